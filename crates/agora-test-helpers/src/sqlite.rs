use crate::TestDb;
use agora_db::schema::setup_schema;
use sea_orm::{Database, DatabaseConnection, DbErr};
use std::borrow::Cow;
use tempfile::TempDir;
use thiserror::Error;

/// A file backed sqlite database that lives as long as the value.
pub struct SqliteDb {
    // Dropping the directory deletes the database.
    #[allow(dead_code)]
    temp_dir: TempDir,
    uri: String,
}

#[derive(Error, Debug)]
pub enum SqliteError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl SqliteDb {
    pub fn new() -> Result<Self, SqliteError> {
        let temp_dir = TempDir::with_prefix("test-sqlite-db")?;
        let uri = temp_dir
            .path()
            .join("db.sqlite")
            .to_str()
            .ok_or(std::io::Error::new(std::io::ErrorKind::InvalidData, "Invalid path"))?
            .to_owned();
        let uri = format!("sqlite://{uri}?mode=rwc");

        tracing::info!(uri = ?uri, "return sqlite db uri");
        Ok(Self { temp_dir, uri })
    }

    /// Connects to the database and creates the schema.
    pub async fn connect(&self) -> Result<DatabaseConnection, SqliteError> {
        let conn = Database::connect(self.uri.as_str()).await?;
        setup_schema(&conn).await?;
        Ok(conn)
    }
}

impl TestDb for SqliteDb {
    fn db_uri(&self) -> Cow<'_, str> {
        self.uri.as_str().into()
    }
}
