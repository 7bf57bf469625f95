use sea_orm::{ConnectionTrait, DatabaseBackend, DbErr};

/// Creates all relay tables if they do not exist yet.
pub async fn setup_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let schema = match db.get_database_backend() {
        DatabaseBackend::Postgres => include_str!("../sql/postgres.sql"),
        DatabaseBackend::Sqlite => include_str!("../sql/sqlite.sql"),
        DatabaseBackend::MySql => return Err(DbErr::Custom("mysql is not supported".to_owned())),
    };
    tracing::debug!(backend = ?db.get_database_backend(), "setting up schema");
    db.execute_unprepared(schema).await?;
    Ok(())
}
