use crate::AppConfig;
use agora_model::status::{ComponentState, ComponentStatus};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use http::StatusCode;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::error::Error;
use std::time::Duration;
use tokio::time::timeout;
use tracing::instrument;

const DB_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_router<S>() -> Router<S> {
    Router::new().route("/", get(get_status)).with_state(())
}

#[instrument(skip_all)]
async fn get_db_status(conn: &DatabaseConnection) -> ComponentStatus {
    match timeout(DB_TIMEOUT, conn.ping()).await {
        Ok(Ok(())) => ComponentStatus::new(ComponentState::Ok, None),
        Ok(Err(error)) => {
            tracing::error!(error = &error as &dyn Error, "db error during health check");
            ComponentStatus::from_error_text("database unavailable")
        }
        Err(error) => {
            tracing::error!(error = &error as &dyn Error, "db timeout during health check");
            ComponentStatus::from_error_text("database timeout")
        }
    }
}

#[derive(Debug, Clone)]
struct Status {
    database: ComponentStatus,
    agents: usize,
}

impl Status {
    pub(crate) fn status_code(&self) -> StatusCode {
        if self.database.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Status> for agora_model::status::Status {
    fn from(val: Status) -> Self {
        agora_model::status::Status {
            database: val.database.into_message(),
            agents: val.agents,
        }
    }
}

impl IntoResponse for Status {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let status: agora_model::status::Status = self.into();
        (status_code, Json(status)).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/v0/status",
    responses(
        (status = OK, description = "Server is ok", body = agora_model::status::Status, example = json!(agora_model::status::Status { database: json!("ok"), agents: 5 })),
        (status = INTERNAL_SERVER_ERROR, description = "The database is not reachable", body = agora_model::status::Status),
    ),
    tag = "util"
)]
#[instrument(skip_all)]
pub(crate) async fn get_status(
    Extension(conn): Extension<DatabaseConnection>,
    Extension(app_config): Extension<AppConfig>,
) -> impl IntoResponse {
    Status {
        database: get_db_status(&conn).await,
        agents: app_config.catalog().len(),
    }
}
