use axum::Json;
use axum::response::{IntoResponse, Response};
use sea_orm::DbErr;
use serde::Serialize;
use std::error::Error;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub(crate) enum ApiError {
    #[error("Agent {0} not found")]
    AgentNotFound(String),

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("No access to agent {0}")]
    AgentForbidden(String),

    #[error("Admin role required")]
    AdminRequired,

    #[error("User not found")]
    UserNotFound,

    #[error("Access record not found")]
    AccessNotFound,

    #[error("Database Error")]
    Database(#[from] DbErr),
}

pub(crate) trait GetStatusCode {
    fn status_code(&self) -> http::StatusCode;
}

impl GetStatusCode for ApiError {
    fn status_code(&self) -> http::StatusCode {
        match self {
            Self::AgentNotFound(_) | Self::ConversationNotFound | Self::UserNotFound | Self::AccessNotFound => {
                http::StatusCode::NOT_FOUND
            }
            Self::AgentForbidden(_) | Self::AdminRequired => http::StatusCode::FORBIDDEN,
            Self::Database(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ErrorData {
    pub(crate) error: String,
    pub(crate) status_code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if let Self::Database(error) = &self {
            tracing::error!(error = error as &dyn Error, "database error while handling request");
        }
        let data = ErrorData {
            error: self.to_string(),
            status_code: status_code.as_u16(),
        };
        (status_code, Json(data)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::AgentNotFound("x".to_owned()).status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::AdminRequired.status_code(), http::StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Database(DbErr::Custom("boom".to_owned())).status_code(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
