use crate::auth::AuthConfig;
use agora_db::user;
use agora_model::user::User;
use agora_model_tools::convert::IntoModel;
use axum::extract::FromRequestParts;
use axum::{Extension, RequestPartsExt};
use axum_auth::AuthBearer;
use axum_extra::extract::Cached;
use http::StatusCode;
use http::request::Parts;
use sea_orm::DatabaseConnection;
use std::error::Error;
use url::form_urlencoded;

/// Browsers can't set headers on websocket upgrades, so the token may also come as a query parameter.
pub fn extract_auth_token_from_params(parts: &Parts) -> Option<String> {
    if let Some(query) = parts.uri.query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == "access_token" {
                return Some(value.to_string());
            }
        }
    }
    None
}

type Rejection = (StatusCode, &'static str);

#[derive(Clone)]
struct Session {
    user: User,
}

#[derive(Clone)]
pub(crate) struct ExtractUser(pub User);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = if let Ok(AuthBearer(token)) = parts.extract::<AuthBearer>().await {
            token
        } else if let Some(token) = extract_auth_token_from_params(parts) {
            token
        } else {
            return Err((StatusCode::UNAUTHORIZED, "No authentication token provided"));
        };

        let Extension(auth_config) = parts.extract::<Extension<AuthConfig>>().await.map_err(|error| {
            tracing::error!(error = &error as &dyn Error, "auth config not found in app data");
            (StatusCode::INTERNAL_SERVER_ERROR, "Auth config not found")
        })?;
        let Extension::<DatabaseConnection>(conn) =
            parts
                .extract::<Extension<DatabaseConnection>>()
                .await
                .map_err(|error| {
                    tracing::error!(
                        error = &error as &dyn Error,
                        "database connection not found in app data"
                    );
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database Connection not found")
                })?;

        let verified = auth_config.validate_jwt(&token).map_err(|error| {
            tracing::debug!(error = &error as &dyn Error, "rejecting token");
            (StatusCode::UNAUTHORIZED, "Invalid token")
        })?;

        let user = user::Mutation::ensure_user(&conn, verified.id, verified.email)
            .await
            .map_err(|error| {
                tracing::error!(error = &error as &dyn Error, "failed to create user");
                (StatusCode::INTERNAL_SERVER_ERROR, "Error creating user")
            })?;

        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(user.id.as_hyphenated().to_string()),
                ..Default::default()
            }));
        });

        Ok(Self {
            user: user.into_model(),
        })
    }
}

impl<S> FromRequestParts<S> for ExtractUser
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session: Session = Cached::<Session>::from_request_parts(parts, state).await?.0;
        Ok(Self(session.user))
    }
}
