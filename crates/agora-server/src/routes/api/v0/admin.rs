use crate::AppConfig;
use crate::routes::error::ApiError;
use crate::user::ExtractUser;
use agora_db::sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use agora_db::util::FlattenTransactionResultExt;
use agora_db::{activity_log, agent_access, user as db_user};
use agora_entity::activity_log::Action;
use agora_model::user::User;
use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::put;
use axum::{Extension, Router};
use http::StatusCode;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

pub(crate) fn create_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/access/{user_id}/{agent_id}", put(grant_access).delete(revoke_access))
        .with_state(())
}

fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, "admin route called without admin role");
        Err(ApiError::AdminRequired)
    }
}

#[utoipa::path(
    put,
    path = "/api/v0/admin/access/{user_id}/{agent_id}",
    responses(
        (status = NO_CONTENT, description = "The user may use the agent"),
        (status = FORBIDDEN, description = "The caller is not an admin", body = crate::routes::error::ErrorData),
        (status = NOT_FOUND, description = "Unknown user or agent", body = crate::routes::error::ErrorData),
    ),
    params(
        ("user_id" = Uuid, Path, description = "user receiving access"),
        ("agent_id" = String, Path, description = "agent to unlock", example = "business-advisor"),
    ),
    tag = "v0/admin",
    security(
        ("token" = [])
    )
)]
#[instrument(skip(admin, app_config, conn), fields(admin_id = %admin.id))]
pub(crate) async fn grant_access(
    ExtractUser(admin): ExtractUser,
    Path((user_id, agent_id)): Path<(Uuid, String)>,
    Extension(app_config): Extension<AppConfig>,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&admin)?;
    if app_config.catalog().get(&agent_id).is_none() {
        return Err(ApiError::AgentNotFound(agent_id));
    }
    if db_user::Query::find_user_by_id(&conn, user_id).await?.is_none() {
        return Err(ApiError::UserNotFound);
    }

    let admin_id = admin.id;
    conn.transaction::<_, _, DbErr>(move |txn| {
        Box::pin(async move {
            agent_access::Mutation::grant(txn, user_id, agent_id.clone(), Some(admin_id)).await?;
            activity_log::Mutation::record(
                txn,
                user_id,
                Action::AccessGranted,
                Some(json!({ "agent_id": agent_id, "granted_by": admin_id })),
            )
            .await
        })
    })
    .await
    .flatten_res()?;
    tracing::info!(%user_id, "granted agent access");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/v0/admin/access/{user_id}/{agent_id}",
    responses(
        (status = NO_CONTENT, description = "The access record was removed"),
        (status = FORBIDDEN, description = "The caller is not an admin", body = crate::routes::error::ErrorData),
        (status = NOT_FOUND, description = "There was no access record", body = crate::routes::error::ErrorData),
    ),
    params(
        ("user_id" = Uuid, Path, description = "user losing access"),
        ("agent_id" = String, Path, description = "agent to lock", example = "business-advisor"),
    ),
    tag = "v0/admin",
    security(
        ("token" = [])
    )
)]
#[instrument(skip(admin, conn), fields(admin_id = %admin.id))]
pub(crate) async fn revoke_access(
    ExtractUser(admin): ExtractUser,
    Path((user_id, agent_id)): Path<(Uuid, String)>,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&admin)?;

    let admin_id = admin.id;
    let revoked = conn
        .transaction::<_, _, DbErr>(move |txn| {
            Box::pin(async move {
                let revoked = agent_access::Mutation::revoke(txn, user_id, &agent_id).await?;
                if revoked {
                    activity_log::Mutation::record(
                        txn,
                        user_id,
                        Action::AccessRevoked,
                        Some(json!({ "agent_id": agent_id, "revoked_by": admin_id })),
                    )
                    .await?;
                }
                Ok(revoked)
            })
        })
        .await
        .flatten_res()?;
    if !revoked {
        return Err(ApiError::AccessNotFound);
    }
    tracing::info!(%user_id, "revoked agent access");
    // Running generations keep going, the next submit is checked again.
    Ok(StatusCode::NO_CONTENT)
}
