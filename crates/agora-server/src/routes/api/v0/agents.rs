use crate::AppConfig;
use crate::relay::grants_access;
use crate::routes::error::ApiError;
use crate::user::ExtractUser;
use agora_config::AgentConfig;
use agora_db::agent_access;
use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;
use utoipa::ToSchema;

pub(crate) fn create_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_agents))
        .route("/{agent_id}", get(get_agent))
        .with_state(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub(crate) struct AgentInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub avatar: String,
    pub capabilities: Vec<String>,
    pub model: String,
    /// `free` or `premium`
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<u32>,
    pub has_access: bool,
}

impl AgentInfo {
    fn new(agent: &AgentConfig, has_access: bool) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            description: agent.description.clone(),
            avatar: agent.avatar.clone(),
            capabilities: agent.capabilities.clone(),
            model: agent.model.clone(),
            tier: agent.tier.to_string(),
            price_cents: agent.price_cents,
            has_access,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v0/agents",
    responses(
        (status = OK, description = "All agents offered by the marketplace", body = [AgentInfo]),
    ),
    tag = "v0/agents",
    security(
        ("token" = [])
    )
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub(crate) async fn list_agents(
    ExtractUser(user): ExtractUser,
    Extension(app_config): Extension<AppConfig>,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    let granted: HashSet<String> = agent_access::Query::get_user_access(&conn, user.id)
        .await?
        .into_iter()
        .map(|access| access.agent_id)
        .collect();
    let agents: Vec<AgentInfo> = app_config
        .catalog()
        .iter()
        .map(|agent| AgentInfo::new(agent, grants_access(agent, user.is_admin(), granted.contains(&agent.id))))
        .collect();
    Ok(Json(agents))
}

#[utoipa::path(
    get,
    path = "/api/v0/agents/{agent_id}",
    responses(
        (status = OK, description = "A single agent", body = AgentInfo),
        (status = NOT_FOUND, description = "The agent does not exist", body = crate::routes::error::ErrorData),
    ),
    params(
        ("agent_id" = String, Path, description = "id of the agent", example = "code-helper"),
    ),
    tag = "v0/agents",
    security(
        ("token" = [])
    )
)]
#[instrument(skip(user, app_config, conn), fields(user_id = %user.id))]
pub(crate) async fn get_agent(
    ExtractUser(user): ExtractUser,
    Path(agent_id): Path<String>,
    Extension(app_config): Extension<AppConfig>,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    let agent = app_config
        .catalog()
        .get(&agent_id)
        .ok_or(ApiError::AgentNotFound(agent_id))?;
    let has_record = agent_access::Query::has_access(&conn, user.id, &agent.id).await?;
    Ok(Json(AgentInfo::new(
        &agent,
        grants_access(&agent, user.is_admin(), has_record),
    )))
}
