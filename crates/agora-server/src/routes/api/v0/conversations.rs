use crate::AppConfig;
use crate::relay::DbEntitlementChecker;
use crate::routes::error::ApiError;
use crate::user::ExtractUser;
use agora_db::{conversation, turn};
use agora_model::conversation::{Conversation, NewConversation};
use agora_model::turn::Turn;
use agora_model_tools::convert::IntoModel;
use axum::extract::Path;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use http::StatusCode;
use sea_orm::DatabaseConnection;
use tracing::instrument;
use uuid::Uuid;

pub(crate) fn create_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route("/{conversation_id}/turns", get(list_turns))
        .with_state(())
}

#[utoipa::path(
    post,
    path = "/api/v0/conversations",
    request_body = NewConversation,
    responses(
        (status = CREATED, description = "The new conversation", body = Conversation),
        (status = FORBIDDEN, description = "The agent requires a purchase", body = crate::routes::error::ErrorData),
        (status = NOT_FOUND, description = "The agent does not exist", body = crate::routes::error::ErrorData),
    ),
    tag = "v0/conversations",
    security(
        ("token" = [])
    )
)]
#[instrument(skip_all, fields(user_id = %user.id, agent_id = %request.agent_id))]
pub(crate) async fn create_conversation(
    ExtractUser(user): ExtractUser,
    Extension(app_config): Extension<AppConfig>,
    Extension(conn): Extension<DatabaseConnection>,
    Json(request): Json<NewConversation>,
) -> Result<impl IntoResponse, ApiError> {
    let NewConversation { agent_id, title } = request;
    let agent = app_config
        .catalog()
        .get(&agent_id)
        .ok_or_else(|| ApiError::AgentNotFound(agent_id.clone()))?;
    if !DbEntitlementChecker::new(conn.clone()).check(user.id, &agent).await? {
        return Err(ApiError::AgentForbidden(agent_id));
    }

    let conversation = conversation::Mutation::create_conversation(&conn, user.id, agent_id, title).await?;
    tracing::debug!(conversation_id = %conversation.conversation_id, "created conversation");
    let conversation: Conversation = conversation.into_model();
    Ok((StatusCode::CREATED, Json(conversation)))
}

#[utoipa::path(
    get,
    path = "/api/v0/conversations",
    responses(
        (status = OK, description = "The conversations of the current user, recently active first", body = [Conversation]),
    ),
    tag = "v0/conversations",
    security(
        ("token" = [])
    )
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub(crate) async fn list_conversations(
    ExtractUser(user): ExtractUser,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations: Vec<Conversation> = conversation::Query::get_all_conversations_from_user(&conn, user.id)
        .await?
        .into_iter()
        .map(IntoModel::into_model)
        .collect();
    Ok(Json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/v0/conversations/{conversation_id}/turns",
    responses(
        (status = OK, description = "The turns of the conversation in order", body = [Turn]),
        (status = NOT_FOUND, description = "No conversation with this id belongs to the user", body = crate::routes::error::ErrorData),
    ),
    params(
        ("conversation_id" = Uuid, Path, description = "id of the conversation"),
    ),
    tag = "v0/conversations",
    security(
        ("token" = [])
    )
)]
#[instrument(skip(user, conn), fields(user_id = %user.id))]
pub(crate) async fn list_turns(
    ExtractUser(user): ExtractUser,
    Path(conversation_id): Path<Uuid>,
    Extension(conn): Extension<DatabaseConnection>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = conversation::Query::get_conversation(&conn, conversation_id).await?;
    if !conversation.is_some_and(|conversation| conversation.user_id == user.id) {
        return Err(ApiError::ConversationNotFound);
    }
    let turns: Vec<Turn> = turn::Query::list_turns(&conn, conversation_id)
        .await?
        .into_iter()
        .map(IntoModel::into_model)
        .collect();
    Ok(Json(turns))
}
