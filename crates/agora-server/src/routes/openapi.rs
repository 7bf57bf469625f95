use super::api;

use crate::routes::api::v0::chat::{ClientFrame, ControlFrame, RejectReason};
use agora_relay::RelayEvent;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::Components;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder};
use utoipa::{Modify, OpenApi, openapi::security::SecurityScheme};

struct SecurityAddon;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::v0::status::get_status,
        api::v0::agents::list_agents,
        api::v0::agents::get_agent,
        api::v0::conversations::list_conversations,
        api::v0::conversations::create_conversation,
        api::v0::conversations::list_turns,
        api::v0::admin::grant_access,
        api::v0::admin::revoke_access,
        api::v0::chat::setup_ws,
    ),
    components(schemas(ClientFrame, ControlFrame, RejectReason, RelayEvent)),
    modifiers(&SecurityAddon),
    tags()
)]
pub(crate) struct ApiDoc;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Components::new);
        components.add_security_scheme(
            "token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("Api Token"))
                    .build(),
            ),
        );
    }
}

pub fn create_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v0/status",
            "/api/v0/agents",
            "/api/v0/conversations/{conversation_id}/turns",
            "/api/v0/admin/access/{user_id}/{agent_id}",
            "/api/v0/chat/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("token"));
        assert!(components.schemas.contains_key("RelayEvent"));
    }
}
