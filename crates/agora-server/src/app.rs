use crate::auth::AuthConfig;
use crate::{AppConfig, routes};
use axum::{Extension, Router};
use http::{Method, header};
use sea_orm::DatabaseConnection;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_app(
    app_config: AppConfig,
    auth_config: AuthConfig,
    origins: &[String],
    seaorm_pool: DatabaseConnection,
) -> anyhow::Result<Router> {
    let api_cors = CorsLayer::new()
        .allow_origin(
            origins
                .iter()
                .map(|origin| origin.parse())
                .collect::<Result<Vec<_>, _>>()?,
        )
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ORIGIN,
            header::UPGRADE,
            header::SEC_WEBSOCKET_KEY,
            header::SEC_WEBSOCKET_VERSION,
            header::SEC_WEBSOCKET_EXTENSIONS,
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .max_age(Duration::from_secs(3600));

    let app = Router::new()
        .merge(routes::openapi::create_router())
        .nest(
            "/api/v0",
            Router::new()
                .nest("/status", routes::api::v0::status::create_router())
                .nest("/agents", routes::api::v0::agents::create_router())
                .nest("/conversations", routes::api::v0::conversations::create_router())
                .nest("/admin", routes::api::v0::admin::create_router())
                .nest("/chat", routes::api::v0::chat::create_router())
                .layer(api_cors),
        )
        .layer(
            // Router layers are called bottom to top
            // ServiceBuilder layers are called top to bottom
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(app_config))
                .layer(Extension(auth_config))
                .layer(Extension(seaorm_pool)),
        )
        .with_state(());
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{issue_token, valid_until};
    use crate::relay::{DbEntitlementChecker, DbMessageStore};
    use agora_config::AgentCatalog;
    use agora_core::UpstreamClient;
    use agora_core::llm_config::LlmConfig;
    use agora_entity::user::Role;
    use agora_relay::{RelayConfig, SessionManager};
    use agora_test_helpers::SqliteDb;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use test_log::test;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    struct TestApp {
        _db: SqliteDb,
        conn: DatabaseConnection,
        router: Router,
    }

    impl TestApp {
        async fn new() -> Self {
            let db = SqliteDb::new().unwrap();
            let conn = db.connect().await.unwrap();
            let catalog = Arc::new(AgentCatalog::builtin().unwrap());
            let sessions = SessionManager::new(
                Arc::new(DbMessageStore::new(conn.clone())),
                Arc::new(UpstreamClient::new(LlmConfig::builder().build()).unwrap()),
                Arc::new(DbEntitlementChecker::new(conn.clone())),
                Arc::clone(&catalog),
                RelayConfig::default(),
            );
            let router = create_app(
                AppConfig::new(catalog, sessions),
                AuthConfig::new(SECRET),
                &["http://localhost:8080".to_string()],
                conn.clone(),
            )
            .unwrap();
            Self { _db: db, conn, router }
        }

        async fn call(&self, method: Method, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                let token = issue_token(SECRET, &user.to_string(), None, valid_until());
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(body) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(body.to_string())
                }
                None => Body::empty(),
            };
            let response = self.router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    #[test(tokio::test)]
    async fn test_status() {
        let app = TestApp::new().await;
        let (status, body) = app.call(Method::GET, "/api/v0/status", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["agents"], 5);
    }

    #[test(tokio::test)]
    async fn test_requires_token() {
        let app = TestApp::new().await;
        let (status, _) = app.call(Method::GET, "/api/v0/agents", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v0/agents")
                    .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test(tokio::test)]
    async fn test_list_agents_marks_access() {
        let app = TestApp::new().await;
        let (status, body) = app.call(Method::GET, "/api/v0/agents", Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::OK);
        let agents = body.as_array().unwrap();
        assert_eq!(agents.len(), 5);
        let advisor = agents.iter().find(|agent| agent["id"] == "business-advisor").unwrap();
        assert_eq!(advisor["tier"], "premium");
        assert_eq!(advisor["has_access"], false);
        let helper = agents.iter().find(|agent| agent["id"] == "code-helper").unwrap();
        assert_eq!(helper["has_access"], true);

        let (status, _) = app.call(Method::GET, "/api/v0/agents/nobody", Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test(tokio::test)]
    async fn test_create_conversation() {
        let app = TestApp::new().await;
        let user = Uuid::new_v4();

        let (status, body) = app
            .call(Method::POST, "/api/v0/conversations", Some(user), Some(json!({"agent_id": "code-helper"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["agent_id"], "code-helper");

        let (status, _) = app
            .call(Method::POST, "/api/v0/conversations", Some(user), Some(json!({"agent_id": "business-advisor"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .call(Method::POST, "/api/v0/conversations", Some(user), Some(json!({"agent_id": "nobody"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app.call(Method::GET, "/api/v0/conversations", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[test(tokio::test)]
    async fn test_turns_of_foreign_conversation() {
        let app = TestApp::new().await;
        let owner = Uuid::new_v4();
        let (_, body) = app
            .call(Method::POST, "/api/v0/conversations", Some(owner), Some(json!({"agent_id": "code-helper"})))
            .await;
        let conversation_id = body["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v0/conversations/{conversation_id}/turns");

        let (status, body) = app.call(Method::GET, &uri, Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = app.call(Method::GET, &uri, Some(Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test(tokio::test)]
    async fn test_grant_requires_admin() {
        let app = TestApp::new().await;
        let admin = Uuid::new_v4();
        let customer = Uuid::new_v4();
        // Both users have to exist before access can be granted.
        app.call(Method::GET, "/api/v0/agents", Some(customer), None).await;
        let uri = format!("/api/v0/admin/access/{customer}/business-advisor");

        let (status, _) = app.call(Method::PUT, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        agora_db::user::Mutation::set_role(&app.conn, admin, Role::Admin)
            .await
            .unwrap();
        let (status, _) = app.call(Method::PUT, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .call(Method::POST, "/api/v0/conversations", Some(customer), Some(json!({"agent_id": "business-advisor"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app.call(Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.call(Method::DELETE, &uri, Some(admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test(tokio::test)]
    async fn test_openapi_document() {
        let app = TestApp::new().await;
        let (status, body) = app.call(Method::GET, "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v0/chat/ws"].is_object());
    }
}
