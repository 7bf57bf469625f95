use std::time::Duration;

use agora_config::{AgentConfig, AgentTier, LlmService};
use agora_core::llm_config::{LlmConfig, LlmServiceConfig};
use agora_core::{UpstreamClient, UpstreamModel};
use agora_model::error_kind::ErrorKind;
use agora_model::turn::{Turn, TurnRole, TurnStatus};
use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use chrono::Utc;
use futures::StreamExt;
use test_log::test;
use tokio::net::TcpListener;
use uuid::Uuid;

const ANTHROPIC_EVENTS: &str = concat!(
    "event: message_start\n",
    "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"content\":[]}}\n\n",
    "event: content_block_start\n",
    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
    "event: ping\n",
    "data: {\"type\":\"ping\"}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" there!\"}}\n\n",
    "event: content_block_stop\n",
    "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
    "event: message_delta\n",
    "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":3}}\n\n",
    "event: message_stop\n",
    "data: {\"type\":\"message_stop\"}\n\n",
);

const ANTHROPIC_RATE_LIMITED_MID_STREAM: &str = concat!(
    "event: content_block_delta\n",
    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Sure,\"}}\n\n",
    "event: error\n",
    "data: {\"type\":\"error\",\"error\":{\"type\":\"rate_limit_error\",\"message\":\"Number of request tokens has exceeded your rate limit\"}}\n\n",
);

const OPENAI_EVENTS: &str = concat!(
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" there!\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{address}/v1")
}

fn event_stream(body: &'static str) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

fn agent(provider: LlmService) -> AgentConfig {
    AgentConfig {
        id: "code-helper".to_owned(),
        name: "Code Helper".to_owned(),
        description: String::new(),
        avatar: String::new(),
        capabilities: Vec::new(),
        system_prompt: "You are a helpful AI assistant.".to_owned(),
        model: "test-model".to_owned(),
        provider,
        tier: AgentTier::Free,
        price_cents: None,
    }
}

fn history() -> Vec<Turn> {
    vec![Turn {
        conversation_id: Uuid::new_v4(),
        turn_order: 0,
        role: TurnRole::User,
        content: "Hello".to_owned(),
        status: TurnStatus::Complete,
        created_at: Utc::now().naive_utc(),
    }]
}

fn anthropic_client(base: String, idle_timeout: Duration) -> UpstreamClient {
    UpstreamClient::new(
        LlmConfig::builder()
            .anthropic(LlmServiceConfig {
                key: Some("test-key".to_owned()),
            })
            .anthropic_base(base)
            .idle_timeout(idle_timeout)
            .build(),
    )
    .unwrap()
}

#[test(tokio::test)]
async fn test_anthropic_stream() {
    let base = serve(Router::new().route("/v1/messages", post(|| async { event_stream(ANTHROPIC_EVENTS) }))).await;
    let client = anthropic_client(base, Duration::from_secs(5));

    let Ok(stream) = client.stream(history(), &agent(LlmService::Anthropic)).await else {
        panic!("stream should open");
    };
    let chunks: Vec<_> = stream.map(|chunk| chunk.unwrap().text).collect().await;
    assert_eq!(chunks, ["Hi", " there!"]);
}

#[test(tokio::test)]
async fn test_anthropic_rate_limited_before_stream() {
    let base = serve(Router::new().route(
        "/v1/messages",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#,
            )
        }),
    ))
    .await;
    let client = anthropic_client(base, Duration::from_secs(5));

    let Err(error) = client.stream(history(), &agent(LlmService::Anthropic)).await else {
        panic!("stream should fail");
    };
    assert_eq!(error.kind(), ErrorKind::RateLimited);
}

#[test(tokio::test)]
async fn test_anthropic_error_after_first_chunk() {
    let base = serve(Router::new().route(
        "/v1/messages",
        post(|| async { event_stream(ANTHROPIC_RATE_LIMITED_MID_STREAM) }),
    ))
    .await;
    let client = anthropic_client(base, Duration::from_secs(5));

    let Ok(mut stream) = client.stream(history(), &agent(LlmService::Anthropic)).await else {
        panic!("stream should open");
    };
    assert_eq!(stream.next().await.unwrap().unwrap().text, "Sure,");
    let error = stream.next().await.unwrap().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::RateLimited);
    assert!(stream.next().await.is_none());
}

#[test(tokio::test)]
async fn test_idle_stream_fails_as_unavailable() {
    let base = serve(Router::new().route(
        "/v1/messages",
        post(|| async {
            let body = Body::from_stream(futures::stream::pending::<Result<String, std::io::Error>>());
            ([(header::CONTENT_TYPE, "text/event-stream")], body)
        }),
    ))
    .await;
    let client = anthropic_client(base, Duration::from_millis(200));

    // Depending on when the headers are flushed the timeout hits the handshake or the first read
    let error = match client.stream(history(), &agent(LlmService::Anthropic)).await {
        Ok(mut stream) => stream.next().await.unwrap().unwrap_err(),
        Err(error) => error,
    };
    assert_eq!(error.kind(), ErrorKind::UpstreamUnavailable);
}

#[test(tokio::test)]
async fn test_missing_key_is_unavailable() {
    let client = UpstreamClient::new(LlmConfig::builder().build()).unwrap();

    let Err(error) = client.stream(history(), &agent(LlmService::OpenAI)).await else {
        panic!("stream should fail");
    };
    assert_eq!(error.kind(), ErrorKind::UpstreamUnavailable);
}

#[test(tokio::test)]
async fn test_openai_compatible_stream() {
    let base = serve(Router::new().route(
        "/v1/chat/completions",
        post(|| async { event_stream(OPENAI_EVENTS) }),
    ))
    .await;
    let client = UpstreamClient::new(LlmConfig::builder().build()).unwrap();

    let provider = LlmService::Custom(base.parse().unwrap());
    let Ok(stream) = client.stream(history(), &agent(provider)).await else {
        panic!("stream should open");
    };
    let chunks: Vec<_> = stream.map(|chunk| chunk.unwrap().text).collect().await;
    assert_eq!(chunks, ["Hi", " there!"]);
}
