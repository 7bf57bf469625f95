use std::borrow::Cow;

use agora_config::AgentConfig;
use agora_model::turn::{Turn, TurnRole};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest_sse::EventSource;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::UpstreamError;
use crate::llm_config::{ANTHROPIC_VERSION, LlmConfig};
use crate::streaming::{ChunkStream, TextChunk};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<InputMessage<'a>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct InputMessage<'a> {
    role: &'static str,
    content: Cow<'a, str>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: ContentDelta },
    MessageDelta { delta: MessageDeltaBody },
    MessageStop {},
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic expects alternating roles starting with a user message. Consecutive
/// turns with the same role are joined with a blank line.
fn build_messages(history: &[Turn]) -> Vec<InputMessage<'_>> {
    let mut messages: Vec<InputMessage<'_>> = Vec::with_capacity(history.len());
    for turn in history.iter().filter(|turn| !turn.content.is_empty()) {
        let role = match turn.role {
            TurnRole::User => "user",
            TurnRole::Agent => "assistant",
        };
        if messages.is_empty() && role == "assistant" {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                let content = last.content.to_mut();
                content.push_str("\n\n");
                content.push_str(&turn.content);
            }
            _ => messages.push(InputMessage {
                role,
                content: Cow::Borrowed(turn.content.as_str()),
            }),
        }
    }
    messages
}

#[instrument(skip_all, fields(model = %agent.model))]
pub async fn stream(
    config: &LlmConfig,
    http_client: reqwest::Client,
    agent: &AgentConfig,
    history: &[Turn],
) -> Result<ChunkStream, UpstreamError> {
    let request = MessagesRequest {
        model: agent.model.as_str(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        stream: true,
        system: Some(agent.system_prompt.as_str()).filter(|prompt| !prompt.is_empty()),
        messages: build_messages(history),
    };

    tracing::debug!("sending streaming Anthropic request");
    let response = http_client
        .post(format!("{}/messages", config.get_anthropic_base()))
        .header("x-api-key", config.get_anthropic_key()?)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status, body });
    }

    let mut events = Box::pin(
        response
            .events()
            .await
            .map_err(|error| UpstreamError::EventStream(error.to_string()))?,
    );

    let stream = try_stream! {
        while let Some(event) = events.next().await {
            let event = event.map_err(|error| UpstreamError::EventStream(error.to_string()))?;
            if event.data.is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamEvent>(&event.data)? {
                StreamEvent::ContentBlockDelta { delta: ContentDelta::TextDelta { text } } => {
                    if !text.is_empty() {
                        yield TextChunk::new(text);
                    }
                }
                StreamEvent::MessageDelta { delta } => {
                    if delta.stop_reason.as_deref() == Some("refusal") {
                        Err::<(), _>(UpstreamError::PolicyRejected("refusal".to_owned()))?;
                    }
                }
                StreamEvent::MessageStop {} => break,
                StreamEvent::Error { error } => {
                    Err::<(), _>(UpstreamError::Provider {
                        error_type: error.error_type,
                        message: error.message,
                    })?;
                }
                StreamEvent::ContentBlockDelta { .. } | StreamEvent::Other => {}
            }
        }
    };
    Ok(stream.boxed())
}
