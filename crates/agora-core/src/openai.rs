use agora_config::AgentConfig;
use agora_model::turn::{Turn, TurnRole};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, FinishReason,
};
use async_stream::try_stream;
use futures::StreamExt;
use tracing::instrument;

use crate::error::UpstreamError;
use crate::streaming::{ChunkStream, TextChunk};

/// Builds the prompt: the agent's system prompt followed by the replayed turns.
pub fn build_messages(agent: &AgentConfig, history: &[Turn]) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(agent.system_prompt.as_str())
            .build()?
            .into(),
    );
    for turn in history.iter().filter(|turn| !turn.content.is_empty()) {
        let message = match turn.role {
            TurnRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.as_str())
                .build()?
                .into(),
            TurnRole::Agent => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.as_str())
                .build()?
                .into(),
        };
        messages.push(message);
    }
    Ok(messages)
}

#[instrument(skip_all, fields(model = %agent.model))]
pub async fn stream(
    openai_config: OpenAIConfig,
    http_client: reqwest::Client,
    agent: &AgentConfig,
    history: &[Turn],
    max_tokens: u32,
    temperature: f32,
) -> Result<ChunkStream, UpstreamError> {
    let request = CreateChatCompletionRequestArgs::default()
        .model(agent.model.as_str())
        .messages(build_messages(agent, history)?)
        .max_tokens(max_tokens)
        .temperature(temperature)
        .stream(true)
        .build()?;

    let client = Client::with_config(openai_config).with_http_client(http_client);

    tracing::debug!("sending streaming OpenAI request");
    let mut response = client.chat().create_stream(request).await?;

    let stream = try_stream! {
        while let Some(chunk) = response.next().await {
            let chunk = chunk?;
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    yield TextChunk::new(content);
                }
            }
            match choice.finish_reason {
                Some(FinishReason::ContentFilter) => {
                    Err::<(), _>(UpstreamError::PolicyRejected("content_filter".to_owned()))?;
                }
                Some(_) => break,
                None => {}
            }
        }
    };
    Ok(stream.boxed())
}
