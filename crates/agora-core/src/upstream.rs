use std::sync::Arc;

use agora_config::{AgentConfig, LlmService};
use agora_model::turn::Turn;
use async_trait::async_trait;
use tracing::instrument;

use crate::error::UpstreamError;
use crate::llm_config::LlmConfig;
use crate::streaming::{ChunkStream, with_idle_timeout};
use crate::{anthropic, openai};

/// A provider of streamed completions.
///
/// The returned stream is lazy and can be consumed once. It ends with `None` after
/// the provider signalled the end of the answer, or right after the first `Err`.
#[async_trait]
pub trait UpstreamModel: Send + Sync {
    async fn stream(&self, history: Vec<Turn>, agent: &AgentConfig) -> Result<ChunkStream, UpstreamError>;
}

/// Dispatches to the provider configured for the agent.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    config: Arc<LlmConfig>,
    http_client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: LlmConfig) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.idle_timeout)
            .build()
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn std::error::Error, "failed to build http client");
            })?;
        Ok(Self {
            config: Arc::new(config),
            http_client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn open(&self, history: &[Turn], agent: &AgentConfig) -> Result<ChunkStream, UpstreamError> {
        match &agent.provider {
            LlmService::OpenAI | LlmService::Custom(_) => {
                let openai_config = self.config.get_openai_config(&agent.provider)?;
                openai::stream(
                    openai_config,
                    self.http_client.clone(),
                    agent,
                    history,
                    self.config.max_tokens,
                    self.config.temperature,
                )
                .await
            }
            LlmService::Anthropic => anthropic::stream(&self.config, self.http_client.clone(), agent, history).await,
        }
    }
}

#[async_trait]
impl UpstreamModel for UpstreamClient {
    #[instrument(skip_all, fields(agent = %agent.id, provider = %agent.provider))]
    async fn stream(&self, history: Vec<Turn>, agent: &AgentConfig) -> Result<ChunkStream, UpstreamError> {
        let idle_timeout = self.config.idle_timeout;
        // The handshake counts against the idle window as well
        let stream = tokio::time::timeout(idle_timeout, self.open(&history, agent))
            .await
            .map_err(|_| UpstreamError::IdleTimeout(idle_timeout))??;
        Ok(with_idle_timeout(stream, idle_timeout))
    }
}
