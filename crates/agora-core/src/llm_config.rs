use std::time::Duration;

use agora_config::LlmService;
use agora_utils::args::llm::LlmServices as LlmServiceArgs;
use async_openai::config::OpenAIConfig;
use typed_builder::TypedBuilder;

use crate::error::UpstreamError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Default)]
pub struct LlmServiceConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct LlmConfig {
    #[builder(default)]
    openai: LlmServiceConfig,
    #[builder(default)]
    anthropic: LlmServiceConfig,
    #[builder(default)]
    custom: LlmServiceConfig,
    #[builder(default = LlmService::Anthropic.get_base().into_owned(), setter(into))]
    anthropic_base: String,
    #[builder(default = Duration::from_secs(30))]
    pub idle_timeout: Duration,
    #[builder(default = 1000)]
    pub max_tokens: u32,
    #[builder(default = 0.7)]
    pub temperature: f32,
}

impl From<LlmServiceArgs> for LlmConfig {
    fn from(config: LlmServiceArgs) -> LlmConfig {
        LlmConfig::builder()
            .openai(LlmServiceConfig { key: config.openai_key.clone() })
            .anthropic(LlmServiceConfig {
                key: config.anthropic_key.clone(),
            })
            .custom(LlmServiceConfig { key: config.custom_key.clone() })
            .idle_timeout(config.idle_timeout())
            .max_tokens(config.max_tokens)
            .temperature(config.temperature)
            .build()
    }
}

impl LlmConfig {
    fn service_config(&self, service: &LlmService) -> &LlmServiceConfig {
        match service {
            LlmService::OpenAI => &self.openai,
            LlmService::Anthropic => &self.anthropic,
            LlmService::Custom(_) => &self.custom,
        }
    }

    /// Client configuration for OpenAI compatible services.
    pub fn get_openai_config(&self, service: &LlmService) -> Result<OpenAIConfig, UpstreamError> {
        let key = self.service_config(service).key.as_deref();
        // Self hosted endpoints often run without a key
        let key = match (service, key) {
            (_, Some(key)) => key,
            (LlmService::Custom(_), None) => "",
            (_, None) => return Err(UpstreamError::MissingCredentials(service.clone())),
        };
        Ok(OpenAIConfig::default()
            .with_api_base(service.get_base())
            .with_api_key(key))
    }

    pub fn get_anthropic_key(&self) -> Result<&str, UpstreamError> {
        self.anthropic
            .key
            .as_deref()
            .ok_or(UpstreamError::MissingCredentials(LlmService::Anthropic))
    }

    #[must_use]
    pub fn get_anthropic_base(&self) -> &str {
        self.anthropic_base.trim_end_matches('/')
    }

    #[must_use]
    pub fn has_key(&self, service: &LlmService) -> bool {
        self.service_config(service).key.is_some()
    }
}
