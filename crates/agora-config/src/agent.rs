use std::borrow::Cow;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};
use url::Url;

use crate::error::LlmServiceError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub provider: LlmService,
    #[serde(default)]
    pub tier: AgentTier,
    /// Price in cents, required for premium agents.
    #[serde(default)]
    pub price_cents: Option<u32>,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_owned()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_owned()
}

impl AgentConfig {
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.tier == AgentTier::Free
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, StrumDisplay, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentTier {
    #[default]
    Free,
    Premium,
}

/// Upstream provider of an agent. Any URL selects an OpenAI compatible endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LlmService {
    #[default]
    OpenAI,
    Anthropic,
    Custom(Url),
}

impl FromStr for LlmService {
    type Err = LlmServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmService::OpenAI),
            "anthropic" => Ok(LlmService::Anthropic),
            _ => Url::parse(s)
                .map(LlmService::Custom)
                .map_err(|_| LlmServiceError::UnknownService(s.to_string())),
        }
    }
}

impl TryFrom<String> for LlmService {
    type Error = LlmServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LlmService> for String {
    fn from(value: LlmService) -> Self {
        value.to_string()
    }
}

impl Display for LlmService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmService::OpenAI => f.write_str("openai"),
            LlmService::Anthropic => f.write_str("anthropic"),
            LlmService::Custom(url) => f.write_str(url.as_str()),
        }
    }
}

impl LlmService {
    #[must_use]
    pub fn get_base(&self) -> Cow<'_, str> {
        match self {
            LlmService::OpenAI => "https://api.openai.com/v1".into(),
            LlmService::Anthropic => "https://api.anthropic.com/v1".into(),
            LlmService::Custom(url) => Cow::from(url.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service() {
        assert_eq!("OpenAI".parse::<LlmService>().unwrap(), LlmService::OpenAI);
        assert_eq!("anthropic".parse::<LlmService>().unwrap(), LlmService::Anthropic);
        let custom: LlmService = "http://localhost:8080/v1".parse().unwrap();
        assert_eq!(custom.get_base(), "http://localhost:8080/v1");
        assert!("gemini".parse::<LlmService>().is_err());
    }

    #[test]
    fn test_defaults() {
        let agent: AgentConfig = serde_yml::from_str("id: helper\nname: Helper\n").unwrap();
        assert_eq!(agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(agent.model, DEFAULT_MODEL);
        assert_eq!(agent.provider, LlmService::OpenAI);
        assert!(agent.is_free());
    }
}
