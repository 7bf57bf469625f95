use std::time::Duration;

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct LlmServices {
    #[arg(long, env = "OPENAI_API_KEY", required = false)]
    pub openai_key: Option<String>,
    #[arg(long, env = "ANTHROPIC_API_KEY", required = false)]
    pub anthropic_key: Option<String>,
    /// API key for agents that point at a custom OpenAI compatible endpoint.
    #[arg(long, env = "AGORA_CUSTOM_LLM_KEY", required = false)]
    pub custom_key: Option<String>,
    /// Fail a generation when the provider sends nothing for this long.
    #[arg(long = "idle-timeout", env = "AGORA_IDLE_TIMEOUT", default_value_t = 30)]
    pub idle_timeout_secs: u64,
    #[arg(long, env = "AGORA_MAX_TOKENS", default_value_t = 1000)]
    pub max_tokens: u32,
    #[arg(long, env = "AGORA_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,
}

impl LlmServices {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        llm: LlmServices,
    }

    #[test]
    fn test_parse_llm_args() {
        let cli = Cli::try_parse_from(["agora", "--openai-key", "sk-test", "--idle-timeout", "5"]).unwrap();
        assert_eq!(cli.llm.openai_key.as_deref(), Some("sk-test"));
        assert_eq!(cli.llm.idle_timeout(), Duration::from_secs(5));
        assert_eq!(cli.llm.max_tokens, 1000);
    }
}
