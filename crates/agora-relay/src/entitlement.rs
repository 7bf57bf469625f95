use agora_config::AgentConfig;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BoxError;

/// Decides whether a user may talk to an agent. Consulted once per submit.
#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    async fn is_entitled(&self, user_id: Uuid, agent: &AgentConfig) -> Result<bool, BoxError>;
}
