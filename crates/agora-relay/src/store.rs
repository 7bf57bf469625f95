use agora_model::turn::{NewTurn, Turn, TurnId, TurnStatus};
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BoxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationInfo {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub agent_id: String,
}

/// Append-only storage of conversation turns.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn conversation(&self, conversation_id: Uuid) -> Result<Option<ConversationInfo>, BoxError>;

    async fn append(&self, conversation_id: Uuid, turn: NewTurn) -> Result<TurnId, BoxError>;

    /// All turns, oldest first.
    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, BoxError>;

    /// The newest `limit` turns worth replaying to a model, oldest first.
    async fn recent_turns(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<Turn>, BoxError> {
        let turns: Vec<Turn> = self
            .list_turns(conversation_id)
            .await?
            .into_iter()
            .filter(|turn| turn.status != TurnStatus::Failed)
            .collect();
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }
}
