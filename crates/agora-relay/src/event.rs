use agora_model::error_kind::ErrorKind;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Events a session emits towards its client, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum RelayEvent {
    Chunk { conversation_id: Uuid, content: String },
    TurnComplete { conversation_id: Uuid },
    TurnError { conversation_id: Uuid, kind: ErrorKind },
}

impl RelayEvent {
    #[must_use]
    pub fn conversation_id(&self) -> Uuid {
        match self {
            RelayEvent::Chunk { conversation_id, .. }
            | RelayEvent::TurnComplete { conversation_id }
            | RelayEvent::TurnError { conversation_id, .. } => *conversation_id,
        }
    }
}
