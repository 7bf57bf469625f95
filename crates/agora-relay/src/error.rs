use thiserror::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reasons a submit is rejected before any generation starts.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("A generation is already running for conversation {0}")]
    Conflict(Uuid),

    #[error("Not allowed to use conversation {0}")]
    Forbidden(Uuid),

    #[error("Conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Message store failed")]
    Store(#[source] BoxError),

    #[error("Entitlement check failed")]
    Entitlement(#[source] BoxError),
}
