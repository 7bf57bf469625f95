pub mod entitlement;
pub mod error;
pub mod event;
pub mod generation;
pub mod session;
pub mod store;

pub use entitlement::EntitlementChecker;
pub use error::{BoxError, RelayError};
pub use event::RelayEvent;
pub use generation::{GenerationHandle, GenerationState};
pub use session::{RelayConfig, Session, SessionManager};
pub use store::{ConversationInfo, MessageStore};
