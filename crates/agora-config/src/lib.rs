pub mod agent;
pub mod catalog;
pub mod error;

pub use agent::{AgentConfig, AgentTier, LlmService};
pub use catalog::AgentCatalog;
