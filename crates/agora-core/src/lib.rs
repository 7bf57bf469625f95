pub mod anthropic;
pub mod error;
pub mod llm_config;
pub mod openai;
pub mod streaming;
pub mod upstream;

pub use error::UpstreamError;
pub use streaming::{ChunkStream, TextChunk};
pub use upstream::{UpstreamClient, UpstreamModel};
