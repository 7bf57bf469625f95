use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ParseError(#[from] serde_yml::Error),

    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("Premium agent {0} has no price")]
    MissingPrice(String),
}

#[derive(Error, Debug)]
pub enum LlmServiceError {
    #[error("Unknown service: {0}")]
    UnknownService(String),
}
