use std::error::Error;
use std::time::Duration;

use agora_config::LlmService;
use agora_model::error_kind::ErrorKind;
use async_openai::error::OpenAIError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    OpenAi(#[from] OpenAIError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Provider answered with status {status}")]
    Status { status: StatusCode, body: String },

    #[error("Provider error {error_type}: {message}")]
    Provider { error_type: String, message: String },

    #[error("Provider rejected the content: {0}")]
    PolicyRejected(String),

    #[error("No data from provider for {0:?}")]
    IdleTimeout(Duration),

    #[error("Event stream failed: {0}")]
    EventStream(String),

    #[error(transparent)]
    Decode(#[from] serde_json::Error),

    #[error("No API key configured for {0}")]
    MissingCredentials(LlmService),
}

impl UpstreamError {
    /// The stable classification sent to clients.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::OpenAi(error) => classify_openai(error),
            UpstreamError::Http(error) => classify_http(error),
            UpstreamError::Status { status, .. } => classify_status(*status),
            UpstreamError::Provider { error_type, message } => classify_error_type(error_type, message),
            UpstreamError::PolicyRejected(_) => ErrorKind::PolicyRejected,
            UpstreamError::IdleTimeout(_) | UpstreamError::EventStream(_) | UpstreamError::MissingCredentials(_) => {
                ErrorKind::UpstreamUnavailable
            }
            UpstreamError::Decode(_) => ErrorKind::Unknown,
        }
    }

    /// Logs the raw error, which never leaves the server, and returns its kind.
    #[must_use]
    pub fn report(&self) -> ErrorKind {
        let kind = self.kind();
        tracing::warn!(error = self as &dyn Error, %kind, "upstream generation failed");
        kind
    }
}

#[must_use]
pub fn classify_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        429 => ErrorKind::RateLimited,
        401 | 403 | 404 | 408 | 500..=599 => ErrorKind::UpstreamUnavailable,
        _ => ErrorKind::Unknown,
    }
}

fn classify_http(error: &reqwest::Error) -> ErrorKind {
    if let Some(status) = error.status() {
        return classify_status(status);
    }
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        ErrorKind::UpstreamUnavailable
    } else {
        ErrorKind::Unknown
    }
}

fn classify_error_type(error_type: &str, message: &str) -> ErrorKind {
    let error_type = error_type.to_lowercase();
    let message = message.to_lowercase();
    if error_type.contains("rate_limit")
        || matches!(error_type.as_str(), "requests" | "tokens" | "insufficient_quota")
        || message.contains("rate limit")
    {
        ErrorKind::RateLimited
    } else if error_type.contains("content_policy")
        || error_type.contains("content_filter")
        || message.contains("content policy")
        || message.contains("content management policy")
    {
        ErrorKind::PolicyRejected
    } else if matches!(
        error_type.as_str(),
        "overloaded_error" | "api_error" | "server_error" | "authentication_error" | "permission_error" | "timeout_error"
    ) || message.contains("api key")
    {
        ErrorKind::UpstreamUnavailable
    } else {
        ErrorKind::Unknown
    }
}

fn classify_openai(error: &OpenAIError) -> ErrorKind {
    match error {
        OpenAIError::Reqwest(error) => classify_http(error),
        OpenAIError::ApiError(api_error) => {
            classify_error_type(api_error.r#type.as_deref().unwrap_or_default(), &api_error.message)
        }
        // The event source reports failed handshakes as text, e.g. "Invalid status code: 429 Too Many Requests"
        OpenAIError::StreamError(message) => {
            if message.contains("429") {
                ErrorKind::RateLimited
            } else {
                ErrorKind::UpstreamUnavailable
            }
        }
        _ => ErrorKind::Unknown,
    }
}
