use axum::extract::ws::{CloseFrame, Message, close_code};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error(transparent)]
    ReceiveError(#[from] axum::Error),
    #[error("Invalid Request: {0}")]
    RequestError(String),
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session was replaced by a newer connection")]
    Superseded,
    #[error(transparent)]
    Send(#[from] tokio::sync::mpsc::error::SendError<Message>),
}

impl WsError {
    pub fn into_close_frame(self) -> CloseFrame {
        let code = match self {
            Self::RequestError(_) | Self::Json(_) => close_code::PROTOCOL,
            Self::Superseded => close_code::POLICY,
            Self::ReceiveError(_) | Self::Send(_) => close_code::ERROR,
        };
        CloseFrame {
            code,
            reason: self.to_string().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_codes() {
        assert_eq!(WsError::Superseded.into_close_frame().code, close_code::POLICY);
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(WsError::Json(json).into_close_frame().code, close_code::PROTOCOL);
    }
}
