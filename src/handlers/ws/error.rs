//! WebSocket error types and handling

use thiserror::Error;

use crate::core::coordinator::ErrorKind;
use crate::errors::AppError;

/// WebSocket handler error types
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// Envelope failed to parse or has an unknown `type`
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// `audio-data` payload is not valid base64
    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    /// The operation needs a dialogue session and none is open
    #[error("No active session. Send start-session first.")]
    NoSession,

    /// A provider needed for voice sessions is not configured
    #[error("Voice session unavailable: {0}")]
    ServiceUnavailable(String),

    /// Chat API rejected a side-channel request
    #[error("Dialogue request failed: {0}")]
    Dialogue(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl WebSocketError {
    /// `errorType` label for the outbound `error` envelope
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebSocketError::InvalidMessage(_)
            | WebSocketError::InvalidAudio(_)
            | WebSocketError::WebSocket(_) => ErrorKind::WebSocket,
            WebSocketError::NoSession => ErrorKind::Session,
            WebSocketError::ServiceUnavailable(_) => ErrorKind::Auth,
            WebSocketError::Dialogue(_) => ErrorKind::Dialogue,
        }
    }
}

impl From<AppError> for WebSocketError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::ServiceUnavailable(msg) => WebSocketError::ServiceUnavailable(msg),
            other => WebSocketError::WebSocket(other.to_string()),
        }
    }
}

/// Result type for WebSocket operations
pub type WebSocketResult<T> = Result<T, WebSocketError>;
