use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::capture::AudioUnit;

/// One recognition result from a streaming provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub text: String,
    /// Interim results may be superseded; only finals reach the dialogue.
    pub is_final: bool,
    /// Unix epoch milliseconds
    pub timestamp: u64,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            timestamp: crate::utils::unix_millis(),
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            timestamp: crate::utils::unix_millis(),
        }
    }
}

/// What a recognizer can deliver.
///
/// Providers without real interim results report `supports_partial_results:
/// false`; callers must not synthesize placeholder partials for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizerCapabilities {
    pub supports_partial_results: bool,
    pub streaming: bool,
}

impl RecognizerCapabilities {
    pub const BATCH: Self = Self {
        supports_partial_results: false,
        streaming: false,
    };

    pub const STREAMING: Self = Self {
        supports_partial_results: true,
        streaming: true,
    };
}

/// Error types for recognition.
///
/// "Nothing recognized" is not an error: it is an empty transcript.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RecognitionError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RecognitionError {
    /// Transport failures are retried (batch) or reconnected (streaming).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Errors that must stop a streaming session instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Configuration(_))
    }

    /// Map a non-success HTTP status from a provider.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(detail),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Self::Transport(detail),
            s if s.is_server_error() => Self::Transport(detail),
            _ => Self::InvalidResponse(detail),
        }
    }
}

impl From<reqwest::Error> for RecognitionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            Self::Configuration(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Request/response recognizer: one finished [`AudioUnit`] in, one transcript out.
#[async_trait]
pub trait BatchRecognizer: Send + Sync {
    /// Transcribe a finished recording.
    ///
    /// # Returns
    /// * `Ok(String)` - The transcript, empty when nothing was recognized
    /// * `Err(RecognitionError)` - The provider call itself failed
    async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError>;

    fn capabilities(&self) -> RecognizerCapabilities {
        RecognizerCapabilities::BATCH
    }

    fn provider_name(&self) -> &'static str;
}

/// One live duplex connection to a streaming provider.
///
/// Dropping `audio` ends the connection. `events` yields `Err` or closes when
/// the provider drops the stream.
pub struct TranscriptStream {
    pub audio: mpsc::Sender<Bytes>,
    pub events: mpsc::Receiver<Result<TranscriptEvent, RecognitionError>>,
}

/// Opens streaming recognition connections.
#[async_trait]
pub trait StreamingTransport: Send + Sync {
    async fn open(&self) -> Result<TranscriptStream, RecognitionError>;

    fn capabilities(&self) -> RecognizerCapabilities {
        RecognizerCapabilities::STREAMING
    }

    fn provider_name(&self) -> &'static str;
}
