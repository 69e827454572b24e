use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;

/// Synthesis/playback failures. The turn loop degrades to a text-only reply
/// instead of stopping.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("TTS authentication failed: {0}")]
    Auth(String),
    #[error("TTS transport error: {0}")]
    Transport(String),
    #[error("TTS provider error: {0}")]
    Provider(String),
    #[error("TTS timed out after {0}ms")]
    Timeout(u64),
    #[error("Audio output failed: {0}")]
    Sink(String),
}

impl PlaybackError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status.as_u16(), body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(detail),
            s if s.is_server_error() => Self::Transport(detail),
            _ => Self::Provider(detail),
        }
    }
}

impl From<reqwest::Error> for PlaybackError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Ordered audio chunks for one utterance.
pub type AudioStream = BoxStream<'static, Result<Bytes, PlaybackError>>;

/// Text-to-speech provider.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start synthesizing `text`.
    ///
    /// The returned stream yields audio in generation order and ends after
    /// the last chunk. Dropping it abandons generation.
    async fn synthesize(&self, text: &str) -> Result<AudioStream, PlaybackError>;

    /// MIME type of the produced audio
    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }

    fn provider_name(&self) -> &'static str;
}

/// Where synthesized audio is played.
///
/// `handle_id` identifies the playback the chunk belongs to, so sinks can
/// discard late audio from a cancelled handle.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn write(&self, handle_id: u64, chunk: Bytes) -> Result<(), PlaybackError>;

    /// All audio for `handle_id` has been written.
    async fn finish(&self, _handle_id: u64) -> Result<(), PlaybackError> {
        Ok(())
    }

    /// Drop anything queued for `handle_id`. Must not block.
    fn clear(&self, handle_id: u64);
}
