mod base;
mod chunking;
pub mod elevenlabs;
mod playback;

use std::sync::Arc;

pub use base::{AudioSink, AudioStream, PlaybackError, SpeechSynthesizer};
pub use chunking::split_into_chunks;
pub use elevenlabs::{
    ElevenLabsHttpSynthesizer, ElevenLabsStreamInputSynthesizer, ElevenLabsTtsConfig,
    VoiceSettings,
};
pub use playback::{
    PlaybackConfig, PlaybackController, PlaybackEvent, PlaybackEventCallback, PlaybackHandle,
    PlaybackMode,
};

/// How synthesis requests reach the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsTransport {
    /// One streaming HTTP request per utterance
    #[default]
    Http,
    /// `stream-input` WebSocket, text sent in sentence chunks
    WebSocket,
}

impl std::str::FromStr for TtsTransport {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" | "rest" => Ok(TtsTransport::Http),
            "websocket" | "ws" => Ok(TtsTransport::WebSocket),
            _ => Err(PlaybackError::Provider(format!(
                "Unsupported TTS transport: {s}. Supported transports: http, websocket"
            ))),
        }
    }
}

impl std::fmt::Display for TtsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsTransport::Http => write!(f, "http"),
            TtsTransport::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Build a synthesizer for the given transport.
pub fn create_synthesizer(
    transport: TtsTransport,
    config: ElevenLabsTtsConfig,
) -> Result<Arc<dyn SpeechSynthesizer>, PlaybackError> {
    match transport {
        TtsTransport::Http => Ok(Arc::new(ElevenLabsHttpSynthesizer::new(config)?)),
        TtsTransport::WebSocket => Ok(Arc::new(ElevenLabsStreamInputSynthesizer::new(config)?)),
    }
}
