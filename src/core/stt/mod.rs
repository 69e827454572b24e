mod base;
pub mod elevenlabs;
mod gateway;
pub mod google;
mod streaming;
pub mod whisper;

use std::sync::Arc;

pub use base::{
    BatchRecognizer, RecognitionError, RecognizerCapabilities, StreamingTransport,
    TranscriptEvent, TranscriptStream,
};
pub use elevenlabs::{ElevenLabsRealtimeTransport, ElevenLabsRecognizer, ElevenLabsSttConfig};
pub use gateway::{GatewayConfig, RecognitionGateway};
pub use google::{GoogleRecognizer, GoogleRecognizerConfig};
pub use streaming::{StreamUpdate, StreamUpdateCallback, StreamingConfig, StreamingRecognizer};
pub use whisper::{WhisperRecognizer, WhisperRecognizerConfig};

/// Supported batch recognition providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum STTProvider {
    /// Google Cloud Speech REST API
    Google,
    /// OpenAI Whisper transcription API
    Whisper,
    /// ElevenLabs speech-to-text API
    ElevenLabs,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::Google => write!(f, "google"),
            STTProvider::Whisper => write!(f, "whisper"),
            STTProvider::ElevenLabs => write!(f, "elevenlabs"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = RecognitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(STTProvider::Google),
            "whisper" | "openai" => Ok(STTProvider::Whisper),
            "elevenlabs" => Ok(STTProvider::ElevenLabs),
            _ => Err(RecognitionError::Configuration(format!(
                "Unsupported STT provider: {s}. Supported providers: google, whisper, elevenlabs"
            ))),
        }
    }
}

/// Credentials and shaping shared by every recognition provider.
#[derive(Debug, Clone, Default)]
pub struct RecognitionCredentials {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub language: String,
    pub sample_rate: u32,
}

fn require(key: &Option<String>, name: &str) -> Result<String, RecognitionError> {
    key.clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| RecognitionError::Configuration(format!("{name} is not configured")))
}

/// Build a batch recognizer for `provider`.
pub fn create_batch_recognizer(
    provider: STTProvider,
    credentials: &RecognitionCredentials,
) -> Result<Arc<dyn BatchRecognizer>, RecognitionError> {
    match provider {
        STTProvider::Google => Ok(Arc::new(GoogleRecognizer::new(GoogleRecognizerConfig {
            api_key: require(&credentials.google_api_key, "GOOGLE_API_KEY")?,
            language: credentials.language.clone(),
            base_url: google::GOOGLE_SPEECH_URL.to_string(),
        })?)),
        STTProvider::Whisper => Ok(Arc::new(WhisperRecognizer::new(
            WhisperRecognizerConfig::new(
                require(&credentials.openai_api_key, "OPENAI_API_KEY")?,
                credentials.language.clone(),
            ),
        )?)),
        STTProvider::ElevenLabs => Ok(Arc::new(ElevenLabsRecognizer::new(
            elevenlabs_config(credentials)?,
        )?)),
    }
}

/// Build the streaming transport. Only ElevenLabs realtime streams today.
pub fn create_streaming_transport(
    credentials: &RecognitionCredentials,
) -> Result<Arc<dyn StreamingTransport>, RecognitionError> {
    Ok(Arc::new(ElevenLabsRealtimeTransport::new(
        elevenlabs_config(credentials)?,
    )?))
}

fn elevenlabs_config(
    credentials: &RecognitionCredentials,
) -> Result<ElevenLabsSttConfig, RecognitionError> {
    Ok(ElevenLabsSttConfig {
        sample_rate: credentials.sample_rate,
        ..ElevenLabsSttConfig::new(
            require(&credentials.elevenlabs_api_key, "ELEVENLABS_API_KEY")?,
            credentials.language.clone(),
        )
    })
}
