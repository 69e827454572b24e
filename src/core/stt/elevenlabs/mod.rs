//! ElevenLabs speech-to-text: batch (`/v1/speech-to-text`) and realtime WebSocket.
//!
//! The realtime transport uses server-side VAD commits, so committed
//! transcripts arrive as final [`TranscriptEvent`](super::TranscriptEvent)s
//! without the client sending explicit commit flags.

mod batch;
mod messages;
mod realtime;

pub use batch::ElevenLabsRecognizer;
pub use messages::{ElevenLabsMessage, InputAudioChunk};
pub use realtime::ElevenLabsRealtimeTransport;

pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io";
pub const ELEVENLABS_WS_URL: &str = "wss://api.elevenlabs.io";

#[derive(Debug, Clone)]
pub struct ElevenLabsSttConfig {
    pub api_key: String,
    /// Language code; the ISO-639-1 prefix is sent
    pub language: String,
    pub sample_rate: u32,
    pub api_base_url: String,
    pub ws_base_url: String,
    /// Batch model (`scribe_v1`)
    pub batch_model: String,
    /// Realtime model (`scribe_v2_realtime`)
    pub realtime_model: String,
}

impl ElevenLabsSttConfig {
    pub fn new(api_key: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            language: language.into(),
            sample_rate: 16000,
            api_base_url: ELEVENLABS_API_URL.to_string(),
            ws_base_url: ELEVENLABS_WS_URL.to_string(),
            batch_model: "scribe_v1".to_string(),
            realtime_model: "scribe_v2_realtime".to_string(),
        }
    }

    /// Realtime endpoint with query parameters.
    pub fn realtime_url(&self) -> String {
        let mut url = format!(
            "{}/v1/speech-to-text/realtime?model_id={}&audio_format=pcm_{}&commit_strategy=vad",
            self.ws_base_url.trim_end_matches('/'),
            self.realtime_model,
            self.sample_rate
        );
        let language = super::whisper::iso_language(&self.language);
        if !language.is_empty() {
            url.push_str("&language_code=");
            url.push_str(language);
        }
        url
    }
}
