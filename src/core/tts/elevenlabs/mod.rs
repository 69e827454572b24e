//! ElevenLabs text-to-speech over the REST streaming endpoint or the
//! `stream-input` WebSocket.

mod http;
mod stream_input;

use serde::{Deserialize, Serialize};

pub use http::ElevenLabsHttpSynthesizer;
pub use stream_input::ElevenLabsStreamInputSynthesizer;

pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io";
pub const ELEVENLABS_WS_URL: &str = "wss://api.elevenlabs.io";

/// Voice settings for ElevenLabs TTS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<f32>,
    /// Similarity boost (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_boost: Option<f32>,
    /// Style strength (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_speaker_boost: Option<bool>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: Some(0.5),
            similarity_boost: Some(0.75),
            style: Some(0.5),
            use_speaker_boost: Some(true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElevenLabsTtsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    /// e.g. `mp3_44100_128`
    pub output_format: String,
    pub voice_settings: VoiceSettings,
    pub api_base_url: String,
    pub ws_base_url: String,
    /// Maximum characters per text message on the stream-input socket
    pub max_chunk_chars: usize,
}

impl ElevenLabsTtsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            voice_settings: VoiceSettings::default(),
            api_base_url: ELEVENLABS_API_URL.to_string(),
            ws_base_url: ELEVENLABS_WS_URL.to_string(),
            max_chunk_chars: 100,
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    fn content_type(&self) -> &'static str {
        if self.output_format.starts_with("pcm") {
            "audio/pcm"
        } else if self.output_format.starts_with("ulaw") {
            "audio/basic"
        } else {
            "audio/mpeg"
        }
    }
}
