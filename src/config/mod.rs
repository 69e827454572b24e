//! Configuration module for the parley server
//!
//! Configuration comes from environment variables (with `.env` support) or
//! from a YAML file. When a YAML file is given, YAML values win over
//! environment variables, which win over defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use parley::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from a YAML file, falling back to the environment
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::activity::ActivityConfig;
use crate::core::capture::{AudioFormat, CaptureConfig};
use crate::core::coordinator::CoordinatorConfig;
use crate::core::dialogue::{DEFAULT_COMPLETION_PHRASE, DialogueClientConfig};
use crate::core::stt::{GatewayConfig, RecognitionCredentials, STTProvider, StreamingConfig};
use crate::core::tts::{ElevenLabsTtsConfig, PlaybackConfig, PlaybackMode, TtsTransport};

/// How user audio reaches the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionMode {
    /// One request per captured utterance
    #[default]
    Batch,
    /// Live audio over the realtime WebSocket
    Streaming,
}

impl std::str::FromStr for RecognitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batch" => Ok(RecognitionMode::Batch),
            "streaming" | "stream" => Ok(RecognitionMode::Streaming),
            _ => Err(format!(
                "Unsupported recognition mode: {s}. Supported modes: batch, streaming"
            )),
        }
    }
}

impl std::fmt::Display for RecognitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionMode::Batch => write!(f, "batch"),
            RecognitionMode::Streaming => write!(f, "streaming"),
        }
    }
}

/// Server configuration
///
/// Everything needed to run the relay: bind address, the chat API, speech
/// providers and the turn-taking thresholds.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Dialogue (chat API)
    pub dialogue_url: String,
    pub dialogue_path_suffix: String,
    pub dialogue_timeout_ms: u64,
    pub completion_phrase: String,

    // Recognition
    pub stt_provider: STTProvider,
    pub stt_mode: RecognitionMode,
    pub stt_language: String,
    pub stt_sample_rate: u32,
    pub stt_timeout_ms: u64,
    pub stt_min_audio_bytes: usize,
    pub stt_max_retries: u32,
    pub stt_retry_backoff_ms: u64,
    pub stt_reconnect_backoff_ms: u64,

    // Provider API keys
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,

    // Synthesis
    pub tts_voice_id: String,
    pub tts_model_id: String,
    pub tts_mode: PlaybackMode,
    pub tts_transport: TtsTransport,
    pub tts_timeout_ms: u64,

    // Activity detection
    pub activity_threshold: f32,
    pub activity_silence_delay_ms: u64,
    pub capture_max_duration_ms: u64,
    pub interrupt_threshold: f32,

    // Session behaviour
    pub error_recovery_delay_ms: u64,
    pub barge_in: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            dialogue_url: "http://localhost:8001/api".to_string(),
            dialogue_path_suffix: String::new(),
            dialogue_timeout_ms: 10_000,
            completion_phrase: DEFAULT_COMPLETION_PHRASE.to_string(),
            stt_provider: STTProvider::Google,
            stt_mode: RecognitionMode::Batch,
            stt_language: "pl-PL".to_string(),
            stt_sample_rate: 16_000,
            stt_timeout_ms: 15_000,
            stt_min_audio_bytes: 500,
            stt_max_retries: 3,
            stt_retry_backoff_ms: 1_000,
            stt_reconnect_backoff_ms: 1_000,
            google_api_key: None,
            openai_api_key: None,
            elevenlabs_api_key: None,
            tts_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            tts_model_id: "eleven_multilingual_v2".to_string(),
            tts_mode: PlaybackMode::Streaming,
            tts_transport: TtsTransport::Http,
            tts_timeout_ms: 8_000,
            activity_threshold: 0.02,
            activity_silence_delay_ms: 700,
            capture_max_duration_ms: 30_000,
            interrupt_threshold: 0.05,
            error_recovery_delay_ms: 3_000,
            barge_in: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable fallback
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables
    /// 3. Default values
    ///
    /// The `.env` file is not read on this path; only real environment
    /// variables fill the gaps the YAML file leaves.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable is malformed, or the merged configuration fails validation.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn dialogue_config(&self) -> DialogueClientConfig {
        let mut completion_phrases = vec![self.completion_phrase.clone()];
        completion_phrases.retain(|p| !p.trim().is_empty());

        DialogueClientConfig {
            base_url: self.dialogue_url.clone(),
            path_suffix: self.dialogue_path_suffix.clone(),
            timeout: Duration::from_millis(self.dialogue_timeout_ms),
            completion_phrases,
        }
    }

    pub fn recognition_credentials(&self) -> RecognitionCredentials {
        RecognitionCredentials {
            google_api_key: self.google_api_key.clone(),
            openai_api_key: self.openai_api_key.clone(),
            elevenlabs_api_key: self.elevenlabs_api_key.clone(),
            language: self.stt_language.clone(),
            sample_rate: self.stt_sample_rate,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            min_audio_bytes: self.stt_min_audio_bytes,
            timeout: Duration::from_millis(self.stt_timeout_ms),
            max_retries: self.stt_max_retries,
            retry_backoff: Duration::from_millis(self.stt_retry_backoff_ms),
        }
    }

    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            reconnect_backoff: Duration::from_millis(self.stt_reconnect_backoff_ms),
            open_timeout: Duration::from_millis(self.stt_timeout_ms),
        }
    }

    /// ElevenLabs synthesis settings, or `None` without an API key.
    pub fn synthesis_config(&self) -> Option<ElevenLabsTtsConfig> {
        let api_key = self.elevenlabs_api_key.clone()?;
        Some(
            ElevenLabsTtsConfig::new(api_key)
                .with_voice(self.tts_voice_id.clone())
                .with_model(self.tts_model_id.clone()),
        )
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let activity = ActivityConfig::default()
            .with_threshold(self.activity_threshold)
            .with_silence_delay(Duration::from_millis(self.activity_silence_delay_ms))
            .with_max_duration(Duration::from_millis(self.capture_max_duration_ms));

        CoordinatorConfig {
            barge_in: self.barge_in,
            error_recovery_delay: Duration::from_millis(self.error_recovery_delay_ms),
            capture: CaptureConfig {
                activity,
                format: AudioFormat::pcm16(self.stt_sample_rate),
                ..Default::default()
            },
            interrupt: activity.with_threshold(self.interrupt_threshold),
            playback: PlaybackConfig {
                mode: self.tts_mode,
                timeout: Duration::from_millis(self.tts_timeout_ms),
            },
        }
    }
}
