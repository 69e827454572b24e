use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything left
/// out falls back to the environment and then to defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///
/// dialogue:
///   base_url: "http://localhost:8001/api"
///   path_suffix: ""
///   timeout_ms: 10000
///   completion_phrase: "Analizuję Twoje dane i przygotowuję oferty"
///
/// recognition:
///   provider: "google"        # google | whisper | elevenlabs
///   mode: "batch"             # batch | streaming
///   language: "pl-PL"
///   sample_rate: 16000
///   timeout_ms: 15000
///   min_audio_bytes: 500
///   max_retries: 3
///   retry_backoff_ms: 1000
///   reconnect_backoff_ms: 1000
///
/// providers:
///   google_api_key: "your-google-key"
///   openai_api_key: "your-openai-key"
///   elevenlabs_api_key: "your-elevenlabs-key"
///
/// synthesis:
///   voice_id: "21m00Tcm4TlvDq8ikWAM"
///   model_id: "eleven_multilingual_v2"
///   mode: "streaming"         # streaming | batch
///   transport: "http"         # http | websocket
///   timeout_ms: 8000
///
/// activity:
///   threshold: 0.02
///   silence_delay_ms: 700
///   max_duration_ms: 30000
///   interrupt_threshold: 0.05
///
/// session:
///   error_recovery_delay_ms: 3000
///   barge_in: true
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub dialogue: Option<DialogueYaml>,
    pub recognition: Option<RecognitionYaml>,
    pub providers: Option<ProvidersYaml>,
    pub synthesis: Option<SynthesisYaml>,
    pub activity: Option<ActivityYaml>,
    pub session: Option<SessionYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DialogueYaml {
    pub base_url: Option<String>,
    pub path_suffix: Option<String>,
    pub timeout_ms: Option<u64>,
    pub completion_phrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RecognitionYaml {
    pub provider: Option<String>,
    pub mode: Option<String>,
    pub language: Option<String>,
    pub sample_rate: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub min_audio_bytes: Option<usize>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub reconnect_backoff_ms: Option<u64>,
}

/// Provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SynthesisYaml {
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub mode: Option<String>,
    pub transport: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ActivityYaml {
    pub threshold: Option<f32>,
    pub silence_delay_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
    pub interrupt_threshold: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub error_recovery_delay_ms: Option<u64>,
    pub barge_in: Option<bool>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is malformed or
    /// a field has the wrong type.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
