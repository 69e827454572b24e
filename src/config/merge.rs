use std::env;
use std::fmt::Display;
use std::str::FromStr;

use super::ServerConfig;
use super::utils::{parse_bool, parse_value};
use super::yaml::YamlConfig;

/// Read and parse an environment variable. Unset or blank means `None`.
fn env_value<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw).map(Some),
        _ => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>, String> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| format!("Invalid {key} value '{raw}': expected true or false")),
        _ => Ok(None),
    }
}

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration to use as overrides
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();
    let defaults = ServerConfig::default();

    // Strings: YAML > ENV > Default
    macro_rules! get_string {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .unwrap_or($default)
        };
    }

    // Optional strings: YAML > ENV
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            $yaml_value
                .or_else(|| env::var($env_var).ok())
                .filter(|v: &String| !v.trim().is_empty())
        };
    }

    // Typed values: YAML > ENV > Default
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => env_value($env_var)?.unwrap_or($default),
            }
        };
    }

    // Enum-like values written as strings in YAML
    macro_rules! get_named {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(raw) => parse_value($env_var, &raw)?,
                None => env_value($env_var)?.unwrap_or($default),
            }
        };
    }

    let server = yaml.server.unwrap_or_default();
    let dialogue = yaml.dialogue.unwrap_or_default();
    let recognition = yaml.recognition.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let synthesis = yaml.synthesis.unwrap_or_default();
    let activity = yaml.activity.unwrap_or_default();
    let session = yaml.session.unwrap_or_default();

    let barge_in = match session.barge_in {
        Some(value) => value,
        None => env_bool("BARGE_IN")?.unwrap_or(defaults.barge_in),
    };

    Ok(ServerConfig {
        host: get_string!("HOST", server.host, defaults.host),
        port: get_parsed!("PORT", server.port, defaults.port),

        dialogue_url: get_string!("CHAT_API_URL", dialogue.base_url, defaults.dialogue_url),
        dialogue_path_suffix: get_string!(
            "CHAT_API_PATH_SUFFIX",
            dialogue.path_suffix,
            defaults.dialogue_path_suffix
        ),
        dialogue_timeout_ms: get_parsed!(
            "DIALOGUE_TIMEOUT_MS",
            dialogue.timeout_ms,
            defaults.dialogue_timeout_ms
        ),
        completion_phrase: get_string!(
            "CHAT_COMPLETION_PHRASE",
            dialogue.completion_phrase,
            defaults.completion_phrase
        ),

        stt_provider: get_named!("STT_PROVIDER", recognition.provider, defaults.stt_provider),
        stt_mode: get_named!("STT_MODE", recognition.mode, defaults.stt_mode),
        stt_language: get_string!("STT_LANGUAGE", recognition.language, defaults.stt_language),
        stt_sample_rate: get_parsed!(
            "STT_SAMPLE_RATE",
            recognition.sample_rate,
            defaults.stt_sample_rate
        ),
        stt_timeout_ms: get_parsed!(
            "STT_TIMEOUT_MS",
            recognition.timeout_ms,
            defaults.stt_timeout_ms
        ),
        stt_min_audio_bytes: get_parsed!(
            "STT_MIN_AUDIO_BYTES",
            recognition.min_audio_bytes,
            defaults.stt_min_audio_bytes
        ),
        stt_max_retries: get_parsed!(
            "STT_MAX_RETRIES",
            recognition.max_retries,
            defaults.stt_max_retries
        ),
        stt_retry_backoff_ms: get_parsed!(
            "STT_RETRY_BACKOFF_MS",
            recognition.retry_backoff_ms,
            defaults.stt_retry_backoff_ms
        ),
        stt_reconnect_backoff_ms: get_parsed!(
            "STT_RECONNECT_BACKOFF_MS",
            recognition.reconnect_backoff_ms,
            defaults.stt_reconnect_backoff_ms
        ),

        google_api_key: get_optional!("GOOGLE_API_KEY", providers.google_api_key),
        openai_api_key: get_optional!("OPENAI_API_KEY", providers.openai_api_key),
        elevenlabs_api_key: get_optional!("ELEVENLABS_API_KEY", providers.elevenlabs_api_key),

        tts_voice_id: get_string!("ELEVENLABS_VOICE_ID", synthesis.voice_id, defaults.tts_voice_id),
        tts_model_id: get_string!("ELEVENLABS_MODEL_ID", synthesis.model_id, defaults.tts_model_id),
        tts_mode: get_named!("TTS_MODE", synthesis.mode, defaults.tts_mode),
        tts_transport: get_named!("TTS_TRANSPORT", synthesis.transport, defaults.tts_transport),
        tts_timeout_ms: get_parsed!(
            "TTS_TIMEOUT_MS",
            synthesis.timeout_ms,
            defaults.tts_timeout_ms
        ),

        activity_threshold: get_parsed!(
            "ACTIVITY_THRESHOLD",
            activity.threshold,
            defaults.activity_threshold
        ),
        activity_silence_delay_ms: get_parsed!(
            "ACTIVITY_SILENCE_DELAY_MS",
            activity.silence_delay_ms,
            defaults.activity_silence_delay_ms
        ),
        capture_max_duration_ms: get_parsed!(
            "CAPTURE_MAX_DURATION_MS",
            activity.max_duration_ms,
            defaults.capture_max_duration_ms
        ),
        interrupt_threshold: get_parsed!(
            "INTERRUPT_THRESHOLD",
            activity.interrupt_threshold,
            defaults.interrupt_threshold
        ),

        error_recovery_delay_ms: get_parsed!(
            "ERROR_RECOVERY_DELAY_MS",
            session.error_recovery_delay_ms,
            defaults.error_recovery_delay_ms
        ),
        barge_in,
    })
}
