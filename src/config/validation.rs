use super::ServerConfig;

/// Validate the merged configuration
///
/// Checks that:
/// - the chat API base URL parses as an http(s) URL
/// - activity thresholds are normalized energies in `(0, 1]`
/// - timeouts, delays and the sample rate are non-zero
/// - the recognition language is set
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_http_url("CHAT_API_URL", &config.dialogue_url)?;
    validate_threshold("ACTIVITY_THRESHOLD", config.activity_threshold)?;
    validate_threshold("INTERRUPT_THRESHOLD", config.interrupt_threshold)?;

    for (key, value) in [
        ("DIALOGUE_TIMEOUT_MS", config.dialogue_timeout_ms),
        ("STT_TIMEOUT_MS", config.stt_timeout_ms),
        ("TTS_TIMEOUT_MS", config.tts_timeout_ms),
        ("ACTIVITY_SILENCE_DELAY_MS", config.activity_silence_delay_ms),
        ("CAPTURE_MAX_DURATION_MS", config.capture_max_duration_ms),
        ("STT_SAMPLE_RATE", u64::from(config.stt_sample_rate)),
    ] {
        if value == 0 {
            return Err(format!("{key} must be greater than zero").into());
        }
    }

    if config.capture_max_duration_ms <= config.activity_silence_delay_ms {
        return Err(format!(
            "CAPTURE_MAX_DURATION_MS ({}) must be longer than ACTIVITY_SILENCE_DELAY_MS ({})",
            config.capture_max_duration_ms, config.activity_silence_delay_ms
        )
        .into());
    }

    if config.stt_language.trim().is_empty() {
        return Err("STT_LANGUAGE cannot be empty".into());
    }

    Ok(())
}

/// Ensure `value` is an absolute http or https URL.
pub fn validate_http_url(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(value).map_err(|e| format!("{key} is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("{key} must use http or https, got '{scheme}'").into()),
    }
}

fn validate_threshold(key: &str, value: f32) -> Result<(), Box<dyn std::error::Error>> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(format!("{key} must be a normalized energy in (0, 1], got {value}").into())
    }
}
