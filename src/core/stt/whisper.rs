//! OpenAI Whisper (`/v1/audio/transcriptions`) recognizer.
//!
//! Whisper has no interim results, so it reports
//! `supports_partial_results: false`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::base::{BatchRecognizer, RecognitionError};
use crate::core::capture::AudioUnit;

pub const OPENAI_API_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone)]
pub struct WhisperRecognizerConfig {
    pub api_key: String,
    /// Language code; only the ISO-639-1 prefix is sent (`pl-PL` → `pl`)
    pub language: String,
    pub model: String,
    pub base_url: String,
}

impl WhisperRecognizerConfig {
    pub fn new(api_key: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            language: language.into(),
            model: "whisper-1".to_string(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

pub struct WhisperRecognizer {
    client: reqwest::Client,
    config: WhisperRecognizerConfig,
}

impl WhisperRecognizer {
    pub fn new(config: WhisperRecognizerConfig) -> Result<Self, RecognitionError> {
        if config.api_key.is_empty() {
            return Err(RecognitionError::Configuration(
                "OpenAI API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

/// `pl-PL` → `pl`
pub(crate) fn iso_language(language: &str) -> &str {
    language.split(['-', '_']).next().unwrap_or(language)
}

#[async_trait]
impl BatchRecognizer for WhisperRecognizer {
    async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError> {
        let (file, encoding) = audio.to_file_bytes();
        let part = Part::bytes(file.to_vec())
            .file_name(format!("audio.{}", encoding.file_extension()))
            .mime_str(encoding.mime_type())
            .map_err(|e| RecognitionError::Configuration(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", iso_language(&self.config.language).to_string())
            .text("response_format", "json");

        let response = self
            .client
            .post(format!(
                "{}/v1/audio/transcriptions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::from_status(status, &body));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        debug!("Whisper transcript: {:?}", parsed.text);
        Ok(parsed.text)
    }

    fn provider_name(&self) -> &'static str {
        "whisper"
    }
}
