use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::ElevenLabsSttConfig;
use crate::core::capture::AudioUnit;
use crate::core::stt::base::{BatchRecognizer, RecognitionError};
use crate::core::stt::whisper::iso_language;

#[derive(Debug, Deserialize)]
struct SpeechToTextResponse {
    #[serde(default)]
    text: String,
}

/// One-shot ElevenLabs transcription of a finished recording.
pub struct ElevenLabsRecognizer {
    client: reqwest::Client,
    config: ElevenLabsSttConfig,
}

impl ElevenLabsRecognizer {
    pub fn new(config: ElevenLabsSttConfig) -> Result<Self, RecognitionError> {
        if config.api_key.is_empty() {
            return Err(RecognitionError::Configuration(
                "ElevenLabs API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl BatchRecognizer for ElevenLabsRecognizer {
    async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError> {
        let (file, encoding) = audio.to_file_bytes();
        let part = Part::bytes(file.to_vec())
            .file_name(format!("audio.{}", encoding.file_extension()))
            .mime_str(encoding.mime_type())
            .map_err(|e| RecognitionError::Configuration(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model_id", self.config.batch_model.clone());
        let language = iso_language(&self.config.language);
        if !language.is_empty() {
            form = form.text("language_code", language.to_string());
        }

        let response = self
            .client
            .post(format!(
                "{}/v1/speech-to-text",
                self.config.api_base_url.trim_end_matches('/')
            ))
            .header("xi-api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::from_status(status, &body));
        }

        let parsed: SpeechToTextResponse = response.json().await?;
        debug!("ElevenLabs transcript: {:?}", parsed.text);
        Ok(parsed.text)
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}
