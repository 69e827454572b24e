//! Google Cloud Speech-to-Text REST (`speech:recognize`) recognizer.

use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::base::{BatchRecognizer, RecognitionError};
use crate::core::capture::AudioUnit;

pub const GOOGLE_SPEECH_URL: &str = "https://speech.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleRecognizerConfig {
    pub api_key: String,
    /// BCP-47 language code, e.g. `pl-PL`
    pub language: String,
    pub base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    enable_automatic_punctuation: bool,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

pub struct GoogleRecognizer {
    client: reqwest::Client,
    config: GoogleRecognizerConfig,
}

impl GoogleRecognizer {
    pub fn new(config: GoogleRecognizerConfig) -> Result<Self, RecognitionError> {
        if config.api_key.is_empty() {
            return Err(RecognitionError::Configuration(
                "Google API key is required".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/speech:recognize",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl BatchRecognizer for GoogleRecognizer {
    async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError> {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: audio.format.encoding.google_name(),
                sample_rate_hertz: audio.format.sample_rate,
                language_code: &self.config.language,
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio {
                content: BASE64_STANDARD.encode(&audio.data),
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::from_status(status, &body));
        }

        let parsed: RecognizeResponse = response.json().await?;
        let transcript = parsed
            .results
            .iter()
            .filter_map(|r| r.alternatives.first())
            .map(|a| a.transcript.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        debug!("Google transcript: {:?}", transcript);
        Ok(transcript)
    }

    fn provider_name(&self) -> &'static str {
        "google"
    }
}
