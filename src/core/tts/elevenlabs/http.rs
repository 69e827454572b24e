use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use super::ElevenLabsTtsConfig;
use crate::core::tts::base::{AudioStream, PlaybackError, SpeechSynthesizer};

/// `POST /v1/text-to-speech/{voice}/stream`, audio streamed in the response body.
pub struct ElevenLabsHttpSynthesizer {
    client: reqwest::Client,
    config: ElevenLabsTtsConfig,
}

impl ElevenLabsHttpSynthesizer {
    pub fn new(config: ElevenLabsTtsConfig) -> Result<Self, PlaybackError> {
        if config.api_key.is_empty() {
            return Err(PlaybackError::Auth(
                "API key is required for ElevenLabs".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn build_request(&self, text: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/v1/text-to-speech/{}/stream",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.voice_id
        );

        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": self.config.voice_settings,
        });

        self.client
            .post(url)
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", self.config.content_type())
            .json(&body)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsHttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, PlaybackError> {
        let response = self.build_request(text).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaybackError::from_status(status, &body));
        }

        debug!("ElevenLabs TTS stream opened for {} chars", text.chars().count());
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(PlaybackError::from))
            .boxed())
    }

    fn content_type(&self) -> &'static str {
        self.config.content_type()
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}
