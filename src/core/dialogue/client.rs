use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    AnswerRequest, AnswerResponse, DialogueResult, DialogueStart, Offer, OffersResponse,
    SendOffersEmailRequest,
};
use super::{DialogueError, DialogueGateway};

pub const DEFAULT_COMPLETION_PHRASE: &str = "Analizuję Twoje dane i przygotowuję oferty";

#[derive(Debug, Clone)]
pub struct DialogueClientConfig {
    /// e.g. `http://localhost:8001/api`
    pub base_url: String,
    /// Appended to each chat path (`.json` for static mock servers)
    pub path_suffix: String,
    pub timeout: Duration,
    /// Prompts containing any of these phrases finish the conversation even
    /// when the API does not set `isCompleted`.
    pub completion_phrases: Vec<String>,
}

impl Default for DialogueClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001/api".to_string(),
            path_suffix: String::new(),
            timeout: Duration::from_millis(10_000),
            completion_phrases: vec![DEFAULT_COMPLETION_PHRASE.to_string()],
        }
    }
}

/// HTTP client for the chat API.
pub struct HttpDialogueClient {
    client: Client,
    config: DialogueClientConfig,
}

impl HttpDialogueClient {
    pub fn new(config: DialogueClientConfig) -> Result<Self, DialogueError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DialogueError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            self.config.path_suffix
        )
    }

    async fn read<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, DialogueError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Chat API returned {}: {}", status, body);
            return Err(DialogueError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<T>().await.map_err(DialogueError::from)
    }
}

fn require_session(session_id: &str) -> Result<(), DialogueError> {
    if session_id.trim().is_empty() {
        Err(DialogueError::MissingSession)
    } else {
        Ok(())
    }
}

#[async_trait]
impl DialogueGateway for HttpDialogueClient {
    async fn start(&self) -> Result<DialogueStart, DialogueError> {
        let response = self.client.get(self.url("chat/start")).send().await?;
        let start: DialogueStart = self.read(response).await?;
        if start.session_id.is_empty() {
            return Err(DialogueError::InvalidResponse(
                "chat/start returned no sessionId".to_string(),
            ));
        }
        debug!("Dialogue session {} started", start.session_id);
        Ok(start)
    }

    async fn answer(
        &self,
        session_id: &str,
        answer: &str,
        system_question: Option<&str>,
    ) -> Result<DialogueResult, DialogueError> {
        require_session(session_id)?;

        let body = AnswerRequest {
            session_id,
            answer,
            system_question,
        };
        let response = self
            .client
            .post(self.url("chat/answer"))
            .json(&body)
            .send()
            .await?;
        let parsed: AnswerResponse = self.read(response).await?;

        Ok(DialogueResult::from_response(
            parsed,
            session_id,
            &self.config.completion_phrases,
        ))
    }

    async fn mortgage_offers(&self, session_id: &str) -> Result<Vec<Offer>, DialogueError> {
        require_session(session_id)?;

        let response = self
            .client
            .get(self.url(&format!("chat/mortgage-offers/{session_id}")))
            .send()
            .await?;
        let parsed: OffersResponse = self.read(response).await?;
        Ok(parsed.offers.items)
    }

    async fn send_offers_email(
        &self,
        session_id: &str,
        email: &str,
        message: &str,
    ) -> Result<Value, DialogueError> {
        require_session(session_id)?;

        let body = SendOffersEmailRequest {
            session_id,
            email,
            message,
        };
        let response = self
            .client
            .post(self.url("chat/send-offers-email"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DialogueError::Api {
                status: status.as_u16(),
                body,
            });
        }
        // Some deployments answer with an empty body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::json!({ "success": true }));
        }
        serde_json::from_str(&text).map_err(|e| DialogueError::InvalidResponse(e.to_string()))
    }
}
