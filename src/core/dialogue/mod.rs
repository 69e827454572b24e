//! Dialogue Gateway: the remote chat API that owns conversation state.

mod client;
mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use client::{DEFAULT_COMPLETION_PHRASE, DialogueClientConfig, HttpDialogueClient};
pub use types::{
    AvailableActions, Bank, DialogueResult, DialogueStart, NextAction, Offer, OfferCost,
};

/// Error types for dialogue calls
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DialogueError {
    /// `answer` (or any per-session call) without a session id
    #[error("No dialogue session has been started")]
    MissingSession,
    #[error("Chat API unreachable: {0}")]
    Transport(String),
    #[error("Chat API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Invalid chat API response: {0}")]
    InvalidResponse(String),
    #[error("Chat API timed out")]
    Timeout,
}

impl From<reqwest::Error> for DialogueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// The remote conversation oracle.
///
/// Implementations carry no session state of their own: every per-session
/// call takes the session id explicitly.
#[async_trait]
pub trait DialogueGateway: Send + Sync {
    /// Open a new conversation. Called once per session lifetime.
    async fn start(&self) -> Result<DialogueStart, DialogueError>;

    /// Submit the user's answer.
    ///
    /// # Arguments
    /// * `session_id` - Id from [`start`](Self::start); empty ids fail with `MissingSession`
    /// * `answer` - Recognized user text
    /// * `system_question` - The assistant prompt being answered
    async fn answer(
        &self,
        session_id: &str,
        answer: &str,
        system_question: Option<&str>,
    ) -> Result<DialogueResult, DialogueError>;

    async fn mortgage_offers(&self, session_id: &str) -> Result<Vec<Offer>, DialogueError>;

    async fn send_offers_email(
        &self,
        session_id: &str,
        email: &str,
        message: &str,
    ) -> Result<Value, DialogueError>;
}
