//! Command handler for WebSocket messages
//!
//! Handles client voice-activity reports, ad-hoc speech requests and the
//! offers email side channel.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::state::AppState;

use super::{
    error::{WebSocketError, WebSocketResult},
    messages::OutgoingMessage,
    processor::send_error,
    session_handler::ensure_coordinator,
    state::ConnectionState,
};

/// Handle `user-started-speaking` / `user-stopped-speaking`.
///
/// With a coordinator the report may interrupt playback; without one it is
/// only echoed back as `user-speaking`.
pub async fn handle_user_speaking(
    speaking: bool,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
) -> WebSocketResult<()> {
    let coordinator = state.read().await.coordinator.clone();
    match coordinator {
        Some(coordinator) => coordinator.user_speaking(speaking),
        None => {
            let _ = message_tx
                .send(OutgoingMessage::UserSpeaking { speaking })
                .await;
        }
    }
    Ok(())
}

/// Handle `tts-request`: speak `text` outside the dialogue loop.
pub async fn handle_tts_request(
    text: String,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> WebSocketResult<()> {
    if text.trim().is_empty() {
        return Err(WebSocketError::InvalidMessage(
            "tts-request text cannot be empty".to_string(),
        ));
    }

    debug!("Processing tts-request: {} chars", text.len());
    let coordinator = ensure_coordinator(state, message_tx, app_state).await?;
    coordinator.say(text);
    Ok(())
}

/// Handle `send-offers-email` for the connection's current dialogue.
///
/// The chat API call runs in the background so audio keeps flowing; its
/// outcome arrives as `email-sent` or `error`.
pub async fn handle_send_offers_email(
    email: String,
    message: Option<String>,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> WebSocketResult<()> {
    if email.trim().is_empty() {
        return Err(WebSocketError::InvalidMessage(
            "send-offers-email requires an email address".to_string(),
        ));
    }

    let session_id = state
        .read()
        .await
        .session_id()
        .ok_or(WebSocketError::NoSession)?;

    info!(session_id = %session_id, "Sending offers email");
    let dialogue = app_state.services.dialogue.clone();
    let message_tx = message_tx.clone();
    tokio::spawn(async move {
        let message = message.unwrap_or_default();
        match dialogue
            .send_offers_email(&session_id, &email, &message)
            .await
        {
            Ok(result) => {
                let result = (!result.is_null()).then_some(result);
                let _ = message_tx
                    .send(OutgoingMessage::EmailSent { email, result })
                    .await;
            }
            Err(e) => {
                send_error(&WebSocketError::Dialogue(e.to_string()), &message_tx).await;
            }
        }
    });

    Ok(())
}
