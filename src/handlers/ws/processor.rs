//! WebSocket message processing orchestrator
//!
//! Routes each parsed envelope to its handler and turns handler failures
//! into `error` envelopes. Only a closed socket ends the connection.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::warn;

use crate::state::AppState;

use super::{
    audio_handler::handle_audio_data,
    command_handler::{handle_send_offers_email, handle_tts_request, handle_user_speaking},
    error::WebSocketError,
    messages::{IncomingMessage, OutgoingMessage},
    session_handler::{handle_start_session, handle_stop_session},
    state::ConnectionState,
};

/// Process incoming WebSocket message based on its type
///
/// # Returns
/// * `bool` - true to continue processing, false to terminate the connection
pub async fn handle_incoming_message(
    msg: IncomingMessage,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> bool {
    let result = match msg {
        IncomingMessage::StartSession { session_id } => {
            handle_start_session(session_id, state, message_tx, app_state).await
        }
        IncomingMessage::StopSession => handle_stop_session(state, message_tx).await,
        IncomingMessage::AudioData { audio } => handle_audio_data(&audio, state).await,
        IncomingMessage::UserStartedSpeaking => {
            handle_user_speaking(true, state, message_tx).await
        }
        IncomingMessage::UserStoppedSpeaking => {
            handle_user_speaking(false, state, message_tx).await
        }
        IncomingMessage::TtsRequest { text } => {
            handle_tts_request(text, state, message_tx, app_state).await
        }
        IncomingMessage::SendOffersEmail { email, message } => {
            handle_send_offers_email(email, message, state, message_tx, app_state).await
        }
    };

    if let Err(e) = result {
        send_error(&e, message_tx).await;
    }
    true
}

/// Report a handler failure to the client.
pub async fn send_error(error: &WebSocketError, message_tx: &mpsc::Sender<OutgoingMessage>) {
    warn!("WebSocket request failed: {}", error);
    let _ = message_tx
        .send(OutgoingMessage::error(error.kind(), error.to_string()))
        .await;
}
