//! Axum WebSocket handler
//!
//! This module contains the WebSocket upgrade handler for Axum and the
//! per-connection loop.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use crate::utils::unix_millis;

use super::{
    audio_handler::handle_audio_message,
    error::WebSocketError,
    messages::{IncomingMessage, OutgoingMessage},
    processor::{handle_incoming_message, send_error},
    state::ConnectionState,
};

/// Channel buffer between handlers and the socket writer. Audio chunks go
/// through it, so it is sized for bursts.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// WebSocket voice session handler
/// Upgrades the HTTP connection to WebSocket for a voice session
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("WebSocket voice connection upgrade requested");
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state))
}

/// Drive one voice connection until the client goes away, then tear its
/// session down.
async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("WebSocket voice connection established");

    let (mut sender, mut receiver) = socket.split();

    let state = Arc::new(RwLock::new(ConnectionState::new()));

    let (message_tx, mut message_rx) = mpsc::channel::<OutgoingMessage>(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(message) = message_rx.recv().await {
            let json_str = match message.to_envelope(unix_millis()) {
                Ok(json_str) => json_str,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };

            if let Err(e) = sender.send(Message::Text(json_str.into())).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(msg) => {
                if !process_message(msg, &state, &message_tx, &app_state).await {
                    break;
                }
            }
            Err(e) => {
                warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up resources
    let mut guard = state.write().await;
    guard.microphone.close();
    if let Some(connection_id) = guard.connection_id.take() {
        if !app_state.sessions.close(&connection_id).await {
            warn!(connection_id = %connection_id, "Session already removed from registry");
        }
    }
    if let Some(coordinator) = guard.coordinator.take() {
        coordinator.shutdown().await;
    }
    if let Some(relay_task) = guard.relay_task.take() {
        relay_task.abort();
    }
    drop(guard);
    sender_task.abort();

    info!("WebSocket voice connection terminated");
}

/// Process one WebSocket frame.
///
/// Returns `false` once the client closed the connection.
async fn process_message(
    msg: Message,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            let incoming_msg: IncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    send_error(&WebSocketError::InvalidMessage(e.to_string()), message_tx).await;
                    return true;
                }
            };

            handle_incoming_message(incoming_msg, state, message_tx, app_state).await
        }
        Message::Binary(data) => {
            handle_audio_message(data, state).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("WebSocket connection closed by client");
            false
        }
    }
}
