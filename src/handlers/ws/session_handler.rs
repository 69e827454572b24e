//! Session lifecycle handler for WebSocket connections
//!
//! Builds the connection's turn coordinator on first use and registers it
//! in the session registry.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{info, warn};

use crate::core::coordinator::TurnCoordinator;
use crate::state::AppState;

use super::{
    error::WebSocketResult,
    messages::OutgoingMessage,
    relay::{WebSocketSink, spawn_event_relay},
    state::ConnectionState,
};

/// Return the connection's coordinator, creating it if needed.
///
/// # Errors
/// `ServiceUnavailable` when recognition or synthesis is not configured.
pub async fn ensure_coordinator(
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> WebSocketResult<Arc<TurnCoordinator>> {
    let mut guard = state.write().await;
    if let Some(coordinator) = &guard.coordinator {
        return Ok(coordinator.clone());
    }

    let sink = Arc::new(WebSocketSink::new(message_tx.clone()));
    let collaborators = app_state.collaborators(Arc::new(guard.microphone.clone()), sink)?;
    let content_type = collaborators.synthesizer.content_type();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let coordinator = TurnCoordinator::spawn(
        collaborators,
        app_state.config.coordinator_config(),
        events_tx,
        Some(app_state.plugins.dispatcher()),
    );
    let (connection_id, coordinator) = app_state.sessions.open(coordinator);
    info!(connection_id = %connection_id, "Turn coordinator created");

    guard.relay_task = Some(spawn_event_relay(
        events_rx,
        message_tx.clone(),
        content_type,
    ));
    guard.connection_id = Some(connection_id);
    guard.coordinator = Some(coordinator.clone());

    Ok(coordinator)
}

/// Handle `start-session`.
pub async fn handle_start_session(
    session_id: Option<String>,
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
    app_state: &Arc<AppState>,
) -> WebSocketResult<()> {
    let session_id = session_id.filter(|id| !id.trim().is_empty());
    info!(resume = session_id.is_some(), "Starting voice session");

    let coordinator = ensure_coordinator(state, message_tx, app_state).await?;
    coordinator.start(session_id);
    Ok(())
}

/// Handle `stop-session`. Without a coordinator there is nothing to cancel,
/// but the client still gets its acknowledgement.
pub async fn handle_stop_session(
    state: &Arc<RwLock<ConnectionState>>,
    message_tx: &mpsc::Sender<OutgoingMessage>,
) -> WebSocketResult<()> {
    let coordinator = state.read().await.coordinator.clone();
    match coordinator {
        Some(coordinator) => coordinator.stop(),
        None => {
            if message_tx.send(OutgoingMessage::SessionStopped).await.is_err() {
                warn!("Failed to acknowledge stop-session, socket writer closed");
            }
        }
    }
    Ok(())
}
