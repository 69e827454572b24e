//! WebSocket connection state

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::core::capture::SharedMicrophone;
use crate::core::coordinator::TurnCoordinator;

/// Per-connection state.
///
/// The coordinator is created lazily by the first message that needs it, so
/// a client can use the connection for plain `tts-request`s or fail
/// gracefully when recognition is not configured.
pub struct ConnectionState {
    /// Fed by `audio-data` envelopes and binary frames
    pub microphone: SharedMicrophone,
    pub coordinator: Option<Arc<TurnCoordinator>>,
    /// Key of the coordinator in the session registry
    pub connection_id: Option<String>,
    /// Task forwarding coordinator events to the socket
    pub relay_task: Option<JoinHandle<()>>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            microphone: SharedMicrophone::default(),
            coordinator: None,
            connection_id: None,
            relay_task: None,
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.coordinator.as_ref()?.session_id()
    }
}
