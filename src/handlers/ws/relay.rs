//! Bridges between a coordinator and the socket writer.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::messages::{AudioPayload, OutgoingMessage};
use crate::core::coordinator::SessionEvent;
use crate::core::tts::{AudioSink, PlaybackError};

/// Audio sink that ships synthesized audio to the client as `tts-chunk`
/// envelopes.
///
/// Handle ids grow monotonically, so remembering the highest cleared id is
/// enough to drop late chunks from every cancelled playback.
pub struct WebSocketSink {
    tx: mpsc::Sender<OutgoingMessage>,
    cleared_through: AtomicU64,
}

impl WebSocketSink {
    pub fn new(tx: mpsc::Sender<OutgoingMessage>) -> Self {
        Self {
            tx,
            cleared_through: AtomicU64::new(0),
        }
    }

    fn is_cleared(&self, handle_id: u64) -> bool {
        handle_id <= self.cleared_through.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AudioSink for WebSocketSink {
    async fn write(&self, handle_id: u64, chunk: Bytes) -> Result<(), PlaybackError> {
        if self.is_cleared(handle_id) {
            debug!("Dropping {} bytes for cleared playback {}", chunk.len(), handle_id);
            return Ok(());
        }

        let message = OutgoingMessage::TtsChunk {
            handle_id,
            audio: AudioPayload {
                data: BASE64.encode(&chunk),
            },
        };
        self.tx
            .send(message)
            .await
            .map_err(|_| PlaybackError::Sink("WebSocket connection closed".to_string()))
    }

    fn clear(&self, handle_id: u64) {
        self.cleared_through.fetch_max(handle_id, Ordering::AcqRel);
    }
}

/// Forward coordinator events to the socket writer until either side
/// closes.
pub fn spawn_event_relay(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    tx: mpsc::Sender<OutgoingMessage>,
    content_type: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if tx
                .send(OutgoingMessage::from_event(event, content_type))
                .await
                .is_err()
            {
                debug!("Socket writer gone, stopping event relay");
                break;
            }
        }
    })
}
