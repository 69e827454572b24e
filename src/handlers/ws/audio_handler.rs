//! Audio processing handler for WebSocket connections
//!
//! Client audio goes straight into the connection's shared microphone.
//! Whoever holds the microphone lease (capture, barge-in tap or streaming
//! recognition) receives it; without a holder the frame is dropped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

use super::{
    error::{WebSocketError, WebSocketResult},
    state::ConnectionState,
};

/// Handle an `audio-data` envelope carrying base64 PCM16LE.
pub async fn handle_audio_data(
    audio: &str,
    state: &Arc<RwLock<ConnectionState>>,
) -> WebSocketResult<()> {
    let decoded = BASE64
        .decode(audio.trim())
        .map_err(|e| WebSocketError::InvalidAudio(e.to_string()))?;

    handle_audio_message(Bytes::from(decoded), state).await;
    Ok(())
}

/// Handle raw PCM16LE from a binary frame.
#[inline]
pub async fn handle_audio_message(audio_data: Bytes, state: &Arc<RwLock<ConnectionState>>) {
    if audio_data.is_empty() {
        return;
    }

    let len = audio_data.len();
    let delivered = state.read().await.microphone.push(audio_data);
    trace!("Audio frame of {} bytes delivered: {}", len, delivered);
}
