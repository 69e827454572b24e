//! Long-lived streaming recognition with reconnect.
//!
//! ```text
//! open() ──► Connected ── stream error / close ──► Outage ── backoff ──► open()
//!               │                                    │
//!               └── auth / config error ──► Failed   └── write() drops audio
//! ```
//!
//! Audio written while no connection is live is discarded. Nothing is
//! buffered or replayed across a reconnect.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{RecognitionError, RecognizerCapabilities, StreamingTransport, TranscriptEvent};

/// Updates delivered by [`StreamingRecognizer`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Transcript(TranscriptEvent),
    /// The stream dropped; a new connection will be attempted after the backoff.
    Reconnecting { attempt: u32 },
    /// Unrecoverable; the recognizer has stopped.
    Failed(RecognitionError),
}

pub type StreamUpdateCallback = Arc<dyn Fn(StreamUpdate) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    /// Wait between a dropped stream and the next connection attempt
    pub reconnect_backoff: Duration,
    /// Bound on one `open()` handshake. Expiry counts as a transport error.
    pub open_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_millis(1_000),
            open_timeout: Duration::from_millis(15_000),
        }
    }
}

pub struct StreamingRecognizer {
    audio: Arc<Mutex<Option<mpsc::Sender<Bytes>>>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    capabilities: RecognizerCapabilities,
}

impl StreamingRecognizer {
    /// Connect and keep the stream alive until [`stop`](Self::stop).
    pub fn start(
        transport: Arc<dyn StreamingTransport>,
        config: StreamingConfig,
        on_update: StreamUpdateCallback,
    ) -> Self {
        let audio = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();
        let capabilities = transport.capabilities();

        let task = tokio::spawn(supervise(
            transport,
            config,
            audio.clone(),
            cancel.clone(),
            on_update,
        ));

        Self {
            audio,
            cancel,
            task: Mutex::new(Some(task)),
            capabilities,
        }
    }

    pub fn capabilities(&self) -> RecognizerCapabilities {
        self.capabilities
    }

    /// Forward a chunk to the live connection.
    ///
    /// Returns `false` when the chunk was dropped (outage or stopped).
    pub fn write(&self, chunk: Bytes) -> bool {
        let audio = self.audio.lock();
        match audio.as_ref() {
            Some(sender) => sender.try_send(chunk).is_ok(),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.audio.lock().is_some()
    }

    /// Close the stream and wait for the supervisor to exit. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for StreamingRecognizer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn supervise(
    transport: Arc<dyn StreamingTransport>,
    config: StreamingConfig,
    audio: Arc<Mutex<Option<mpsc::Sender<Bytes>>>>,
    cancel: CancellationToken,
    on_update: StreamUpdateCallback,
) {
    let provider = transport.provider_name();
    let backoff = config.reconnect_backoff;
    let mut attempt = 0u32;

    loop {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = tokio::time::timeout(config.open_timeout, transport.open()) => {
                opened.unwrap_or_else(|_| {
                    Err(RecognitionError::Transport(format!(
                        "connect timed out after {}ms",
                        config.open_timeout.as_millis()
                    )))
                })
            }
        };

        let failure = match opened {
            Ok(stream) => {
                info!("{} streaming recognition connected", provider);
                attempt = 0;
                *audio.lock() = Some(stream.audio);
                let mut events = stream.events;

                let failure = loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break None,
                        event = events.recv() => match event {
                            Some(Ok(event)) => on_update(StreamUpdate::Transcript(event)),
                            Some(Err(e)) => break Some(e),
                            None => break Some(RecognitionError::Transport(
                                "stream closed by provider".to_string(),
                            )),
                        },
                    }
                };

                // Dropping the sender closes the provider connection
                audio.lock().take();
                match failure {
                    Some(e) => e,
                    None => break,
                }
            }
            Err(e) => e,
        };

        if failure.is_fatal() {
            warn!("{} streaming recognition failed: {}", provider, failure);
            on_update(StreamUpdate::Failed(failure));
            break;
        }

        attempt += 1;
        info!(
            "{} stream dropped ({}), reconnecting in {}ms (attempt {})",
            provider,
            failure,
            backoff.as_millis(),
            attempt
        );
        on_update(StreamUpdate::Reconnecting { attempt });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    audio.lock().take();
    debug!("{} streaming recognition supervisor exited", provider);
}
