//! Synthesis & playback with cancellable handles.
//!
//! Every [`PlaybackController::speak`] emits `Started` and then exactly one
//! terminal event: `Ended` (natural completion, possibly degraded by an
//! error) or `Cancelled`. At most one handle is active; a new `speak`
//! cancels the previous handle before it starts.

use bytes::BytesMut;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::base::{AudioSink, PlaybackError, SpeechSynthesizer};

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started { id: u64 },
    /// Natural completion. `error` is set when synthesis or output failed
    /// and the utterance was not (fully) played.
    Ended { id: u64, error: Option<PlaybackError> },
    Cancelled { id: u64 },
}

impl PlaybackEvent {
    pub fn id(&self) -> u64 {
        match self {
            Self::Started { id } | Self::Ended { id, .. } | Self::Cancelled { id } => *id,
        }
    }
}

pub type PlaybackEventCallback = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Forward chunks to the sink as they arrive
    #[default]
    Streaming,
    /// Collect the full payload, then write it once
    Batch,
}

impl std::str::FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streaming" | "stream" => Ok(Self::Streaming),
            "batch" => Ok(Self::Batch),
            other => Err(format!("Unsupported TTS mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub mode: PlaybackMode,
    /// Bound for opening synthesis and for each gap between chunks
    pub timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Streaming,
            timeout: Duration::from_millis(8_000),
        }
    }
}

#[derive(Debug)]
struct HandleState {
    id: u64,
    token: CancellationToken,
    terminal: AtomicBool,
}

/// One in-flight `speak()`.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    state: Arc<HandleState>,
}

impl PlaybackHandle {
    fn new(id: u64) -> Self {
        Self {
            state: Arc::new(HandleState {
                id,
                token: CancellationToken::new(),
                terminal: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// True until the terminal event has been emitted.
    pub fn is_active(&self) -> bool {
        !self.state.terminal.load(Ordering::SeqCst)
    }

    /// Claim the right to emit the terminal event.
    fn finish(&self) -> bool {
        !self.state.terminal.swap(true, Ordering::SeqCst)
    }
}

struct ControllerInner {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    config: PlaybackConfig,
    active: Mutex<Option<PlaybackHandle>>,
    next_id: AtomicU64,
    on_event: RwLock<Option<PlaybackEventCallback>>,
}

impl ControllerInner {
    fn emit(&self, event: PlaybackEvent) {
        let callback = self.on_event.read().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn release_slot(&self, handle: &PlaybackHandle) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|h| h.id() == handle.id()) {
            *active = None;
        }
    }

    fn cancel(&self, handle: &PlaybackHandle) -> bool {
        if !handle.finish() {
            return false;
        }
        handle.state.token.cancel();
        self.sink.clear(handle.id());
        self.release_slot(handle);
        info!("Playback {} cancelled", handle.id());
        self.emit(PlaybackEvent::Cancelled { id: handle.id() });
        true
    }
}

#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl PlaybackController {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                synthesizer,
                sink,
                config,
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
                on_event: RwLock::new(None),
            }),
        }
    }

    /// Register the lifecycle callback. Invoked inline, so it must not block.
    pub fn set_event_callback(&self, callback: PlaybackEventCallback) {
        *self.inner.on_event.write() = Some(callback);
    }

    /// Start speaking `text`, cancelling any active handle first.
    ///
    /// `Started` is emitted before this returns.
    pub fn speak(&self, text: impl Into<String>) -> PlaybackHandle {
        let text = text.into();
        let handle = PlaybackHandle::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        let previous = self.inner.active.lock().replace(handle.clone());
        if let Some(previous) = previous {
            debug!("Playback {} replaced by {}", previous.id(), handle.id());
            self.inner.cancel(&previous);
        }

        self.inner.emit(PlaybackEvent::Started { id: handle.id() });
        tokio::spawn(run(self.inner.clone(), handle.clone(), text));
        handle
    }

    /// Stop `handle`. Returns `false` (and emits nothing) when it already ended.
    ///
    /// `Cancelled` is emitted before this returns.
    pub fn cancel(&self, handle: &PlaybackHandle) -> bool {
        self.inner.cancel(handle)
    }

    /// Cancel whatever is playing. Returns the cancelled handle id.
    pub fn cancel_active(&self) -> Option<u64> {
        let active = self.inner.active.lock().clone();
        active.filter(|handle| self.inner.cancel(handle)).map(|h| h.id())
    }

    pub fn active(&self) -> Option<PlaybackHandle> {
        self.inner.active.lock().clone()
    }

    pub fn content_type(&self) -> &'static str {
        self.inner.synthesizer.content_type()
    }
}

async fn run(inner: Arc<ControllerInner>, handle: PlaybackHandle, text: String) {
    let token = handle.state.token.clone();
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        result = play(&inner, &handle, &text) => result,
    };

    if !handle.finish() {
        return;
    }
    inner.release_slot(&handle);

    match &result {
        Ok(()) => info!("Playback {} finished", handle.id()),
        Err(e) => warn!("Playback {} failed: {}", handle.id(), e),
    }
    inner.emit(PlaybackEvent::Ended {
        id: handle.id(),
        error: result.err(),
    });
}

async fn play(
    inner: &ControllerInner,
    handle: &PlaybackHandle,
    text: &str,
) -> Result<(), PlaybackError> {
    let timeout = inner.config.timeout;
    let timeout_ms = timeout.as_millis() as u64;

    let mut stream = tokio::time::timeout(timeout, inner.synthesizer.synthesize(text))
        .await
        .map_err(|_| PlaybackError::Timeout(timeout_ms))??;

    let mut buffered = BytesMut::new();
    let mut chunks = 0usize;
    loop {
        let next = tokio::time::timeout(timeout, stream.next())
            .await
            .map_err(|_| PlaybackError::Timeout(timeout_ms))?;
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        chunks += 1;

        match inner.config.mode {
            PlaybackMode::Streaming => inner.sink.write(handle.id(), chunk).await?,
            PlaybackMode::Batch => buffered.extend_from_slice(&chunk),
        }
    }

    if inner.config.mode == PlaybackMode::Batch && !buffered.is_empty() {
        inner.sink.write(handle.id(), buffered.freeze()).await?;
    }

    debug!("Playback {} delivered {} chunks", handle.id(), chunks);
    inner.sink.finish(handle.id()).await
}
