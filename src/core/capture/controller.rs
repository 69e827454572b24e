//! Recording lifecycle for one utterance.
//!
//! ```text
//! Idle ── start() ──► Acquiring ── device ok ──► Recording
//!  ▲                     │                          │ silence / max duration / stop()
//!  │                     └── DeviceError ──► Idle   ▼
//!  └──────────────── unit emitted ◄──────────── Finalizing
//! ```

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::errors::DeviceError;
use super::microphone::{AudioInput, AudioTap};
use super::unit::{AudioFormat, AudioUnit, StopReason};
use crate::core::activity::{ActivityConfig, ActivityDetector, ActivityEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Acquiring,
    Recording,
    Finalizing,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub activity: ActivityConfig,
    pub format: AudioFormat,
    /// How often silence is re-checked when no frames arrive
    pub poll_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig::default(),
            format: AudioFormat::default(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Owns microphone acquisition and turns a live tap into one [`AudioUnit`].
pub struct CaptureController {
    input: Arc<dyn AudioInput>,
    config: CaptureConfig,
    state: Arc<Mutex<CaptureState>>,
    stop_token: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureController {
    pub fn new(input: Arc<dyn AudioInput>, config: CaptureConfig) -> Self {
        Self {
            input,
            config,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            stop_token: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock()
    }

    /// Begin recording. `on_complete` is called exactly once with the
    /// finished unit unless acquisition fails or is aborted.
    ///
    /// Returns `Ok(false)` without side effects when a recording is already
    /// in progress.
    pub async fn start<F>(&self, on_complete: F) -> Result<bool, DeviceError>
    where
        F: FnOnce(AudioUnit) + Send + 'static,
    {
        let stop = CancellationToken::new();
        {
            let mut state = self.state.lock();
            if *state != CaptureState::Idle {
                debug!("Capture start ignored, controller is {:?}", *state);
                return Ok(false);
            }
            *state = CaptureState::Acquiring;
            *self.stop_token.lock() = Some(stop.clone());
        }

        let tap = match self.input.acquire().await {
            Ok(tap) => tap,
            Err(e) => {
                *self.state.lock() = CaptureState::Idle;
                return Err(e);
            }
        };

        if stop.is_cancelled() {
            debug!("Capture stopped during acquisition");
            drop(tap);
            *self.state.lock() = CaptureState::Idle;
            return Ok(false);
        }

        *self.state.lock() = CaptureState::Recording;
        info!("Capture recording started");

        let task = tokio::spawn(record(
            tap,
            self.config.clone(),
            self.state.clone(),
            stop,
            on_complete,
        ));
        *self.task.lock() = Some(task);

        Ok(true)
    }

    /// Stop the active recording and wait until it has been finalized and
    /// the device released. No-op when idle.
    pub async fn stop(&self) {
        if let Some(token) = self.stop_token.lock().take() {
            token.cancel();
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

async fn record<F>(
    mut tap: AudioTap,
    config: CaptureConfig,
    state: Arc<Mutex<CaptureState>>,
    stop: CancellationToken,
    on_complete: F,
) where
    F: FnOnce(AudioUnit) + Send + 'static,
{
    let detector = ActivityDetector::new(config.activity);
    let started = Instant::now();
    let deadline = started + config.activity.max_duration;
    let mut chunks: Vec<Bytes> = Vec::new();

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let reason = loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break StopReason::Explicit,
            _ = tokio::time::sleep_until(deadline) => break StopReason::MaxDuration,
            frame = tap.recv() => match frame {
                Some(frame) => {
                    chunks.push(frame.data);
                    if detector.process(frame.energy, Instant::now()) == Some(ActivityEvent::Stop) {
                        break StopReason::Silence;
                    }
                }
                None => break StopReason::InputClosed,
            },
            _ = ticker.tick() => {
                if detector.poll(Instant::now()) == Some(ActivityEvent::Stop) {
                    break StopReason::Silence;
                }
            }
        }
    };

    *state.lock() = CaptureState::Finalizing;
    drop(tap);

    let total: usize = chunks.iter().map(Bytes::len).sum();
    let mut data = BytesMut::with_capacity(total);
    for chunk in &chunks {
        data.extend_from_slice(chunk);
    }

    let unit = AudioUnit {
        data: data.freeze(),
        format: config.format,
        duration: started.elapsed(),
        chunk_count: chunks.len(),
        stop_reason: reason,
    };

    info!(
        "Capture finished: {} bytes in {} chunks after {}ms ({:?})",
        unit.len(),
        unit.chunk_count,
        unit.duration.as_millis(),
        reason
    );

    *state.lock() = CaptureState::Idle;
    on_complete(unit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::{AudioFrame, SharedMicrophone};
    use tokio::sync::oneshot;

    fn controller(mic: &SharedMicrophone, silence_ms: u64, max_ms: u64) -> CaptureController {
        CaptureController::new(
            Arc::new(mic.clone()),
            CaptureConfig {
                activity: ActivityConfig::default()
                    .with_threshold(0.1)
                    .with_silence_delay(Duration::from_millis(silence_ms))
                    .with_max_duration(Duration::from_millis(max_ms)),
                ..Default::default()
            },
        )
    }

    fn frame(energy: f32, marker: u8) -> AudioFrame {
        AudioFrame::with_energy(Bytes::from(vec![marker; 4]), energy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_silence_with_exact_chunks() {
        let mic = SharedMicrophone::default();
        let capture = controller(&mic, 700, 30_000);

        let (tx, mut rx) = oneshot::channel();
        let started = capture
            .start(move |unit| {
                let _ = tx.send((unit, Instant::now()));
            })
            .await
            .unwrap();
        assert!(started);
        assert_eq!(capture.state(), CaptureState::Recording);

        let mut accepted = Vec::new();
        let mut silence_start = None;
        let mut result = None;

        for i in 0..100u32 {
            let loud = i < 10; // 200ms of speech in 20ms frames
            if !loud && silence_start.is_none() {
                silence_start = Some(Instant::now());
            }
            let marker = (i % 250) as u8;
            if mic.push_frame(frame(if loud { 0.5 } else { 0.01 }, marker)) {
                accepted.push(marker);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            if let Ok(done) = rx.try_recv() {
                result = Some(done);
                break;
            }
        }

        let (unit, stopped_at) = result.expect("capture should finish on silence");
        let silence_start = silence_start.unwrap();
        let elapsed = stopped_at.duration_since(silence_start);
        assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(760), "{elapsed:?}");

        assert_eq!(unit.stop_reason, StopReason::Silence);
        assert_eq!(unit.chunk_count, accepted.len());
        let expected: Vec<u8> = accepted.iter().flat_map(|m| [*m; 4]).collect();
        assert_eq!(&unit.data[..], &expected[..]);

        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(!mic.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_duration_forces_stop() {
        let mic = SharedMicrophone::default();
        let capture = controller(&mic, 700, 1_000);

        let (tx, rx) = oneshot::channel();
        capture
            .start(move |unit| {
                let _ = tx.send(unit);
            })
            .await
            .unwrap();

        // Background noise that never drops below the threshold
        let feeder = {
            let mic = mic.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    mic.push_frame(frame(0.5, 1));
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
        };

        let unit = rx.await.unwrap();
        feeder.abort();
        assert_eq!(unit.stop_reason, StopReason::MaxDuration);
        assert!(unit.duration >= Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_while_recording() {
        let mic = SharedMicrophone::default();
        let capture = controller(&mic, 700, 30_000);

        assert!(capture.start(|_| {}).await.unwrap());
        assert!(!capture.start(|_| panic!("second start must not record")).await.unwrap());
        capture.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_stop_delivers_unit_and_releases_device() {
        let mic = SharedMicrophone::default();
        let capture = controller(&mic, 700, 30_000);

        let (tx, rx) = oneshot::channel();
        capture
            .start(move |unit| {
                let _ = tx.send(unit);
            })
            .await
            .unwrap();

        mic.push_frame(frame(0.5, 9));
        tokio::time::sleep(Duration::from_millis(10)).await;

        capture.stop().await;
        assert!(!mic.is_held());
        assert_eq!(capture.state(), CaptureState::Idle);

        let unit = rx.await.unwrap();
        assert_eq!(unit.stop_reason, StopReason::Explicit);
        assert_eq!(unit.chunk_count, 1);

        // Second stop is a no-op
        capture.stop().await;
    }

    #[tokio::test]
    async fn test_device_error_returns_to_idle() {
        let mic = SharedMicrophone::default();
        mic.deny("blocked");
        let capture = controller(&mic, 700, 30_000);

        let result = capture.start(|_| {}).await;
        assert!(matches!(result, Err(DeviceError::PermissionDenied(_))));
        assert_eq!(capture.state(), CaptureState::Idle);

        mic.allow();
        assert!(capture.start(|_| {}).await.unwrap());
        capture.stop().await;
    }
}
