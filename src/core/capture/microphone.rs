//! Audio input devices and scoped microphone leases.
//!
//! Only one [`AudioTap`] can hold a device at a time. Dropping the tap
//! releases the device on every exit path (success, error, cancellation),
//! so a second acquirer (for example capture after barge-in) can safely
//! wait for the first one to finish.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use super::errors::DeviceError;
use crate::core::activity::rms_energy;

/// One chunk of captured audio with its precomputed energy.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub data: Bytes,
    /// Normalized RMS energy in `0.0..=1.0`
    pub energy: f32,
}

impl AudioFrame {
    pub fn from_pcm16(data: Bytes) -> Self {
        let energy = rms_energy(&data);
        Self { data, energy }
    }

    pub fn with_energy(data: Bytes, energy: f32) -> Self {
        Self { data, energy }
    }
}

/// An exclusive, scoped stream of frames from an input device.
///
/// The device lease is released when the tap is dropped.
pub struct AudioTap {
    frames: mpsc::Receiver<AudioFrame>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl AudioTap {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            frames,
            release: Some(Box::new(release)),
        }
    }

    /// Next frame, or `None` once the device stops producing audio.
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.frames.recv().await
    }
}

impl Drop for AudioTap {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// An audio input device that hands out exclusive taps.
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Acquire the device. Waits a bounded time if another tap holds it.
    async fn acquire(&self) -> Result<AudioTap, DeviceError>;
}

struct TapSlot {
    id: u64,
    sender: mpsc::Sender<AudioFrame>,
}

struct MicrophoneInner {
    lease: Arc<Semaphore>,
    tap: Mutex<Option<TapSlot>>,
    next_tap_id: AtomicU64,
    availability: RwLock<Result<(), DeviceError>>,
    acquire_timeout: Duration,
    buffer: usize,
}

/// A microphone fed by a remote client (WebSocket `audio-data` frames).
///
/// Frames pushed while nobody holds a tap are dropped; the relay never
/// buffers audio for a future acquirer.
#[derive(Clone)]
pub struct SharedMicrophone {
    inner: Arc<MicrophoneInner>,
}

impl Default for SharedMicrophone {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl SharedMicrophone {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(MicrophoneInner {
                lease: Arc::new(Semaphore::new(1)),
                tap: Mutex::new(None),
                next_tap_id: AtomicU64::new(1),
                availability: RwLock::new(Ok(())),
                acquire_timeout,
                buffer: 256,
            }),
        }
    }

    /// Deliver a PCM16 chunk to the current tap holder.
    ///
    /// Returns `true` if a tap accepted the frame.
    pub fn push(&self, data: Bytes) -> bool {
        self.push_frame(AudioFrame::from_pcm16(data))
    }

    pub fn push_frame(&self, frame: AudioFrame) -> bool {
        let slot = self.inner.tap.lock();
        let Some(tap) = slot.as_ref() else {
            return false;
        };

        match tap.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Microphone tap {} is not keeping up, dropping frame", tap.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Make subsequent acquisitions fail with `PermissionDenied`.
    pub fn deny(&self, reason: impl Into<String>) {
        *self.inner.availability.write() = Err(DeviceError::PermissionDenied(reason.into()));
    }

    pub fn allow(&self) {
        *self.inner.availability.write() = Ok(());
    }

    /// Permanently close the device. Held taps stop receiving frames.
    pub fn close(&self) {
        *self.inner.availability.write() =
            Err(DeviceError::NotFound("microphone closed".to_string()));
        self.inner.lease.close();
        self.inner.tap.lock().take();
    }

    /// Whether a tap currently holds the device.
    pub fn is_held(&self) -> bool {
        self.inner.lease.available_permits() == 0
    }
}

#[async_trait]
impl AudioInput for SharedMicrophone {
    async fn acquire(&self) -> Result<AudioTap, DeviceError> {
        self.inner.availability.read().clone()?;

        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.lease.clone().acquire_owned(),
        )
        .await
        .map_err(|_| DeviceError::Busy)?
        .map_err(|_| DeviceError::NotFound("microphone closed".to_string()))?;

        let (sender, receiver) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_tap_id.fetch_add(1, Ordering::Relaxed);
        *self.inner.tap.lock() = Some(TapSlot { id, sender });
        debug!("Microphone tap {} acquired", id);

        let inner = self.inner.clone();
        Ok(AudioTap::new(receiver, move || {
            let mut slot = inner.tap.lock();
            if slot.as_ref().is_some_and(|tap| tap.id == id) {
                *slot = None;
            }
            drop(slot);
            drop(permit);
            debug!("Microphone tap {} released", id);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_without_tap_is_dropped() {
        let mic = SharedMicrophone::default();
        assert!(!mic.push(Bytes::from_static(&[0, 0])));
    }

    #[tokio::test]
    async fn test_tap_receives_frames_and_releases_on_drop() {
        let mic = SharedMicrophone::default();
        let mut tap = mic.acquire().await.unwrap();
        assert!(mic.is_held());

        assert!(mic.push(Bytes::from_static(&[0, 64, 0, 64])));
        let frame = tap.recv().await.unwrap();
        assert_eq!(frame.data.len(), 4);
        assert!(frame.energy > 0.4);

        drop(tap);
        assert!(!mic.is_held());
        assert!(!mic.push(Bytes::from_static(&[0, 0])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_acquirer_times_out_while_held() {
        let mic = SharedMicrophone::new(Duration::from_millis(100));
        let _tap = mic.acquire().await.unwrap();

        let result = mic.acquire().await;
        assert!(matches!(result, Err(DeviceError::Busy)));
    }

    #[tokio::test]
    async fn test_second_acquirer_waits_for_release() {
        let mic = SharedMicrophone::new(Duration::from_secs(2));
        let tap = mic.acquire().await.unwrap();

        let mic2 = mic.clone();
        let waiter = tokio::spawn(async move { mic2.acquire().await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(tap);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_denied_device() {
        let mic = SharedMicrophone::default();
        mic.deny("user refused");
        assert!(matches!(
            mic.acquire().await,
            Err(DeviceError::PermissionDenied(_))
        ));

        mic.allow();
        assert!(mic.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_device() {
        let mic = SharedMicrophone::default();
        mic.close();
        assert!(matches!(mic.acquire().await, Err(DeviceError::NotFound(_))));
    }
}
