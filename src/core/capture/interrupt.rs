//! Barge-in detection tap.
//!
//! While the assistant is speaking, the monitor holds its own microphone tap
//! and watches for activity. The tap is always released before the interrupt
//! callback runs, so the capture controller can acquire the device right
//! after.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::errors::DeviceError;
use super::microphone::AudioInput;
use crate::core::activity::{ActivityConfig, ActivityDetector, ActivityEvent};

pub struct InterruptMonitor {
    input: Arc<dyn AudioInput>,
    config: ActivityConfig,
    active: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl InterruptMonitor {
    pub fn new(input: Arc<dyn AudioInput>, config: ActivityConfig) -> Self {
        Self {
            input,
            config,
            active: Mutex::new(None),
        }
    }

    /// Acquire a tap and watch it. `on_interrupt` fires at most once.
    ///
    /// Any previously armed watch is disarmed first.
    pub async fn arm<F>(&self, on_interrupt: F) -> Result<(), DeviceError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.disarm().await;

        let mut tap = self.input.acquire().await?;
        let token = CancellationToken::new();
        let config = self.config;
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let detector = ActivityDetector::new(config);
            let interrupted = loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break false,
                    frame = tap.recv() => match frame {
                        Some(frame) => {
                            if detector.process(frame.energy, Instant::now()) == Some(ActivityEvent::Start) {
                                break true;
                            }
                        }
                        None => break false,
                    },
                }
            };

            drop(tap);

            if interrupted {
                info!("Barge-in detected on interrupt tap");
                on_interrupt();
            } else {
                debug!("Interrupt tap disarmed");
            }
        });

        *self.active.lock() = Some((token, task));
        Ok(())
    }

    /// Stop watching and wait for the tap to be released. Idempotent.
    pub async fn disarm(&self) {
        let active = self.active.lock().take();
        if let Some((token, task)) = active {
            token.cancel();
            let _ = task.await;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }
}
