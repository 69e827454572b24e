use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::capture::{AudioInput, DeviceError};
use crate::core::stt::StreamingRecognizer;

/// Holds a microphone tap and forwards its frames to a streaming recognizer.
///
/// Streaming-mode counterpart of a capture recording: it is the listening
/// phase's single tap holder.
pub(super) struct AudioPump {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl AudioPump {
    pub(super) async fn start(
        input: &Arc<dyn AudioInput>,
        recognizer: Arc<StreamingRecognizer>,
    ) -> Result<Self, DeviceError> {
        let mut tap = input.acquire().await?;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut dropped = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    frame = tap.recv() => match frame {
                        Some(frame) => {
                            if !recognizer.write(frame.data) {
                                dropped += 1;
                            }
                        }
                        None => break,
                    },
                }
            }
            if dropped > 0 {
                debug!("{} audio chunks dropped while the stream was down", dropped);
            }
        });

        Ok(Self { token, task })
    }

    pub(super) async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
