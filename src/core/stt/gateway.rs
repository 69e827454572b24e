//! Batch recognition with request shaping shared by every provider.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::base::{BatchRecognizer, RecognitionError, RecognizerCapabilities};
use crate::core::capture::AudioUnit;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Units smaller than this are answered with an empty transcript
    /// without calling the provider.
    pub min_audio_bytes: usize,
    /// Per-attempt timeout. Expiry counts as a transport error.
    pub timeout: Duration,
    /// Extra attempts for transport errors.
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            min_audio_bytes: 500,
            timeout: Duration::from_millis(15_000),
            max_retries: 3,
            retry_backoff: Duration::from_millis(1_000),
        }
    }
}

/// Wraps a [`BatchRecognizer`] with the size sanity check, a bounded timeout
/// and fixed-backoff retries for transport failures.
pub struct RecognitionGateway {
    recognizer: Arc<dyn BatchRecognizer>,
    config: GatewayConfig,
}

impl RecognitionGateway {
    pub fn new(recognizer: Arc<dyn BatchRecognizer>, config: GatewayConfig) -> Self {
        Self { recognizer, config }
    }

    pub fn capabilities(&self) -> RecognizerCapabilities {
        self.recognizer.capabilities()
    }

    pub fn provider_name(&self) -> &'static str {
        self.recognizer.provider_name()
    }

    /// Transcribe one unit. An empty string means nothing was recognized.
    pub async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError> {
        if audio.len() < self.config.min_audio_bytes {
            debug!(
                "Audio unit too short for recognition ({} < {} bytes)",
                audio.len(),
                self.config.min_audio_bytes
            );
            return Ok(String::new());
        }

        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(
                self.config.timeout,
                self.recognizer.transcribe(audio),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(RecognitionError::Transport(format!(
                    "{} recognition timed out after {}ms",
                    self.recognizer.provider_name(),
                    self.config.timeout.as_millis()
                ))),
            };

            match result {
                Ok(text) => return Ok(text.trim().to_string()),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Recognition attempt {} failed ({}), retrying in {}ms",
                        attempt,
                        e,
                        self.config.retry_backoff.as_millis()
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::{AudioFormat, StopReason};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedRecognizer {
        replies: Mutex<VecDeque<Result<String, RecognitionError>>>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl ScriptedRecognizer {
        fn new(replies: Vec<Result<String, RecognitionError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                hang: true,
            })
        }
    }

    #[async_trait]
    impl BatchRecognizer for ScriptedRecognizer {
        async fn transcribe(&self, _audio: &AudioUnit) -> Result<String, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn unit(len: usize) -> AudioUnit {
        AudioUnit {
            data: Bytes::from(vec![0u8; len]),
            format: AudioFormat::default(),
            duration: Duration::from_millis(500),
            chunk_count: 1,
            stop_reason: StopReason::Silence,
        }
    }

    #[tokio::test]
    async fn test_short_audio_skips_provider() {
        let recognizer = ScriptedRecognizer::new(vec![Ok("should not be used".into())]);
        let gateway = RecognitionGateway::new(recognizer.clone(), GatewayConfig::default());

        assert_eq!(gateway.transcribe(&unit(20)).await.unwrap(), "");
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transcript_is_trimmed() {
        let recognizer = ScriptedRecognizer::new(vec![Ok("  I need a loan \n".into())]);
        let gateway = RecognitionGateway::new(recognizer, GatewayConfig::default());
        assert_eq!(gateway.transcribe(&unit(1000)).await.unwrap(), "I need a loan");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let recognizer = ScriptedRecognizer::new(vec![
            Err(RecognitionError::Transport("reset".into())),
            Err(RecognitionError::Transport("reset".into())),
            Ok("hello".into()),
        ]);
        let gateway = RecognitionGateway::new(recognizer.clone(), GatewayConfig::default());

        let started = tokio::time::Instant::now();
        assert_eq!(gateway.transcribe(&unit(1000)).await.unwrap(), "hello");
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_escalates() {
        let recognizer = ScriptedRecognizer::new(
            (0..5)
                .map(|_| Err(RecognitionError::Transport("down".into())))
                .collect(),
        );
        let gateway = RecognitionGateway::new(recognizer.clone(), GatewayConfig::default());

        let err = gateway.transcribe(&unit(1000)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let recognizer =
            ScriptedRecognizer::new(vec![Err(RecognitionError::Auth("bad key".into()))]);
        let gateway = RecognitionGateway::new(recognizer.clone(), GatewayConfig::default());

        let err = gateway.transcribe(&unit(1000)).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Auth(_)));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_transport_error() {
        let recognizer = ScriptedRecognizer::hanging();
        let gateway = RecognitionGateway::new(
            recognizer.clone(),
            GatewayConfig {
                max_retries: 0,
                ..Default::default()
            },
        );

        let err = gateway.transcribe(&unit(1000)).await.unwrap_err();
        assert!(matches!(err, RecognitionError::Transport(_)));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    }
}
