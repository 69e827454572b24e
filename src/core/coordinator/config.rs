use std::sync::Arc;
use std::time::Duration;

use crate::core::activity::ActivityConfig;
use crate::core::capture::{AudioInput, CaptureConfig};
use crate::core::dialogue::DialogueGateway;
use crate::core::stt::{
    RecognitionGateway, RecognizerCapabilities, StreamingConfig, StreamingTransport,
};
use crate::core::tts::{AudioSink, PlaybackConfig, SpeechSynthesizer};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Watch the microphone for barge-in while speaking
    pub barge_in: bool,
    /// Delay before `Error` falls back to `Idle`
    pub error_recovery_delay: Duration,
    pub capture: CaptureConfig,
    /// Detector settings for the barge-in tap
    pub interrupt: ActivityConfig,
    pub playback: PlaybackConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            barge_in: true,
            error_recovery_delay: Duration::from_millis(3_000),
            capture: CaptureConfig::default(),
            interrupt: ActivityConfig::default().with_threshold(0.05),
            playback: PlaybackConfig::default(),
        }
    }
}

/// How user audio becomes text.
#[derive(Clone)]
pub enum Recognition {
    /// Record one unit per turn, then transcribe it
    Batch(Arc<RecognitionGateway>),
    /// Forward live audio to a long-lived stream while listening
    Streaming {
        transport: Arc<dyn StreamingTransport>,
        config: StreamingConfig,
    },
}

impl Recognition {
    pub fn capabilities(&self) -> RecognizerCapabilities {
        match self {
            Recognition::Batch(gateway) => gateway.capabilities(),
            Recognition::Streaming { transport, .. } => transport.capabilities(),
        }
    }
}

/// Everything a coordinator talks to. Injected so server and tests share
/// one implementation.
#[derive(Clone)]
pub struct Collaborators {
    pub microphone: Arc<dyn AudioInput>,
    pub recognition: Recognition,
    pub dialogue: Arc<dyn DialogueGateway>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub sink: Arc<dyn AudioSink>,
}
