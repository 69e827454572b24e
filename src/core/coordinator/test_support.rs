//! Inert collaborators for tests that need a running coordinator but do not
//! exercise a full conversation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Collaborators, CoordinatorConfig, Recognition, TurnCoordinator};
use crate::core::capture::{AudioUnit, SharedMicrophone};
use crate::core::dialogue::{DialogueError, DialogueGateway, DialogueResult, DialogueStart, Offer};
use crate::core::stt::{BatchRecognizer, GatewayConfig, RecognitionError, RecognitionGateway};
use crate::core::tts::{AudioSink, AudioStream, PlaybackError, SpeechSynthesizer};

pub(crate) struct SilentRecognizer;

#[async_trait]
impl BatchRecognizer for SilentRecognizer {
    async fn transcribe(&self, _audio: &AudioUnit) -> Result<String, RecognitionError> {
        Ok(String::new())
    }

    fn provider_name(&self) -> &'static str {
        "silent"
    }
}

/// Starts session `stub-session` and echoes every answer back.
pub(crate) struct EchoDialogue;

#[async_trait]
impl DialogueGateway for EchoDialogue {
    async fn start(&self) -> Result<DialogueStart, DialogueError> {
        Ok(DialogueStart {
            session_id: "stub-session".into(),
            greeting: "Dzień dobry".into(),
            created_at: None,
        })
    }

    async fn answer(
        &self,
        session_id: &str,
        answer: &str,
        _system_question: Option<&str>,
    ) -> Result<DialogueResult, DialogueError> {
        Ok(DialogueResult::reply(session_id, answer))
    }

    async fn mortgage_offers(&self, _session_id: &str) -> Result<Vec<Offer>, DialogueError> {
        Ok(Vec::new())
    }

    async fn send_offers_email(
        &self,
        _session_id: &str,
        _email: &str,
        _message: &str,
    ) -> Result<serde_json::Value, DialogueError> {
        Ok(serde_json::json!({ "success": true }))
    }
}

/// Yields the text itself as a single audio chunk.
pub(crate) struct EchoSynthesizer;

#[async_trait]
impl SpeechSynthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, PlaybackError> {
        let chunk = Bytes::from(text.to_string());
        Ok(futures::stream::iter([Ok(chunk)]).boxed())
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

pub(crate) struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn write(&self, _handle_id: u64, _chunk: Bytes) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn clear(&self, _handle_id: u64) {}
}

pub(crate) fn stub_collaborators(mic: SharedMicrophone) -> Collaborators {
    Collaborators {
        microphone: Arc::new(mic),
        recognition: Recognition::Batch(Arc::new(RecognitionGateway::new(
            Arc::new(SilentRecognizer),
            GatewayConfig::default(),
        ))),
        dialogue: Arc::new(EchoDialogue),
        synthesizer: Arc::new(EchoSynthesizer),
        sink: Arc::new(NullSink),
    }
}

/// A coordinator that is never started. Its events are dropped.
pub(crate) fn idle_coordinator() -> TurnCoordinator {
    let (events_tx, _) = mpsc::unbounded_channel();
    TurnCoordinator::spawn(
        stub_collaborators(SharedMicrophone::default()),
        CoordinatorConfig::default(),
        events_tx,
        None,
    )
}
