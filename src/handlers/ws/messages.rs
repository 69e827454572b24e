//! WebSocket message types
//!
//! Every envelope is a JSON object tagged by `type`. Outbound envelopes also
//! carry a `timestamp` in Unix epoch milliseconds, added at serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::coordinator::{ErrorKind, SessionEvent, TurnState};
use crate::core::dialogue::{NextAction, Offer};

/// WebSocket message types for incoming messages
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum IncomingMessage {
    /// Open the conversation, resuming `sessionId` when given
    #[serde(rename_all = "camelCase")]
    StartSession {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    StopSession,
    /// Base64 PCM16LE microphone audio
    AudioData { audio: String },
    UserStartedSpeaking,
    UserStoppedSpeaking,
    /// Speak `text` outside the dialogue loop
    TtsRequest { text: String },
    SendOffersEmail {
        email: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

/// Base64 audio payload of a `tts-chunk`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioPayload {
    pub data: String,
}

/// WebSocket message types for outgoing messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    #[serde(rename_all = "camelCase")]
    SessionStarted { session_id: String },
    SessionStopped,
    StateChanged { state: TurnState },
    PartialTranscript { text: String },
    FinalTranscript { text: String },
    #[serde(rename_all = "camelCase")]
    AssistantMessage {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_completed: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_action: Option<NextAction>,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        question_number: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_questions: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_state: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        structured_data: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    TtsStart {
        handle_id: u64,
        content_type: String,
    },
    #[serde(rename_all = "camelCase")]
    TtsChunk { handle_id: u64, audio: AudioPayload },
    #[serde(rename_all = "camelCase")]
    TtsEnd { handle_id: u64, interrupted: bool },
    TextFallback { text: String },
    UserSpeaking { speaking: bool },
    ResultsReady { offers: Vec<Offer> },
    ActionRequired { action: NextAction },
    EmailSent {
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error { error_type: ErrorKind, message: String },
}

impl OutgoingMessage {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        OutgoingMessage::Error {
            error_type: kind,
            message: message.into(),
        }
    }

    /// Map a coordinator event onto its wire envelope.
    ///
    /// `content_type` is the synthesizer's audio MIME type, announced on
    /// `tts-start`.
    pub fn from_event(event: SessionEvent, content_type: &str) -> Self {
        match event {
            SessionEvent::SessionStarted { session_id } => {
                OutgoingMessage::SessionStarted { session_id }
            }
            SessionEvent::SessionStopped => OutgoingMessage::SessionStopped,
            SessionEvent::StateChanged { state } => OutgoingMessage::StateChanged { state },
            SessionEvent::PartialTranscript { text } => OutgoingMessage::PartialTranscript { text },
            SessionEvent::FinalTranscript { text } => OutgoingMessage::FinalTranscript { text },
            SessionEvent::AssistantMessage { text, details } => match details {
                Some(result) => OutgoingMessage::AssistantMessage {
                    text,
                    is_completed: Some(result.is_completed),
                    next_action: Some(result.next_action),
                    category: result.category,
                    question_number: result.question_number,
                    total_questions: result.total_questions,
                    current_state: result.current_state,
                    structured_data: result.structured_data,
                },
                None => OutgoingMessage::AssistantMessage {
                    text,
                    is_completed: None,
                    next_action: None,
                    category: None,
                    question_number: None,
                    total_questions: None,
                    current_state: None,
                    structured_data: None,
                },
            },
            SessionEvent::TtsStart { handle_id } => OutgoingMessage::TtsStart {
                handle_id,
                content_type: content_type.to_string(),
            },
            SessionEvent::TtsEnd {
                handle_id,
                interrupted,
            } => OutgoingMessage::TtsEnd {
                handle_id,
                interrupted,
            },
            SessionEvent::TextFallback { text } => OutgoingMessage::TextFallback { text },
            SessionEvent::UserSpeaking { speaking } => OutgoingMessage::UserSpeaking { speaking },
            SessionEvent::ResultsReady { offers } => OutgoingMessage::ResultsReady { offers },
            SessionEvent::ActionRequired { action } => OutgoingMessage::ActionRequired { action },
            SessionEvent::Error { kind, message } => OutgoingMessage::error(kind, message),
        }
    }

    /// JSON text of the envelope with `timestamp` added.
    pub fn to_envelope(&self, timestamp: u64) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".to_string(), Value::from(timestamp));
        }
        serde_json::to_string(&value)
    }
}
