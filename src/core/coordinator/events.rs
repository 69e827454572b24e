use serde::Serialize;

use super::errors::ErrorKind;
use crate::core::dialogue::{DialogueResult, NextAction, Offer};

/// Where the conversational loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    #[default]
    Idle,
    /// Terminal sub-state of `Idle`: the dialogue finished and the loop no
    /// longer listens on its own.
    Completed,
    Listening,
    Processing,
    Speaking,
    Error,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Completed => "completed",
            TurnState::Listening => "listening",
            TurnState::Processing => "processing",
            TurnState::Speaking => "speaking",
            TurnState::Error => "error",
        }
    }

    /// `Completed` counts as idle for everything but auto-listening.
    pub fn is_idle(&self) -> bool {
        matches!(self, TurnState::Idle | TurnState::Completed)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a session reports to the outside world, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted {
        session_id: String,
    },
    SessionStopped,
    StateChanged {
        state: TurnState,
    },
    PartialTranscript {
        text: String,
    },
    FinalTranscript {
        text: String,
    },
    /// Assistant prompt text. `details` is absent for the greeting.
    AssistantMessage {
        text: String,
        details: Option<Box<DialogueResult>>,
    },
    TtsStart {
        handle_id: u64,
    },
    TtsEnd {
        handle_id: u64,
        interrupted: bool,
    },
    /// Synthesis failed; the text is all the user gets for this prompt.
    TextFallback {
        text: String,
    },
    UserSpeaking {
        speaking: bool,
    },
    ResultsReady {
        offers: Vec<Offer>,
    },
    ActionRequired {
        action: NextAction,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl SessionEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        SessionEvent::Error {
            kind,
            message: message.into(),
        }
    }
}
