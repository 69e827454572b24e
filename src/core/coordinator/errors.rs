use serde::Serialize;

use crate::core::capture::DeviceError;
use crate::core::dialogue::DialogueError;
use crate::core::stt::RecognitionError;
use crate::core::tts::PlaybackError;

/// Shown to the user when a dialogue turn cannot be completed. Never spoken.
pub const APOLOGY_MESSAGE: &str = "Przepraszam, wystąpił błąd. Spróbuj ponownie.";

/// Label carried as `errorType` on outbound error envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Device,
    Transport,
    Auth,
    Session,
    Dialogue,
    Playback,
    WebSocket,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Device => "device",
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::Session => "session",
            ErrorKind::Dialogue => "dialogue",
            ErrorKind::Playback => "playback",
            ErrorKind::WebSocket => "websocket",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any failure the turn loop can observe
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum TurnError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl TurnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TurnError::Device(_) => ErrorKind::Device,
            TurnError::Recognition(e) if e.is_fatal() => ErrorKind::Auth,
            TurnError::Recognition(_) => ErrorKind::Transport,
            TurnError::Dialogue(DialogueError::MissingSession) => ErrorKind::Session,
            TurnError::Dialogue(_) => ErrorKind::Dialogue,
            TurnError::Playback(PlaybackError::Auth(_)) => ErrorKind::Auth,
            TurnError::Playback(_) => ErrorKind::Playback,
        }
    }

    /// Human-readable text for the end user.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Device(e) => format!("Brak dostępu do mikrofonu: {e}"),
            TurnError::Recognition(_) => {
                "Nie udało się rozpoznać mowy. Spróbuj ponownie.".to_string()
            }
            TurnError::Dialogue(_) => APOLOGY_MESSAGE.to_string(),
            TurnError::Playback(_) => "Nie udało się odtworzyć odpowiedzi.".to_string(),
        }
    }
}
