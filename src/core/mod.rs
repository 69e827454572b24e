pub mod activity;
pub mod capture;
pub mod coordinator;
pub mod dialogue;
pub mod plugins;
pub mod session;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use coordinator::{
    Collaborators, CoordinatorConfig, ErrorKind, Recognition, SessionEvent, TurnCoordinator,
    TurnError, TurnState,
};
pub use dialogue::{DialogueError, DialogueGateway, DialogueResult, HttpDialogueClient, NextAction};
pub use plugins::{Plugin, PluginEvent, PluginEventKind, PluginRegistry};
pub use session::{SessionRegistry, SessionSummary};
pub use stt::{RecognitionError, RecognitionGateway, STTProvider, StreamingTransport};
pub use tts::{PlaybackController, PlaybackError, PlaybackMode, SpeechSynthesizer, TtsTransport};
