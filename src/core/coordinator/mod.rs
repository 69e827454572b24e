//! # Turn Coordinator
//!
//! One state machine per conversation, deciding at every moment whether the
//! session listens, processes or speaks, and letting the user interrupt
//! playback at any time.
//!
//! ```text
//!  Idle ─ start() ─► Listening ─ transcript ─► Processing ─ result ─► Speaking
//!   ▲                  ▲  ▲  └─ empty transcript ─┘                       │
//!   │                  │  └────────────── barge-in ──────────────────────┤
//!   │                  └───────────────── playback ended ────────────────┤
//!   │                         (Completed instead, once the dialogue ends) │
//!   └──── recovery delay ──── Error ◄──── fatal gateway failure, any state
//! ```
//!
//! The coordinator runs as its own task; [`TurnCoordinator`] is a cheap
//! command handle. Collaborators are injected through [`Collaborators`], so
//! the WebSocket relay and tests drive the same implementation.

mod actor;
mod config;
mod errors;
mod events;
mod pump;

#[cfg(test)]
pub(crate) mod test_support;

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::plugins::PluginDispatcher;
use crate::core::stt::RecognizerCapabilities;

pub use config::{Collaborators, CoordinatorConfig, Recognition};
pub use errors::{APOLOGY_MESSAGE, ErrorKind, TurnError};
pub use events::{SessionEvent, TurnState};

use actor::{Channels, Command, TurnActor};

/// Handle to a running turn loop. Dropping the last handle shuts it down.
pub struct TurnCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<TurnState>,
    session_id: Arc<RwLock<Option<String>>>,
    capabilities: RecognizerCapabilities,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TurnCoordinator {
    /// Start the loop task. Events are delivered to `events` in emission
    /// order, and mirrored to `plugins` when given.
    pub fn spawn(
        collaborators: Collaborators,
        config: CoordinatorConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
        plugins: Option<PluginDispatcher>,
    ) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(TurnState::Idle);
        let session_id = Arc::new(RwLock::new(None));
        let capabilities = collaborators.recognition.capabilities();

        let task = tokio::spawn(TurnActor::run(
            collaborators,
            config,
            Channels {
                commands,
                state: state_tx,
                session_id: session_id.clone(),
                events,
                plugins,
            },
        ));

        Self {
            commands: commands_tx,
            state,
            session_id,
            capabilities,
            task: Mutex::new(Some(task)),
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Turn coordinator already stopped");
        }
    }

    /// Open the session. With a session id the dialogue is resumed and the
    /// loop goes straight to listening; otherwise a new dialogue is started
    /// and its greeting spoken. No-op while a turn is already running.
    pub fn start(&self, session_id: Option<String>) {
        self.send(Command::Start { session_id });
    }

    /// Cancel whatever phase is active and return to `Idle`.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Client-side voice activity. `true` while speaking interrupts playback.
    pub fn user_speaking(&self, speaking: bool) {
        self.send(Command::UserSpeaking(speaking));
    }

    /// Speak `text` outside the dialogue loop.
    pub fn say(&self, text: impl Into<String>) {
        self.send(Command::Say(text.into()));
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn capabilities(&self) -> RecognizerCapabilities {
        self.capabilities
    }

    /// Stop the loop, release every resource and wait for the task to exit.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}
