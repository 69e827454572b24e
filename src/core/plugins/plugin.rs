use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::core::coordinator::{ErrorKind, SessionEvent};

/// Lifecycle events a plugin can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginEventKind {
    #[serde(rename = "onTranscript")]
    Transcript,
    #[serde(rename = "onPartialTranscript")]
    PartialTranscript,
    #[serde(rename = "onTTSStart")]
    TtsStart,
    #[serde(rename = "onTTSStop")]
    TtsStop,
    #[serde(rename = "onUserStartedSpeaking")]
    UserStartedSpeaking,
    #[serde(rename = "onError")]
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    Transcript(String),
    PartialTranscript(String),
    TtsStart,
    TtsStop { interrupted: bool },
    UserStartedSpeaking,
    Error { kind: ErrorKind, message: String },
}

impl PluginEvent {
    pub fn kind(&self) -> PluginEventKind {
        match self {
            PluginEvent::Transcript(_) => PluginEventKind::Transcript,
            PluginEvent::PartialTranscript(_) => PluginEventKind::PartialTranscript,
            PluginEvent::TtsStart => PluginEventKind::TtsStart,
            PluginEvent::TtsStop { .. } => PluginEventKind::TtsStop,
            PluginEvent::UserStartedSpeaking => PluginEventKind::UserStartedSpeaking,
            PluginEvent::Error { .. } => PluginEventKind::Error,
        }
    }

    /// The plugin-visible part of a session event, if any.
    pub fn from_session_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::FinalTranscript { text } => Some(PluginEvent::Transcript(text.clone())),
            SessionEvent::PartialTranscript { text } => {
                Some(PluginEvent::PartialTranscript(text.clone()))
            }
            SessionEvent::TtsStart { .. } => Some(PluginEvent::TtsStart),
            SessionEvent::TtsEnd { interrupted, .. } => Some(PluginEvent::TtsStop {
                interrupted: *interrupted,
            }),
            SessionEvent::UserSpeaking { speaking: true } => Some(PluginEvent::UserStartedSpeaking),
            SessionEvent::Error { kind, message } => Some(PluginEvent::Error {
                kind: *kind,
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Passed to every handler invocation
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub plugin_name: String,
    pub session_id: Option<String>,
    /// Unix epoch milliseconds at dispatch
    pub timestamp: u64,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PluginError(pub String);

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

pub type PluginHandler = Arc<
    dyn Fn(PluginEvent, PluginContext) -> BoxFuture<'static, Result<(), PluginError>>
        + Send
        + Sync,
>;

/// A named bundle of handlers keyed by event kind.
pub struct Plugin {
    name: String,
    handlers: HashMap<PluginEventKind, PluginHandler>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an async handler. Replaces any earlier handler for `kind`.
    pub fn on<F, Fut>(mut self, kind: PluginEventKind, handler: F) -> Self
    where
        F: Fn(PluginEvent, PluginContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PluginError>> + Send + 'static,
    {
        let handler: PluginHandler = Arc::new(move |event, ctx| handler(event, ctx).boxed());
        self.handlers.insert(kind, handler);
        self
    }

    /// Register a synchronous handler.
    pub fn on_sync<F>(mut self, kind: PluginEventKind, handler: F) -> Self
    where
        F: Fn(&PluginEvent, &PluginContext) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: PluginHandler = Arc::new(move |event, ctx| {
            let handler = handler.clone();
            async move { handler(&event, &ctx) }.boxed()
        });
        self.handlers.insert(kind, wrapped);
        self
    }

    pub fn handler(&self, kind: PluginEventKind) -> Option<PluginHandler> {
        self.handlers.get(&kind).cloned()
    }

    pub fn events(&self) -> Vec<PluginEventKind> {
        let mut kinds: Vec<PluginEventKind> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| *k as u8);
        kinds
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("events", &self.events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coordinator::TurnState;

    #[test]
    fn test_session_event_mapping() {
        assert_eq!(
            PluginEvent::from_session_event(&SessionEvent::FinalTranscript {
                text: "hej".into()
            }),
            Some(PluginEvent::Transcript("hej".into()))
        );
        assert_eq!(
            PluginEvent::from_session_event(&SessionEvent::UserSpeaking { speaking: true }),
            Some(PluginEvent::UserStartedSpeaking)
        );
        assert_eq!(
            PluginEvent::from_session_event(&SessionEvent::UserSpeaking { speaking: false }),
            None
        );
        assert_eq!(
            PluginEvent::from_session_event(&SessionEvent::StateChanged {
                state: TurnState::Listening
            }),
            None
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            serde_json::to_value(PluginEventKind::TtsStop).unwrap(),
            "onTTSStop"
        );
        let plugin = Plugin::new("p")
            .on_sync(PluginEventKind::Error, |_, _| Ok(()))
            .on(PluginEventKind::Transcript, |_, _| async { Ok(()) });
        assert_eq!(
            plugin.events(),
            vec![PluginEventKind::Transcript, PluginEventKind::Error]
        );
    }
}
