//! Maps transport connections to their turn coordinators.
//!
//! Each WebSocket connection owns exactly one [`TurnCoordinator`]; the
//! registry only tracks them so they can be listed and torn down when the
//! connection closes. Coordinators never share state with each other.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::coordinator::{TurnCoordinator, TurnState};
use crate::utils::unix_millis;

struct SessionEntry {
    coordinator: Arc<TurnCoordinator>,
    opened_at: u64,
}

/// Snapshot of one registered connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub connection_id: String,
    /// Dialogue session id, once the dialogue has issued one
    pub session_id: Option<String>,
    pub state: TurnState,
    pub opened_at: u64,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coordinator under a fresh connection id.
    pub fn open(&self, coordinator: TurnCoordinator) -> (String, Arc<TurnCoordinator>) {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let coordinator = Arc::new(coordinator);

        self.sessions.write().insert(
            connection_id.clone(),
            SessionEntry {
                coordinator: coordinator.clone(),
                opened_at: unix_millis(),
            },
        );
        info!("Opened connection {} ({} active)", connection_id, self.len());

        (connection_id, coordinator)
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<TurnCoordinator>> {
        self.sessions
            .read()
            .get(connection_id)
            .map(|entry| entry.coordinator.clone())
    }

    /// Remove the connection and shut its coordinator down.
    ///
    /// Returns `false` if the connection was not registered.
    pub async fn close(&self, connection_id: &str) -> bool {
        let Some(entry) = self.sessions.write().remove(connection_id) else {
            debug!("Connection {} already closed", connection_id);
            return false;
        };

        entry.coordinator.shutdown().await;
        info!("Closed connection {} ({} active)", connection_id, self.len());
        true
    }

    /// Summaries ordered by connection time.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| SessionSummary {
                connection_id: id.clone(),
                session_id: entry.coordinator.session_id(),
                state: entry.coordinator.state(),
                opened_at: entry.opened_at,
            })
            .collect();
        sessions.sort_by(|a, b| {
            a.opened_at
                .cmp(&b.opened_at)
                .then_with(|| a.connection_id.cmp(&b.connection_id))
        });
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
