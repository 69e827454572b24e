use futures::FutureExt;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::plugin::{Plugin, PluginContext, PluginError, PluginEvent, PluginEventKind};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub events: Vec<PluginEventKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStats {
    pub events_dispatched: u64,
    pub handler_failures: u64,
    pub handler_panics: u64,
}

#[derive(Default)]
struct Counters {
    events_dispatched: AtomicU64,
    handler_failures: AtomicU64,
    handler_panics: AtomicU64,
}

/// Process-wide set of registered plugins.
///
/// Each event source gets its own [`PluginDispatcher`] so events from one
/// session are delivered in order without waiting on another session.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<RwLock<Vec<Arc<Plugin>>>>,
    counters: Arc<Counters>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Names are unique.
    pub fn register(&self, plugin: Plugin) -> Result<(), PluginError> {
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(PluginError(format!(
                "Plugin '{}' is already registered",
                plugin.name()
            )));
        }
        info!("Registered plugin '{}'", plugin.name());
        plugins.push(Arc::new(plugin));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut plugins = self.plugins.write();
        let before = plugins.len();
        plugins.retain(|p| p.name() != name);
        before != plugins.len()
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins
            .read()
            .iter()
            .map(|p| PluginInfo {
                name: p.name().to_string(),
                events: p.events(),
            })
            .collect()
    }

    pub fn stats(&self) -> PluginStats {
        PluginStats {
            events_dispatched: self.counters.events_dispatched.load(Ordering::Relaxed),
            handler_failures: self.counters.handler_failures.load(Ordering::Relaxed),
            handler_panics: self.counters.handler_panics.load(Ordering::Relaxed),
        }
    }

    /// Start a FIFO dispatcher for one event source.
    pub fn dispatcher(&self) -> PluginDispatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_loop(self.clone(), rx));
        PluginDispatcher {
            queue: tx,
            session_id: Arc::new(RwLock::new(None)),
        }
    }

    async fn deliver(&self, event: PluginEvent, session_id: Option<String>) {
        let kind = event.kind();
        let targets: Vec<(String, _)> = self
            .plugins
            .read()
            .iter()
            .filter_map(|p| p.handler(kind).map(|h| (p.name().to_string(), h)))
            .collect();

        self.counters.events_dispatched.fetch_add(1, Ordering::Relaxed);
        if targets.is_empty() {
            return;
        }

        let timestamp = crate::utils::unix_millis();
        let calls = targets.into_iter().map(|(name, handler)| {
            let ctx = PluginContext {
                plugin_name: name.clone(),
                session_id: session_id.clone(),
                timestamp,
            };
            let event = event.clone();
            let call = async move { handler(event, ctx).await };
            async move { (name, AssertUnwindSafe(call).catch_unwind().await) }
        });

        for (name, outcome) in join_all(calls).await {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.counters.handler_failures.fetch_add(1, Ordering::Relaxed);
                    error!("Plugin '{}' failed on {:?}: {}", name, kind, e);
                }
                Err(_) => {
                    self.counters.handler_panics.fetch_add(1, Ordering::Relaxed);
                    error!("Plugin '{}' panicked on {:?}", name, kind);
                }
            }
        }
    }
}

enum Queued {
    /// The session id is the one current at emit time
    Event(PluginEvent, Option<String>),
    Flush(oneshot::Sender<()>),
}

/// FIFO queue in front of a [`PluginRegistry`].
///
/// Every handler for an event is awaited before the next event is delivered.
#[derive(Clone)]
pub struct PluginDispatcher {
    queue: mpsc::UnboundedSender<Queued>,
    session_id: Arc<RwLock<Option<String>>>,
}

impl PluginDispatcher {
    /// Enqueue without waiting for delivery.
    pub fn emit(&self, event: PluginEvent) {
        let session_id = self.session_id.read().clone();
        if self.queue.send(Queued::Event(event, session_id)).is_err() {
            debug!("Plugin dispatcher closed, event dropped");
        }
    }

    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write() = session_id;
    }

    /// Wait until everything emitted so far has been delivered.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.queue.send(Queued::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn dispatch_loop(registry: PluginRegistry, mut queue: mpsc::UnboundedReceiver<Queued>) {
    while let Some(item) = queue.recv().await {
        match item {
            Queued::Event(event, session_id) => registry.deliver(event, session_id).await,
            Queued::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Plugin dispatcher stopped");
}
