//! Plugin hooks on session lifecycle events.
//!
//! Plugins are named handler bundles keyed by [`PluginEventKind`]. Handlers
//! may be sync or async. A failing or panicking handler never prevents the
//! others from running, and events from one source are delivered strictly in
//! submission order.

mod plugin;
mod registry;

pub use plugin::{
    Plugin, PluginContext, PluginError, PluginEvent, PluginEventKind, PluginHandler,
};
pub use registry::{PluginDispatcher, PluginInfo, PluginRegistry, PluginStats};

use tracing::info;

/// Logs every final transcript and error. Registered by default.
pub fn logging_plugin() -> Plugin {
    Plugin::new("logger")
        .on_sync(PluginEventKind::Transcript, |event, ctx| {
            if let PluginEvent::Transcript(text) = event {
                info!(session_id = ?ctx.session_id, "Final transcript: {}", text);
            }
            Ok(())
        })
        .on_sync(PluginEventKind::Error, |event, ctx| {
            if let PluginEvent::Error { kind, message } = event {
                info!(session_id = ?ctx.session_id, "Session error ({}): {}", kind, message);
            }
            Ok(())
        })
}
