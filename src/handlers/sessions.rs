use axum::{Json, extract::State};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::state::AppState;

/// `GET /api/sessions`
///
/// Voice sessions currently open over WebSocket, oldest first.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sessions = state.sessions.list();
    Json(json!({
        "active": sessions.len(),
        "sessions": sessions,
    }))
}
