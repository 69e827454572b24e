use axum::response::Json;
use serde_json::{Value, json};

/// `GET /`
///
/// Liveness check. Does not touch the dialogue backend or speech providers.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
