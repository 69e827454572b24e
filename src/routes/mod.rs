pub mod api;
pub mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Full application router: health check at `/`, REST under `/api` and the
/// voice WebSocket at `/ws`.
///
/// CORS is permissive so the browser client can be served from anywhere.
pub fn create_app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .nest("/api", api::create_api_router())
        .merge(ws::create_ws_router())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
