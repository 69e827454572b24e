use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{chat, sessions, speak, stt};
use crate::state::AppState;
use std::sync::Arc;

/// REST routes, mounted under `/api`
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/start", get(chat::start_chat))
        .route("/chat/answer", post(chat::answer_chat))
        .route(
            "/chat/mortgage-offers/{session_id}",
            get(chat::mortgage_offers),
        )
        .route("/chat/send-offers-email", post(chat::send_offers_email))
        .route("/stt", post(stt::transcribe_handler))
        .route("/tts", post(speak::speak_handler))
        .route("/sessions", get(sessions::list_sessions))
        .layer(TraceLayer::new_for_http())
}
