use axum::{
    Json,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::tts::PlaybackError;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Request body for the speak endpoint
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    /// The text to synthesize
    pub text: String,
}

/// `POST /api/tts`
///
/// Streams the synthesizer's audio back as it is generated. Only the start
/// of synthesis is bounded by `TTS_TIMEOUT_MS`; the body itself is not.
pub async fn speak_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeakRequest>,
) -> AppResult<Response> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("Text cannot be empty".to_string()));
    }

    let synthesizer = state.services.synthesizer.clone().ok_or_else(|| {
        AppError::ServiceUnavailable("Speech synthesis is not configured".to_string())
    })?;

    info!(
        "Synthesizing {} chars with {}",
        request.text.len(),
        synthesizer.provider_name()
    );

    let timeout_ms = state.config.tts_timeout_ms;
    let stream = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        synthesizer.synthesize(&request.text),
    )
    .await
    .map_err(|_| PlaybackError::Timeout(timeout_ms))??;

    Ok((
        [(header::CONTENT_TYPE, synthesizer.content_type())],
        Body::from_stream(stream),
    )
        .into_response())
}
