//! Chat API proxy
//!
//! Thin pass-through to the dialogue gateway for clients that drive the
//! conversation over plain HTTP instead of the WebSocket session.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::core::coordinator::APOLOGY_MESSAGE;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Greeting returned when the chat API cannot start a conversation.
pub const FALLBACK_GREETING: &str =
    "Cześć! Jestem twoim asystentem głosowym. W czym mogę ci pomóc?";

/// Request body for `POST /api/chat/answer`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub system_question: Option<String>,
}

/// Request body for `POST /api/chat/send-offers-email`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOffersEmailRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{name} is required")))
}

/// `GET /api/chat/start`
///
/// On failure the client still gets a greeting to show, with status 500.
pub async fn start_chat(State(state): State<Arc<AppState>>) -> Response {
    match state.services.dialogue.start().await {
        Ok(start) => {
            info!(session_id = %start.session_id, "Chat session started");
            Json(start).into_response()
        }
        Err(e) => {
            error!("Failed to start chat session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to start chat session",
                    "message": FALLBACK_GREETING,
                })),
            )
                .into_response()
        }
    }
}

/// `POST /api/chat/answer`
///
/// On an upstream failure the client gets an apology to show as the next
/// question, with status 500.
pub async fn answer_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerRequest>,
) -> AppResult<Response> {
    let session_id = required(request.session_id, "sessionId")?;
    let answer = required(request.answer, "answer")?;

    let result = state
        .services
        .dialogue
        .answer(&session_id, &answer, request.system_question.as_deref())
        .await;
    Ok(match result {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            error!(session_id = %session_id, "Failed to answer chat: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to connect to chat API",
                    "question": APOLOGY_MESSAGE,
                })),
            )
                .into_response()
        }
    })
}

/// `GET /api/chat/mortgage-offers/{sessionId}`
pub async fn mortgage_offers(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> AppResult<Json<Value>> {
    let offers = state
        .services
        .dialogue
        .mortgage_offers(&session_id)
        .await?;
    Ok(Json(json!({ "offers": { "items": offers } })))
}

/// `POST /api/chat/send-offers-email`
pub async fn send_offers_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendOffersEmailRequest>,
) -> AppResult<Json<Value>> {
    let session_id = required(request.session_id, "sessionId")?;
    let email = required(request.email, "email")?;

    state
        .services
        .dialogue
        .send_offers_email(&session_id, &email, request.message.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(json!({ "success": true })))
}
