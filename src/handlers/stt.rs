use axum::{
    Json,
    extract::{Multipart, State},
};
use bytes::Bytes;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::capture::{AudioEncoding, AudioFormat, AudioUnit, StopReason};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// `POST /api/stt`
///
/// Transcribes the multipart `audio` file with the batch recognition
/// gateway. Uploads without a recognizable content type are treated as
/// browser WebM/Opus recordings. Audio under the gateway minimum yields an
/// empty transcript.
pub async fn transcribe_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let gateway = state.services.batch_recognition.clone().ok_or_else(|| {
        AppError::ServiceUnavailable(format!(
            "Speech recognition ({}) is not configured",
            state.config.stt_provider
        ))
    })?;

    let mut upload: Option<(Bytes, AudioEncoding)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        let encoding = field
            .content_type()
            .and_then(AudioEncoding::from_mime)
            .unwrap_or(AudioEncoding::WebmOpus);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read audio field: {e}")))?;
        upload = Some((data, encoding));
        break;
    }

    let Some((data, encoding)) = upload else {
        return Err(AppError::BadRequest("No audio file provided".to_string()));
    };

    debug!("Received {} bytes of {:?} audio", data.len(), encoding);
    let unit = AudioUnit {
        data,
        format: AudioFormat {
            encoding,
            // Browser MediaRecorder Opus is always 48 kHz
            sample_rate: match encoding {
                AudioEncoding::WebmOpus => 48_000,
                _ => state.config.stt_sample_rate,
            },
            channels: 1,
        },
        duration: Duration::ZERO,
        chunk_count: 1,
        stop_reason: StopReason::Explicit,
    };

    let transcript = gateway.transcribe(&unit).await?;
    info!("Transcribed upload: {} chars", transcript.len());
    Ok(Json(json!({ "transcript": transcript })))
}
