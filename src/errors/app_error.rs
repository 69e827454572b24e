use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::core::dialogue::DialogueError;
use crate::core::stt::RecognitionError;
use crate::core::tts::PlaybackError;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InternalServerError(String),
    BadRequest(String),
    NotFound(String),
    /// A required provider is not configured on this server
    ServiceUnavailable(String),
    /// An upstream gateway answered with an error
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::BadGateway(msg) => {
                tracing::error!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            AppError::NotFound(msg) => write!(f, "Not found: {msg}"),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {msg}"),
            AppError::BadGateway(msg) => write!(f, "Bad gateway: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<DialogueError> for AppError {
    fn from(err: DialogueError) -> Self {
        match err {
            DialogueError::MissingSession => AppError::BadRequest(err.to_string()),
            DialogueError::Api { status: 404, .. } => AppError::NotFound(err.to_string()),
            _ => AppError::BadGateway(err.to_string()),
        }
    }
}

impl From<RecognitionError> for AppError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::Configuration(_) => AppError::ServiceUnavailable(err.to_string()),
            _ => AppError::BadGateway(err.to_string()),
        }
    }
}

impl From<PlaybackError> for AppError {
    fn from(err: PlaybackError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::InternalServerError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_dialogue_error_mapping() {
        assert!(matches!(
            AppError::from(DialogueError::MissingSession),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(DialogueError::Api {
                status: 404,
                body: String::new()
            }),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(DialogueError::Timeout),
            AppError::BadGateway(_)
        ));
    }

    #[test]
    fn test_recognition_configuration_is_unavailable() {
        assert!(matches!(
            AppError::from(RecognitionError::Configuration("no key".into())),
            AppError::ServiceUnavailable(_)
        ));
    }
}
