use thiserror::Error;

/// Capture device failures.
///
/// These are terminal for the acquisition attempt that raised them; the
/// caller decides whether to try again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("No audio input device: {0}")]
    NotFound(String),

    #[error("Microphone is held by another tap")]
    Busy,
}
