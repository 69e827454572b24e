//! WebSocket message types for the ElevenLabs realtime speech-to-text API.

use serde::{Deserialize, Serialize};

/// Audio chunk sent to ElevenLabs.
#[derive(Debug, Serialize)]
pub struct InputAudioChunk {
    /// Always "input_audio_chunk"
    pub message_type: &'static str,
    /// Base64-encoded PCM16LE audio
    pub audio_base_64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

impl InputAudioChunk {
    #[inline]
    pub fn new(audio_base_64: String) -> Self {
        Self {
            message_type: "input_audio_chunk",
            audio_base_64,
            sample_rate: None,
        }
    }

    #[inline]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionStarted {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderError {
    /// "error", "auth_error" or "quota_exceeded_error"
    pub message_type: String,
    #[serde(default)]
    pub error: String,
}

/// Incoming server messages.
#[derive(Debug)]
pub enum ElevenLabsMessage {
    SessionStarted(SessionStarted),
    /// Interim result, may change
    PartialTranscript(Transcript),
    /// Final result for a speech segment (with or without word timestamps)
    CommittedTranscript(Transcript),
    Error(ProviderError),
    /// Forward compatibility
    Unknown(String),
}

impl ElevenLabsMessage {
    /// Parse a text frame by peeking at `message_type` first.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct MessageTypePeek {
            message_type: String,
        }

        let peek: MessageTypePeek = serde_json::from_str(text)?;

        match peek.message_type.as_str() {
            "session_started" => Ok(Self::SessionStarted(serde_json::from_str(text)?)),
            "partial_transcript" => Ok(Self::PartialTranscript(serde_json::from_str(text)?)),
            "committed_transcript" | "committed_transcript_with_timestamps" => {
                Ok(Self::CommittedTranscript(serde_json::from_str(text)?))
            }
            "error" | "auth_error" | "quota_exceeded_error" => {
                Ok(Self::Error(serde_json::from_str(text)?))
            }
            _ => Ok(Self::Unknown(text.to_string())),
        }
    }
}
