use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use std::time::Duration;

/// Audio payload encodings understood by the gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// 16-bit signed little-endian PCM
    Linear16,
    Mp3,
    WebmOpus,
    Wav,
}

impl AudioEncoding {
    /// Encoding of an uploaded file by its MIME type. Parameters such as
    /// `;codecs=opus` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "audio/webm" | "video/webm" | "audio/ogg" => Some(Self::WebmOpus),
            "audio/wav" | "audio/wave" | "audio/x-wav" => Some(Self::Wav),
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/pcm" | "audio/l16" | "application/octet-stream" => Some(Self::Linear16),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Linear16 => "audio/pcm",
            Self::Mp3 => "audio/mpeg",
            Self::WebmOpus => "audio/webm",
            Self::Wav => "audio/wav",
        }
    }

    /// Google Speech `RecognitionConfig.encoding` name.
    pub fn google_name(&self) -> &'static str {
        match self {
            Self::Linear16 | Self::Wav => "LINEAR16",
            Self::Mp3 => "MP3",
            Self::WebmOpus => "WEBM_OPUS",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Linear16 => "pcm",
            Self::Mp3 => "mp3",
            Self::WebmOpus => "webm",
            Self::Wav => "wav",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16(16000)
    }
}

impl AudioFormat {
    pub fn pcm16(sample_rate: u32) -> Self {
        Self {
            encoding: AudioEncoding::Linear16,
            sample_rate,
            channels: 1,
        }
    }
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Silence,
    MaxDuration,
    Explicit,
    InputClosed,
}

/// One finished recording, consumed exactly once by recognition.
#[derive(Debug, Clone)]
pub struct AudioUnit {
    pub data: Bytes,
    pub format: AudioFormat,
    /// Wall-clock time between recording start and stop
    pub duration: Duration,
    pub chunk_count: usize,
    pub stop_reason: StopReason,
}

impl AudioUnit {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Wrap PCM16 payloads in a RIFF/WAVE container for providers that need a
    /// self-describing file. Other encodings are returned unchanged.
    pub fn to_file_bytes(&self) -> (Bytes, AudioEncoding) {
        if self.format.encoding != AudioEncoding::Linear16 {
            return (self.data.clone(), self.format.encoding);
        }

        let channels = self.format.channels.max(1);
        let sample_rate = self.format.sample_rate;
        let byte_rate = sample_rate * channels as u32 * 2;
        let data_len = self.data.len() as u32;

        let mut out = BytesMut::with_capacity(44 + self.data.len());
        out.put_slice(b"RIFF");
        out.put_u32_le(36 + data_len);
        out.put_slice(b"WAVE");
        out.put_slice(b"fmt ");
        out.put_u32_le(16);
        out.put_u16_le(1);
        out.put_u16_le(channels);
        out.put_u32_le(sample_rate);
        out.put_u32_le(byte_rate);
        out.put_u16_le(channels * 2);
        out.put_u16_le(16);
        out.put_slice(b"data");
        out.put_u32_le(data_len);
        out.put_slice(&self.data);

        (out.freeze(), AudioEncoding::Wav)
    }
}
