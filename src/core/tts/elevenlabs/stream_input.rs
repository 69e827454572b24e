//! `stream-input` WebSocket protocol.
//!
//! ```text
//! client: {"text":" ", voice_settings, generation_config}   BOS
//! client: {"text":"chunk ", "try_trigger_generation":bool}   one per chunk
//! client: {"text":""}                                         EOS
//! server: {"audio":"<base64>"} ... {"isFinal":true}
//! ```

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use super::{ElevenLabsTtsConfig, VoiceSettings};
use crate::core::tts::base::{AudioStream, PlaybackError, SpeechSynthesizer};
use crate::core::tts::chunking::split_into_chunks;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CHUNK_LENGTH_SCHEDULE: [u32; 4] = [120, 160, 250, 290];

#[derive(Debug, Serialize)]
struct BeginOfStream<'a> {
    text: &'static str,
    voice_settings: &'a VoiceSettings,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    chunk_length_schedule: [u32; 4],
}

#[derive(Debug, Serialize)]
struct TextChunk {
    text: String,
    try_trigger_generation: bool,
}

#[derive(Debug, Serialize)]
struct EndOfStream {
    text: &'static str,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    is_final: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ElevenLabsStreamInputSynthesizer {
    config: ElevenLabsTtsConfig,
}

impl ElevenLabsStreamInputSynthesizer {
    pub fn new(config: ElevenLabsTtsConfig) -> Result<Self, PlaybackError> {
        if config.api_key.is_empty() {
            return Err(PlaybackError::Auth(
                "API key is required for ElevenLabs".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream-input?model_id={}&output_format={}",
            self.config.ws_base_url.trim_end_matches('/'),
            self.config.voice_id,
            self.config.model_id,
            self.config.output_format
        )
    }

    async fn connect(&self) -> Result<Socket, PlaybackError> {
        let ws_url = self.url();
        let parsed = url::Url::parse(&ws_url)
            .map_err(|e| PlaybackError::Provider(format!("Invalid URL {ws_url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(PlaybackError::Provider(format!("URL has no host: {ws_url}"))),
        };

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(&ws_url)
            .header("Host", host)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("xi-api-key", &self.config.api_key)
            .body(())
            .map_err(|e| PlaybackError::Provider(format!("Failed to create WebSocket request: {e}")))?;

        let (socket, _response) = connect_async(request).await.map_err(|e| match e {
            tokio_tungstenite::tungstenite::Error::Http(response)
                if matches!(
                    response.status(),
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                ) =>
            {
                PlaybackError::Auth(format!("ElevenLabs rejected credentials: {}", response.status()))
            }
            other => PlaybackError::Transport(format!("Failed to connect to ElevenLabs: {other}")),
        })?;

        info!("Connected to ElevenLabs stream-input WebSocket");
        Ok(socket)
    }
}

async fn send_json<T: Serialize>(
    sink: &mut SplitSink<Socket, Message>,
    message: &T,
) -> Result<(), PlaybackError> {
    let json = serde_json::to_string(message)
        .map_err(|e| PlaybackError::Provider(format!("Failed to serialize message: {e}")))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| PlaybackError::Transport(format!("Failed to send to ElevenLabs: {e}")))
}

struct ReadState {
    stream: SplitStream<Socket>,
    sink: SplitSink<Socket, Message>,
    done: bool,
}

async fn next_audio(mut state: ReadState) -> Option<(Result<Bytes, PlaybackError>, ReadState)> {
    if state.done {
        return None;
    }

    loop {
        let message = match state.stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                state.done = true;
                return Some((Err(PlaybackError::Transport(format!("WebSocket error: {e}"))), state));
            }
            None => return None,
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(frame) => {
                debug!("ElevenLabs stream-input closed: {:?}", frame);
                return None;
            }
            _ => continue,
        };

        let response: StreamResponse = match serde_json::from_str(&text) {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to parse ElevenLabs TTS message: {}", e);
                continue;
            }
        };

        if let Some(error) = response.error {
            state.done = true;
            return Some((Err(PlaybackError::Provider(error)), state));
        }

        if let Some(audio) = response.audio.filter(|a| !a.is_empty()) {
            return match BASE64_STANDARD.decode(audio.as_bytes()) {
                Ok(decoded) => Some((Ok(Bytes::from(decoded)), state)),
                Err(e) => {
                    state.done = true;
                    Some((Err(PlaybackError::Provider(format!("Invalid audio payload: {e}"))), state))
                }
            };
        }

        if response.is_final == Some(true) {
            let _ = state.sink.send(Message::Close(None)).await;
            return None;
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsStreamInputSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, PlaybackError> {
        let socket = self.connect().await?;
        let (mut sink, stream) = socket.split();

        send_json(
            &mut sink,
            &BeginOfStream {
                text: " ",
                voice_settings: &self.config.voice_settings,
                generation_config: GenerationConfig {
                    chunk_length_schedule: CHUNK_LENGTH_SCHEDULE,
                },
            },
        )
        .await?;

        let chunks = split_into_chunks(text, self.config.max_chunk_chars);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.into_iter().enumerate() {
            send_json(
                &mut sink,
                &TextChunk {
                    text: format!("{chunk} "),
                    try_trigger_generation: i == last,
                },
            )
            .await?;
        }

        send_json(&mut sink, &EndOfStream { text: "" }).await?;

        let state = ReadState {
            stream,
            sink,
            done: false,
        };
        Ok(futures::stream::unfold(state, next_audio).boxed())
    }

    fn content_type(&self) -> &'static str {
        self.config.content_type()
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs-ws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_protocol_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut received: Vec<serde_json::Value> = Vec::new();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                let eos = value["text"] == "";
                received.push(value);
                if eos {
                    break;
                }
            }

            for payload in [&b"abc"[..], &b"def"[..]] {
                let msg = serde_json::json!({"audio": BASE64_STANDARD.encode(payload)});
                ws.send(Message::Text(msg.to_string().into())).await.unwrap();
            }
            ws.send(Message::Text(r#"{"audio":null,"isFinal":true}"#.into()))
                .await
                .unwrap();
            received
        });

        let mut config = ElevenLabsTtsConfig::new("xi-test");
        config.ws_base_url = format!("ws://{addr}");
        let synthesizer = ElevenLabsStreamInputSynthesizer::new(config).unwrap();

        let stream = synthesizer
            .synthesize("Hello there. How much do you need?")
            .await
            .unwrap();
        let audio: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(audio, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")]);

        let received = server.await.unwrap();
        assert_eq!(received.len(), 4);
        assert_eq!(received[0]["text"], " ");
        assert_eq!(
            received[0]["generation_config"]["chunk_length_schedule"],
            serde_json::json!([120, 160, 250, 290])
        );
        assert_eq!(received[1]["text"], "Hello there. ");
        assert_eq!(received[1]["try_trigger_generation"], false);
        assert_eq!(received[2]["text"], "How much do you need? ");
        assert_eq!(received[2]["try_trigger_generation"], true);
        assert_eq!(received[3]["text"], "");
    }

    #[tokio::test]
    async fn test_provider_error_message() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // BOS, one chunk, EOS
            for _ in 0..3 {
                let _ = ws.next().await;
            }
            ws.send(Message::Text(r#"{"error":"quota_exceeded"}"#.into()))
                .await
                .unwrap();
            let _ = ws.next().await;
        });

        let mut config = ElevenLabsTtsConfig::new("xi-test");
        config.ws_base_url = format!("ws://{addr}");
        let synthesizer = ElevenLabsStreamInputSynthesizer::new(config).unwrap();

        let stream = synthesizer.synthesize("Hi").await.unwrap();
        let result: Result<Vec<Bytes>, PlaybackError> = stream.try_collect().await;
        assert!(matches!(result, Err(PlaybackError::Provider(e)) if e == "quota_exceeded"));
    }
}
