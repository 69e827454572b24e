use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use super::ElevenLabsSttConfig;
use super::messages::{ElevenLabsMessage, InputAudioChunk};
use crate::core::stt::base::{
    RecognitionError, StreamingTransport, TranscriptEvent, TranscriptStream,
};

type EventSender = mpsc::Sender<Result<TranscriptEvent, RecognitionError>>;

/// Opens ElevenLabs realtime STT connections.
pub struct ElevenLabsRealtimeTransport {
    config: ElevenLabsSttConfig,
}

impl ElevenLabsRealtimeTransport {
    pub fn new(config: ElevenLabsSttConfig) -> Result<Self, RecognitionError> {
        if config.api_key.is_empty() {
            return Err(RecognitionError::Configuration(
                "ElevenLabs API key is required".to_string(),
            ));
        }
        Ok(Self { config })
    }
}

/// Map one server message to an event, an error, or nothing.
fn handle_message(message: ElevenLabsMessage) -> Option<Result<TranscriptEvent, RecognitionError>> {
    match message {
        ElevenLabsMessage::SessionStarted(session) => {
            info!("ElevenLabs STT session started: {}", session.session_id);
            None
        }
        ElevenLabsMessage::PartialTranscript(partial) => {
            (!partial.text.is_empty()).then(|| Ok(TranscriptEvent::partial(partial.text)))
        }
        ElevenLabsMessage::CommittedTranscript(committed) => {
            Some(Ok(TranscriptEvent::final_result(committed.text)))
        }
        ElevenLabsMessage::Error(err) => {
            error!("ElevenLabs STT error ({}): {}", err.message_type, err.error);
            Some(Err(match err.message_type.as_str() {
                "auth_error" => RecognitionError::Auth(err.error),
                "quota_exceeded_error" => {
                    RecognitionError::Transport(format!("Quota exceeded: {}", err.error))
                }
                _ => RecognitionError::Transport(err.error),
            }))
        }
        ElevenLabsMessage::Unknown(raw) => {
            debug!("Received unknown ElevenLabs message type: {}", raw);
            None
        }
    }
}

#[async_trait]
impl StreamingTransport for ElevenLabsRealtimeTransport {
    async fn open(&self) -> Result<TranscriptStream, RecognitionError> {
        let ws_url = self.config.realtime_url();
        let parsed = url::Url::parse(&ws_url)
            .map_err(|e| RecognitionError::Configuration(format!("Invalid URL {ws_url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(RecognitionError::Configuration(format!(
                    "URL has no host: {ws_url}"
                )));
            }
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
            .map_err(|e| {
                RecognitionError::Configuration(format!("Failed to create WebSocket request: {e}"))
            })?;

        let (ws_stream, _response) = connect_async(request).await.map_err(|e| match e {
            tokio_tungstenite::tungstenite::Error::Http(response)
                if matches!(
                    response.status(),
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                ) =>
            {
                RecognitionError::Auth(format!("ElevenLabs rejected credentials: {}", response.status()))
            }
            other => RecognitionError::Transport(format!("Failed to connect to ElevenLabs: {other}")),
        })?;

        info!("Connected to ElevenLabs STT WebSocket");

        let (audio_tx, audio_rx) = mpsc::channel::<Bytes>(32);
        let (events_tx, events_rx) = mpsc::channel(64);
        let sample_rate = self.config.sample_rate;

        tokio::spawn(run_connection(ws_stream, audio_rx, events_tx, sample_rate));

        Ok(TranscriptStream {
            audio: audio_tx,
            events: events_rx,
        })
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}

async fn run_connection<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    mut audio_rx: mpsc::Receiver<Bytes>,
    events_tx: EventSender,
    sample_rate: u32,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            chunk = audio_rx.recv() => {
                let Some(audio_data) = chunk else {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                };

                let input = InputAudioChunk::new(BASE64_STANDARD.encode(&audio_data))
                    .with_sample_rate(sample_rate);
                let json = match serde_json::to_string(&input) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize audio chunk: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    let _ = events_tx
                        .send(Err(RecognitionError::Transport(format!(
                            "Failed to send audio to ElevenLabs: {e}"
                        ))))
                        .await;
                    break;
                }
            }

            message = ws_stream.next() => match message {
                Some(Ok(Message::Text(text))) => match ElevenLabsMessage::parse(&text) {
                    Ok(parsed) => match handle_message(parsed) {
                        Some(Ok(event)) => {
                            if events_tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = events_tx.send(Err(e)).await;
                            break;
                        }
                        None => {}
                    },
                    Err(e) => warn!("Failed to parse ElevenLabs message: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("ElevenLabs WebSocket closed: {:?}", frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events_tx
                        .send(Err(RecognitionError::Transport(format!("WebSocket error: {e}"))))
                        .await;
                    break;
                }
                None => break,
            },
        }
    }

    debug!("ElevenLabs STT connection task exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn mock_server() -> (String, tokio::task::JoinHandle<Vec<serde_json::Value>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"message_type":"session_started","session_id":"s"}"#.into(),
            ))
            .await
            .unwrap();

            let mut received = Vec::new();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                received.push(serde_json::from_str(&text).unwrap());
            }

            ws.send(Message::Text(
                r#"{"message_type":"partial_transcript","text":"dzień"}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"message_type":"committed_transcript","text":"dzień dobry"}"#.into(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text(
                r#"{"message_type":"auth_error","error":"expired"}"#.into(),
            ))
            .await
            .unwrap();
            received
        });

        (format!("ws://{addr}"), server)
    }

    #[tokio::test]
    async fn test_stream_round_trip_against_local_server() {
        let (url, server) = mock_server().await;
        let transport = ElevenLabsRealtimeTransport::new(ElevenLabsSttConfig {
            ws_base_url: url,
            ..ElevenLabsSttConfig::new("xi-test", "pl-PL")
        })
        .unwrap();

        let mut stream = transport.open().await.unwrap();
        stream.audio.send(Bytes::from_static(&[1, 2])).await.unwrap();

        let partial = stream.events.recv().await.unwrap().unwrap();
        assert_eq!(partial.text, "dzień");
        assert!(!partial.is_final);

        let committed = stream.events.recv().await.unwrap().unwrap();
        assert_eq!(committed.text, "dzień dobry");
        assert!(committed.is_final);

        let err = stream.events.recv().await.unwrap().unwrap_err();
        assert!(matches!(err, RecognitionError::Auth(_)));
        assert!(stream.events.recv().await.is_none());

        let received = server.await.unwrap();
        assert_eq!(received[0]["message_type"], "input_audio_chunk");
        assert_eq!(received[0]["audio_base_64"], "AQI=");
        assert_eq!(received[0]["sample_rate"], 16000);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ElevenLabsRealtimeTransport::new(ElevenLabsSttConfig {
            ws_base_url: format!("ws://{addr}"),
            ..ElevenLabsSttConfig::new("xi-test", "pl-PL")
        })
        .unwrap();

        let err = transport.open().await.err().unwrap();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_empty_partial_is_skipped() {
        let msg =
            ElevenLabsMessage::parse(r#"{"message_type":"partial_transcript","text":""}"#).unwrap();
        assert!(handle_message(msg).is_none());
    }
}
