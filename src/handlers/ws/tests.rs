use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

use super::messages::{AudioPayload, IncomingMessage, OutgoingMessage};
use super::processor::handle_incoming_message;
use super::relay::WebSocketSink;
use super::session_handler::ensure_coordinator;
use super::state::ConnectionState;
use crate::config::ServerConfig;
use crate::core::coordinator::test_support::{EchoDialogue, EchoSynthesizer, SilentRecognizer};
use crate::core::coordinator::{ErrorKind, SessionEvent, TurnState};
use crate::core::dialogue::{DialogueResult, NextAction};
use crate::core::stt::{GatewayConfig, RecognitionGateway};
use crate::core::tts::{AudioSink, SpeechSynthesizer};
use crate::state::{AppState, Services};

fn envelope(message: &OutgoingMessage) -> Value {
    serde_json::from_str(&message.to_envelope(1_700_000_000_000).unwrap()).unwrap()
}

fn stub_app_state(with_voice: bool) -> Arc<AppState> {
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(EchoSynthesizer);
    let services = Services {
        dialogue: Arc::new(EchoDialogue),
        batch_recognition: with_voice.then(|| {
            Arc::new(RecognitionGateway::new(
                Arc::new(SilentRecognizer),
                GatewayConfig::default(),
            ))
        }),
        streaming_transport: None,
        synthesizer: with_voice.then_some(synthesizer),
    };
    AppState::with_services(ServerConfig::default(), services)
}

struct Connection {
    state: Arc<RwLock<ConnectionState>>,
    tx: mpsc::Sender<OutgoingMessage>,
    rx: mpsc::Receiver<OutgoingMessage>,
    app: Arc<AppState>,
}

impl Connection {
    fn new(with_voice: bool) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::new())),
            tx,
            rx,
            app: stub_app_state(with_voice),
        }
    }

    async fn send(&self, json: &str) {
        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        assert!(handle_incoming_message(msg, &self.state, &self.tx, &self.app).await);
    }

    async fn recv(&mut self) -> OutgoingMessage {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for outgoing message")
            .expect("channel closed")
    }

    async fn recv_until<F>(&mut self, mut predicate: F) -> OutgoingMessage
    where
        F: FnMut(&OutgoingMessage) -> bool,
    {
        loop {
            let message = self.recv().await;
            if predicate(&message) {
                return message;
            }
        }
    }
}

#[test]
fn test_incoming_message_parsing() {
    let msg: IncomingMessage = serde_json::from_str(r#"{"type":"start-session"}"#).unwrap();
    assert_eq!(msg, IncomingMessage::StartSession { session_id: None });

    let msg: IncomingMessage =
        serde_json::from_str(r#"{"type":"start-session","sessionId":"abc"}"#).unwrap();
    assert_eq!(
        msg,
        IncomingMessage::StartSession {
            session_id: Some("abc".to_string())
        }
    );

    let msg: IncomingMessage =
        serde_json::from_str(r#"{"type":"audio-data","audio":"AAA=","timestamp":1}"#).unwrap();
    assert_eq!(
        msg,
        IncomingMessage::AudioData {
            audio: "AAA=".to_string()
        }
    );

    let msg: IncomingMessage =
        serde_json::from_str(r#"{"type":"user-started-speaking"}"#).unwrap();
    assert_eq!(msg, IncomingMessage::UserStartedSpeaking);

    let msg: IncomingMessage =
        serde_json::from_str(r#"{"type":"send-offers-email","email":"a@b.pl"}"#).unwrap();
    assert_eq!(
        msg,
        IncomingMessage::SendOffersEmail {
            email: "a@b.pl".to_string(),
            message: None
        }
    );
}

#[test]
fn test_unknown_and_malformed_messages_rejected() {
    assert!(serde_json::from_str::<IncomingMessage>(r#"{"type":"config"}"#).is_err());
    assert!(serde_json::from_str::<IncomingMessage>(r#"{"type":"tts-request"}"#).is_err());
    assert!(serde_json::from_str::<IncomingMessage>("not json").is_err());
}

#[test]
fn test_outgoing_envelopes() {
    let json = envelope(&OutgoingMessage::SessionStarted {
        session_id: "s1".to_string(),
    });
    assert_eq!(json["type"], "session-started");
    assert_eq!(json["sessionId"], "s1");
    assert_eq!(json["timestamp"], 1_700_000_000_000u64);

    let json = envelope(&OutgoingMessage::StateChanged {
        state: TurnState::Listening,
    });
    assert_eq!(json["type"], "state-changed");
    assert_eq!(json["state"], "listening");

    let json = envelope(&OutgoingMessage::TtsChunk {
        handle_id: 4,
        audio: AudioPayload {
            data: "AQI=".to_string(),
        },
    });
    assert_eq!(json["type"], "tts-chunk");
    assert_eq!(json["handleId"], 4);
    assert_eq!(json["audio"]["data"], "AQI=");

    let json = envelope(&OutgoingMessage::error(ErrorKind::WebSocket, "bad"));
    assert_eq!(json["type"], "error");
    assert_eq!(json["errorType"], "websocket");
    assert_eq!(json["message"], "bad");

    let json = envelope(&OutgoingMessage::ActionRequired {
        action: NextAction::DisplayOffers,
    });
    assert_eq!(json["action"], "display-offers");
}

#[test]
fn test_event_mapping() {
    let message = OutgoingMessage::from_event(SessionEvent::TtsStart { handle_id: 2 }, "audio/mpeg");
    assert_eq!(
        message,
        OutgoingMessage::TtsStart {
            handle_id: 2,
            content_type: "audio/mpeg".to_string()
        }
    );

    let mut result = DialogueResult::reply("s1", "Ile zarabiasz?");
    result.question_number = Some(2);
    result.total_questions = Some(9);
    result.category = Some("income".to_string());
    let json = envelope(&OutgoingMessage::from_event(
        SessionEvent::AssistantMessage {
            text: "Ile zarabiasz?".to_string(),
            details: Some(Box::new(result)),
        },
        "audio/mpeg",
    ));
    assert_eq!(json["type"], "assistant-message");
    assert_eq!(json["text"], "Ile zarabiasz?");
    assert_eq!(json["isCompleted"], false);
    assert_eq!(json["questionNumber"], 2);
    assert_eq!(json["totalQuestions"], 9);
    assert_eq!(json["category"], "income");

    let json = envelope(&OutgoingMessage::from_event(
        SessionEvent::AssistantMessage {
            text: "Dzień dobry".to_string(),
            details: None,
        },
        "audio/mpeg",
    ));
    assert!(json.get("isCompleted").is_none());

    let message = OutgoingMessage::from_event(
        SessionEvent::error(ErrorKind::Dialogue, "chat down"),
        "audio/mpeg",
    );
    assert_eq!(message, OutgoingMessage::error(ErrorKind::Dialogue, "chat down"));
}

#[tokio::test]
async fn test_sink_drops_cleared_handles() {
    let (tx, mut rx) = mpsc::channel(8);
    let sink = WebSocketSink::new(tx);

    sink.write(1, Bytes::from_static(&[1, 2])).await.unwrap();
    sink.clear(1);
    sink.write(1, Bytes::from_static(&[3])).await.unwrap();
    sink.write(2, Bytes::from_static(&[4])).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(
        first,
        OutgoingMessage::TtsChunk {
            handle_id: 1,
            audio: AudioPayload {
                data: general_purpose::STANDARD.encode([1, 2])
            }
        }
    );
    let second = rx.recv().await.unwrap();
    assert!(matches!(second, OutgoingMessage::TtsChunk { handle_id: 2, .. }));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_sink_write_fails_after_close() {
    let (tx, rx) = mpsc::channel(1);
    let sink = WebSocketSink::new(tx);
    drop(rx);
    assert!(sink.write(1, Bytes::from_static(&[0])).await.is_err());
}

#[tokio::test]
async fn test_start_session_without_providers_reports_error() {
    let mut conn = Connection::new(false);
    conn.send(r#"{"type":"start-session"}"#).await;

    match conn.recv().await {
        OutgoingMessage::Error { error_type, message } => {
            assert_eq!(error_type, ErrorKind::Auth);
            assert!(message.contains("not configured"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert!(conn.state.read().await.coordinator.is_none());
    assert!(conn.app.sessions.is_empty());
}

#[tokio::test]
async fn test_stop_and_speaking_without_session() {
    let mut conn = Connection::new(false);

    conn.send(r#"{"type":"stop-session"}"#).await;
    assert_eq!(conn.recv().await, OutgoingMessage::SessionStopped);

    conn.send(r#"{"type":"user-started-speaking"}"#).await;
    assert_eq!(
        conn.recv().await,
        OutgoingMessage::UserSpeaking { speaking: true }
    );
}

#[tokio::test]
async fn test_invalid_audio_payload() {
    let mut conn = Connection::new(false);
    conn.send(r#"{"type":"audio-data","audio":"%%%"}"#).await;

    assert!(matches!(
        conn.recv().await,
        OutgoingMessage::Error {
            error_type: ErrorKind::WebSocket,
            ..
        }
    ));
}

#[tokio::test]
async fn test_send_offers_email_requires_session() {
    let mut conn = Connection::new(true);
    conn.send(r#"{"type":"send-offers-email","email":"jan@example.com"}"#)
        .await;

    assert!(matches!(
        conn.recv().await,
        OutgoingMessage::Error {
            error_type: ErrorKind::Session,
            ..
        }
    ));
}

#[tokio::test]
async fn test_start_session_speaks_greeting() {
    let mut conn = Connection::new(true);
    conn.send(r#"{"type":"start-session"}"#).await;

    let started = conn
        .recv_until(|m| matches!(m, OutgoingMessage::SessionStarted { .. }))
        .await;
    assert_eq!(
        started,
        OutgoingMessage::SessionStarted {
            session_id: "stub-session".to_string()
        }
    );

    let chunk = conn
        .recv_until(|m| matches!(m, OutgoingMessage::TtsChunk { .. }))
        .await;
    let OutgoingMessage::TtsChunk { audio, .. } = chunk else {
        unreachable!()
    };
    let decoded = general_purpose::STANDARD.decode(audio.data).unwrap();
    assert_eq!(decoded, "Dzień dobry".as_bytes());

    conn.recv_until(|m| {
        matches!(
            m,
            OutgoingMessage::StateChanged {
                state: TurnState::Listening
            }
        )
    })
    .await;

    assert_eq!(conn.app.sessions.len(), 1);
    let summary = &conn.app.sessions.list()[0];
    assert_eq!(summary.session_id.as_deref(), Some("stub-session"));

    conn.send(r#"{"type":"send-offers-email","email":"jan@example.com"}"#)
        .await;
    let sent = conn
        .recv_until(|m| matches!(m, OutgoingMessage::EmailSent { .. }))
        .await;
    assert!(matches!(sent, OutgoingMessage::EmailSent { email, .. } if email == "jan@example.com"));
}

#[tokio::test]
async fn test_coordinator_created_once() {
    let conn = Connection::new(true);
    let first = ensure_coordinator(&conn.state, &conn.tx, &conn.app)
        .await
        .unwrap();
    let second = ensure_coordinator(&conn.state, &conn.tx, &conn.app)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(conn.app.sessions.len(), 1);
}

#[tokio::test]
async fn test_tts_request_speaks_without_session() {
    let mut conn = Connection::new(true);
    conn.send(r#"{"type":"tts-request","text":"Test"}"#).await;

    let start = conn
        .recv_until(|m| matches!(m, OutgoingMessage::TtsStart { .. }))
        .await;
    assert!(matches!(start, OutgoingMessage::TtsStart { content_type, .. } if content_type == "audio/mpeg"));
    conn.recv_until(|m| {
        matches!(
            m,
            OutgoingMessage::TtsEnd {
                interrupted: false,
                ..
            }
        )
    })
    .await;
}

#[tokio::test]
async fn test_empty_tts_request_rejected() {
    let mut conn = Connection::new(true);
    conn.send(r#"{"type":"tts-request","text":"  "}"#).await;
    assert!(matches!(
        conn.recv().await,
        OutgoingMessage::Error {
            error_type: ErrorKind::WebSocket,
            ..
        }
    ));
}
