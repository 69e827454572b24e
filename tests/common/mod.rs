#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

use parley::core::capture::AudioUnit;
use parley::core::dialogue::{DialogueGateway, HttpDialogueClient};
use parley::core::stt::{BatchRecognizer, GatewayConfig, RecognitionError, RecognitionGateway};
use parley::core::tts::{AudioStream, PlaybackError, SpeechSynthesizer};
use parley::state::Services;
use parley::{AppState, ServerConfig, create_app};

/// Returns a fixed transcript and counts calls.
pub struct FixedRecognizer {
    pub transcript: String,
    pub calls: AtomicUsize,
    pub last_len: AtomicUsize,
}

impl FixedRecognizer {
    pub fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            calls: AtomicUsize::new(0),
            last_len: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BatchRecognizer for FixedRecognizer {
    async fn transcribe(&self, audio: &AudioUnit) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_len.store(audio.len(), Ordering::SeqCst);
        Ok(self.transcript.clone())
    }

    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

/// Synthesizes `text` as two chunks: the UTF-8 bytes of the text, then a
/// terminator byte.
pub struct TextSynthesizer;

#[async_trait]
impl SpeechSynthesizer for TextSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioStream, PlaybackError> {
        let chunks = vec![Ok(Bytes::from(text.to_string())), Ok(Bytes::from_static(&[0]))];
        Ok(futures::stream::iter(chunks).boxed())
    }

    fn provider_name(&self) -> &'static str {
        "text"
    }
}

pub fn test_config(dialogue_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        dialogue_url: dialogue_url.to_string(),
        activity_silence_delay_ms: 200,
        google_api_key: None,
        openai_api_key: None,
        elevenlabs_api_key: None,
        ..Default::default()
    }
}

/// State with the real HTTP dialogue client and in-process speech stubs.
pub fn stub_state(config: ServerConfig, recognizer: Option<Arc<FixedRecognizer>>) -> Arc<AppState> {
    let dialogue: Arc<dyn DialogueGateway> =
        Arc::new(HttpDialogueClient::new(config.dialogue_config()).expect("dialogue client"));
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(TextSynthesizer);

    let services = Services {
        dialogue,
        batch_recognition: recognizer.map(|r| {
            Arc::new(RecognitionGateway::new(
                r,
                GatewayConfig {
                    min_audio_bytes: 100,
                    ..Default::default()
                },
            ))
        }),
        streaming_transport: None,
        synthesizer: Some(synthesizer),
    };
    AppState::with_services(config, services)
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// `samples` PCM16LE samples of constant amplitude.
pub fn pcm16(amplitude: i16, samples: usize) -> Vec<u8> {
    (0..samples).flat_map(|_| amplitude.to_le_bytes()).collect()
}
