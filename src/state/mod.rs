use std::sync::Arc;

use crate::config::{RecognitionMode, ServerConfig};
use crate::core::capture::AudioInput;
use crate::core::coordinator::{Collaborators, Recognition};
use crate::core::dialogue::{DialogueGateway, HttpDialogueClient};
use crate::core::plugins::{PluginRegistry, logging_plugin};
use crate::core::session::SessionRegistry;
use crate::core::stt::{
    RecognitionGateway, StreamingTransport, create_batch_recognizer, create_streaming_transport,
};
use crate::core::tts::{AudioSink, SpeechSynthesizer, create_synthesizer};
use crate::errors::{AppError, AppResult};

/// Provider clients shared by every connection. Optional ones are `None`
/// when their credentials are missing.
#[derive(Clone)]
pub struct Services {
    pub dialogue: Arc<dyn DialogueGateway>,
    pub batch_recognition: Option<Arc<RecognitionGateway>>,
    pub streaming_transport: Option<Arc<dyn StreamingTransport>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub services: Services,
    /// Live voice sessions, keyed by connection id
    pub sessions: Arc<SessionRegistry>,
    pub plugins: PluginRegistry,
}

impl AppState {
    /// Build every provider client from `config`.
    ///
    /// Only the dialogue client is mandatory. Recognition and synthesis
    /// providers without credentials are logged and left out; the routes that
    /// need them answer 503.
    pub fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let dialogue = HttpDialogueClient::new(config.dialogue_config()).map_err(|e| {
            AppError::InternalServerError(format!("Failed to build dialogue client: {e}"))
        })?;

        let credentials = config.recognition_credentials();

        let batch_recognition = match create_batch_recognizer(config.stt_provider, &credentials) {
            Ok(recognizer) => Some(Arc::new(RecognitionGateway::new(
                recognizer,
                config.gateway_config(),
            ))),
            Err(e) => {
                tracing::warn!(
                    "Batch recognition ({}) unavailable: {}",
                    config.stt_provider,
                    e
                );
                None
            }
        };

        let streaming_transport = if config.stt_mode == RecognitionMode::Streaming {
            match create_streaming_transport(&credentials) {
                Ok(transport) => Some(transport),
                Err(e) => {
                    tracing::warn!("Streaming recognition unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let synthesizer = match config.synthesis_config() {
            Some(tts_config) => match create_synthesizer(config.tts_transport, tts_config) {
                Ok(synthesizer) => Some(synthesizer),
                Err(e) => {
                    tracing::warn!("Speech synthesis unavailable: {}", e);
                    None
                }
            },
            None => {
                tracing::warn!("ELEVENLABS_API_KEY not set, speech synthesis disabled");
                None
            }
        };

        Ok(Self::with_services(
            config,
            Services {
                dialogue: Arc::new(dialogue),
                batch_recognition,
                streaming_transport,
                synthesizer,
            },
        ))
    }

    /// State over pre-built services. The logging plugin is registered.
    pub fn with_services(config: ServerConfig, services: Services) -> Arc<Self> {
        let plugins = PluginRegistry::new();
        if let Err(e) = plugins.register(logging_plugin()) {
            tracing::warn!("Failed to register logging plugin: {}", e);
        }

        Arc::new(Self {
            config,
            services,
            sessions: Arc::new(SessionRegistry::new()),
            plugins,
        })
    }

    /// Recognition path for new voice sessions, following `STT_MODE`.
    pub fn recognition(&self) -> Option<Recognition> {
        match self.config.stt_mode {
            RecognitionMode::Batch => self
                .services
                .batch_recognition
                .clone()
                .map(Recognition::Batch),
            RecognitionMode::Streaming => {
                self.services
                    .streaming_transport
                    .clone()
                    .map(|transport| Recognition::Streaming {
                        transport,
                        config: self.config.streaming_config(),
                    })
            }
        }
    }

    /// Wire a coordinator's collaborators around a connection's audio
    /// endpoints.
    pub fn collaborators(
        &self,
        microphone: Arc<dyn AudioInput>,
        sink: Arc<dyn AudioSink>,
    ) -> AppResult<Collaborators> {
        let recognition = self.recognition().ok_or_else(|| {
            AppError::ServiceUnavailable(format!(
                "Speech recognition ({}, {}) is not configured",
                self.config.stt_provider, self.config.stt_mode
            ))
        })?;
        let synthesizer = self.services.synthesizer.clone().ok_or_else(|| {
            AppError::ServiceUnavailable("Speech synthesis is not configured".to_string())
        })?;

        Ok(Collaborators {
            microphone,
            recognition,
            dialogue: self.services.dialogue.clone(),
            synthesizer,
            sink,
        })
    }
}
