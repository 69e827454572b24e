//! The per-session turn loop.
//!
//! All state lives in one task. Collaborator callbacks and spawned gateway
//! calls report back through channels, tagged with the phase they were
//! started in; anything tagged with an older phase is discarded. The phase
//! advances on every state change, so a response that arrives after
//! `stop()` (or after a barge-in) can never drive the loop.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::{Collaborators, CoordinatorConfig, Recognition};
use super::errors::TurnError;
use super::events::{SessionEvent, TurnState};
use super::pump::AudioPump;
use crate::core::capture::{AudioUnit, CaptureController, InterruptMonitor};
use crate::core::dialogue::{
    DialogueError, DialogueResult, DialogueStart, NextAction, Offer,
};
use crate::core::plugins::{PluginDispatcher, PluginEvent};
use crate::core::stt::{RecognitionError, StreamUpdate, StreamingRecognizer};
use crate::core::tts::{PlaybackController, PlaybackEvent, PlaybackHandle};

#[derive(Debug)]
pub(super) enum Command {
    Start { session_id: Option<String> },
    Stop,
    UserSpeaking(bool),
    Say(String),
    Shutdown,
}

enum Input {
    Started(Result<DialogueStart, DialogueError>),
    Captured(AudioUnit),
    Recognized(Result<String, RecognitionError>),
    Answered(Result<DialogueResult, DialogueError>),
    Offers(Result<Vec<Offer>, DialogueError>),
    BargeIn,
    Recover,
}

struct Tagged {
    phase: u64,
    input: Input,
}

/// What happens once the current utterance has been played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterSpeech {
    Listen,
    Complete(NextAction),
    Rest(TurnState),
}

struct Speech {
    handle: PlaybackHandle,
    text: String,
    after: AfterSpeech,
}

pub(super) struct Channels {
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub state: watch::Sender<TurnState>,
    pub session_id: Arc<RwLock<Option<String>>>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub plugins: Option<PluginDispatcher>,
}

pub(super) struct TurnActor {
    collab: Collaborators,
    config: CoordinatorConfig,
    capture: CaptureController,
    interrupt: InterruptMonitor,
    playback: PlaybackController,
    recognizer: Option<Arc<StreamingRecognizer>>,
    pump: Option<AudioPump>,

    state_tx: watch::Sender<TurnState>,
    shared_session_id: Arc<RwLock<Option<String>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    plugins: Option<PluginDispatcher>,

    inputs_tx: mpsc::UnboundedSender<Tagged>,
    stream_tx: mpsc::UnboundedSender<StreamUpdate>,

    phase: u64,
    state: TurnState,
    active: bool,
    session_id: Option<String>,
    last_prompt: Option<String>,
    speaking: Option<Speech>,
}

impl TurnActor {
    pub(super) async fn run(collab: Collaborators, config: CoordinatorConfig, channels: Channels) {
        let Channels {
            mut commands,
            state,
            session_id,
            events,
            plugins,
        } = channels;

        let (inputs_tx, mut inputs) = mpsc::unbounded_channel();
        let (stream_tx, mut stream) = mpsc::unbounded_channel();
        let (playback_tx, mut playback_events) = mpsc::unbounded_channel();

        let playback = PlaybackController::new(
            collab.synthesizer.clone(),
            collab.sink.clone(),
            config.playback.clone(),
        );
        playback.set_event_callback(Arc::new(move |event| {
            let _ = playback_tx.send(event);
        }));

        let mut actor = TurnActor {
            capture: CaptureController::new(collab.microphone.clone(), config.capture.clone()),
            interrupt: InterruptMonitor::new(collab.microphone.clone(), config.interrupt),
            playback,
            recognizer: None,
            pump: None,
            collab,
            config,
            state_tx: state,
            shared_session_id: session_id,
            events,
            plugins,
            inputs_tx,
            stream_tx,
            phase: 0,
            state: TurnState::Idle,
            active: false,
            session_id: None,
            last_prompt: None,
            speaking: None,
        };

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => actor.on_command(command).await,
                },
                Some(tagged) = inputs.recv() => {
                    if tagged.phase == actor.phase {
                        actor.on_input(tagged.input).await;
                    } else {
                        debug!("Discarding stale result from phase {}", tagged.phase);
                    }
                }
                Some(event) = playback_events.recv() => actor.on_playback(event).await,
                Some(update) = stream.recv() => actor.on_stream(update).await,
            }
        }

        actor.halt_activity().await;
        actor.stop_recognizer().await;
        debug!("Turn coordinator stopped");
    }

    fn emit(&self, event: SessionEvent) {
        if let (Some(plugins), Some(plugin_event)) =
            (&self.plugins, PluginEvent::from_session_event(&event))
        {
            plugins.emit(plugin_event);
        }
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state == state {
            return;
        }
        debug!("Turn state {} -> {}", self.state, state);
        self.state = state;
        self.phase += 1;
        self.state_tx.send_replace(state);
        self.emit(SessionEvent::StateChanged { state });
    }

    fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id = session_id.clone();
        *self.shared_session_id.write() = session_id.clone();
        if let Some(plugins) = &self.plugins {
            plugins.set_session_id(session_id);
        }
    }

    /// Spawn `work` and feed its result back tagged with the current phase.
    fn spawn_tagged<F>(&self, work: F)
    where
        F: std::future::Future<Output = Input> + Send + 'static,
    {
        let tx = self.inputs_tx.clone();
        let phase = self.phase;
        tokio::spawn(async move {
            let input = work.await;
            let _ = tx.send(Tagged { phase, input });
        });
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Start { session_id } => self.start(session_id).await,
            Command::Stop => self.stop().await,
            Command::UserSpeaking(true) => {
                self.emit(SessionEvent::UserSpeaking { speaking: true });
                if self.state == TurnState::Speaking {
                    self.barge_in().await;
                }
            }
            Command::UserSpeaking(false) => {
                self.emit(SessionEvent::UserSpeaking { speaking: false });
            }
            Command::Say(text) => self.say(text).await,
            Command::Shutdown => {}
        }
    }

    async fn start(&mut self, session_id: Option<String>) {
        if self.active && !self.state.is_idle() && self.state != TurnState::Error {
            debug!("Start ignored, session already {}", self.state);
            return;
        }

        let requested = session_id.filter(|id| !id.is_empty());
        self.active = true;
        self.halt_activity().await;

        if self.state == TurnState::Completed && requested.is_none() {
            // Finished conversations start over with a new dialogue session
            self.set_session_id(None);
            self.last_prompt = None;
        }

        if let Some(id) = requested.or_else(|| self.session_id.clone()) {
            info!("Resuming dialogue session {}", id);
            self.set_session_id(Some(id.clone()));
            self.emit(SessionEvent::SessionStarted { session_id: id });
            self.begin_listening().await;
            return;
        }

        info!("Starting new dialogue session");
        self.set_state(TurnState::Processing);
        let dialogue = self.collab.dialogue.clone();
        self.spawn_tagged(async move { Input::Started(dialogue.start().await) });
    }

    async fn stop(&mut self) {
        info!("Stopping session {:?}", self.session_id);
        self.active = false;
        self.halt_activity().await;
        self.stop_recognizer().await;
        self.set_state(TurnState::Idle);
        // Phase must move even when already idle
        self.phase += 1;
        self.emit(SessionEvent::SessionStopped);
    }

    async fn say(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        let after = match self.state {
            TurnState::Processing => {
                warn!("Ignoring speech request while waiting for the dialogue");
                return;
            }
            TurnState::Speaking => self
                .speaking
                .as_ref()
                .map(|s| s.after)
                .unwrap_or(AfterSpeech::Listen),
            TurnState::Listening => AfterSpeech::Listen,
            TurnState::Completed => AfterSpeech::Rest(TurnState::Completed),
            TurnState::Idle | TurnState::Error => AfterSpeech::Rest(TurnState::Idle),
        };

        self.stop_listening().await;
        self.speak(text, after).await;
    }

    async fn on_input(&mut self, input: Input) {
        match input {
            Input::Started(Ok(start)) => self.on_dialogue_started(start).await,
            Input::Started(Err(e)) => self.fail(e.into()).await,
            Input::Captured(unit) => self.on_captured(unit),
            Input::Recognized(Ok(text)) => {
                if text.trim().is_empty() {
                    debug!("Empty transcript, listening again");
                    self.begin_listening().await;
                } else {
                    self.on_final_transcript(text);
                }
            }
            Input::Recognized(Err(e)) => self.fail(e.into()).await,
            Input::Answered(Ok(result)) => self.on_answer(result).await,
            Input::Answered(Err(e)) => self.fail(e.into()).await,
            Input::Offers(Ok(offers)) => {
                info!("Fetched {} offers", offers.len());
                self.emit(SessionEvent::ResultsReady { offers });
            }
            Input::Offers(Err(e)) => {
                warn!("Failed to fetch offers: {}", e);
                let err = TurnError::from(e);
                self.emit(SessionEvent::error(err.kind(), err.user_message()));
            }
            Input::BargeIn => {
                if self.state == TurnState::Speaking {
                    self.emit(SessionEvent::UserSpeaking { speaking: true });
                    self.barge_in().await;
                }
            }
            Input::Recover => {
                if self.state == TurnState::Error {
                    info!("Recovered from error");
                    self.set_state(TurnState::Idle);
                }
            }
        }
    }

    async fn on_dialogue_started(&mut self, start: DialogueStart) {
        info!("Dialogue session {} started", start.session_id);
        self.set_session_id(Some(start.session_id.clone()));
        self.emit(SessionEvent::SessionStarted {
            session_id: start.session_id,
        });

        if start.greeting.trim().is_empty() {
            self.begin_listening().await;
            return;
        }

        self.last_prompt = Some(start.greeting.clone());
        self.emit(SessionEvent::AssistantMessage {
            text: start.greeting.clone(),
            details: None,
        });
        self.speak(start.greeting, AfterSpeech::Listen).await;
    }

    fn on_captured(&mut self, unit: AudioUnit) {
        if self.state != TurnState::Listening {
            return;
        }
        let Recognition::Batch(gateway) = &self.collab.recognition else {
            return;
        };
        debug!(
            "Captured {} bytes in {:?} ({:?})",
            unit.len(),
            unit.duration,
            unit.stop_reason
        );

        let gateway = gateway.clone();
        self.spawn_tagged(async move { Input::Recognized(gateway.transcribe(&unit).await) });
    }

    fn on_final_transcript(&mut self, text: String) {
        let text = text.trim().to_string();
        info!("Final transcript: {}", text);
        self.emit(SessionEvent::FinalTranscript { text: text.clone() });
        self.set_state(TurnState::Processing);

        let dialogue = self.collab.dialogue.clone();
        let session_id = self.session_id.clone().unwrap_or_default();
        let prompt = self.last_prompt.clone();
        self.spawn_tagged(async move {
            Input::Answered(dialogue.answer(&session_id, &text, prompt.as_deref()).await)
        });
    }

    async fn on_answer(&mut self, result: DialogueResult) {
        if !result.session_id.is_empty()
            && self.session_id.as_deref() != Some(result.session_id.as_str())
        {
            self.set_session_id(Some(result.session_id.clone()));
        }

        let after = if result.is_completed {
            info!("Dialogue completed, next action {}", result.next_action.as_str());
            AfterSpeech::Complete(result.next_action)
        } else {
            AfterSpeech::Listen
        };

        let prompt = result.prompt_text.clone();
        self.last_prompt = Some(prompt.clone());
        self.emit(SessionEvent::AssistantMessage {
            text: prompt.clone(),
            details: Some(Box::new(result)),
        });

        if prompt.trim().is_empty() {
            self.after_speech(after).await;
        } else {
            self.speak(prompt, after).await;
        }
    }

    async fn on_playback(&mut self, event: PlaybackEvent) {
        let PlaybackEvent::Ended { id, error } = event else {
            return;
        };
        if self.speaking.as_ref().map(|s| s.handle.id()) != Some(id) {
            return;
        }
        let Some(speech) = self.speaking.take() else {
            return;
        };

        self.interrupt.disarm().await;
        self.emit(SessionEvent::TtsEnd {
            handle_id: id,
            interrupted: false,
        });
        if let Some(e) = error {
            warn!("Speech synthesis failed, falling back to text: {}", e);
            self.emit(SessionEvent::TextFallback { text: speech.text });
        }
        self.after_speech(speech.after).await;
    }

    async fn on_stream(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Transcript(event) => {
                if self.state != TurnState::Listening || event.text.trim().is_empty() {
                    return;
                }
                if !event.is_final {
                    self.emit(SessionEvent::PartialTranscript { text: event.text });
                    return;
                }
                if let Some(pump) = self.pump.take() {
                    pump.stop().await;
                }
                self.on_final_transcript(event.text);
            }
            StreamUpdate::Reconnecting { attempt } => {
                info!("Streaming recognition reconnecting (attempt {})", attempt);
            }
            StreamUpdate::Failed(e) => {
                self.stop_recognizer().await;
                if self.active {
                    self.fail(e.into()).await;
                }
            }
        }
    }

    async fn speak(&mut self, text: String, after: AfterSpeech) {
        self.cancel_speech();

        self.set_state(TurnState::Speaking);
        let handle = self.playback.speak(text.clone());
        self.emit(SessionEvent::TtsStart {
            handle_id: handle.id(),
        });
        self.speaking = Some(Speech {
            handle,
            text,
            after,
        });

        if self.config.barge_in {
            let tx = self.inputs_tx.clone();
            let phase = self.phase;
            let armed = self
                .interrupt
                .arm(move || {
                    let _ = tx.send(Tagged {
                        phase,
                        input: Input::BargeIn,
                    });
                })
                .await;
            if let Err(e) = armed {
                warn!("Barge-in unavailable for this utterance: {}", e);
            }
        }
    }

    /// Cancel the active utterance, reporting it as interrupted.
    ///
    /// A handle that already finished but whose `Ended` is still queued gets
    /// its `TtsEnd` here; the queued event no longer matches and is ignored.
    fn cancel_speech(&mut self) {
        let Some(speech) = self.speaking.take() else {
            return;
        };
        let interrupted = self.playback.cancel(&speech.handle);
        self.emit(SessionEvent::TtsEnd {
            handle_id: speech.handle.id(),
            interrupted,
        });
    }

    async fn barge_in(&mut self) {
        let Some(after) = self.speaking.as_ref().map(|s| s.after) else {
            return;
        };
        info!("Barge-in: cancelling playback");
        self.cancel_speech();
        // The tap is released before capture acquires the device
        self.interrupt.disarm().await;

        match after {
            AfterSpeech::Complete(action) => self.complete(action),
            AfterSpeech::Rest(state) if !self.active => self.set_state(state),
            _ => self.begin_listening().await,
        }
    }

    async fn after_speech(&mut self, after: AfterSpeech) {
        match after {
            AfterSpeech::Listen if self.active => self.begin_listening().await,
            AfterSpeech::Listen => self.set_state(TurnState::Idle),
            AfterSpeech::Complete(action) => self.complete(action),
            AfterSpeech::Rest(state) => self.set_state(state),
        }
    }

    fn complete(&mut self, action: NextAction) {
        self.set_state(TurnState::Completed);
        match action {
            NextAction::Email => self.emit(SessionEvent::ActionRequired { action }),
            NextAction::DisplayOffers => {
                let dialogue = self.collab.dialogue.clone();
                let session_id = self.session_id.clone().unwrap_or_default();
                self.spawn_tagged(async move {
                    Input::Offers(dialogue.mortgage_offers(&session_id).await)
                });
            }
            NextAction::None => {}
        }
    }

    async fn begin_listening(&mut self) {
        self.set_state(TurnState::Listening);

        let started = if let Some(recognizer) = self.ensure_recognizer() {
            if self.pump.is_some() {
                Ok(())
            } else {
                match AudioPump::start(&self.collab.microphone, recognizer).await {
                    Ok(pump) => {
                        self.pump = Some(pump);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        } else {
            let tx = self.inputs_tx.clone();
            let phase = self.phase;
            self.capture
                .start(move |unit| {
                    let _ = tx.send(Tagged {
                        phase,
                        input: Input::Captured(unit),
                    });
                })
                .await
                .map(|_| ())
        };

        if let Err(e) = started {
            warn!("Could not start listening: {}", e);
            let err = TurnError::from(e);
            self.emit(SessionEvent::error(err.kind(), err.user_message()));
            self.set_state(TurnState::Idle);
        }
    }

    fn ensure_recognizer(&mut self) -> Option<Arc<StreamingRecognizer>> {
        let Recognition::Streaming { transport, config } = &self.collab.recognition
        else {
            return None;
        };

        if self.recognizer.is_none() {
            let tx = self.stream_tx.clone();
            self.recognizer = Some(Arc::new(StreamingRecognizer::start(
                transport.clone(),
                *config,
                Arc::new(move |update| {
                    let _ = tx.send(update);
                }),
            )));
        }
        self.recognizer.clone()
    }

    async fn stop_recognizer(&mut self) {
        if let Some(recognizer) = self.recognizer.take() {
            recognizer.stop().await;
        }
    }

    /// Release the microphone, whoever holds it.
    async fn stop_listening(&mut self) {
        self.capture.stop().await;
        if let Some(pump) = self.pump.take() {
            pump.stop().await;
        }
    }

    /// Stop everything in flight. In-transit gateway calls are left to
    /// finish; their results are discarded by phase.
    async fn halt_activity(&mut self) {
        self.stop_listening().await;
        self.interrupt.disarm().await;
        self.cancel_speech();
    }

    async fn fail(&mut self, err: TurnError) {
        error!("Turn failed ({}): {}", err.kind(), err);
        self.halt_activity().await;
        self.emit(SessionEvent::error(err.kind(), err.user_message()));
        self.set_state(TurnState::Error);

        let delay = self.config.error_recovery_delay;
        self.spawn_tagged(async move {
            tokio::time::sleep(delay).await;
            Input::Recover
        });
    }
}
