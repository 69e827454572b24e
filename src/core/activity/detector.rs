//! Threshold + debounce state machine.
//!
//! # State Transitions
//!
//! ```text
//! [Quiet] ─── energy > threshold ──► [Active]            (emits Start)
//!    ▲                                   │
//!    │                                   │ energy <= threshold
//!    │                                   ▼
//!    └── silence >= silence_delay ── [Active, silence pending]  (emits Stop)
//!                                        │
//!                                        └── energy > threshold ──► [Active] (no event)
//! ```
//!
//! Timing is driven by caller-supplied instants so the same detector works for
//! live frames and for a periodic `poll` when no frames arrive.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Edge events produced by [`ActivityDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// Energy crossed the threshold after a quiet period.
    Start,
    /// Energy stayed below the threshold for `silence_delay` after a `Start`.
    Stop,
}

/// Detector tuning.
///
/// The energy unit is normalized RMS in `0.0..=1.0` (see [`super::rms_energy`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivityConfig {
    /// Frames with energy strictly above this value count as activity.
    pub threshold: f32,

    /// How long energy must stay below the threshold before `Stop` fires.
    pub silence_delay: Duration,

    /// Hard ceiling for one recording. The detector itself never enforces it;
    /// capture uses it as a forced stop when silence logic never triggers.
    pub max_duration: Duration,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            silence_delay: Duration::from_millis(700),
            max_duration: Duration::from_millis(30_000),
        }
    }
}

impl ActivityConfig {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_silence_delay(mut self, delay: Duration) -> Self {
        self.silence_delay = delay;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }
}

#[derive(Debug, Default)]
struct DetectorState {
    active: bool,
    silence_since: Option<Instant>,
}

/// Classifies energy samples into activity start/stop edges.
///
/// ```ignore
/// let detector = ActivityDetector::new(ActivityConfig::default());
/// for (energy, at) in frames {
///     match detector.process(energy, at) {
///         Some(ActivityEvent::Start) => { /* user started talking */ }
///         Some(ActivityEvent::Stop) => { /* end of utterance */ }
///         None => {}
///     }
/// }
/// ```
pub struct ActivityDetector {
    config: ActivityConfig,
    state: Mutex<DetectorState>,
}

impl ActivityDetector {
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DetectorState::default()),
        }
    }

    /// Feed one energy sample observed at `now`.
    pub fn process(&self, energy: f32, now: Instant) -> Option<ActivityEvent> {
        let mut state = self.state.lock();

        if energy > self.config.threshold {
            state.silence_since = None;
            if !state.active {
                state.active = true;
                debug!(energy, "Activity started");
                return Some(ActivityEvent::Start);
            }
            return None;
        }

        if !state.active {
            return None;
        }

        let since = *state.silence_since.get_or_insert(now);
        self.check_silence(&mut state, since, now)
    }

    /// Re-evaluate the silence debounce without a new sample.
    ///
    /// Needed when the input goes quiet by sending nothing at all.
    pub fn poll(&self, now: Instant) -> Option<ActivityEvent> {
        let mut state = self.state.lock();
        match (state.active, state.silence_since) {
            (true, Some(since)) => self.check_silence(&mut state, since, now),
            _ => None,
        }
    }

    fn check_silence(
        &self,
        state: &mut DetectorState,
        since: Instant,
        now: Instant,
    ) -> Option<ActivityEvent> {
        if now.saturating_duration_since(since) >= self.config.silence_delay {
            state.active = false;
            state.silence_since = None;
            debug!(
                silence_ms = now.saturating_duration_since(since).as_millis() as u64,
                "Activity stopped"
            );
            Some(ActivityEvent::Stop)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn reset(&self) {
        *self.state.lock() = DetectorState::default();
    }
}
