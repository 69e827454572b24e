//! Voice activity detection over a stream of audio energy samples.
//!
//! The detector classifies each frame as speech or silence using a fixed
//! energy threshold and debounces the speech-to-silence edge by a configurable
//! delay. It is shared by the capture path (stop recording on silence) and the
//! barge-in path (cancel playback when the user starts talking).

mod detector;
mod energy;

pub use detector::{ActivityConfig, ActivityDetector, ActivityEvent};
pub use energy::rms_energy;
