//! Microphone capture.
//!
//! - [`microphone`]: the [`AudioInput`] device abstraction with scoped leases
//!   and the relay-fed [`SharedMicrophone`]
//! - [`controller`]: the [`CaptureController`] recording lifecycle
//!   (`Idle → Acquiring → Recording → Finalizing → Idle`)
//! - [`interrupt`]: the barge-in [`InterruptMonitor`] tap used while speaking
//! - [`unit`]: finished recordings ([`AudioUnit`]) and their formats

mod controller;
mod errors;
mod interrupt;
mod microphone;
mod unit;

pub use controller::{CaptureConfig, CaptureController, CaptureState};
pub use errors::DeviceError;
pub use interrupt::InterruptMonitor;
pub use microphone::{AudioFrame, AudioInput, AudioTap, SharedMicrophone};
pub use unit::{AudioEncoding, AudioFormat, AudioUnit, StopReason};
