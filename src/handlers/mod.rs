//! HTTP and WebSocket request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Health check endpoint
//! - `chat` - Chat API proxy (start, answer, offers, offers email)
//! - `sessions` - Live voice session listing
//! - `speak` - Text-to-speech REST API
//! - `stt` - Speech-to-text upload endpoint
//! - `ws` - WebSocket voice sessions

pub mod api;
pub mod chat;
pub mod sessions;
pub mod speak;
pub mod stt;
pub mod ws;

// Re-export commonly used handlers for convenient access
pub use ws::ws_voice_handler;
