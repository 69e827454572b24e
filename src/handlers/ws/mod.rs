//! # WebSocket Voice Session Module
//!
//! One WebSocket connection carries one voice session. The browser streams
//! microphone audio in; the server drives the turn coordinator and streams
//! transcripts, assistant prompts and synthesized speech back out.
//!
//! ## WebSocket API
//!
//! ### Connection Flow
//! 1. Client connects to `/ws`
//! 2. Client sends `start-session`, optionally with a `sessionId` to resume
//! 3. Server answers `session-started` and speaks the greeting (new dialogues only)
//! 4. Client streams microphone audio as `audio-data` or binary frames
//! 5. Server reports transcripts and streams every assistant prompt as
//!    `tts-start`, `tts-chunk`..., `tts-end`
//!
//! ### Message Types
//!
//! Every envelope is a JSON object tagged by `type`. Outbound envelopes also
//! carry `timestamp` (Unix epoch milliseconds).
//!
//! **Incoming Messages:**
//! - `{"type": "start-session", "sessionId": "..."}` - Open the session (`sessionId` optional)
//! - `{"type": "stop-session"}` - Cancel the active phase and go idle
//! - `{"type": "audio-data", "audio": "<base64 PCM16LE>"}` - Microphone audio
//! - **Binary messages** - Raw PCM16LE microphone audio
//! - `{"type": "user-started-speaking"}` / `{"type": "user-stopped-speaking"}` - Client-side voice activity; starting interrupts playback
//! - `{"type": "tts-request", "text": "..."}` - Speak text outside the dialogue loop
//! - `{"type": "send-offers-email", "email": "...", "message": "..."}` - Email the offers of the current dialogue
//!
//! **Outgoing Messages:**
//! - `{"type": "session-started", "sessionId": "..."}` / `{"type": "session-stopped"}`
//! - `{"type": "state-changed", "state": "listening"}` - `idle`, `completed`, `listening`, `processing`, `speaking` or `error`
//! - `{"type": "partial-transcript", "text": "..."}` / `{"type": "final-transcript", "text": "..."}`
//! - `{"type": "assistant-message", "text": "...", "isCompleted": false, "questionNumber": 2, ...}`
//! - `{"type": "tts-start", "handleId": 3, "contentType": "audio/mpeg"}`
//! - `{"type": "tts-chunk", "handleId": 3, "audio": {"data": "<base64>"}}`
//! - `{"type": "tts-end", "handleId": 3, "interrupted": false}`
//! - `{"type": "text-fallback", "text": "..."}` - Synthesis failed, show the text instead
//! - `{"type": "user-speaking", "speaking": true}`
//! - `{"type": "results-ready", "offers": [...]}` / `{"type": "action-required", "action": "email"}`
//! - `{"type": "email-sent", "email": "..."}`
//! - `{"type": "error", "errorType": "websocket", "message": "..."}`
//!
//! Malformed or unknown envelopes are answered with an `error` of type
//! `websocket`; the connection stays open.
//!
//! ## JavaScript Client Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:3001/ws');
//!
//! ws.onopen = () => ws.send(JSON.stringify({ type: 'start-session' }));
//!
//! ws.onmessage = (event) => {
//!   const message = JSON.parse(event.data);
//!   switch (message.type) {
//!     case 'tts-start':
//!       player.begin(message.handleId, message.contentType);
//!       break;
//!     case 'tts-chunk':
//!       player.append(message.handleId, atob(message.audio.data));
//!       break;
//!     case 'tts-end':
//!       player.end(message.handleId, message.interrupted);
//!       break;
//!     case 'final-transcript':
//!       console.log('You said:', message.text);
//!       break;
//!     case 'error':
//!       console.error(`${message.errorType}: ${message.message}`);
//!       break;
//!   }
//! };
//!
//! // PCM16LE frames from an AudioWorklet
//! function sendAudio(pcm16) {
//!   ws.send(pcm16.buffer);
//! }
//! ```

mod audio_handler;
mod command_handler;
mod error;
mod handler;
mod messages;
mod processor;
mod relay;
mod session_handler;
mod state;

#[cfg(test)]
mod tests;

pub use error::{WebSocketError, WebSocketResult};
pub use handler::ws_voice_handler;
pub use messages::{AudioPayload, IncomingMessage, OutgoingMessage};
pub use relay::WebSocketSink;
