//! Recording session management
//!
//! This module provides the `RecordingSession` abstraction that manages:
//! - Audio capture from the configured sources
//! - Gain mixing (mutable microphone gain for mute/unmute)
//! - Incremental WAV output with drain-before-finalize semantics
//! - Chunked feeding of the transcription queue
//! - Control commands/events and session statistics

mod config;
mod session;
mod stats;

pub use config::{SessionConfig, TranscriptionConfig};
pub use session::RecordingSession;
pub use stats::SessionStats;
