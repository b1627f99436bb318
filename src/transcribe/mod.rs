//! Local transcription pipeline
//!
//! Chunks of captured audio are fed to an external speech-recognition
//! executable through a strictly ordered queue:
//! - `recognizer`: capability interface over the external executable
//! - `queue`: FIFO, single-subprocess-in-flight work queue
//! - `transcript`: noise stripping and duplicate suppression

pub mod queue;
pub mod recognizer;
pub mod transcript;

pub use queue::{QueueConfig, TranscriptionQueue};
pub use recognizer::{CommandRecognizer, Recognizer, RecognizerError};
pub use transcript::TranscriptAccumulator;
