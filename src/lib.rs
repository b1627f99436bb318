pub mod audio;
pub mod config;
pub mod control;
pub mod http;
pub mod session;
pub mod setup;
pub mod transcribe;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioChunk, AudioFrame, AudioSource,
    AudioStreamSource, ChunkSlicer, RecordedAudio,
};
pub use config::Settings;
pub use control::{ControlCommand, ControlEvent};
pub use http::{create_router, AppState};
pub use session::{RecordingSession, SessionConfig, SessionStats};
pub use transcribe::{
    CommandRecognizer, Recognizer, RecognizerError, TranscriptAccumulator, TranscriptionQueue,
};
