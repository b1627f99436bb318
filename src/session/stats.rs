use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the recording started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Whether chunks are currently being fed to the recognizer
    pub transcription_enabled: bool,

    /// Whether the microphone is muted
    pub microphone_muted: bool,

    /// Chunks handed to the recognizer so far (including failures)
    pub chunks_transcribed: usize,

    /// Chunks whose recognition failed and was skipped
    pub chunks_failed: usize,

    /// Most recent RMS level of the mixed stream, in [0.0, 1.0]
    pub level_rms: f32,
}
