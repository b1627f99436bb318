use std::path::PathBuf;
use std::time::Duration;

use crate::audio::AudioSource;
use crate::config::{OutputFormat, Settings};

/// Configuration for a recording session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique recording identifier
    pub recording_id: String,

    /// Folder the finished recording (and transcript sibling) lands in
    pub recordings_dir: PathBuf,

    /// Capture sources mixed into the recording
    pub sources: Vec<AudioSource>,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Output container for the finished recording
    pub output_format: OutputFormat,

    /// Transcription pipeline settings; None disables transcription
    pub transcription: Option<TranscriptionConfig>,
}

/// Settings for the chunk-and-recognize pipeline of one session
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Recognizer executable path
    pub executable: PathBuf,
    /// Model file path
    pub model: PathBuf,
    /// Language code handed to the recognizer
    pub language: String,
    /// Recognizer thread count (0 = auto)
    pub threads: u32,
    /// Wall-clock duration of each chunk (default 2s)
    pub chunk_duration: Duration,
    /// Sample rate the recognizer expects
    pub recognizer_sample_rate: u32,
    /// Directory for per-chunk temporary WAV files
    pub work_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_id: format!("recording-{}", uuid::Uuid::new_v4()),
            recordings_dir: PathBuf::from("recordings"),
            sources: Vec::new(),
            sample_rate: 44100,
            channels: 1,
            output_format: OutputFormat::Wav,
            transcription: None,
        }
    }
}

impl SessionConfig {
    /// Build a session config from persisted settings.
    ///
    /// `sources` is supplied by the caller since it depends on how the session
    /// is launched (live capture vs. file input).
    pub fn from_settings(settings: &Settings, sources: Vec<AudioSource>) -> Self {
        let transcription = if settings.transcription.enabled {
            Some(TranscriptionConfig {
                executable: PathBuf::from(&settings.transcription.executable_path),
                model: PathBuf::from(&settings.transcription.model_path),
                language: settings.transcription.language.clone(),
                threads: settings.transcription.threads,
                chunk_duration: Duration::from_secs(settings.transcription.chunk_duration_secs),
                recognizer_sample_rate: 16000,
                work_dir: std::env::temp_dir(),
            })
        } else {
            None
        };

        Self {
            recording_id: format!("recording-{}", uuid::Uuid::new_v4()),
            recordings_dir: PathBuf::from(&settings.recordings_dir),
            sources,
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            output_format: settings.output_format.clone(),
            transcription,
        }
    }
}
