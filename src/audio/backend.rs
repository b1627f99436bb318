use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Audio stream source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioStreamSource {
    /// System audio (applications, browser, etc.)
    System,
    /// Microphone input
    Microphone,
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since recording started
    pub timestamp_ms: u64,
    /// Audio stream source (system or microphone)
    pub source: AudioStreamSource,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 44100,
            target_channels: 1,
            buffer_duration_ms: 100, // 100ms buffers
        }
    }
}

/// Audio capture backend trait
///
/// The capture layer is a host capability: a backend either hands out a frame
/// stream or fails cleanly at start, in which case no session begins.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// System audio (host capture API)
    System,
    /// Microphone input; device name, "default" for the system default
    Microphone(String),
    /// File input (testing/batch processing), tagged with a stream source
    File(PathBuf, AudioStreamSource),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on platform and configuration
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::System => bail!(
                "System audio capture is not available on this host. \
                Recording from system output requires a platform capture API."
            ),

            AudioSource::Microphone(device) => bail!(
                "Microphone capture for device '{}' is not available on this host. \
                Use a file source or run under a host that provides audio input.",
                device
            ),

            AudioSource::File(path, stream_source) => {
                let backend = FileBackend::new(path, stream_source, config)?;
                Ok(Box::new(backend))
            }
        }
    }
}

/// File-based audio backend
///
/// Reads a WAV file and replays it as a stream of fixed-duration frames,
/// tagged with the configured stream source. Used for batch transcription and
/// as the capture stand-in in tests.
pub struct FileBackend {
    path: PathBuf,
    stream_source: AudioStreamSource,
    config: AudioBackendConfig,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl FileBackend {
    pub fn new(
        path: PathBuf,
        stream_source: AudioStreamSource,
        config: AudioBackendConfig,
    ) -> Result<Self> {
        if !path.exists() {
            bail!("Audio file not found: {}", path.display());
        }

        Ok(Self {
            path,
            stream_source,
            config,
            task: None,
            capturing: false,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        let audio = super::file::RecordedAudio::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        info!(
            "File backend streaming {} ({:.1}s, {}Hz, {}ch)",
            self.path.display(),
            audio.duration_seconds,
            audio.sample_rate,
            audio.channels
        );

        let (tx, rx) = mpsc::channel(100);
        let frame_ms = self.config.buffer_duration_ms.max(1);
        let stream_source = self.stream_source;

        let task = tokio::spawn(async move {
            let samples_per_frame =
                (audio.sample_rate as u64 * audio.channels as u64 * frame_ms / 1000) as usize;
            let samples_per_frame = samples_per_frame.max(1);

            let mut timestamp_ms = 0u64;
            for block in audio.samples.chunks(samples_per_frame) {
                let frame = AudioFrame {
                    samples: block.to_vec(),
                    sample_rate: audio.sample_rate,
                    channels: audio.channels,
                    timestamp_ms,
                    source: stream_source,
                };

                if tx.send(frame).await.is_err() {
                    warn!("File backend receiver dropped, stopping stream");
                    return;
                }

                timestamp_ms += frame_ms;

                // Pace the replay a little so downstream consumers see a
                // stream rather than one burst, without taking real time.
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        self.task = Some(task);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }

        self.capturing = false;

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}
