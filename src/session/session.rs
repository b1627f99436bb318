use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::audio::{
    stereo_to_mono, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource,
    ChunkSlicer, GainControl,
};
use crate::audio::mixer::{AudioMixer, MixerConfig};
use crate::config::OutputFormat;
use crate::control::{ControlCommand, ControlEvent};
use crate::transcribe::{CommandRecognizer, Recognizer, TranscriptionQueue};
use crate::transcribe::queue::QueueConfig;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What the capture task hands back when it finishes.
///
/// The WAV writer is returned unfinalized: stop() must drain the
/// transcription queue before the output file is finalized and renamed.
struct CaptureOutcome {
    writer: hound::WavWriter<BufWriter<File>>,
    samples_written: u64,
}

/// A recording session that manages capture, mixing, incremental WAV output,
/// and the chunked transcription pipeline.
pub struct RecordingSession {
    config: SessionConfig,

    /// When the session was created
    started_at: chrono::DateTime<Utc>,

    /// Final output path (`Recording YYYY-MM-DD HH.MM.SS.wav`)
    output_path: PathBuf,

    /// In-progress file; renamed to `output_path` only after queue drain
    part_path: PathBuf,

    is_recording: Arc<AtomicBool>,

    /// Whether new chunks are fed to the recognizer
    transcription_enabled: Arc<AtomicBool>,

    /// Shared per-source gains (mute/unmute flips the microphone gain)
    gains: GainControl,

    /// Latest mixed-stream RMS level, stored as f32 bits
    level_bits: Arc<AtomicU32>,

    /// Transcription queue; None when transcription is off or unavailable
    queue: Option<Arc<TranscriptionQueue>>,

    /// Fire-and-forget events for control surfaces
    events: broadcast::Sender<ControlEvent>,

    /// Handle for the capture/mix task
    capture_task: Mutex<Option<JoinHandle<Result<CaptureOutcome>>>>,
}

impl RecordingSession {
    /// Create a session, building the subprocess recognizer from the config.
    ///
    /// A missing recognizer or model degrades the session: transcription is
    /// disabled with a warning and recording proceeds without it.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let recognizer = config.transcription.as_ref().map(|tc| {
            Arc::new(CommandRecognizer::new(
                &tc.executable,
                &tc.model,
                tc.language.clone(),
                tc.threads,
            ))
        });

        let recognizer: Option<Arc<dyn Recognizer>> = match recognizer {
            Some(rec) => match rec.check_available() {
                Ok(()) => Some(rec as Arc<dyn Recognizer>),
                Err(e) => {
                    warn!("Transcription disabled for this session: {}", e);
                    None
                }
            },
            None => None,
        };

        Self::build(config, recognizer)
    }

    /// Create a session with an injected recognizer capability.
    pub fn with_recognizer(config: SessionConfig, recognizer: Arc<dyn Recognizer>) -> Result<Self> {
        Self::build(config, Some(recognizer))
    }

    fn build(config: SessionConfig, recognizer: Option<Arc<dyn Recognizer>>) -> Result<Self> {
        if let OutputFormat::Webm = config.output_format {
            bail!(
                "WebM output requires a host media encoder, which is not available here. \
                Use the wav output format."
            );
        }

        let started_at = Utc::now();
        let basename = format!(
            "Recording {}",
            chrono::Local::now().format("%Y-%m-%d %H.%M.%S")
        );
        let output_path = config.recordings_dir.join(format!("{}.wav", basename));
        let part_path = config.recordings_dir.join(format!("{}.wav.part", basename));

        let queue = match (&config.transcription, recognizer) {
            (Some(tc), Some(recognizer)) => {
                let queue_config = QueueConfig {
                    recognizer_sample_rate: tc.recognizer_sample_rate,
                    work_dir: tc.work_dir.clone(),
                };
                Some(Arc::new(TranscriptionQueue::new(queue_config, recognizer)))
            }
            _ => None,
        };

        let (events, _) = broadcast::channel(64);
        let transcription_enabled = queue.is_some();

        info!(
            "Recording session {} created (transcription: {})",
            config.recording_id,
            if transcription_enabled { "on" } else { "off" }
        );

        Ok(Self {
            config,
            started_at,
            output_path,
            part_path,
            is_recording: Arc::new(AtomicBool::new(false)),
            transcription_enabled: Arc::new(AtomicBool::new(transcription_enabled)),
            gains: GainControl::new(),
            level_bits: Arc::new(AtomicU32::new(0.0f32.to_bits())),
            queue,
            events,
            capture_task: Mutex::new(None),
        })
    }

    pub fn recording_id(&self) -> &str {
        &self.config.recording_id
    }

    /// Path the finished recording will be written to.
    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Path of the transcript sibling (written only when non-empty).
    pub fn transcript_path(&self) -> PathBuf {
        self.output_path.with_extension("md")
    }

    /// Subscribe to session events (levels, mute changes, stop).
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    /// Start capturing.
    pub async fn start(&self) -> Result<()> {
        if self.is_recording.swap(true, Ordering::SeqCst) {
            warn!("Recording already started");
            return Ok(());
        }

        if self.config.sources.is_empty() {
            self.is_recording.store(false, Ordering::SeqCst);
            bail!("No capture sources configured");
        }

        info!("Starting recording session: {}", self.config.recording_id);

        fs::create_dir_all(&self.config.recordings_dir).with_context(|| {
            format!(
                "Failed to create recordings folder {}",
                self.config.recordings_dir.display()
            )
        })?;

        // Create the in-progress WAV before touching any capture source so a
        // bad output folder fails the start with nothing to release.
        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = match hound::WavWriter::create(&self.part_path, spec)
            .with_context(|| format!("Failed to create {}", self.part_path.display()))
        {
            Ok(writer) => writer,
            Err(e) => {
                self.is_recording.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let backend_config = AudioBackendConfig {
            target_sample_rate: self.config.sample_rate,
            target_channels: self.config.channels,
            buffer_duration_ms: 100,
        };

        // Bring up every configured source. A failing optional source
        // (microphone) degrades; a failing mandatory source aborts the start
        // even when another source came up, releasing everything acquired.
        let mut backends: Vec<Box<dyn AudioBackend>> = Vec::new();
        let mut receivers = Vec::new();
        let mut first_error = None;

        for source in self.config.sources.clone() {
            let optional = matches!(source, AudioSource::Microphone(_));
            match Self::start_backend(source, backend_config.clone()).await {
                Ok((backend, rx)) => {
                    backends.push(backend);
                    receivers.push(rx);
                }
                Err(e) if optional => {
                    warn!("Continuing without microphone: {:#}", e);
                }
                Err(e) => {
                    error!("Capture source failed to start: {:#}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if first_error.is_some() || receivers.is_empty() {
            for mut backend in backends {
                let _ = backend.stop().await;
            }
            drop(writer);
            let _ = fs::remove_file(&self.part_path);
            self.is_recording.store(false, Ordering::SeqCst);
            return Err(first_error
                .unwrap_or_else(|| anyhow::anyhow!("No capture source could be started")));
        }

        // Merge all backend streams into one channel
        let (merged_tx, merged_rx) = mpsc::channel(256);
        for mut rx in receivers {
            let tx = merged_tx.clone();
            tokio::spawn(async move {
                while let Some(frame) = rx.recv().await {
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(merged_tx);

        let mixer = AudioMixer::new(
            MixerConfig {
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
                max_buffer_delay_ms: 200,
                enabled_sources: MixerConfig::default().enabled_sources,
            },
            self.gains.clone(),
        );

        let slicer = self.config.transcription.as_ref().map(|tc| {
            ChunkSlicer::new(self.config.sample_rate, tc.chunk_duration)
        });

        let task = tokio::spawn(Self::capture_loop(
            merged_rx,
            mixer,
            writer,
            slicer,
            backends,
            self.queue.clone(),
            Arc::clone(&self.is_recording),
            Arc::clone(&self.transcription_enabled),
            Arc::clone(&self.level_bits),
            self.events.clone(),
            self.config.channels,
        ));

        {
            let mut handle = self.capture_task.lock().await;
            *handle = Some(task);
        }

        info!("Recording session started: {}", self.config.recording_id);

        Ok(())
    }

    async fn start_backend(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> Result<(Box<dyn AudioBackend>, mpsc::Receiver<crate::audio::AudioFrame>)> {
        let mut backend = AudioBackendFactory::create(source, config)
            .context("Failed to create audio backend")?;
        let rx = backend
            .start()
            .await
            .context("Failed to start audio capture")?;
        Ok((backend, rx))
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture_loop(
        mut rx: mpsc::Receiver<crate::audio::AudioFrame>,
        mut mixer: AudioMixer,
        mut writer: hound::WavWriter<BufWriter<File>>,
        mut slicer: Option<ChunkSlicer>,
        mut backends: Vec<Box<dyn AudioBackend>>,
        queue: Option<Arc<TranscriptionQueue>>,
        is_recording: Arc<AtomicBool>,
        transcription_enabled: Arc<AtomicBool>,
        level_bits: Arc<AtomicU32>,
        events: broadcast::Sender<ControlEvent>,
        channels: u16,
    ) -> Result<CaptureOutcome> {
        debug!("Capture task started");

        let mut samples_written = 0u64;

        while let Some(frame) = rx.recv().await {
            if !is_recording.load(Ordering::SeqCst) {
                break;
            }

            mixer.buffer_frame(frame);
            while let Some(mixed) = mixer.mix_next_chunk()? {
                samples_written += mixed.samples.len() as u64;
                Self::consume_mixed(
                    &mixed.samples,
                    &mut writer,
                    &mut slicer,
                    &queue,
                    &transcription_enabled,
                    &level_bits,
                    &events,
                    channels,
                )
                .await?;
            }
        }

        // Input closed or stop requested; mix out whatever is buffered
        for mixed in mixer.flush()? {
            samples_written += mixed.samples.len() as u64;
            Self::consume_mixed(
                &mixed.samples,
                &mut writer,
                &mut slicer,
                &queue,
                &transcription_enabled,
                &level_bits,
                &events,
                channels,
            )
            .await?;
        }

        for backend in &mut backends {
            if let Err(e) = backend.stop().await {
                warn!("Failed to stop {} backend: {:#}", backend.name(), e);
            }
        }

        if let Some(slicer) = &slicer {
            if slicer.pending_samples() > 0 {
                // Trailing partial chunk is dropped, matching the fixed
                // wall-clock slicing of the recording timer.
                debug!(
                    "Discarding {} pending samples shorter than one chunk",
                    slicer.pending_samples()
                );
            }
        }

        debug!("Capture task finished ({} samples written)", samples_written);

        Ok(CaptureOutcome {
            writer,
            samples_written,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn consume_mixed(
        samples: &[i16],
        writer: &mut hound::WavWriter<BufWriter<File>>,
        slicer: &mut Option<ChunkSlicer>,
        queue: &Option<Arc<TranscriptionQueue>>,
        transcription_enabled: &AtomicBool,
        level_bits: &AtomicU32,
        events: &broadcast::Sender<ControlEvent>,
        channels: u16,
    ) -> Result<()> {
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to recording")?;
        }

        let rms = Self::rms(samples);
        level_bits.store(rms.to_bits(), Ordering::Relaxed);
        let _ = events.send(ControlEvent::Level { rms });

        if transcription_enabled.load(Ordering::SeqCst) {
            if let (Some(slicer), Some(queue)) = (slicer.as_mut(), queue.as_ref()) {
                let mono = stereo_to_mono(samples, channels);
                for chunk in slicer.push(&mono) {
                    queue.enqueue(chunk).await;
                }
            }
        }

        Ok(())
    }

    fn rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        ((sum / samples.len() as f64).sqrt() / 32768.0) as f32
    }

    /// Stop recording.
    ///
    /// Joins the capture task, waits for the transcription queue to empty
    /// (nothing in flight), and only then finalizes the WAV and renames it to
    /// its final name. The transcript sibling is written when non-empty.
    pub async fn stop(&self) -> Result<SessionStats> {
        self.is_recording.store(false, Ordering::SeqCst);

        let task = {
            let mut handle = self.capture_task.lock().await;
            handle.take()
        };

        let Some(task) = task else {
            warn!("Recording not active");
            return Ok(self.get_stats());
        };

        info!("Stopping recording session: {}", self.config.recording_id);

        let outcome = task
            .await
            .context("Capture task panicked")?
            .context("Capture task failed")?;

        if let Some(queue) = &self.queue {
            info!("Waiting for transcription queue to drain");
            queue.drain().await;
        }

        outcome
            .writer
            .finalize()
            .context("Failed to finalize recording")?;
        fs::rename(&self.part_path, &self.output_path).with_context(|| {
            format!("Failed to move recording to {}", self.output_path.display())
        })?;

        info!(
            "Recording saved: {} ({} samples)",
            self.output_path.display(),
            outcome.samples_written
        );

        if let Some(queue) = &self.queue {
            let transcript = queue.transcript().await;
            if !transcript.is_empty() {
                let path = self.transcript_path();
                fs::write(&path, format!("{}\n", transcript))
                    .with_context(|| format!("Failed to write transcript {}", path.display()))?;
                info!("Transcript saved: {}", path.display());
            } else {
                debug!("Transcript empty, no sibling file written");
            }
        }

        let _ = self.events.send(ControlEvent::Stopped);

        Ok(self.get_stats())
    }

    /// Apply a fire-and-forget control command.
    pub async fn apply(&self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Mute => {
                self.gains.mute_microphone();
                let _ = self.events.send(ControlEvent::MuteChanged { muted: true });
            }
            ControlCommand::Unmute => {
                self.gains.unmute_microphone();
                let _ = self.events.send(ControlEvent::MuteChanged { muted: false });
            }
            ControlCommand::ToggleTranscription => {
                if self.queue.is_none() {
                    warn!("Transcription is not available for this session");
                } else {
                    let enabled = !self.transcription_enabled.load(Ordering::SeqCst);
                    self.transcription_enabled.store(enabled, Ordering::SeqCst);
                    info!("Transcription toggled: {}", enabled);
                    let _ = self
                        .events
                        .send(ControlEvent::TranscriptionToggled { enabled });
                }
            }
            ControlCommand::Resize { width, height } => {
                // Geometry belongs to a window front-end; nothing to do here
                debug!("Resize requested: {}x{}", width, height);
            }
            ControlCommand::Stop => {
                self.stop().await?;
            }
        }

        Ok(())
    }

    /// Current session statistics.
    pub fn get_stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            is_recording: self.is_recording.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            transcription_enabled: self.transcription_enabled.load(Ordering::SeqCst),
            microphone_muted: self.gains.is_microphone_muted(),
            chunks_transcribed: self.queue.as_ref().map_or(0, |q| q.chunks_processed()),
            chunks_failed: self.queue.as_ref().map_or(0, |q| q.chunks_failed()),
            level_rms: f32::from_bits(self.level_bits.load(Ordering::Relaxed)),
        }
    }

    /// Accumulated transcript so far.
    pub async fn transcript(&self) -> String {
        match &self.queue {
            Some(queue) => queue.transcript().await,
            None => String::new(),
        }
    }
}
