use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::recognizer::Recognizer;
use super::transcript::TranscriptAccumulator;
use crate::audio::chunk::AudioChunk;
use crate::audio::file::write_wav_pcm;
use crate::audio::resample::resample_linear;

/// Configuration for the transcription queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Sample rate the recognizer expects (chunks are resampled to this)
    pub recognizer_sample_rate: u32,
    /// Directory for per-chunk temporary WAV files
    pub work_dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            recognizer_sample_rate: 16000,
            work_dir: std::env::temp_dir(),
        }
    }
}

/// Ordered, single-flight work queue feeding chunks to a recognizer.
///
/// Contract:
/// - chunks are consumed strictly in arrival order
/// - at most one recognizer invocation is in flight at any time
/// - a failed chunk is logged and skipped; the queue keeps going
/// - per-chunk temporary files are deleted whether or not recognition worked
///
/// `drain` polls until the queue is empty and nothing is in flight; stop paths
/// call it before finalizing the recording output.
pub struct TranscriptionQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    recognizer: Arc<dyn Recognizer>,
    pending: Mutex<VecDeque<AudioChunk>>,
    /// Guards against re-entrant consumer loop starts
    processing: AtomicBool,
    /// Per-session chunk counter, names temp files and orders logs
    chunk_index: AtomicUsize,
    failed_chunks: AtomicUsize,
    accumulator: Mutex<TranscriptAccumulator>,
}

impl TranscriptionQueue {
    pub fn new(config: QueueConfig, recognizer: Arc<dyn Recognizer>) -> Self {
        info!(
            "Transcription queue ready ({}Hz, recognizer: {})",
            config.recognizer_sample_rate,
            recognizer.name()
        );

        Self {
            inner: Arc::new(QueueInner {
                config,
                recognizer,
                pending: Mutex::new(VecDeque::new()),
                processing: AtomicBool::new(false),
                chunk_index: AtomicUsize::new(0),
                failed_chunks: AtomicUsize::new(0),
                accumulator: Mutex::new(TranscriptAccumulator::new()),
            }),
        }
    }

    /// Push a chunk and start the consumer loop if it is not already running.
    pub async fn enqueue(&self, chunk: AudioChunk) {
        {
            let mut pending = self.inner.pending.lock().await;
            pending.push_back(chunk);
        }

        if !self.inner.processing.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                QueueInner::consume(inner).await;
            });
        }
    }

    /// True when the queue is empty and no chunk is in flight.
    pub async fn is_idle(&self) -> bool {
        let empty = self.inner.pending.lock().await.is_empty();
        empty && !self.inner.processing.load(Ordering::SeqCst)
    }

    /// Wait until every queued chunk has been processed.
    ///
    /// Worst case this takes (queue length x recognizer invocation time);
    /// there is no cancellation of an in-flight invocation.
    pub async fn drain(&self) {
        loop {
            if self.is_idle().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Number of chunks processed so far (including failed ones).
    pub fn chunks_processed(&self) -> usize {
        self.inner.chunk_index.load(Ordering::SeqCst)
    }

    /// Number of chunks whose recognition failed and was skipped.
    pub fn chunks_failed(&self) -> usize {
        self.inner.failed_chunks.load(Ordering::SeqCst)
    }

    /// Snapshot of the accumulated transcript.
    pub async fn transcript(&self) -> String {
        self.inner.accumulator.lock().await.text()
    }

    pub async fn transcript_is_empty(&self) -> bool {
        self.inner.accumulator.lock().await.is_empty()
    }
}

impl QueueInner {
    /// Consumer loop: runs while there is work, then parks.
    ///
    /// Exactly one instance runs at a time; the `processing` flag is only
    /// cleared here, and re-checked after clearing so a chunk enqueued during
    /// shutdown is not stranded.
    async fn consume(inner: Arc<QueueInner>) {
        debug!("Transcription consumer started");

        loop {
            let chunk = {
                let mut pending = inner.pending.lock().await;
                pending.pop_front()
            };

            match chunk {
                Some(chunk) => {
                    inner.process_chunk(chunk).await;
                }
                None => {
                    inner.processing.store(false, Ordering::SeqCst);

                    // A producer may have pushed between the pop and the store.
                    // Reclaim the flag and keep going if so; otherwise the
                    // next enqueue starts a fresh loop.
                    let more = !inner.pending.lock().await.is_empty();
                    if more && !inner.processing.swap(true, Ordering::SeqCst) {
                        continue;
                    }

                    debug!("Transcription consumer parked");
                    return;
                }
            }
        }
    }

    async fn process_chunk(&self, chunk: AudioChunk) {
        let index = self.chunk_index.fetch_add(1, Ordering::SeqCst);

        let samples = resample_linear(
            &chunk.samples,
            chunk.sample_rate,
            self.config.recognizer_sample_rate,
        );

        let wav_path = self
            .config
            .work_dir
            .join(format!("tapescribe-chunk-{:05}.wav", index));

        // The temp WAV (and any recognizer output next to it) must not outlive
        // the chunk, success or not.
        let _cleanup = TempFiles::for_chunk(&wav_path);

        if let Err(e) = write_wav_pcm(&wav_path, &samples, self.config.recognizer_sample_rate, 1) {
            error!("Chunk {} skipped, failed to write temp WAV: {:#}", index, e);
            self.failed_chunks.fetch_add(1, Ordering::SeqCst);
            return;
        }

        debug!(
            "Transcribing chunk {} ({} samples at {}ms)",
            index,
            samples.len(),
            chunk.timestamp_ms
        );

        match self.recognizer.transcribe(&wav_path).await {
            Ok(text) => {
                let mut accumulator = self.accumulator.lock().await;
                if accumulator.push(&text) {
                    debug!("Chunk {} transcribed: {}", index, text.trim());
                } else {
                    debug!("Chunk {} produced no new text", index);
                }
            }
            Err(e) => {
                // Per-chunk failure only: log, count, move on
                error!("Chunk {} transcription failed: {}", index, e);
                self.failed_chunks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Deletes a chunk's temporary files on drop.
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn for_chunk(wav_path: &Path) -> Self {
        Self {
            paths: vec![
                wav_path.to_path_buf(),
                wav_path.with_extension("txt"),
                PathBuf::from(format!("{}.txt", wav_path.display())),
            ],
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if path.exists() {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}
