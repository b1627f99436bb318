use std::time::Duration;

/// A fixed-duration slice of mono capture-rate samples queued for recognition.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono samples at the capture sample rate
    pub samples: Vec<i16>,
    /// Sample rate of `samples` in Hz
    pub sample_rate: u32,
    /// Timestamp of the chunk's first sample, ms since recording start
    pub timestamp_ms: u64,
}

impl AudioChunk {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Slices a continuous mono stream into fixed-duration chunks.
///
/// Samples accumulate across pushes; every time a full chunk's worth is
/// available one chunk is emitted and the remainder carries forward. A
/// trailing partial chunk is never emitted; on stop it is simply dropped,
/// matching the wall-clock slicing of the recording timer.
pub struct ChunkSlicer {
    sample_rate: u32,
    samples_per_chunk: usize,
    buffer: Vec<i16>,
    /// Total samples already emitted, used to timestamp chunk boundaries
    emitted_samples: u64,
}

impl ChunkSlicer {
    pub fn new(sample_rate: u32, chunk_duration: Duration) -> Self {
        let samples_per_chunk =
            ((sample_rate as f64 * chunk_duration.as_secs_f64()) as usize).max(1);

        Self {
            sample_rate,
            samples_per_chunk,
            buffer: Vec::with_capacity(samples_per_chunk),
            emitted_samples: 0,
        }
    }

    /// Append samples and return any full chunks now available.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioChunk> {
        self.buffer.extend_from_slice(samples);

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.samples_per_chunk {
            let rest = self.buffer.split_off(self.samples_per_chunk);
            let chunk_samples = std::mem::replace(&mut self.buffer, rest);

            let timestamp_ms = self.emitted_samples * 1000 / self.sample_rate as u64;
            self.emitted_samples += chunk_samples.len() as u64;

            chunks.push(AudioChunk {
                samples: chunk_samples,
                sample_rate: self.sample_rate,
                timestamp_ms,
            });
        }

        chunks
    }

    /// Samples currently carried forward, waiting for a full chunk.
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }
}
