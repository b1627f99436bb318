// Audio mixer for combining system audio and microphone streams
//
// Buffers frames from each enabled stream, applies a per-source gain, and
// sums the samples with clipping. The microphone gain is shared through a
// GainControl handle so mute/unmute can flip it while the mix task runs.

use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, AudioStreamSource};

/// Configuration for audio mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Target sample rate for output
    pub sample_rate: u32,
    /// Number of channels in output
    pub channels: u16,
    /// Maximum buffering delay in milliseconds (default: 200ms)
    /// Frames older than this are dropped to prevent unbounded buffering
    pub max_buffer_delay_ms: u64,
    /// Sources to include in the mix
    pub enabled_sources: HashSet<AudioStreamSource>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        let mut enabled_sources = HashSet::new();
        enabled_sources.insert(AudioStreamSource::System);
        enabled_sources.insert(AudioStreamSource::Microphone);

        Self {
            sample_rate: 44100,
            channels: 1,
            max_buffer_delay_ms: 200,
            enabled_sources,
        }
    }
}

/// Shared handle for runtime gain changes.
///
/// Gains are stored as f32 bit patterns in atomics so the capture task can
/// read them per frame without locking.
#[derive(Clone)]
pub struct GainControl {
    system: Arc<AtomicU32>,
    microphone: Arc<AtomicU32>,
}

impl GainControl {
    pub fn new() -> Self {
        Self {
            system: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            microphone: Arc::new(AtomicU32::new(1.0f32.to_bits())),
        }
    }

    pub fn gain(&self, source: AudioStreamSource) -> f32 {
        let bits = match source {
            AudioStreamSource::System => self.system.load(Ordering::Relaxed),
            AudioStreamSource::Microphone => self.microphone.load(Ordering::Relaxed),
        };
        f32::from_bits(bits)
    }

    pub fn set_gain(&self, source: AudioStreamSource, gain: f32) {
        let bits = gain.max(0.0).to_bits();
        match source {
            AudioStreamSource::System => self.system.store(bits, Ordering::Relaxed),
            AudioStreamSource::Microphone => self.microphone.store(bits, Ordering::Relaxed),
        }
    }

    /// Mute the microphone, remembering nothing: unmute restores unit gain.
    pub fn mute_microphone(&self) {
        self.set_gain(AudioStreamSource::Microphone, 0.0);
    }

    pub fn unmute_microphone(&self) {
        self.set_gain(AudioStreamSource::Microphone, 1.0);
    }

    pub fn is_microphone_muted(&self) -> bool {
        self.gain(AudioStreamSource::Microphone) == 0.0
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio mixer that combines multiple audio streams
pub struct AudioMixer {
    config: MixerConfig,
    gains: GainControl,
    /// Buffers for each audio source type
    buffers: HashMap<AudioStreamSource, VecDeque<AudioFrame>>,
    current_position_ms: u64,
}

impl AudioMixer {
    pub fn new(config: MixerConfig, gains: GainControl) -> Self {
        info!(
            "Audio mixer initialized: {}Hz, {} channels, {} enabled sources",
            config.sample_rate,
            config.channels,
            config.enabled_sources.len()
        );

        let mut buffers = HashMap::new();
        for source in &config.enabled_sources {
            buffers.insert(*source, VecDeque::new());
        }

        Self {
            config,
            gains,
            buffers,
            current_position_ms: 0,
        }
    }

    /// Buffer an incoming frame, then call [`Self::mix_next_chunk`] to pull
    /// mixed output.
    pub fn buffer_frame(&mut self, frame: AudioFrame) {
        if !self.config.enabled_sources.contains(&frame.source) {
            debug!(
                "Skipping frame from disabled source: {:?} at {}ms",
                frame.source, frame.timestamp_ms
            );
            return;
        }

        if frame.sample_rate != self.config.sample_rate {
            warn!(
                "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
                self.config.sample_rate, frame.sample_rate
            );
            return;
        }

        if frame.channels != self.config.channels {
            warn!(
                "Frame channel count mismatch: expected {}, got {}. Dropping frame.",
                self.config.channels, frame.channels
            );
            return;
        }

        if let Some(buffer) = self.buffers.get_mut(&frame.source) {
            buffer.push_back(frame);
        }

        self.cleanup_old_frames();
    }

    /// Remove frames that are too old (beyond max buffer delay)
    fn cleanup_old_frames(&mut self) {
        let cutoff_time = self
            .current_position_ms
            .saturating_sub(self.config.max_buffer_delay_ms);

        for (source, buffer) in &mut self.buffers {
            while let Some(frame) = buffer.front() {
                if frame.timestamp_ms < cutoff_time {
                    warn!(
                        "Dropping old {:?} frame at {}ms (current position: {}ms)",
                        source, frame.timestamp_ms, self.current_position_ms
                    );
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// Try to mix the next chunk of audio from all enabled source buffers
    ///
    /// Returns None if there's no data available in any buffer
    pub fn mix_next_chunk(&mut self) -> Result<Option<AudioFrame>> {
        let mut frames_to_mix: Vec<AudioFrame> = Vec::new();

        for (_source, buffer) in &mut self.buffers {
            if let Some(frame) = buffer.pop_front() {
                frames_to_mix.push(frame);
            }
        }

        if frames_to_mix.is_empty() {
            return Ok(None);
        }

        let mixed = self.mix_frames(&frames_to_mix)?;
        self.current_position_ms = mixed.timestamp_ms;
        Ok(Some(mixed))
    }

    /// Drain whatever is left in the buffers after the input streams close.
    pub fn flush(&mut self) -> Result<Vec<AudioFrame>> {
        let mut frames = Vec::new();
        while let Some(mixed) = self.mix_next_chunk()? {
            frames.push(mixed);
        }
        Ok(frames)
    }

    /// Mix frames together by summing gain-scaled samples with clipping.
    fn mix_frames(&self, frames: &[AudioFrame]) -> Result<AudioFrame> {
        if frames.is_empty() {
            anyhow::bail!("Cannot mix zero frames");
        }

        // Use the earliest timestamp
        let timestamp_ms = frames.iter().map(|f| f.timestamp_ms).min().unwrap_or(0);

        // Determine output length (use the longest frame)
        let max_len = frames.iter().map(|f| f.samples.len()).max().unwrap_or(0);
        let mut mixed_samples = Vec::with_capacity(max_len);

        for i in 0..max_len {
            let mut sum: f64 = 0.0;

            for frame in frames {
                let sample = frame.samples.get(i).copied().unwrap_or(0);
                sum += sample as f64 * self.gains.gain(frame.source) as f64;
            }

            // Clip to prevent overflow
            let mixed = sum.round().clamp(i16::MIN as f64, i16::MAX as f64);
            mixed_samples.push(mixed as i16);
        }

        Ok(AudioFrame {
            samples: mixed_samples,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            timestamp_ms,
            source: AudioStreamSource::System, // Mixed frames are marked as System
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(source: AudioStreamSource, samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 44100,
            channels: 1,
            timestamp_ms,
            source,
        }
    }

    #[test]
    fn mixer_creation_buffers_enabled_sources() {
        let mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());
        assert_eq!(mixer.buffers.len(), 2); // System and Microphone by default
        assert_eq!(mixer.current_position_ms, 0);
    }

    #[test]
    fn mixes_two_sources_by_addition() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());

        mixer.buffer_frame(frame(AudioStreamSource::System, vec![100, 200, 300], 0));
        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![50, 100, 150], 0));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples, vec![150, 300, 450]);
    }

    #[test]
    fn mixing_clips_on_overflow() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());

        mixer.buffer_frame(frame(AudioStreamSource::System, vec![i16::MAX - 100], 0));
        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![200], 0));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples[0], i16::MAX);
    }

    #[test]
    fn shorter_frame_is_zero_padded() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());

        mixer.buffer_frame(frame(AudioStreamSource::System, vec![100, 200], 0));
        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![50, 100, 150, 200], 0));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples, vec![150, 300, 150, 200]);
    }

    #[test]
    fn muted_microphone_contributes_nothing() {
        let gains = GainControl::new();
        gains.mute_microphone();
        let mut mixer = AudioMixer::new(MixerConfig::default(), gains.clone());

        mixer.buffer_frame(frame(AudioStreamSource::System, vec![100, 200], 0));
        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![1000, 1000], 0));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples, vec![100, 200]);

        // Unmute restores the contribution on the next chunk
        gains.unmute_microphone();
        mixer.buffer_frame(frame(AudioStreamSource::System, vec![100], 100));
        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![1000], 100));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples, vec![1100]);
    }

    #[test]
    fn fractional_gain_scales_samples() {
        let gains = GainControl::new();
        gains.set_gain(AudioStreamSource::Microphone, 0.5);
        let mut mixer = AudioMixer::new(MixerConfig::default(), gains);

        mixer.buffer_frame(frame(AudioStreamSource::Microphone, vec![1000], 0));

        let mixed = mixer.mix_next_chunk().unwrap().unwrap();
        assert_eq!(mixed.samples, vec![500]);
    }

    #[test]
    fn mismatched_sample_rate_is_dropped() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());

        mixer.buffer_frame(AudioFrame {
            samples: vec![1, 2, 3],
            sample_rate: 48000,
            channels: 1,
            timestamp_ms: 0,
            source: AudioStreamSource::System,
        });

        assert!(mixer.mix_next_chunk().unwrap().is_none());
    }

    #[test]
    fn flush_empties_buffers() {
        let mut mixer = AudioMixer::new(MixerConfig::default(), GainControl::new());

        mixer.buffer_frame(frame(AudioStreamSource::System, vec![1], 0));
        mixer.buffer_frame(frame(AudioStreamSource::System, vec![2], 100));

        let frames = mixer.flush().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(mixer.mix_next_chunk().unwrap().is_none());
    }
}
