pub mod backend;
pub mod chunk;
pub mod file;
pub mod mixer;
pub mod resample;

pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource,
    AudioStreamSource, FileBackend,
};
pub use chunk::{AudioChunk, ChunkSlicer};
pub use file::{write_wav_mono_f32, write_wav_pcm, RecordedAudio};
pub use mixer::{AudioMixer, GainControl, MixerConfig};
pub use resample::{f32_to_i16, resample_linear, stereo_to_mono};
