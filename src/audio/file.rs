use anyhow::{Context, Result};
use hound::{WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

use super::resample::f32_to_i16;

/// Decoded audio loaded from disk.
pub struct RecordedAudio {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl RecordedAudio {
    /// Open a WAV file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Decode a compressed container (M4A, MP3, OGG, FLAC, ...) into PCM.
    ///
    /// This is the import path for recordings produced by an external encoder;
    /// the result can be re-encoded into a canonical WAV with [`write_wav_pcm`].
    pub fn decode(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Decoding audio file: {}", path.display());

        let src = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(src), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("Unrecognized container format")?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No decodable audio track")?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .context("Track is missing a sample rate")?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Unsupported codec")?;

        let mut samples: Vec<i16> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e).context("Failed to read packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let mut buf =
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec());
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet, keep going with the rest of the stream
                    warn!("Skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(e).context("Decoder failure"),
            }
        }

        let duration_seconds = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        info!(
            "Decoded {}: {:.1}s, {}Hz, {} channels",
            path.display(),
            duration_seconds,
            sample_rate,
            channels
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }
}

/// Write 16-bit PCM samples as a canonical WAV file.
///
/// The header is the standard 44-byte RIFF/WAVE/fmt /data layout with
/// little-endian 16-bit samples.
pub fn write_wav_pcm(
    path: impl AsRef<Path>,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.as_ref().display()))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample to WAV")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}

/// Write float samples in [-1.0, 1.0] as a 16-bit mono WAV file.
pub fn write_wav_mono_f32(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    write_wav_pcm(path, &f32_to_i16(samples), sample_rate, 1)
}
