//! Sample-rate and channel conversion helpers.
//!
//! The recognizer expects 16kHz mono; capture usually runs at 44.1/48kHz.
//! Conversion is linear interpolation, which is plenty for speech input.

/// Resample `input` from `from_rate` to `to_rate` by linear interpolation.
///
/// Produces `round(len * to_rate / from_rate)` output samples. Interpolation
/// indices are clamped to the source buffer bounds, so the final output sample
/// never reads past the end of the input.
pub fn resample_linear(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if input.is_empty() || from_rate == to_rate {
        return input.to_vec();
    }

    let out_len =
        ((input.len() as u64 * to_rate as u64 + from_rate as u64 / 2) / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = (pos.floor() as usize).min(last);
        let next = (idx + 1).min(last);
        let frac = pos - pos.floor();

        let a = input[idx] as f64;
        let b = input[next] as f64;
        output.push((a + (b - a) * frac).round() as i16);
    }

    output
}

/// Fold interleaved stereo samples to mono by summing channels with clipping.
///
/// Non-stereo input is returned unchanged.
pub fn stereo_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels != 2 {
        return samples.to_vec();
    }

    let mut mono = Vec::with_capacity(samples.len() / 2);
    for pair in samples.chunks_exact(2) {
        let sum = pair[0] as i32 + pair[1] as i32;
        mono.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    mono
}

/// Convert float samples in [-1.0, 1.0] to 16-bit PCM with clipping.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let scaled = (s * 32768.0).round();
            scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_length_is_rounded_ratio() {
        let input = vec![0i16; 44100];
        let out = resample_linear(&input, 44100, 16000);
        assert_eq!(out.len(), 16000);

        let input = vec![0i16; 4410]; // 100ms
        let out = resample_linear(&input, 44100, 16000);
        assert_eq!(out.len(), 1600);

        // Rounding, not truncation
        let input = vec![0i16; 3];
        let out = resample_linear(&input, 44100, 16000);
        assert_eq!(out.len(), 1); // round(3 * 16000 / 44100) = round(1.088)
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![1i16, 2, 3, 4];
        assert_eq!(resample_linear(&input, 16000, 16000), input);
    }

    #[test]
    fn resample_interpolates_between_samples() {
        // Upsampling 2x: every other output sample is the midpoint
        let input = vec![0i16, 100];
        let out = resample_linear(&input, 8000, 16000);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
        assert_eq!(out[2], 100); // clamped to last sample
    }

    #[test]
    fn resample_clamps_endpoints() {
        let input = vec![100i16; 7];
        let out = resample_linear(&input, 48000, 16000);
        // No panic, all values from the source range
        assert!(out.iter().all(|&s| s == 100));
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample_linear(&[], 44100, 16000).is_empty());
    }

    #[test]
    fn stereo_fold_sums_channels() {
        let samples = vec![100i16, 50, -20, 30];
        assert_eq!(stereo_to_mono(&samples, 2), vec![150, 10]);
    }

    #[test]
    fn stereo_fold_clips() {
        let samples = vec![i16::MAX, 1000];
        assert_eq!(stereo_to_mono(&samples, 2), vec![i16::MAX]);
    }

    #[test]
    fn mono_passthrough() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(stereo_to_mono(&samples, 1), samples);
    }

    #[test]
    fn f32_conversion_clips_out_of_range() {
        let out = f32_to_i16(&[0.0, 0.5, 1.5, -1.5]);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 16384);
        assert_eq!(out[2], i16::MAX);
        assert_eq!(out[3], i16::MIN);
    }
}
