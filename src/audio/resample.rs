//! Channel folding and band-limited resampling.
//!
//! The feature front end requires **mono `f32`** audio at a fixed rate.
//! This module provides the two conversion steps:
//!
//! 1. [`to_mono`]: average any number of interleaved channels into one.
//! 2. [`resample`]: windowed-sinc conversion from any source rate
//!    (`rubato::SincFixedIn`, Blackman-Harris window).

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::DecodeError;

/// Sinc filter length in input frames; also the zero tail fed after the
/// signal.
const SINC_LEN: usize = 256;

// ---------------------------------------------------------------------------
// to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input is returned as an owned `Vec` unchanged.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use voice_spoof_trainer::audio::to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Fold every channel of an interleaved buffer separately through
/// [`resample`], keeping the interleaving.
pub fn resample_interleaved(
    samples: &[f32],
    channels: u16,
    from: u32,
    to: u32,
) -> Result<Vec<f32>, DecodeError> {
    let n = channels as usize;
    if from == to {
        return Ok(samples.to_vec());
    }
    if n <= 1 {
        return resample(samples, from, to);
    }

    let planar: Vec<Vec<f32>> = (0..n)
        .map(|c| samples.iter().skip(c).step_by(n).copied().collect())
        .collect();
    let converted = planar
        .iter()
        .map(|ch| resample(ch, from, to))
        .collect::<Result<Vec<_>, _>>()?;

    let frames = converted.first().map_or(0, Vec::len);
    let mut out = Vec::with_capacity(frames * n);
    for i in 0..frames {
        for ch in &converted {
            out.push(ch[i]);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `from` Hz to `to` Hz.
///
/// * If the rates are equal the input is cloned and returned unchanged.
/// * If `samples` is empty an empty vector is returned.
///
/// The output length is exactly `round(samples.len() * to / from)`.  The
/// input is followed by `SINC_LEN` zeros so the filter delay is flushed; the
/// leading delay is then dropped and the result truncated to that length.
///
/// # Example
///
/// ```rust
/// use voice_spoof_trainer::audio::resample;
///
/// let hi = vec![0.0_f32; 4_800];
/// let lo = resample(&hi, 48_000, 16_000).unwrap();
/// assert_eq!(lo.len(), 1_600);
/// ```
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    if from == to {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let fail = |reason: String| DecodeError::Resample { from, to, reason };

    let ratio = to as f64 / from as f64;
    let expected_len = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut padded = Vec::with_capacity(samples.len() + SINC_LEN);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, padded.len(), 1)
        .map_err(|e| fail(e.to_string()))?;
    let delay = resampler.output_delay();

    let channel = resampler
        .process(&[padded], None)
        .map_err(|e| fail(e.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| fail("no output channel".into()))?;

    let mut output: Vec<f32> = channel.into_iter().skip(delay).collect();
    output.resize(expected_len, 0.0);
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- to_mono -----------------------------------------------------------

    #[test]
    fn to_mono_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(to_mono(&input, 1), input);
    }

    #[test]
    fn to_mono_two_channel() {
        let out = to_mono(&[1.0_f32, -1.0, 0.5, 0.5], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn to_mono_four_channel() {
        let out = to_mono(&[0.4_f32; 4], 4);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn to_mono_zero_channels() {
        assert!(to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn resample_same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn resample_empty_input() {
        assert!(resample(&[], 48_000, 16_000).unwrap().is_empty());
    }

    #[test]
    fn resample_44100_to_16k_output_length() {
        let input = vec![0.0_f32; 44_100];
        let out = resample(&input, 44_100, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);
    }

    #[test]
    fn resample_upsample_from_8k() {
        let input = vec![0.0_f32; 800];
        let out = resample(&input, 8_000, 16_000).unwrap();
        assert_eq!(out.len(), 1_600);
    }

    #[test]
    fn resample_keeps_low_tone_energy() {
        // 200 Hz tone @ 48 kHz, well below the 8 kHz Nyquist of the target.
        let input: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 48_000.0).sin() * 0.5)
            .collect();
        let out = resample(&input, 48_000, 16_000).unwrap();

        // Compare RMS over the middle of the clip, away from edge transients.
        let mid = &out[4_000..12_000];
        let rms = (mid.iter().map(|s| s * s).sum::<f32>() / mid.len() as f32).sqrt();
        let expected = 0.5 / 2f32.sqrt();
        assert!((rms - expected).abs() < 0.02, "rms {rms}");
    }

    fn tail_is_live(from: u32, to: u32) {
        let input = vec![0.5_f32; from as usize / 10];
        let out = resample(&input, from, to).unwrap();
        let n = out.len();
        assert_eq!(n, to as usize / 10);

        // Last 5 ms, minus a few samples of edge ringing against the end.
        let tail_len = to as usize / 200;
        let tail = &out[n - tail_len..n - 8];
        assert!(
            tail.iter().all(|&s| s > 0.4),
            "{from} -> {to}: min tail sample {}",
            tail.iter().copied().fold(f32::INFINITY, f32::min)
        );
    }

    #[test]
    fn resample_keeps_signal_up_to_the_end() {
        tail_is_live(8_000, 16_000);
        tail_is_live(22_050, 16_000);
        tail_is_live(44_100, 16_000);
        tail_is_live(48_000, 16_000);
    }

    #[test]
    fn resample_is_not_delayed() {
        // A step at the centre of the input stays at the centre of the output.
        let mut input = vec![0.0_f32; 4_000];
        input[2_000..].fill(0.5);
        let out = resample(&input, 8_000, 16_000).unwrap();
        assert!(out[3_960] < 0.1, "{}", out[3_960]);
        assert!(out[4_040] > 0.4, "{}", out[4_040]);
    }

    #[test]
    fn resample_interleaved_keeps_channel_count() {
        let stereo: Vec<f32> = (0..4_800).flat_map(|_| [0.1_f32, -0.1]).collect();
        let out = resample_interleaved(&stereo, 2, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 1_600 * 2);
    }
}
