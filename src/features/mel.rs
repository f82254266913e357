//! Mel-scale utilities, filterbank generation and the power mel spectrogram.
//!
//! Conventions match the usual torchaudio front end: periodic Hann window,
//! centred frames with reflect padding, power spectrum, HTK mel scale over
//! `[0, sr/2]` with unnormalised triangular filters.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::FeatureConfig;

/// Floor applied before converting power to decibels.
const POWER_FLOOR: f32 = 1e-10;

/// Generates a periodic Hann window of the given length.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Converts frequency in Hz to the HTK mel scale.
fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Converts an HTK mel value back to Hz.
fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// One triangular filter stored as its first non-zero FFT bin plus weights.
#[derive(Debug, Clone)]
struct MelFilter {
    start: usize,
    weights: Vec<f32>,
}

/// Creates the mel filterbank.
///
/// Returns `[num_mels][half_fft]` where `half_fft = fft_size / 2 + 1`.
pub fn mel_filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: u32,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f32>> {
    let half_fft = fft_size / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let bin_hz: Vec<f64> = (0..half_fft)
        .map(|k| {
            if half_fft == 1 {
                0.0
            } else {
                nyquist * k as f64 / (half_fft - 1) as f64
            }
        })
        .collect();

    let low_mel = hz_to_mel(low_freq);
    let high_mel = hz_to_mel(high_freq);
    let step = (high_mel - low_mel) / (num_mels + 1) as f64;
    let hz_points: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(low_mel + i as f64 * step))
        .collect();

    (0..num_mels)
        .map(|m| {
            let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
            bin_hz
                .iter()
                .map(|&f| {
                    let down = (f - left) / (center - left);
                    let up = (right - f) / (right - center);
                    down.min(up).max(0.0) as f32
                })
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MelFrontEnd
// ---------------------------------------------------------------------------

/// Immutable spectral transform: window, FFT plan and filterbank built once
/// and shared by reference across every extraction call and worker thread.
pub struct MelFrontEnd {
    n_fft: usize,
    hop: usize,
    n_mels: usize,
    window: Vec<f32>,
    filters: Vec<MelFilter>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for MelFrontEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelFrontEnd")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .field("n_mels", &self.n_mels)
            .finish_non_exhaustive()
    }
}

impl MelFrontEnd {
    pub fn new(cfg: &FeatureConfig) -> Self {
        let bank = mel_filter_bank(
            cfg.n_mels,
            cfg.n_fft,
            cfg.sample_rate,
            0.0,
            cfg.sample_rate as f64 / 2.0,
        );
        let filters = bank
            .into_iter()
            .map(|row| {
                let start = row.iter().position(|&w| w > 0.0).unwrap_or(0);
                let end = row.iter().rposition(|&w| w > 0.0).map_or(start, |e| e + 1);
                MelFilter {
                    start,
                    weights: row[start..end].to_vec(),
                }
            })
            .collect();

        let fft = FftPlanner::<f32>::new().plan_fft_forward(cfg.n_fft);

        Self {
            n_fft: cfg.n_fft,
            hop: cfg.hop_length,
            n_mels: cfg.n_mels,
            window: hann_window(cfg.n_fft),
            filters,
            fft,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    /// Number of centred frames produced for `len` samples.
    pub fn n_frames(&self, len: usize) -> usize {
        len / self.hop + 1
    }

    /// Computes the power mel spectrogram of mono `pcm`.
    ///
    /// Returns a mel-major buffer of `n_mels * n_frames` values (row `m`
    /// holds every frame of mel bin `m`).
    pub fn power_mel(&self, pcm: &[f32]) -> Vec<f32> {
        let n_frames = self.n_frames(pcm.len());
        let half_fft = self.n_fft / 2 + 1;
        let pad = (self.n_fft / 2) as isize;

        let mut out = vec![0.0f32; self.n_mels * n_frames];
        let mut buf = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0f32; half_fft];

        for t in 0..n_frames {
            let origin = (t * self.hop) as isize - pad;
            for (i, slot) in buf.iter_mut().enumerate() {
                let s = reflect_sample(pcm, origin + i as isize);
                *slot = Complex::new(s * self.window[i], 0.0);
            }

            self.fft.process_with_scratch(&mut buf, &mut scratch);

            for (p, c) in power.iter_mut().zip(&buf[..half_fft]) {
                *p = c.norm_sqr();
            }

            for (m, filter) in self.filters.iter().enumerate() {
                let energy: f32 = filter
                    .weights
                    .iter()
                    .zip(&power[filter.start..])
                    .map(|(w, p)| w * p)
                    .sum();
                out[m * n_frames + t] = energy;
            }
        }

        out
    }
}

/// Converts power values to decibels in place: `10·log10(max(x, 1e-10))`.
pub fn power_to_db(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = 10.0 * v.max(POWER_FLOOR).log10();
    }
}

/// Sample at `idx` of `pcm` with reflect padding outside the signal.
fn reflect_sample(pcm: &[f32], idx: isize) -> f32 {
    let n = pcm.len() as isize;
    match n {
        0 => 0.0,
        1 => pcm[0],
        _ => {
            let period = 2 * (n - 1);
            let mut i = idx.rem_euclid(period);
            if i >= n {
                i = period - i;
            }
            pcm[i as usize]
        }
    }
}
