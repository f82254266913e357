//! Training-only augmentation: waveform gain/noise and spectral masking.
//!
//! Every operation takes an explicit random generator so a seeded run is
//! reproducible.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::FeatureTensor;
use crate::config::AugmentConfig;

// ---------------------------------------------------------------------------
// WaveformAugment
// ---------------------------------------------------------------------------

/// Uniform random gain followed by zero-mean Gaussian noise.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformAugment {
    pub gain_min: f32,
    pub gain_max: f32,
    pub noise_std: f32,
}

impl WaveformAugment {
    pub fn from_config(cfg: &AugmentConfig) -> Self {
        Self {
            gain_min: cfg.gain_min,
            gain_max: cfg.gain_max,
            noise_std: cfg.noise_std,
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, pcm: &mut [f32], rng: &mut R) {
        let gain = if self.gain_max > self.gain_min {
            rng.random_range(self.gain_min..=self.gain_max)
        } else {
            self.gain_min
        };

        match Normal::new(0.0f32, self.noise_std) {
            Ok(noise) if self.noise_std > 0.0 => {
                for s in pcm.iter_mut() {
                    *s = *s * gain + noise.sample(rng);
                }
            }
            _ => {
                for s in pcm.iter_mut() {
                    *s *= gain;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SpecMask
// ---------------------------------------------------------------------------

/// One frequency band and one time band zeroed per application.
///
/// Widths are drawn uniformly from `[0, max]` (clamped to the tensor
/// extent), positions uniformly from the remaining span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecMask {
    pub freq_mask_max: usize,
    pub time_mask_max: usize,
}

impl SpecMask {
    pub fn from_config(cfg: &AugmentConfig) -> Self {
        Self {
            freq_mask_max: cfg.freq_mask_max,
            time_mask_max: cfg.time_mask_max,
        }
    }

    pub fn apply<R: Rng + ?Sized>(&self, features: &mut FeatureTensor, rng: &mut R) {
        let (n_mels, n_frames) = features.shape();

        let (start, width) = draw_band(self.freq_mask_max, n_mels, rng);
        features.zero_mel_band(start, width);

        let (start, width) = draw_band(self.time_mask_max, n_frames, rng);
        features.zero_frame_band(start, width);
    }
}

fn draw_band<R: Rng + ?Sized>(max_width: usize, extent: usize, rng: &mut R) -> (usize, usize) {
    let width = rng.random_range(0..=max_width.min(extent));
    let start = rng.random_range(0..=extent - width);
    (start, width)
}
