//! Raw audio → fixed-shape normalised [`FeatureTensor`].
//!
//! Two named pipelines share the same spectral back end:
//!
//! | Step | [`Pipeline::Training`] | [`Pipeline::Preprocess`] |
//! |------|------------------------|--------------------------|
//! | 1 | mono fold | resample |
//! | 2 | resample | mono fold |
//! | 3 | | energy trim (−40 dB) |
//! | 4 | pad / random or centre crop | pad / head crop |
//! | 5 | gain + noise (train mode) | |
//! | 6 | mel power → dB | mel power → dB |
//! | 7 | z-score | z-score |
//!
//! The training dataset uses `Training`; the standalone preprocess command
//! uses `Preprocess`.  Features from one are not interchangeable with the
//! other.

use std::path::Path;

use rand::Rng;

use super::augment::WaveformAugment;
use super::mel::{power_to_db, MelFrontEnd};
use super::FeatureTensor;
use crate::audio::{
    decode_wav, resample, resample_interleaved, to_mono, AudioClip, DecodeError, EnergyTrimmer,
};
use crate::config::TrainConfig;

// ---------------------------------------------------------------------------
// Pipeline / Mode
// ---------------------------------------------------------------------------

/// Which front-end variant produced a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Dataset path used during training and evaluation.
    Training,
    /// Standalone preprocessing path with energy trimming.
    Preprocess,
}

/// Extraction mode of the training pipeline.  Fixed per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Random crop offset, waveform augmentation when enabled.
    Train,
    /// Centre crop, no augmentation.  Deterministic.
    Eval,
}

/// How an over-long clip is cut down to the target length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crop {
    Random,
    Center,
    Head,
}

/// Right-pads with zeros or crops `pcm` to exactly `target` samples.
pub fn fit_to_length<R: Rng + ?Sized>(
    pcm: &[f32],
    target: usize,
    crop: Crop,
    rng: &mut R,
) -> Vec<f32> {
    if pcm.len() <= target {
        let mut out = pcm.to_vec();
        out.resize(target, 0.0);
        return out;
    }

    let slack = pcm.len() - target;
    let start = match crop {
        Crop::Random => rng.random_range(0..=slack),
        Crop::Center => slack / 2,
        Crop::Head => 0,
    };
    pcm[start..start + target].to_vec()
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Immutable extraction configuration: built once per run and shared by
/// reference (it is `Send + Sync`) across data-loading workers.
#[derive(Debug)]
pub struct FeatureExtractor {
    sample_rate: u32,
    target_len: usize,
    norm_eps: f32,
    waveform_augment: Option<WaveformAugment>,
    trimmer: EnergyTrimmer,
    front: MelFrontEnd,
}

impl FeatureExtractor {
    pub fn new(config: &TrainConfig) -> Self {
        let f = &config.features;
        Self {
            sample_rate: f.sample_rate,
            target_len: f.target_len(),
            norm_eps: f.norm_eps,
            waveform_augment: config
                .augment
                .waveform
                .then(|| WaveformAugment::from_config(&config.augment)),
            trimmer: EnergyTrimmer::new(config.vad.threshold_db, config.vad.frame_len),
            front: MelFrontEnd::new(f),
        }
    }

    /// `(n_mels, n_frames)` of every tensor this extractor produces.
    pub fn output_shape(&self) -> (usize, usize) {
        (self.front.n_mels(), self.front.n_frames(self.target_len))
    }

    /// Run the named pipeline over a decoded clip.  `mode` only affects
    /// [`Pipeline::Training`].
    pub fn extract_with<R: Rng + ?Sized>(
        &self,
        pipeline: Pipeline,
        clip: &AudioClip,
        mode: Mode,
        rng: &mut R,
    ) -> Result<FeatureTensor, DecodeError> {
        match pipeline {
            Pipeline::Training => self.extract(clip, mode, rng),
            Pipeline::Preprocess => self.extract_preprocess(clip),
        }
    }

    /// Training pipeline over a decoded clip.
    pub fn extract<R: Rng + ?Sized>(
        &self,
        clip: &AudioClip,
        mode: Mode,
        rng: &mut R,
    ) -> Result<FeatureTensor, DecodeError> {
        let mono = to_mono(&clip.samples, clip.channels);
        let pcm = resample(&mono, clip.sample_rate, self.sample_rate)?;

        let crop = match mode {
            Mode::Train => Crop::Random,
            Mode::Eval => Crop::Center,
        };
        let mut pcm = fit_to_length(&pcm, self.target_len, crop, rng);

        if let (Mode::Train, Some(aug)) = (mode, &self.waveform_augment) {
            aug.apply(&mut pcm, rng);
        }

        Ok(self.spectral(&pcm))
    }

    /// Decode `path` and run the training pipeline.
    pub fn extract_file<R: Rng + ?Sized>(
        &self,
        path: &Path,
        mode: Mode,
        rng: &mut R,
    ) -> Result<FeatureTensor, DecodeError> {
        let clip = decode_wav(path)?;
        self.extract(&clip, mode, rng)
    }

    /// Preprocess pipeline over a decoded clip.  Fully deterministic.
    pub fn extract_preprocess(&self, clip: &AudioClip) -> Result<FeatureTensor, DecodeError> {
        let resampled =
            resample_interleaved(&clip.samples, clip.channels, clip.sample_rate, self.sample_rate)?;
        let mono = to_mono(&resampled, clip.channels);
        let voiced = self.trimmer.trim(&mono);

        let mut head = voiced[..voiced.len().min(self.target_len)].to_vec();
        head.resize(self.target_len, 0.0);

        Ok(self.spectral(&head))
    }

    /// Steps 6–7: mel power spectrogram → dB → per-sample z-score.
    pub fn spectral(&self, pcm: &[f32]) -> FeatureTensor {
        let mut mel = self.front.power_mel(pcm);
        power_to_db(&mut mel);

        let n_mels = self.front.n_mels();
        let n_frames = self.front.n_frames(pcm.len());
        let mut tensor = FeatureTensor::from_mel_major(mel, n_mels, n_frames);
        tensor.normalize(self.norm_eps);
        tensor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
