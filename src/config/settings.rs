//! Training configuration structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to every
//! component by reference.  Missing fields in a TOML file fall back to the
//! defaults of their section.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A configuration value that cannot start a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric field is outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    /// The loss name is not one of `focal` / `bce`.
    #[error("unknown loss `{0}` (expected `focal` or `bce`)")]
    UnknownLoss(String),

    /// No usable training samples were found.
    #[error("training set is empty: {0}")]
    EmptyTrainingSet(String),

    /// The train/validation split would leave the training partition empty.
    #[error("validation split of {val} out of {total} samples leaves no training samples")]
    SplitLeavesNoTraining { total: usize, val: usize },
}

fn out_of_range(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// LossKind
// ---------------------------------------------------------------------------

/// Objective optimised by the training loop.
///
/// | Variant | Loss |
/// |---------|------|
/// | Focal   | `α_t · (1 − p_t)^γ · BCE` |
/// | Bce     | binary cross-entropy with a positive-class weight |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    Focal,
    Bce,
}

impl Default for LossKind {
    fn default() -> Self {
        Self::Focal
    }
}

impl FromStr for LossKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focal" => Ok(Self::Focal),
            "bce" => Ok(Self::Bce),
            other => Err(ConfigError::UnknownLoss(other.to_string())),
        }
    }
}

impl std::fmt::Display for LossKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Focal => write!(f, "focal"),
            Self::Bce => write!(f, "bce"),
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Spectral front-end settings.  These define the fixed tensor shape and must
/// not change between training and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Target sample rate in Hz; every clip is resampled to it.
    pub sample_rate: u32,
    /// Fixed clip duration in seconds.
    pub clip_seconds: f32,
    /// FFT size (and window length) of the short-time transform.
    pub n_fft: usize,
    /// Hop between successive frames, in samples.
    pub hop_length: usize,
    /// Number of mel bins.
    pub n_mels: usize,
    /// Added to the standard deviation during per-sample normalisation.
    pub norm_eps: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            clip_seconds: 3.0,
            n_fft: 1024,
            hop_length: 256,
            n_mels: 64,
            norm_eps: 1e-5,
        }
    }
}

impl FeatureConfig {
    /// Number of waveform samples in one fixed-length clip.
    pub fn target_len(&self) -> usize {
        (self.sample_rate as f64 * self.clip_seconds as f64).round() as usize
    }

    /// Number of spectrogram frames produced from one fixed-length clip
    /// (centred framing: `target_len / hop + 1`).
    pub fn n_frames(&self) -> usize {
        self.target_len() / self.hop_length + 1
    }
}

// ---------------------------------------------------------------------------
// AugmentConfig
// ---------------------------------------------------------------------------

/// Training-only augmentation.  Evaluation never applies any of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Random gain + additive Gaussian noise on the cropped waveform.
    pub waveform: bool,
    /// Lower bound of the uniform gain factor.
    pub gain_min: f32,
    /// Upper bound of the uniform gain factor.
    pub gain_max: f32,
    /// Standard deviation of the additive noise.
    pub noise_std: f32,
    /// Minibatch-level frequency/time masking of the normalised features.
    pub spec_mask: bool,
    /// Maximum width of the frequency mask, in mel bins.
    pub freq_mask_max: usize,
    /// Maximum width of the time mask, in frames.
    pub time_mask_max: usize,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            waveform: true,
            gain_min: 0.8,
            gain_max: 1.2,
            noise_std: 0.003,
            spec_mask: true,
            freq_mask_max: 8,
            time_mask_max: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// VadConfig
// ---------------------------------------------------------------------------

/// Energy trim used by the standalone preprocessing pipeline only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Frames whose energy is above this level (dBFS) count as voice.
    pub threshold_db: f32,
    /// Envelope frame length in samples; `1` gives a per-sample envelope.
    pub frame_len: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            frame_len: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// OptimConfig
// ---------------------------------------------------------------------------

/// Optimiser, schedule, loss and stopping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    /// Epoch budget; also the period of the cosine schedule.
    pub epochs: usize,
    pub batch_size: usize,
    /// Initial AdamW learning rate.
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Floor of the cosine schedule.
    pub min_learning_rate: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    pub loss: LossKind,
    /// Focusing exponent γ of the focal loss.
    pub focal_gamma: f32,
    /// Blend factor pulling each binary target toward 0.5 (0 disables).
    pub label_smoothing: f32,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            epochs: 25,
            batch_size: 32,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            min_learning_rate: 0.0,
            patience: 12,
            loss: LossKind::default(),
            focal_gamma: 2.0,
            label_smoothing: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Per-run execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Fraction of the training set held out when no validation directory
    /// is available.  Clamped to `[0.01, 0.5]` by [`TrainConfig::validate`].
    pub val_ratio: f32,
    /// Seed of the deterministic train/validation split.
    pub split_seed: u64,
    /// Seed for augmentation, cropping and sampling.  `None` draws one from
    /// the OS.
    pub seed: Option<u64>,
    /// Data-loading worker threads; `0` uses the available parallelism.
    pub workers: usize,
    /// Run the numeric kernels on the first CUDA device when available.
    pub use_gpu: bool,
    /// Checkpoint to resume from.
    pub resume: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            val_ratio: 0.1,
            split_seed: 42,
            seed: None,
            workers: 0,
            use_gpu: false,
            resume: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Training root holding `real/` and `fake/`.
    pub data_root: PathBuf,
    /// Held-out validation root with the same layout.
    pub val_root: Option<PathBuf>,
    /// Directory receiving the checkpoint and the training report.
    pub model_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/raw/train"),
            val_root: None,
            model_dir: PathBuf::from("model"),
        }
    }
}

// ---------------------------------------------------------------------------
// TrainConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration of a training run, serialised as TOML.
///
/// Construct once at run start, call [`validate`](Self::validate), then pass
/// by reference to every component.
///
/// ```rust,no_run
/// use voice_spoof_trainer::config::TrainConfig;
///
/// let config = TrainConfig::load_from("train.toml".as_ref())
///     .unwrap()
///     .validate()
///     .unwrap();
/// assert!(config.run.val_ratio >= 0.01);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub features: FeatureConfig,
    pub augment: AugmentConfig,
    pub vad: VadConfig,
    pub optim: OptimConfig,
    pub run: RunConfig,
    pub paths: PathsConfig,
}

impl TrainConfig {
    /// Load from `path`.  Returns `Ok(TrainConfig::default())` when the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every field against its allowed range and return the validated
    /// record.  The validation ratio is clamped rather than rejected.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let f = &self.features;
        if f.sample_rate == 0 {
            return Err(out_of_range("features.sample_rate", "must be > 0"));
        }
        if !(f.clip_seconds > 0.0) {
            return Err(out_of_range("features.clip_seconds", "must be > 0"));
        }
        if f.n_fft < 2 {
            return Err(out_of_range("features.n_fft", "must be >= 2"));
        }
        if f.hop_length == 0 {
            return Err(out_of_range("features.hop_length", "must be > 0"));
        }
        if f.n_mels == 0 {
            return Err(out_of_range("features.n_mels", "must be > 0"));
        }
        if !(f.norm_eps > 0.0) {
            return Err(out_of_range("features.norm_eps", "must be > 0"));
        }
        if f.target_len() == 0 {
            return Err(out_of_range("features.clip_seconds", "clip is shorter than one sample"));
        }

        let a = &self.augment;
        if !(a.gain_min > 0.0 && a.gain_min <= a.gain_max) {
            return Err(out_of_range(
                "augment.gain_min",
                format!("need 0 < gain_min <= gain_max, got {}..{}", a.gain_min, a.gain_max),
            ));
        }
        if !(a.noise_std >= 0.0) {
            return Err(out_of_range("augment.noise_std", "must be >= 0"));
        }

        if self.vad.frame_len == 0 {
            return Err(out_of_range("vad.frame_len", "must be > 0"));
        }

        let o = &self.optim;
        if o.epochs == 0 {
            return Err(out_of_range("optim.epochs", "must be > 0"));
        }
        if o.batch_size == 0 {
            return Err(out_of_range("optim.batch_size", "must be > 0"));
        }
        if !(o.learning_rate > 0.0) {
            return Err(out_of_range("optim.learning_rate", "must be > 0"));
        }
        if !(o.weight_decay >= 0.0) {
            return Err(out_of_range("optim.weight_decay", "must be >= 0"));
        }
        if !(o.min_learning_rate >= 0.0 && o.min_learning_rate <= o.learning_rate) {
            return Err(out_of_range(
                "optim.min_learning_rate",
                "must be within [0, learning_rate]",
            ));
        }
        if o.patience == 0 {
            return Err(out_of_range("optim.patience", "must be > 0"));
        }
        if !(o.focal_gamma >= 0.0) {
            return Err(out_of_range("optim.focal_gamma", "must be >= 0"));
        }
        if !(0.0..1.0).contains(&o.label_smoothing) {
            return Err(out_of_range("optim.label_smoothing", "must be within [0, 1)"));
        }

        if self.run.val_ratio.is_nan() {
            return Err(out_of_range("run.val_ratio", "must be a number"));
        }
        self.run.val_ratio = self.run.val_ratio.clamp(0.01, 0.5);

        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
