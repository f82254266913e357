//! Feature extraction: fixed-length waveform → normalised mel spectrogram.
//!
//! # Pipeline
//!
//! ```text
//! AudioClip → mono → resample → fit_to_length → [WaveformAugment]
//!           → MelFrontEnd (power mel) → dB → z-score → FeatureTensor
//!                                                       → [SpecMask, per minibatch]
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rand::SeedableRng;
//! use voice_spoof_trainer::config::TrainConfig;
//! use voice_spoof_trainer::features::{FeatureExtractor, Mode};
//!
//! let extractor = FeatureExtractor::new(&TrainConfig::default());
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let mel = extractor
//!     .extract_file("data/raw/train/fake/x.wav".as_ref(), Mode::Eval, &mut rng)
//!     .unwrap();
//! assert_eq!(mel.shape(), (64, 188));
//! ```

pub mod augment;
pub mod extractor;
pub mod mel;
pub mod tensor;

pub use augment::{SpecMask, WaveformAugment};
pub use extractor::{fit_to_length, Crop, FeatureExtractor, Mode, Pipeline};
pub use mel::MelFrontEnd;
pub use tensor::{FeatureTensor, FEATURE_KEY};
