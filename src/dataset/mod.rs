//! Labelled clip index, train/validation split and imbalance-aware sampling.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   real/*.wav   → Label::Real (target 0.0)
//!   fake/*.wav   → Label::Fake (target 1.0)
//! ```
//!
//! [`build`] scans a root once; [`AudioDataset`] wraps the records with a
//! shared [`FeatureExtractor`](crate::features::FeatureExtractor) and a
//! [`Mode`](crate::features::Mode) chosen at construction.

pub mod audio_dataset;
pub mod index;
pub mod label;
pub mod sampler;
pub mod split;

pub use audio_dataset::{AudioDataset, Batch, DatasetError};
pub use index::{build, ClassCounts, DatasetRecord};
pub use label::Label;
pub use sampler::{weights, WeightedSampler};
pub use split::{split, Split};
