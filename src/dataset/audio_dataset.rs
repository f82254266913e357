//! [`AudioDataset`]: indexed records plus a shared extractor and a fixed mode.

use std::path::PathBuf;
use std::sync::Arc;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

use super::{ClassCounts, DatasetRecord, Label};
use crate::audio::DecodeError;
use crate::features::{FeatureExtractor, FeatureTensor, Mode};

// ---------------------------------------------------------------------------
// DatasetError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset root does not exist or is not a directory.
    #[error("dataset root {0} is not a directory")]
    MissingRoot(PathBuf),

    /// Listing a class directory failed.
    #[error("cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An item could not be decoded.  Fatal during training.
    #[error("cannot load {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// A label token other than `real` / `fake`.
    #[error("unknown label `{0}`")]
    UnknownLabel(String),

    #[error("index {index} out of range for dataset of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Extracted minibatch before it is moved to the device.
#[derive(Debug, Clone)]
pub struct Batch {
    pub features: Vec<FeatureTensor>,
    pub labels: Vec<Label>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `([B, 1, n_mels, n_frames], [B])` input and target tensors.
    pub fn to_tensors(&self, device: &Device) -> candle_core::Result<(Tensor, Tensor)> {
        let inputs = FeatureTensor::stack(&self.features, device)?;
        let targets: Vec<f32> = self.labels.iter().map(|l| l.as_target()).collect();
        let targets = Tensor::from_vec(targets, self.labels.len(), device)?;
        Ok((inputs, targets))
    }
}

// ---------------------------------------------------------------------------
// AudioDataset
// ---------------------------------------------------------------------------

/// A labelled clip collection with a fixed extraction mode.
///
/// Items are decoded and extracted on every access, so training-mode crops
/// and augmentation are redrawn each epoch.
#[derive(Debug, Clone)]
pub struct AudioDataset {
    records: Vec<DatasetRecord>,
    extractor: Arc<FeatureExtractor>,
    mode: Mode,
    counts: ClassCounts,
}

impl AudioDataset {
    pub fn new(records: Vec<DatasetRecord>, extractor: Arc<FeatureExtractor>, mode: Mode) -> Self {
        let counts = ClassCounts::from_records(&records);
        Self {
            records,
            extractor,
            mode,
            counts,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    /// Class population, tallied once at construction.
    pub fn class_counts(&self) -> ClassCounts {
        self.counts
    }

    /// Extract item `index`.
    pub fn get<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> Result<(FeatureTensor, Label), DatasetError> {
        let record = self
            .records
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })?;

        let features = self
            .extractor
            .extract_file(&record.path, self.mode, rng)
            .map_err(|source| DatasetError::Decode {
                path: record.path.clone(),
                source,
            })?;
        Ok((features, record.label))
    }

    /// Extract `indices` concurrently on the current rayon pool.
    ///
    /// Each item gets its own generator seeded from `rng`, so the result
    /// does not depend on worker scheduling.  The first failing item aborts
    /// the batch.
    pub fn load_batch<R: Rng + ?Sized>(
        &self,
        indices: &[usize],
        rng: &mut R,
    ) -> Result<Batch, DatasetError> {
        let seeds: Vec<u64> = indices.iter().map(|_| rng.random()).collect();

        let items: Vec<(FeatureTensor, Label)> = indices
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(&i, &seed)| self.get(i, &mut StdRng::seed_from_u64(seed)))
            .collect::<Result<_, _>>()?;

        let (features, labels) = items.into_iter().unzip();
        Ok(Batch { features, labels })
    }
}
