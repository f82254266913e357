//! Standalone feature preprocessing.
//!
//! Walks `<input>/{real,fake}/*.wav`, runs the
//! [`Pipeline::Preprocess`](crate::features::Pipeline::Preprocess) front end
//! (with energy trimming) and writes one safetensors file per clip:
//!
//! ```text
//! <input>/real/a.wav  →  <output>/real/a.safetensors   { "mel": [1, n_mels, n_frames] }
//! ```
//!
//! A clip that cannot be decoded aborts the run.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::decode_wav;
use crate::config::TrainConfig;
use crate::dataset::{self, DatasetError, Label};
use crate::features::{FeatureExtractor, Mode, Pipeline};

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("cannot create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },
}

/// Files written per class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessStats {
    pub real: usize,
    pub fake: usize,
}

/// Output path of the feature file for `wav` of class `label`.  Dots inside
/// the stem are kept, so `utt.1.wav` and `utt.2.wav` stay distinct.
pub fn output_path(output: &Path, label: Label, wav: &Path) -> PathBuf {
    let mut name = wav.file_stem().unwrap_or(wav.as_os_str()).to_os_string();
    name.push(".safetensors");
    output.join(label.dir_name()).join(name)
}

/// Preprocess every clip under `input` into `output`.
pub fn run(input: &Path, output: &Path, config: &TrainConfig) -> Result<PreprocessStats, PreprocessError> {
    let records = dataset::build(input)?;
    let extractor = FeatureExtractor::new(config);

    for label in Label::ALL {
        let dir = output.join(label.dir_name());
        std::fs::create_dir_all(&dir).map_err(|source| PreprocessError::CreateDir { path: dir, source })?;
    }

    let labels = records
        .par_iter()
        .map(|record| -> Result<Label, PreprocessError> {
            let clip = decode_wav(&record.path).map_err(|source| DatasetError::Decode {
                path: record.path.clone(),
                source,
            })?;
            // The preprocess pipeline draws no randomness.
            let features = extractor
                .extract_with(Pipeline::Preprocess, &clip, Mode::Eval, &mut StdRng::seed_from_u64(0))
                .map_err(|source| DatasetError::Decode {
                    path: record.path.clone(),
                    source,
                })?;

            let dst = output_path(output, record.label, &record.path);
            features
                .save(&dst)
                .map_err(|source| PreprocessError::Write { path: dst.clone(), source })?;
            log::debug!("preprocess: saved {}", dst.display());
            Ok(record.label)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stats = PreprocessStats {
        real: labels.iter().filter(|&&l| l == Label::Real).count(),
        fake: labels.iter().filter(|&&l| l == Label::Fake).count(),
    };
    log::info!(
        "preprocess: wrote {} real / {} fake feature files to {}",
        stats.real,
        stats.fake,
        output.display()
    );
    Ok(stats)
}
