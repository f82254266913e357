//! Staging of a labelled corpus into `<output>/<subset>/{real,fake}/*.wav`.
//!
//! ```text
//! metadata ──▶ parse_metadata ──▶ map_label ──┬─ unknown ─────────▶ skipped
//!                                             ├─ source missing ──▶ skipped
//!                                             ├─ undecodable ─────▶ skipped
//!                                             └─ decode → mono → resample → PCM16 WAV
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::metadata::{parse_metadata, DEFAULT_ID_PREFIX};
use crate::audio::{decode_file, resample, to_mono, write_wav_pcm16, EncodeError};
use crate::dataset::Label;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("cannot read metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Everything one staging run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub metadata: PathBuf,
    /// Directory holding `<utt_id><extension>` source files.
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// Split name, e.g. `train`, `dev`.
    pub subset: String,
    pub sample_rate: u32,
    /// Source file extension including the dot; `.flac` and `.wav` decode.
    pub extension: String,
    pub id_prefix: String,
    /// Stop once this many files are staged.  `None` or `Some(0)` stages
    /// everything.
    pub limit: Option<usize>,
}

impl Default for StageRequest {
    fn default() -> Self {
        Self {
            metadata: PathBuf::new(),
            source_root: PathBuf::new(),
            output_root: PathBuf::from("data/raw"),
            subset: "train".to_string(),
            sample_rate: 16_000,
            extension: ".flac".to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            limit: None,
        }
    }
}

impl StageRequest {
    pub fn subset_dir(&self) -> PathBuf {
        self.output_root.join(&self.subset)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub real: usize,
    pub fake: usize,
    pub skipped: usize,
}

impl StageStats {
    pub fn staged(&self) -> usize {
        self.real + self.fake
    }

    fn record(&mut self, label: Label) {
        match label {
            Label::Real => self.real += 1,
            Label::Fake => self.fake += 1,
        }
    }
}

impl std::fmt::Display for StageStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} real / {} fake / {} skipped", self.real, self.fake, self.skipped)
    }
}

/// Stage every usable metadata entry, in file order.
///
/// Entries with an unknown label, a missing source or an undecodable source
/// are logged and counted as skipped.  Write failures abort the run.
pub fn stage_subset(request: &StageRequest) -> Result<StageStats, StageError> {
    let entries = parse_metadata(&request.metadata, &request.id_prefix).map_err(|source| {
        StageError::Metadata {
            path: request.metadata.clone(),
            source,
        }
    })?;
    let limit = request.limit.filter(|&l| l > 0);
    let target = request.subset_dir();

    log::info!(
        "stage: {} entries from {} → {}",
        entries.len(),
        request.metadata.display(),
        target.display()
    );

    let mut stats = StageStats::default();
    for entry in &entries {
        let Some(label) = entry.label() else {
            log::warn!("stage: unknown label `{}` for {} (skipped)", entry.label_token, entry.utt_id);
            stats.skipped += 1;
            continue;
        };

        let src = request
            .source_root
            .join(format!("{}{}", entry.utt_id, request.extension));
        if !src.is_file() {
            log::warn!("stage: missing file {} (skipped)", src.display());
            stats.skipped += 1;
            continue;
        }

        let clip = match decode_file(&src) {
            Ok(clip) => clip,
            Err(e) => {
                log::warn!("stage: {e} (skipped)");
                stats.skipped += 1;
                continue;
            }
        };
        let mono = to_mono(&clip.samples, clip.channels);
        let pcm = match resample(&mono, clip.sample_rate, request.sample_rate) {
            Ok(pcm) => pcm,
            Err(e) => {
                log::warn!("stage: {} in {} (skipped)", e, src.display());
                stats.skipped += 1;
                continue;
            }
        };

        let dir = target.join(label.dir_name());
        std::fs::create_dir_all(&dir).map_err(|source| StageError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let dst = dir.join(format!("{}.wav", entry.utt_id));
        write_wav_pcm16(&dst, &pcm, request.sample_rate)?;
        stats.record(label);

        if limit.is_some_and(|l| stats.staged() >= l) {
            log::info!("stage: limit of {} files reached", stats.staged());
            break;
        }
    }

    log::info!("stage: staged {} subset: {}", request.subset, stats);
    Ok(stats)
}
