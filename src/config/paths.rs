//! On-disk layout of a training run.
//!
//! Layout:
//!
//! Data roots (consumed):
//!   <data_root>/real/*.wav
//!   <data_root>/fake/*.wav
//!   <val_root>/{real,fake}/*.wav      (optional held-out split)
//!
//! Model dir (produced):
//!   <model_dir>/melcnn.safetensors    (single best checkpoint, overwritten)
//!   <model_dir>/train_report.json

use std::path::{Path, PathBuf};

use super::PathsConfig;

/// File name of the single best-checkpoint slot.
pub const CHECKPOINT_FILE: &str = "melcnn.safetensors";
/// File name of the JSON training report written by the binary.
pub const REPORT_FILE: &str = "train_report.json";

/// Holds all resolved paths of one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    /// Training root holding `real/` and `fake/`.
    pub data_root: PathBuf,
    /// Held-out validation root, if one was configured.
    pub val_root: Option<PathBuf>,
    /// Directory for the checkpoint and report.
    pub model_dir: PathBuf,
    /// Full path to the checkpoint slot.
    pub checkpoint_file: PathBuf,
    /// Full path to the training report.
    pub report_file: PathBuf,
}

impl RunPaths {
    /// Resolves every path from the `[paths]` config section.
    pub fn new(cfg: &PathsConfig) -> Self {
        Self {
            data_root: cfg.data_root.clone(),
            val_root: cfg.val_root.clone(),
            checkpoint_file: cfg.model_dir.join(CHECKPOINT_FILE),
            report_file: cfg.model_dir.join(REPORT_FILE),
            model_dir: cfg.model_dir.clone(),
        }
    }

    /// Validation root when it exists as a directory.  Whether it holds any
    /// audio is decided by the dataset scan.
    pub fn existing_val_root(&self) -> Option<&Path> {
        self.val_root.as_deref().filter(|p| p.is_dir())
    }
}
