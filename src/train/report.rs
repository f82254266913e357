//! Per-epoch statistics and the end-of-run report.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Termination;
use crate::dataset::ClassCounts;

/// Statistics of one completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub learning_rate: f64,
    /// Mean training loss over every sampled item.
    pub train_loss: f32,
    pub val_loss: f32,
    /// Fraction of validation clips classified correctly at p = 0.5.
    pub val_accuracy: f32,
    /// This epoch set a new best validation loss and was checkpointed.
    pub improved: bool,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Summary returned by [`Trainer::run`](super::Trainer::run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub termination: Termination,
    pub epochs_run: usize,
    /// 1-based epoch whose parameters are in the checkpoint.
    pub best_epoch: Option<usize>,
    pub best_val_loss: Option<f32>,
    /// `None` when no epoch produced a finite validation loss.
    pub checkpoint: Option<PathBuf>,
    pub train_counts: ClassCounts,
    pub val_counts: ClassCounts,
    pub history: Vec<EpochStats>,
}

impl TrainReport {
    /// Write as pretty-printed JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/train_report.json");
        let report = TrainReport {
            termination: Termination::Converged,
            epochs_run: 4,
            best_epoch: Some(1),
            best_val_loss: Some(0.25),
            checkpoint: Some(PathBuf::from("model/melcnn.safetensors")),
            train_counts: ClassCounts { real: 9, fake: 2 },
            val_counts: ClassCounts { real: 1, fake: 0 },
            history: vec![EpochStats {
                epoch: 1,
                learning_rate: 1e-3,
                train_loss: 0.5,
                val_loss: 0.25,
                val_accuracy: 1.0,
                improved: true,
                elapsed_ms: 12,
            }],
        };

        report.save_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"termination\": \"Converged\""));
        assert_eq!(TrainReport::load_from(&path).unwrap(), report);
    }
}
