//! Deterministic train/validation partition of a single record list.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::DatasetRecord;
use crate::config::ConfigError;

/// Result of [`split`].
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<DatasetRecord>,
    pub val: Vec<DatasetRecord>,
}

/// Carve a validation partition of `round(n × ratio)` records (at least one)
/// out of `records`.
///
/// Records are sorted by path and shuffled with `seed`, so the same inputs
/// always produce the same partition.  Fails when nothing would be left to
/// train on.
pub fn split(
    mut records: Vec<DatasetRecord>,
    ratio: f32,
    seed: u64,
) -> Result<Split, ConfigError> {
    let total = records.len();
    if total == 0 {
        return Err(ConfigError::EmptyTrainingSet(
            "no records to split".to_string(),
        ));
    }

    let n_val = ((total as f64 * ratio as f64).round() as usize).max(1);
    if n_val >= total {
        return Err(ConfigError::SplitLeavesNoTraining { total, val: n_val });
    }

    records.sort();
    records.shuffle(&mut StdRng::seed_from_u64(seed));

    let train = records.split_off(n_val);
    Ok(Split {
        train,
        val: records,
    })
}
