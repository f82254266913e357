//! Imbalance-aware draw-with-replacement sampler.
//!
//! Each record is weighted by the size of the *other* class, so both classes
//! carry the same total mass `real × fake`:
//!
//! ```text
//!   8 real, 2 fake
//!   real record weight = 2   → real mass = 8 × 2 = 16
//!   fake record weight = 8   → fake mass = 2 × 8 = 16
//! ```
//!
//! An epoch is `len` independent draws, so some records repeat and some are
//! never visited.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use super::{ClassCounts, DatasetRecord};

/// Per-record draw weight: the opposite class's population.
pub fn weights(records: &[DatasetRecord]) -> Vec<f64> {
    let counts = ClassCounts::from_records(records);
    records
        .iter()
        .map(|r| counts.get(r.label.opposite()) as f64)
        .collect()
}

/// Draws `len` indices per epoch with replacement, proportionally to
/// [`weights`].
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    len: usize,
    /// `None` when every weight is zero (single-class data); draws are then
    /// uniform.
    dist: Option<WeightedIndex<f64>>,
}

impl WeightedSampler {
    pub fn new(records: &[DatasetRecord]) -> Self {
        let dist = WeightedIndex::new(weights(records)).ok();
        if dist.is_none() && !records.is_empty() {
            log::warn!("sampler: only one class present, drawing uniformly");
        }
        Self {
            len: records.len(),
            dist,
        }
    }

    /// Number of draws per epoch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_uniform(&self) -> bool {
        self.dist.is_none()
    }

    /// Indices for one epoch.
    pub fn epoch<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        match &self.dist {
            Some(dist) => (0..self.len).map(|_| dist.sample(rng)).collect(),
            None if self.len > 0 => (0..self.len).map(|_| rng.random_range(0..self.len)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Label;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn records(real: usize, fake: usize) -> Vec<DatasetRecord> {
        let make = |label, i| DatasetRecord {
            path: PathBuf::from(format!("{label}_{i}.wav")),
            label,
        };
        (0..real)
            .map(|i| make(Label::Real, i))
            .chain((0..fake).map(|i| make(Label::Fake, i)))
            .collect()
    }

    #[test]
    fn class_masses_are_equal() {
        for (p, f) in [(1, 1), (10, 2), (3, 97), (50, 7)] {
            let recs = records(p, f);
            let w = weights(&recs);
            let mass = |label| -> f64 {
                recs.iter()
                    .zip(&w)
                    .filter(|(r, _)| r.label == label)
                    .map(|(_, w)| w)
                    .sum()
            };
            assert_eq!(mass(Label::Real), (p * f) as f64);
            assert_eq!(mass(Label::Fake), (f * p) as f64);
        }
    }

    #[test]
    fn epoch_has_dataset_length() {
        let sampler = WeightedSampler::new(&records(10, 2));
        let idx = sampler.epoch(&mut StdRng::seed_from_u64(1));
        assert_eq!(idx.len(), 12);
        assert!(idx.iter().all(|&i| i < 12));
    }

    #[test]
    fn draws_are_balanced_in_expectation() {
        let recs = records(90, 10);
        let sampler = WeightedSampler::new(&recs);
        let mut rng = StdRng::seed_from_u64(3);

        let mut fake = 0usize;
        let mut total = 0usize;
        for _ in 0..200 {
            for i in sampler.epoch(&mut rng) {
                total += 1;
                if recs[i].label == Label::Fake {
                    fake += 1;
                }
            }
        }
        let share = fake as f64 / total as f64;
        assert!((share - 0.5).abs() < 0.03, "fake share {share}");
    }

    #[test]
    fn single_class_falls_back_to_uniform() {
        let sampler = WeightedSampler::new(&records(5, 0));
        assert!(sampler.is_uniform());
        assert_eq!(sampler.epoch(&mut StdRng::seed_from_u64(0)).len(), 5);
    }

    #[test]
    fn empty_dataset_draws_nothing() {
        let sampler = WeightedSampler::new(&[]);
        assert!(sampler.is_empty());
        assert!(sampler.epoch(&mut StdRng::seed_from_u64(0)).is_empty());
    }
}
