//! Binary objectives over raw logits.
//!
//! | Kind  | Per-item loss |
//! |-------|---------------|
//! | Focal | `α_t · (1 − p_t)^γ · BCE(z, y)` |
//! | Bce   | `(1 − y)·z + (1 + (w − 1)·y) · softplus(−z)` with `w = real / fake` |
//!
//! `α` is the share of real clips in the training set, so the rarer `fake`
//! class gets the larger weight when real clips dominate.  Both reduce by
//! mean over the batch.

use candle_core::{Result, Tensor};

use crate::config::{LossKind, OptimConfig};
use crate::dataset::ClassCounts;

/// Loss selected for a run, with its imbalance weights fixed from the
/// training-set class counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Loss {
    pub kind: LossKind,
    /// Focal weight of the positive (`fake`) class.
    pub alpha: f32,
    /// Focal focusing exponent.
    pub gamma: f32,
    /// BCE weight of the positive class.
    pub pos_weight: f32,
    /// Target smoothing factor, applied during training only.
    pub label_smoothing: f32,
}

impl Loss {
    pub fn new(optim: &OptimConfig, counts: ClassCounts) -> Self {
        let alpha = if counts.total() == 0 {
            0.5
        } else {
            counts.real as f32 / counts.total() as f32
        };
        let pos_weight = if counts.fake == 0 {
            1.0
        } else {
            counts.real as f32 / counts.fake as f32
        };

        Self {
            kind: optim.loss,
            alpha,
            gamma: optim.focal_gamma,
            pos_weight,
            label_smoothing: optim.label_smoothing,
        }
    }

    /// Training loss: targets are smoothed toward 0.5 first.
    pub fn train(&self, logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
        if self.label_smoothing > 0.0 {
            let eps = self.label_smoothing as f64;
            let smoothed = targets.affine(1.0 - eps, 0.5 * eps)?;
            self.compute(logits, &smoothed)
        } else {
            self.compute(logits, targets)
        }
    }

    /// Validation loss on hard targets.
    pub fn eval(&self, logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
        self.compute(logits, targets)
    }

    fn compute(&self, logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
        match self.kind {
            LossKind::Focal => focal_with_logits(logits, targets, self.alpha, self.gamma),
            LossKind::Bce => bce_with_logits(logits, targets, self.pos_weight),
        }
    }
}

/// `softplus(−z) = log(1 + e^{−z})`, computed without overflow.
fn softplus_neg(z: &Tensor) -> Result<Tensor> {
    let tail = z.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    tail + z.neg()?.relu()?
}

/// Per-item BCE with logits and a positive-class weight.
fn bce_terms(logits: &Tensor, targets: &Tensor, pos_weight: f32) -> Result<Tensor> {
    let neg_part = ((1.0 - targets)? * logits)?;
    let weight = targets.affine(pos_weight as f64 - 1.0, 1.0)?;
    neg_part + (weight * softplus_neg(logits)?)?
}

/// Mean BCE with logits.  `pos_weight == 1` gives the unweighted loss.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor, pos_weight: f32) -> Result<Tensor> {
    bce_terms(logits, targets, pos_weight)?.mean_all()
}

/// Mean binary focal loss with logits.
pub fn focal_with_logits(logits: &Tensor, targets: &Tensor, alpha: f32, gamma: f32) -> Result<Tensor> {
    let bce = bce_terms(logits, targets, 1.0)?;

    let p = candle_nn::ops::sigmoid(logits)?;
    let one_minus_t = (1.0 - targets)?;
    let p_t = ((&p * targets)? + ((1.0 - &p)? * &one_minus_t)?)?;
    let alpha_t = targets.affine(2.0 * alpha as f64 - 1.0, 1.0 - alpha as f64)?;

    let weighted = (alpha_t * bce)?;
    let loss = if gamma > 0.0 {
        let modulator = (1.0 - p_t)?.clamp(1e-12f32, 1f32)?.powf(gamma as f64)?;
        (modulator * weighted)?
    } else {
        weighted
    };
    loss.mean_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn t(v: &[f32]) -> Tensor {
        Tensor::new(v, &Device::Cpu).unwrap()
    }

    fn scalar(x: Tensor) -> f32 {
        x.to_scalar::<f32>().unwrap()
    }

    const LN2: f32 = std::f32::consts::LN_2;

    #[test]
    fn bce_at_zero_logit_is_ln2() {
        let l = scalar(bce_with_logits(&t(&[0.0, 0.0]), &t(&[1.0, 0.0]), 1.0).unwrap());
        assert!((l - LN2).abs() < 1e-6);
    }

    #[test]
    fn bce_pos_weight_scales_positive_term_only() {
        let pos = scalar(bce_with_logits(&t(&[0.0]), &t(&[1.0]), 3.0).unwrap());
        let neg = scalar(bce_with_logits(&t(&[0.0]), &t(&[0.0]), 3.0).unwrap());
        assert!((pos - 3.0 * LN2).abs() < 1e-5);
        assert!((neg - LN2).abs() < 1e-6);
    }

    #[test]
    fn bce_is_stable_for_extreme_logits() {
        let l = scalar(bce_with_logits(&t(&[-100.0, 100.0]), &t(&[1.0, 1.0]), 1.0).unwrap());
        assert!(l.is_finite());
        assert!((l - 50.0).abs() < 1e-3);
    }

    #[test]
    fn focal_matches_hand_computation() {
        // p = 0.5, p_t = 0.5, α_t = 0.25 → 0.25 · 0.25 · ln 2
        let l = scalar(focal_with_logits(&t(&[0.0]), &t(&[1.0]), 0.25, 2.0).unwrap());
        assert!((l - 0.0625 * LN2).abs() < 1e-6);

        // negative target uses 1 − α
        let l = scalar(focal_with_logits(&t(&[0.0]), &t(&[0.0]), 0.25, 2.0).unwrap());
        assert!((l - 0.75 * 0.25 * LN2).abs() < 1e-6);
    }

    #[test]
    fn focal_down_weights_easy_examples() {
        let easy = scalar(focal_with_logits(&t(&[4.0]), &t(&[1.0]), 0.5, 2.0).unwrap());
        let bce = scalar(bce_with_logits(&t(&[4.0]), &t(&[1.0]), 1.0).unwrap());
        assert!(easy < 0.01 * bce);
    }

    #[test]
    fn focal_with_zero_gamma_is_alpha_weighted_bce() {
        let l = scalar(focal_with_logits(&t(&[0.3]), &t(&[1.0]), 0.5, 0.0).unwrap());
        let bce = scalar(bce_with_logits(&t(&[0.3]), &t(&[1.0]), 1.0).unwrap());
        assert!((l - 0.5 * bce).abs() < 1e-6);
    }

    #[test]
    fn weights_follow_class_counts() {
        let loss = Loss::new(&OptimConfig::default(), ClassCounts { real: 10, fake: 2 });
        assert!((loss.alpha - 10.0 / 12.0).abs() < 1e-6);
        assert!((loss.pos_weight - 5.0).abs() < 1e-6);

        let degenerate = Loss::new(&OptimConfig::default(), ClassCounts { real: 4, fake: 0 });
        assert_eq!(degenerate.pos_weight, 1.0);
    }

    #[test]
    fn smoothing_applies_to_training_only() {
        let optim = OptimConfig {
            loss: LossKind::Bce,
            label_smoothing: 0.2,
            ..OptimConfig::default()
        };
        let loss = Loss::new(&optim, ClassCounts { real: 1, fake: 1 });
        let (z, y) = (t(&[5.0]), t(&[1.0]));

        let smoothed = scalar(loss.train(&z, &y).unwrap());
        let hard = scalar(loss.eval(&z, &y).unwrap());
        // target 0.9 penalises a confident logit more than target 1.0
        assert!(smoothed > hard);
        let expected = scalar(bce_with_logits(&z, &t(&[0.9]), 1.0).unwrap());
        assert!((smoothed - expected).abs() < 1e-6);
    }
}
