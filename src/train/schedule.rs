//! Epoch-indexed cosine annealing.

/// `lr(e) = min + (base − min) · (1 + cos(π · e / T)) / 2`
///
/// Stepped once per epoch: epoch 0 runs at `base`, and the rate reaches
/// `min` at `e = T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosineSchedule {
    base: f64,
    min: f64,
    period: usize,
}

impl CosineSchedule {
    pub fn new(base: f64, min: f64, period: usize) -> Self {
        Self {
            base,
            min,
            period: period.max(1),
        }
    }

    pub fn learning_rate(&self, epoch: usize) -> f64 {
        let progress = epoch.min(self.period) as f64 / self.period as f64;
        self.min + (self.base - self.min) * (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0
    }
}
