//! Three-stage convolutional classifier over mel spectrograms.
//!
//! # Architecture
//!
//! ```text
//! Input: features [batch, 1, n_mels, n_frames]
//!        ↓
//! features.0  Conv2d(1 → 32, 3×3, pad 1) → features.1 BatchNorm → ReLU → MaxPool 2
//! features.4  Conv2d(32 → 64, 3×3, pad 1) → features.5 BatchNorm → ReLU → MaxPool 2
//! features.8  Conv2d(64 → 128, 3×3, pad 1) → features.9 BatchNorm → ReLU → mean over (H, W)
//!        ↓
//! Dropout 0.6 → classifier.2 Linear(128 → 64) → ReLU → Dropout 0.4 → classifier.5 Linear(64 → 1)
//!        ↓
//! Output: logits [batch]
//! ```
//!
//! The global average over both spatial axes makes the network independent
//! of the number of time frames.  No sigmoid is applied; the losses consume
//! raw logits.

use candle_core::{Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, linear, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Dropout, Linear,
    Module, ModuleT, VarBuilder,
};

const KERNEL: usize = 3;
const PADDING: usize = 1;
const WIDTHS: [usize; 3] = [32, 64, 128];
const HIDDEN: usize = 64;
const DROPOUT_IN: f32 = 0.6;
const DROPOUT_HIDDEN: f32 = 0.4;

// ---------------------------------------------------------------------------
// ConvStage
// ---------------------------------------------------------------------------

/// Conv → BatchNorm → ReLU, followed by 2× max-pooling or a global average.
struct ConvStage {
    conv: Conv2d,
    norm: BatchNorm,
    pool: bool,
}

impl ConvStage {
    /// `conv_idx` is the index of the convolution in the `features`
    /// sequence; its norm sits at `conv_idx + 1`.
    fn new(vb: &VarBuilder, conv_idx: usize, c_in: usize, c_out: usize, pool: bool) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: PADDING,
            ..Default::default()
        };
        Ok(Self {
            conv: conv2d(c_in, c_out, KERNEL, cfg, vb.pp(conv_idx))?,
            norm: batch_norm(c_out, BatchNormConfig::default(), vb.pp(conv_idx + 1))?,
            pool,
        })
    }

    fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.conv.forward(x)?;
        let x = self.norm.forward_t(&x, train)?.relu()?;
        if self.pool {
            x.max_pool2d(2)
        } else {
            x.mean((2, 3))
        }
    }
}

// ---------------------------------------------------------------------------
// MelCnn
// ---------------------------------------------------------------------------

/// Real-vs-fake classifier.  Build it from a `VarBuilder` backed by a
/// `VarMap` so the same map can be optimised, saved and reloaded.
pub struct MelCnn {
    stages: [ConvStage; 3],
    dropout_in: Dropout,
    fc1: Linear,
    dropout_hidden: Dropout,
    fc2: Linear,
}

impl MelCnn {
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let f = vb.pp("features");
        let stages = [
            ConvStage::new(&f, 0, 1, WIDTHS[0], true)?,
            ConvStage::new(&f, 4, WIDTHS[0], WIDTHS[1], true)?,
            ConvStage::new(&f, 8, WIDTHS[1], WIDTHS[2], false)?,
        ];

        let c = vb.pp("classifier");
        Ok(Self {
            stages,
            dropout_in: Dropout::new(DROPOUT_IN),
            fc1: linear(WIDTHS[2], HIDDEN, c.pp(2))?,
            dropout_hidden: Dropout::new(DROPOUT_HIDDEN),
            fc2: linear(HIDDEN, 1, c.pp(5))?,
        })
    }

    /// Raw logits of shape `[batch]`.
    ///
    /// `train` switches batch statistics and dropout on; evaluation uses the
    /// running statistics and is deterministic.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let mut x = x.clone();
        for stage in &self.stages {
            x = stage.forward_t(&x, train)?;
        }

        let x = self.dropout_in.forward(&x, train)?;
        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.dropout_hidden.forward(&x, train)?;
        self.fc2.forward(&x)?.squeeze(1)
    }

    /// Probability of the `fake` class, `sigmoid(logit)`, in evaluation mode.
    pub fn predict_proba(&self, x: &Tensor) -> Result<Tensor> {
        candle_nn::ops::sigmoid(&self.forward_t(x, false)?)
    }
}

impl ModuleT for MelCnn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        MelCnn::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn model() -> (VarMap, MelCnn) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = MelCnn::new(vb).unwrap();
        (varmap, model)
    }

    #[test]
    fn logits_have_batch_shape() {
        let (_, model) = model();
        let x = Tensor::randn(0f32, 1.0, (3, 1, 64, 188), &Device::Cpu).unwrap();
        assert_eq!(model.forward_t(&x, false).unwrap().dims(), &[3]);
        assert_eq!(model.forward_t(&x, true).unwrap().dims(), &[3]);
    }

    #[test]
    fn tolerates_any_frame_count() {
        let (_, model) = model();
        for frames in [17, 63, 250] {
            let x = Tensor::zeros((2, 1, 64, frames), DType::F32, &Device::Cpu).unwrap();
            assert_eq!(model.forward_t(&x, false).unwrap().dims(), &[2]);
        }
    }

    #[test]
    fn eval_forward_is_deterministic() {
        let (_, model) = model();
        let x = Tensor::randn(0f32, 1.0, (2, 1, 32, 40), &Device::Cpu).unwrap();
        let a = model.forward_t(&x, false).unwrap().to_vec1::<f32>().unwrap();
        let b = model.forward_t(&x, false).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn probabilities_are_in_unit_interval() {
        let (_, model) = model();
        let x = Tensor::randn(0f32, 1.0, (4, 1, 32, 40), &Device::Cpu).unwrap();
        let p = model.predict_proba(&x).unwrap().to_vec1::<f32>().unwrap();
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn parameter_names_follow_layer_indices() {
        let (varmap, _) = model();
        let data = varmap.data().lock().unwrap();
        for key in [
            "features.0.weight",
            "features.0.bias",
            "features.1.weight",
            "features.1.bias",
            "features.1.running_mean",
            "features.1.running_var",
            "features.4.weight",
            "features.5.running_var",
            "features.8.weight",
            "features.9.bias",
            "classifier.2.weight",
            "classifier.5.bias",
        ] {
            assert!(data.contains_key(key), "missing {key}");
        }
        assert_eq!(data["classifier.2.weight"].dims(), &[64, 128]);
        assert_eq!(data["classifier.5.weight"].dims(), &[1, 64]);
        assert_eq!(data["features.8.weight"].dims(), &[128, 64, 3, 3]);
    }
}
