//! Fixed-shape spectral feature tensor.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};

/// Safetensors key under which a single feature tensor is stored.
pub const FEATURE_KEY: &str = "mel";

/// A single-channel `(n_mels, n_frames)` decibel spectrogram, stored
/// mel-major (`data[m * n_frames + t]`).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    data: Vec<f32>,
    n_mels: usize,
    n_frames: usize,
}

impl FeatureTensor {
    /// Wrap a mel-major buffer.  Returns `None` when the length does not
    /// match `n_mels * n_frames`.
    pub fn new(data: Vec<f32>, n_mels: usize, n_frames: usize) -> Option<Self> {
        (data.len() == n_mels * n_frames).then_some(Self {
            data,
            n_mels,
            n_frames,
        })
    }

    /// Wrap a buffer produced by the mel front end, whose length is
    /// `n_mels * n_frames` by construction.
    pub(crate) fn from_mel_major(data: Vec<f32>, n_mels: usize, n_frames: usize) -> Self {
        debug_assert_eq!(data.len(), n_mels * n_frames);
        Self {
            data,
            n_mels,
            n_frames,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// `(n_mels, n_frames)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_mels, self.n_frames)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn get(&self, mel: usize, frame: usize) -> f32 {
        self.data[mel * self.n_frames + frame]
    }

    /// Zero mel bins `[start, start + width)` across every frame.
    pub fn zero_mel_band(&mut self, start: usize, width: usize) {
        let end = (start + width).min(self.n_mels);
        for m in start.min(end)..end {
            let row = m * self.n_frames;
            self.data[row..row + self.n_frames].fill(0.0);
        }
    }

    /// Zero frames `[start, start + width)` in every mel bin.
    pub fn zero_frame_band(&mut self, start: usize, width: usize) {
        let end = (start + width).min(self.n_frames);
        let start = start.min(end);
        for m in 0..self.n_mels {
            let row = m * self.n_frames;
            self.data[row + start..row + end].fill(0.0);
        }
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        (self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64) as f32
    }

    /// Sample standard deviation (Bessel-corrected).
    pub fn std(&self) -> f32 {
        let n = self.data.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean() as f64;
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / (n - 1) as f64;
        var.sqrt() as f32
    }

    /// Per-sample z-score: subtract the mean, divide by `std + eps`.
    ///
    /// A constant tensor becomes all zeros rather than an error.
    pub fn normalize(&mut self, eps: f32) {
        let mean = self.mean();
        let denom = self.std() + eps;
        for v in self.data.iter_mut() {
            *v = (*v - mean) / denom;
        }
    }

    /// Copy into a `[1, n_mels, n_frames]` tensor.
    pub fn to_tensor(&self, device: &Device) -> candle_core::Result<Tensor> {
        Tensor::from_slice(&self.data, (1, self.n_mels, self.n_frames), device)
    }

    /// Stack equally-shaped tensors into a `[batch, 1, n_mels, n_frames]`
    /// minibatch.
    pub fn stack(items: &[FeatureTensor], device: &Device) -> candle_core::Result<Tensor> {
        let Some(first) = items.first() else {
            candle_core::bail!("cannot stack an empty minibatch");
        };
        let (n_mels, n_frames) = first.shape();
        let mut flat = Vec::with_capacity(items.len() * n_mels * n_frames);
        for item in items {
            if item.shape() != (n_mels, n_frames) {
                candle_core::bail!(
                    "feature shape mismatch in minibatch: {:?} vs {:?}",
                    item.shape(),
                    (n_mels, n_frames)
                );
            }
            flat.extend_from_slice(&item.data);
        }
        Tensor::from_vec(flat, (items.len(), 1, n_mels, n_frames), device)
    }

    /// Write as a safetensors file with a single `mel` tensor.
    pub fn save(&self, path: &Path) -> candle_core::Result<()> {
        let tensors = HashMap::from([(FEATURE_KEY.to_string(), self.to_tensor(&Device::Cpu)?)]);
        candle_core::safetensors::save(&tensors, path)
    }

    /// Read a file written by [`save`](Self::save).
    pub fn load(path: &Path) -> candle_core::Result<Self> {
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
        let tensor = tensors
            .remove(FEATURE_KEY)
            .ok_or_else(|| candle_core::Error::Msg(format!("no `{FEATURE_KEY}` tensor")))?;
        let (_, n_mels, n_frames) = tensor.dims3()?;
        let data = tensor.flatten_all()?.to_vec1::<f32>()?;
        Ok(Self {
            data,
            n_mels,
            n_frames,
        })
    }
}
