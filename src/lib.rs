//! Real-vs-spoofed speech classifier trainer.
//!
//! # Module map
//!
//! ```text
//! staging ──▶ <root>/{real,fake}/*.wav
//!                    │
//!                    ▼
//! audio (decode, mono, resample, trim) ──▶ features (mel, normalise, augment)
//!                                                 │
//!              ┌──────────────────────────────────┤
//!              ▼                                  ▼
//!          preprocess                dataset (index, split, sampler)
//!     (<label>/<stem>.safetensors)                │
//!                                                 ▼
//!                                 train (loss, schedule, early stop) ◀── model (MelCnn)
//!                                                 │
//!                                                 ▼
//!                               <model_dir>/melcnn.safetensors + report
//! ```
//!
//! Everything is driven by a single [`config::TrainConfig`].

pub mod audio;
pub mod config;
pub mod dataset;
pub mod features;
pub mod model;
pub mod preprocess;
pub mod staging;
pub mod train;
