//! Configuration module.
//!
//! Provides `TrainConfig` (top-level settings), one sub-config per
//! subsystem, `RunPaths` for the on-disk layout of a run, and TOML
//! persistence via `TrainConfig::load_from` / `TrainConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::{RunPaths, CHECKPOINT_FILE, REPORT_FILE};
pub use settings::{
    AugmentConfig, ConfigError, FeatureConfig, LossKind, OptimConfig, PathsConfig, RunConfig,
    TrainConfig, VadConfig,
};
