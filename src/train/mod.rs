//! Training loop, objectives, schedule, early stopping and checkpointing.
//!
//! # Architecture
//!
//! ```text
//! TrainConfig ──▶ Trainer::new ──────────────────────────── [Initializing]
//!                   │  AudioDataset (train, Mode::Train) + WeightedSampler
//!                   │  AudioDataset (val,   Mode::Eval)
//!                   │  MelCnn + AdamW + CosineSchedule + Loss
//!                   ▼
//!                 Trainer::run
//!                   ├─ TrainEpoch(e)    minibatches → backward → step
//!                   ├─ ValidateEpoch(e) evaluate → TrainingState::observe
//!                   │      └─ improved → CheckpointStore::save (single slot)
//!                   └─ Converged | ExhaustedEpochs → TrainReport
//! ```

pub mod checkpoint;
pub mod loss;
pub mod report;
pub mod schedule;
pub mod state;
pub mod trainer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use checkpoint::{CheckpointError, CheckpointStore};
pub use loss::{bce_with_logits, focal_with_logits, Loss};
pub use report::{EpochStats, TrainReport};
pub use schedule::CosineSchedule;
pub use state::{EpochVerdict, Termination, TrainingPhase, TrainingState};
pub use trainer::{evaluate, Evaluation, TrainError, Trainer};
