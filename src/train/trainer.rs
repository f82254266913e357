//! Training loop.  Drives [`TrainingState`] from `Initializing` to a
//! terminal phase.
//!
//! # Flow
//!
//! ```text
//! Trainer::new(config)                                  [Initializing]
//!   ├─ validate config, pick device, start worker pool
//!   ├─ scan data root; held-out root or seeded split
//!   ├─ MelCnn on a fresh VarMap (optionally resumed)
//!   └─ Loss from class counts, AdamW, cosine schedule
//!
//! Trainer::run()
//!   loop:
//!     sampler.epoch → minibatches → [SpecMask] → forward → loss → AdamW   [TrainEpoch(e)]
//!     evaluate(val set, centre crop, no augmentation)                      [ValidateEpoch(e)]
//!     improved? → CheckpointStore::save
//!   until Converged | ExhaustedEpochs
//! ```
//!
//! Data loading runs on a dedicated rayon pool; everything else runs on the
//! calling thread.

use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use super::checkpoint::{CheckpointError, CheckpointStore};
use super::loss::Loss;
use super::report::{EpochStats, TrainReport};
use super::schedule::CosineSchedule;
use super::state::{Termination, TrainingPhase, TrainingState};
use crate::config::{ConfigError, RunPaths, TrainConfig};
use crate::dataset::{self, AudioDataset, DatasetError, DatasetRecord, Label, WeightedSampler};
use crate::features::{FeatureExtractor, Mode, SpecMask};
use crate::model::MelCnn;

// ---------------------------------------------------------------------------
// TrainError
// ---------------------------------------------------------------------------

/// Anything that ends a run abnormally.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("cannot start data-loading workers: {0}")]
    Workers(#[from] rayon::ThreadPoolBuildError),

    /// Evaluation was asked to average over zero clips.
    #[error("evaluation set is empty")]
    EmptyEvaluationSet,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Aggregate validation metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean loss on hard targets.
    pub loss: f32,
    /// Fraction classified correctly with the decision threshold at 0.5.
    pub accuracy: f32,
}

/// Forward-only pass over `dataset` in evaluation mode.
///
/// Deterministic for a dataset in [`Mode::Eval`].  Runs data loading on the
/// current rayon pool.
pub fn evaluate(
    model: &MelCnn,
    dataset: &AudioDataset,
    loss: &Loss,
    batch_size: usize,
    device: &Device,
) -> Result<Evaluation, TrainError> {
    let n = dataset.len();
    if n == 0 {
        return Err(TrainError::EmptyEvaluationSet);
    }

    let indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(0);

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    for chunk in indices.chunks(batch_size.max(1)) {
        let batch = dataset.load_batch(chunk, &mut rng)?;
        let (x, y) = batch.to_tensors(device)?;
        let logits = model.forward_t(&x, false)?;

        loss_sum += loss.eval(&logits, &y)?.to_scalar::<f32>()? as f64 * batch.len() as f64;
        correct += logits
            .to_vec1::<f32>()?
            .iter()
            .zip(&batch.labels)
            .filter(|&(&z, &label)| (z >= 0.0) == (label == Label::Fake))
            .count();
    }

    Ok(Evaluation {
        loss: (loss_sum / n as f64) as f32,
        accuracy: correct as f32 / n as f32,
    })
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// One training run.
///
/// ```rust,no_run
/// use voice_spoof_trainer::config::TrainConfig;
/// use voice_spoof_trainer::train::Trainer;
///
/// let report = Trainer::new(TrainConfig::default()).unwrap().run().unwrap();
/// println!("{:?} after {} epochs", report.termination, report.epochs_run);
/// ```
pub struct Trainer {
    config: TrainConfig,
    device: Device,
    varmap: VarMap,
    model: MelCnn,
    optimizer: AdamW,
    train_set: AudioDataset,
    val_set: AudioDataset,
    sampler: WeightedSampler,
    loss: Loss,
    schedule: CosineSchedule,
    store: CheckpointStore,
    spec_mask: Option<SpecMask>,
    pool: rayon::ThreadPool,
    rng: StdRng,
    state: TrainingState,
}

impl Trainer {
    /// Build everything a run needs.  Fails before any epoch on an invalid
    /// configuration, an unusable data layout or an incompatible resume
    /// checkpoint.
    pub fn new(config: TrainConfig) -> Result<Self, TrainError> {
        let config = config.validate()?;
        let state = TrainingState::new(config.optim.epochs, config.optim.patience);
        log::info!("train: phase → {}", state.phase().label());

        let paths = RunPaths::new(&config.paths);
        let device = if config.run.use_gpu {
            Device::cuda_if_available(0)?
        } else {
            Device::Cpu
        };
        log::info!("train: device {:?}", device);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.run.workers)
            .thread_name(|i| format!("loader-{i}"))
            .build()?;

        let (train_records, val_records) = resolve_records(&config, &paths)?;
        let extractor = Arc::new(FeatureExtractor::new(&config));
        let train_set = AudioDataset::new(train_records, Arc::clone(&extractor), Mode::Train);
        let val_set = AudioDataset::new(val_records, extractor, Mode::Eval);
        log::info!(
            "train: {} training clips ({}), {} validation clips ({})",
            train_set.len(),
            train_set.class_counts(),
            val_set.len(),
            val_set.class_counts()
        );

        let sampler = WeightedSampler::new(train_set.records());
        let loss = Loss::new(&config.optim, train_set.class_counts());
        log::info!(
            "train: {} loss (alpha {:.3}, gamma {}, pos_weight {:.3}, smoothing {})",
            loss.kind,
            loss.alpha,
            loss.gamma,
            loss.pos_weight,
            loss.label_smoothing
        );

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = MelCnn::new(vb)?;
        if let Some(resume) = &config.run.resume {
            CheckpointStore::new(resume).load_into(&varmap)?;
            log::info!("train: resumed from {}", resume.display());
        }

        let params = ParamsAdamW {
            lr: config.optim.learning_rate,
            weight_decay: config.optim.weight_decay,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        let schedule = CosineSchedule::new(
            config.optim.learning_rate,
            config.optim.min_learning_rate,
            config.optim.epochs,
        );

        let rng = match config.run.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let spec_mask = config
            .augment
            .spec_mask
            .then(|| SpecMask::from_config(&config.augment));

        Ok(Self {
            store: CheckpointStore::new(paths.checkpoint_file),
            config,
            device,
            varmap,
            model,
            optimizer,
            train_set,
            val_set,
            sampler,
            loss,
            schedule,
            spec_mask,
            pool,
            rng,
            state,
        })
    }

    pub fn phase(&self) -> TrainingPhase {
        self.state.phase()
    }

    pub fn train_set(&self) -> &AudioDataset {
        &self.train_set
    }

    pub fn val_set(&self) -> &AudioDataset {
        &self.val_set
    }

    pub fn loss(&self) -> &Loss {
        &self.loss
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.store
    }

    /// Train until early stopping or the epoch budget ends the run.
    pub fn run(mut self) -> Result<TrainReport, TrainError> {
        let total_epochs = self.config.optim.epochs;
        let mut history = Vec::new();

        while let Some(epoch) = self.state.begin_epoch() {
            let started = Instant::now();
            let lr = self.schedule.learning_rate(epoch);
            log::debug!("train: phase → {} (epoch {})", self.state.phase().label(), epoch + 1);

            let train_loss = self.train_epoch(epoch, lr)?;

            self.state.begin_validation();
            let eval = self.validate()?;
            let verdict = self.state.observe(eval.loss);
            if verdict.improved {
                self.store.save(&self.varmap)?;
            }

            let stats = EpochStats {
                epoch: epoch + 1,
                learning_rate: lr,
                train_loss,
                val_loss: eval.loss,
                val_accuracy: eval.accuracy,
                improved: verdict.improved,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            log::info!(
                "train: epoch {}/{} lr {:.2e} train_loss {:.4} val_loss {:.4} val_acc {:.3}{} ({} ms)",
                stats.epoch,
                total_epochs,
                stats.learning_rate,
                stats.train_loss,
                stats.val_loss,
                stats.val_accuracy,
                if stats.improved { " *" } else { "" },
                stats.elapsed_ms
            );
            history.push(stats);

            if verdict.stop.is_some() {
                break;
            }
        }

        let termination = self
            .state
            .termination()
            .unwrap_or(Termination::ExhaustedEpochs);
        log::info!(
            "train: phase → {} after {} epochs (best val_loss {:?} at epoch {:?})",
            self.state.phase().label(),
            history.len(),
            self.state.best_loss(),
            self.state.best_epoch().map(|e| e + 1)
        );

        Ok(TrainReport {
            termination,
            epochs_run: history.len(),
            best_epoch: self.state.best_epoch().map(|e| e + 1),
            best_val_loss: self.state.best_loss(),
            checkpoint: self
                .state
                .best_epoch()
                .map(|_| self.store.path().to_path_buf()),
            train_counts: self.train_set.class_counts(),
            val_counts: self.val_set.class_counts(),
            history,
        })
    }

    /// One pass over `len(train_set)` weighted draws.  Returns the mean
    /// training loss per item.
    fn train_epoch(&mut self, epoch: usize, lr: f64) -> Result<f32, TrainError> {
        self.optimizer.set_learning_rate(lr);
        let order = self.sampler.epoch(&mut self.rng);

        let mut loss_sum = 0.0f64;
        let mut seen = 0usize;
        for (step, chunk) in order.chunks(self.config.optim.batch_size).enumerate() {
            let mut batch = {
                let (pool, dataset, rng) = (&self.pool, &self.train_set, &mut self.rng);
                pool.install(|| dataset.load_batch(chunk, rng))?
            };

            if let Some(mask) = &self.spec_mask {
                for features in batch.features.iter_mut() {
                    mask.apply(features, &mut self.rng);
                }
            }

            let (x, y) = batch.to_tensors(&self.device)?;
            let logits = self.model.forward_t(&x, true)?;
            let loss = self.loss.train(&logits, &y)?;
            self.optimizer.backward_step(&loss)?;

            let value = loss.to_scalar::<f32>()?;
            loss_sum += value as f64 * batch.len() as f64;
            seen += batch.len();
            log::debug!("train: epoch {} step {} loss {:.4}", epoch + 1, step + 1, value);
        }

        Ok((loss_sum / seen.max(1) as f64) as f32)
    }

    fn validate(&self) -> Result<Evaluation, TrainError> {
        let batch_size = self.config.optim.batch_size;
        let (model, dataset, loss, device) = (&self.model, &self.val_set, &self.loss, &self.device);
        self.pool
            .install(|| evaluate(model, dataset, loss, batch_size, device))
    }
}

/// Training and validation records for a run.
///
/// A held-out root is used when it exists and holds at least one clip;
/// otherwise the validation set is carved out of the training root.
fn resolve_records(
    config: &TrainConfig,
    paths: &RunPaths,
) -> Result<(Vec<DatasetRecord>, Vec<DatasetRecord>), TrainError> {
    let records = dataset::build(&paths.data_root)?;
    if records.is_empty() {
        return Err(ConfigError::EmptyTrainingSet(format!(
            "no .wav files under {}/{{real,fake}}",
            paths.data_root.display()
        ))
        .into());
    }

    if let Some(val_root) = paths.existing_val_root() {
        let val = dataset::build(val_root)?;
        if !val.is_empty() {
            log::info!("train: validating on {}", val_root.display());
            return Ok((records, val));
        }
        log::warn!("train: {} holds no clips, splitting instead", val_root.display());
    }

    let split = dataset::split(records, config.run.val_ratio, config.run.split_seed)?;
    log::info!(
        "train: split {} train / {} val (ratio {}, seed {})",
        split.train.len(),
        split.val.len(),
        config.run.val_ratio,
        config.run.split_seed
    );
    Ok((split.train, split.val))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav_pcm16;
    use crate::config::{LossKind, CHECKPOINT_FILE};
    use crate::dataset::ClassCounts;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_clip(path: &Path, samples: &[f32]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_wav_pcm16(path, samples, 16_000).unwrap();
    }

    fn tone(len: usize, hz: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / 16_000.0).sin() * 0.3)
            .collect()
    }

    fn small_config(root: &Path) -> TrainConfig {
        let mut cfg = TrainConfig::default();
        cfg.features.clip_seconds = 0.5;
        cfg.features.n_fft = 256;
        cfg.features.hop_length = 128;
        cfg.features.n_mels = 32;
        cfg.optim.batch_size = 4;
        cfg.run.seed = Some(7);
        cfg.run.workers = 2;
        cfg.paths.data_root = root.join("data");
        cfg.paths.model_dir = root.join("model");
        cfg
    }

    fn checkpoints_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "safetensors"))
            .count()
    }

    #[test]
    fn silent_imbalanced_run_ends_with_one_checkpoint() {
        let dir = tempdir().unwrap();
        let silence = vec![0.0f32; 16_000];
        for i in 0..10 {
            write_clip(&dir.path().join(format!("data/real/r{i}.wav")), &silence);
        }
        for i in 0..2 {
            write_clip(&dir.path().join(format!("data/fake/f{i}.wav")), &silence);
        }

        let mut cfg = TrainConfig::default();
        cfg.paths.data_root = dir.path().join("data");
        cfg.paths.model_dir = dir.path().join("model");
        cfg.optim.loss = LossKind::Focal;
        cfg.optim.epochs = 5;
        cfg.optim.patience = 3;
        cfg.run.seed = Some(1);
        assert_eq!(cfg.features.clip_seconds, 3.0);

        let trainer = Trainer::new(cfg).unwrap();
        assert_eq!(trainer.phase(), TrainingPhase::Initializing);

        // 1 s clips are padded to the full 3 s frame count.
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..trainer.train_set().len() {
            let (features, _) = trainer.train_set().get(i, &mut rng).unwrap();
            assert_eq!(features.shape(), (64, 188));
        }

        let report = trainer.run().unwrap();
        assert!(report.epochs_run <= 5);
        assert_eq!(report.history.len(), report.epochs_run);
        assert!(report.best_epoch.is_some());
        assert_eq!(report.train_counts.total() + report.val_counts.total(), 12);
        assert_eq!(checkpoints_in(&dir.path().join("model")), 1);
        assert!(dir.path().join("model").join(CHECKPOINT_FILE).is_file());
    }

    #[test]
    fn reloaded_checkpoint_reproduces_validation_loss() {
        let dir = tempdir().unwrap();
        for i in 0..6 {
            write_clip(&dir.path().join(format!("data/real/r{i}.wav")), &tone(6_000, 200.0 + 40.0 * i as f32));
            write_clip(&dir.path().join(format!("data/fake/f{i}.wav")), &tone(9_000, 900.0 + 70.0 * i as f32));
        }
        let mut cfg = small_config(dir.path());
        cfg.optim.epochs = 1;
        cfg.run.val_ratio = 0.25;

        let trainer = Trainer::new(cfg).unwrap();
        let val_set = trainer.val_set().clone();
        let loss = trainer.loss().clone();
        let store = trainer.checkpoint().clone();

        let report = trainer.run().unwrap();
        assert_eq!(report.termination, Termination::ExhaustedEpochs);
        let best = report.best_val_loss.unwrap();

        let varmap = VarMap::new();
        let model = MelCnn::new(VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu)).unwrap();
        store.load_into(&varmap).unwrap();

        let eval = evaluate(&model, &val_set, &loss, 4, &Device::Cpu).unwrap();
        assert!((eval.loss - best).abs() < 1e-5, "{} vs {}", eval.loss, best);
    }

    #[test]
    fn smoothed_bce_run_trains_and_checkpoints() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            write_clip(&dir.path().join(format!("data/real/r{i}.wav")), &tone(4_000, 250.0 + 30.0 * i as f32));
        }
        for i in 0..3 {
            write_clip(&dir.path().join(format!("data/fake/f{i}.wav")), &tone(4_000, 1_200.0 + 90.0 * i as f32));
        }
        let mut cfg = small_config(dir.path());
        cfg.optim.loss = LossKind::Bce;
        cfg.optim.label_smoothing = 0.1;
        cfg.optim.epochs = 2;
        cfg.run.val_ratio = 0.25;

        let trainer = Trainer::new(cfg).unwrap();
        assert_eq!(trainer.loss().kind, LossKind::Bce);
        assert!((trainer.loss().label_smoothing - 0.1).abs() < 1e-6);

        let report = trainer.run().unwrap();
        assert_eq!(report.termination, Termination::ExhaustedEpochs);
        assert_eq!(report.epochs_run, 2);
        assert!(report.history.iter().all(|e| e.train_loss.is_finite() && e.val_loss.is_finite()));
        assert!(report.best_epoch.is_some());
        assert_eq!(checkpoints_in(&dir.path().join("model")), 1);
    }

    #[test]
    fn evaluating_an_empty_set_is_an_error() {
        let cfg = TrainConfig::default();
        let extractor = Arc::new(FeatureExtractor::new(&cfg));
        let empty = AudioDataset::new(Vec::new(), extractor, Mode::Eval);
        let varmap = VarMap::new();
        let model = MelCnn::new(VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu)).unwrap();
        let loss = Loss::new(&cfg.optim, ClassCounts { real: 1, fake: 1 });

        let err = evaluate(&model, &empty, &loss, 4, &Device::Cpu).unwrap_err();
        assert!(matches!(err, TrainError::EmptyEvaluationSet));
    }

    #[test]
    fn single_clip_cannot_be_split() {
        let dir = tempdir().unwrap();
        write_clip(&dir.path().join("data/real/only.wav"), &tone(1_000, 300.0));

        let err = Trainer::new(small_config(dir.path())).err().unwrap();
        assert!(matches!(
            err,
            TrainError::Config(ConfigError::SplitLeavesNoTraining { total: 1, val: 1 })
        ));
    }

    #[test]
    fn empty_training_root_is_a_config_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/real")).unwrap();

        let err = Trainer::new(small_config(dir.path())).err().unwrap();
        assert!(matches!(err, TrainError::Config(ConfigError::EmptyTrainingSet(_))));
    }

    #[test]
    fn held_out_root_is_preferred_over_split() {
        let dir = tempdir().unwrap();
        for i in 0..3 {
            write_clip(&dir.path().join(format!("data/real/r{i}.wav")), &tone(2_000, 300.0));
        }
        write_clip(&dir.path().join("data/fake/f.wav"), &tone(2_000, 800.0));
        write_clip(&dir.path().join("val/fake/v.wav"), &tone(2_000, 800.0));

        let mut cfg = small_config(dir.path());
        cfg.paths.val_root = Some(dir.path().join("val"));

        let trainer = Trainer::new(cfg).unwrap();
        assert_eq!(trainer.train_set().class_counts(), ClassCounts { real: 3, fake: 1 });
        assert_eq!(trainer.val_set().class_counts(), ClassCounts { real: 0, fake: 1 });
        assert_eq!(trainer.val_set().mode(), Mode::Eval);
        assert_eq!(trainer.train_set().mode(), Mode::Train);
    }

    #[test]
    fn incompatible_resume_fails_at_initialisation() {
        let dir = tempdir().unwrap();
        for i in 0..4 {
            write_clip(&dir.path().join(format!("data/real/r{i}.wav")), &tone(2_000, 300.0));
        }

        let bogus = VarMap::new();
        let vb = VarBuilder::from_varmap(&bogus, DType::F32, &Device::Cpu);
        candle_nn::linear(3, 3, vb.pp("head")).unwrap();
        let resume = dir.path().join("bogus.safetensors");
        bogus.save(&resume).unwrap();

        let mut cfg = small_config(dir.path());
        cfg.run.resume = Some(resume);

        let err = Trainer::new(cfg).err().unwrap();
        assert!(matches!(err, TrainError::Checkpoint(CheckpointError::MissingKey(_))));
    }
}
