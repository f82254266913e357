//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG`, default `info`).
//! 2. Load [`TrainConfig`] from `--config` (defaults when the file is absent).
//! 3. Apply subcommand flags on top of the loaded values.
//! 4. Dispatch to `train`, `preprocess` or `stage`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use voice_spoof_trainer::{
    config::{LossKind, RunPaths, TrainConfig},
    preprocess,
    staging::{self, StageRequest, DEFAULT_ID_PREFIX},
    train::Trainer,
};

#[derive(Debug, Parser)]
#[command(name = "voice-spoof-trainer")]
#[command(about = "Train a mel-spectrogram CNN that tells genuine speech from spoofed speech")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, default_value = "train.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train the classifier and keep the best checkpoint.
    Train(TrainArgs),
    /// Write normalised features of every clip as safetensors files.
    Preprocess(PreprocessArgs),
    /// Convert a labelled corpus into the real/fake directory layout.
    Stage(StageArgs),
}

#[derive(Debug, Args)]
struct TrainArgs {
    /// Training root holding real/ and fake/.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Held-out validation root.
    #[arg(long)]
    val_data: Option<PathBuf>,
    /// Output directory for the checkpoint and report.
    #[arg(long)]
    model_dir: Option<PathBuf>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch: Option<usize>,
    #[arg(long)]
    lr: Option<f64>,
    #[arg(long)]
    weight_decay: Option<f64>,
    #[arg(long)]
    patience: Option<usize>,
    /// `focal` or `bce`.
    #[arg(long)]
    loss: Option<LossKind>,
    #[arg(long)]
    focal_gamma: Option<f32>,
    #[arg(long)]
    label_smoothing: Option<f32>,
    #[arg(long)]
    val_ratio: Option<f32>,
    /// Checkpoint to resume from.
    #[arg(long)]
    resume: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Data-loading threads (0 = all cores).
    #[arg(long)]
    workers: Option<usize>,
    /// Disable waveform gain/noise augmentation.
    #[arg(long, default_value_t = false)]
    no_augment: bool,
    /// Disable frequency/time masking.
    #[arg(long, default_value_t = false)]
    no_spec_mask: bool,
    /// Use the first CUDA device when available.
    #[arg(long, default_value_t = false)]
    gpu: bool,
}

impl TrainArgs {
    fn apply(self, config: &mut TrainConfig) {
        let TrainArgs {
            data,
            val_data,
            model_dir,
            epochs,
            batch,
            lr,
            weight_decay,
            patience,
            loss,
            focal_gamma,
            label_smoothing,
            val_ratio,
            resume,
            seed,
            workers,
            no_augment,
            no_spec_mask,
            gpu,
        } = self;

        if let Some(v) = data {
            config.paths.data_root = v;
        }
        if val_data.is_some() {
            config.paths.val_root = val_data;
        }
        if let Some(v) = model_dir {
            config.paths.model_dir = v;
        }
        if let Some(v) = epochs {
            config.optim.epochs = v;
        }
        if let Some(v) = batch {
            config.optim.batch_size = v;
        }
        if let Some(v) = lr {
            config.optim.learning_rate = v;
        }
        if let Some(v) = weight_decay {
            config.optim.weight_decay = v;
        }
        if let Some(v) = patience {
            config.optim.patience = v;
        }
        if let Some(v) = loss {
            config.optim.loss = v;
        }
        if let Some(v) = focal_gamma {
            config.optim.focal_gamma = v;
        }
        if let Some(v) = label_smoothing {
            config.optim.label_smoothing = v;
        }
        if let Some(v) = val_ratio {
            config.run.val_ratio = v;
        }
        if resume.is_some() {
            config.run.resume = resume;
        }
        if seed.is_some() {
            config.run.seed = seed;
        }
        if let Some(v) = workers {
            config.run.workers = v;
        }
        if no_augment {
            config.augment.waveform = false;
        }
        if no_spec_mask {
            config.augment.spec_mask = false;
        }
        if gpu {
            config.run.use_gpu = true;
        }
    }
}

#[derive(Debug, Args)]
struct PreprocessArgs {
    /// Root holding real/ and fake/ WAV files.
    #[arg(long, default_value = "data/raw")]
    input: PathBuf,
    #[arg(long, default_value = "data/processed")]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct StageArgs {
    /// Protocol file with one `<... id ...> <label>` entry per line.
    #[arg(long)]
    metadata: PathBuf,
    /// Directory containing the source audio files.
    #[arg(long)]
    source_root: PathBuf,
    #[arg(long, default_value = "data/raw")]
    output: PathBuf,
    /// Split name (train/dev/test).
    #[arg(long, default_value = "train")]
    subset: String,
    /// Source file extension (`.flac` or `.wav`).
    #[arg(long, default_value = ".flac")]
    extension: String,
    #[arg(long, default_value = DEFAULT_ID_PREFIX)]
    id_prefix: String,
    /// Optional cap on the number of staged files.
    #[arg(long)]
    limit: Option<usize>,
    /// Output sample rate; defaults to `features.sample_rate`.
    #[arg(long)]
    sample_rate: Option<u32>,
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_train(mut config: TrainConfig, args: TrainArgs) -> Result<()> {
    args.apply(&mut config);
    let paths = RunPaths::new(&config.paths);

    let trainer = Trainer::new(config).context("cannot start training")?;
    let report = trainer.run().context("training failed")?;

    report
        .save_to(&paths.report_file)
        .with_context(|| format!("cannot write {}", paths.report_file.display()))?;
    log::info!(
        "train: {:?} after {} epochs, best val loss {:?} (epoch {:?}), report {}",
        report.termination,
        report.epochs_run,
        report.best_val_loss,
        report.best_epoch,
        paths.report_file.display()
    );
    Ok(())
}

fn run_preprocess(config: TrainConfig, args: PreprocessArgs) -> Result<()> {
    let config = config.validate()?;
    let stats = preprocess::run(&args.input, &args.output, &config)
        .with_context(|| format!("cannot preprocess {}", args.input.display()))?;
    log::info!("preprocess: {} real / {} fake", stats.real, stats.fake);
    Ok(())
}

fn run_stage(config: TrainConfig, args: StageArgs) -> Result<()> {
    let request = StageRequest {
        metadata: args.metadata,
        source_root: args.source_root,
        output_root: args.output,
        subset: args.subset,
        sample_rate: args.sample_rate.unwrap_or(config.features.sample_rate),
        extension: args.extension,
        id_prefix: args.id_prefix,
        limit: args.limit,
    };
    let stats = staging::stage_subset(&request).context("staging failed")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = TrainConfig::load_from(&cli.config)
        .with_context(|| format!("cannot load {}", cli.config.display()))?;

    match cli.command {
        Command::Train(args) => run_train(config, args),
        Command::Preprocess(args) => run_preprocess(config, args),
        Command::Stage(args) => run_stage(config, args),
    }
}
