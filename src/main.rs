use anyhow::{Context, Result};
use arena_agent::clean::DatasetCleaner;
use arena_agent::config::AgentConfig;
use arena_agent::device::AdbDevice;
use arena_agent::driver::{AgentError, Driver};
use arena_agent::logging;
use arena_agent::persistence::DatasetStore;
use arena_agent::predict::{LogisticTrainer, Trainer};
use arena_cv::traits::Perception;
use arena_cv::{ArenaDetector, CaptureDump, Catalogs, Frame, TemplateLoader};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "arena-agent")]
#[command(about = "Screen-driven arena automation with outcome logging")]
#[command(version)]
struct Cli {
    /// JSON configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop against the device (default).
    Run,
    /// Classify a saved screenshot.
    Classify {
        /// Path to the screenshot.
        image: PathBuf,
    },
    /// Read the card slots of a saved screenshot.
    ReadSlots {
        /// Path to the screenshot.
        image: PathBuf,
    },
    /// Retrain the predictor from the dataset and report holdout accuracy.
    Train,
    /// Drop unbalanced, one-sided, duplicate and outlier rows from the dataset.
    Clean {
        /// Balance score bound, overriding the configured one.
        #[arg(long)]
        threshold: Option<f64>,
        /// Write the cleaned rows here instead of replacing the dataset.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Report what would be dropped without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AgentConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = logging::init_tracing(&config.paths.log_dir);
    if cli.config.exists() {
        info!("Loaded config from {}", cli.config.display());
    } else {
        warn!("Config {} not found, using defaults", cli.config.display());
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config),
        Commands::Classify { image } => classify(&config, &image),
        Commands::ReadSlots { image } => read_slots(&config, &image),
        Commands::Train => train(&config),
        Commands::Clean {
            threshold,
            output,
            dry_run,
        } => clean(&config, threshold, output, dry_run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_catalogs(config: &AgentConfig) -> Result<Catalogs> {
    let loader = TemplateLoader::new().with_digit_cut(config.perception.digits.template_cut);
    Catalogs::load(&config.perception.template_dirs, &loader).context("Failed to load template catalogs")
}

fn run(config: &AgentConfig) -> Result<()> {
    let catalogs = load_catalogs(config)?;
    let mut detector = ArenaDetector::new(&catalogs, &config.vocabulary, &config.perception);
    if let Some(capture_dir) = &config.paths.capture_dir {
        detector = detector.with_dump(CaptureDump {
            capture_dir: capture_dir.clone(),
            backup_dir: config.paths.backup_dir.clone(),
        });
    }

    let store = DatasetStore::new(&config.paths.dataset, config.vocabulary.clone());
    store.ensure_header().context("Failed to prepare the dataset")?;

    let trainer = LogisticTrainer::default();
    let model = trainer.train(&store).context("Initial training failed")?.model;

    let device = AdbDevice::new(&config.device);
    if let Err(e) = device.connect() {
        warn!("adb connect failed: {}", e);
    }

    let mut driver = Driver::new(device, detector, trainer, model, store, config);
    match driver.run() {
        Ok(()) => Ok(()),
        Err(AgentError::HardMatchFailure(e)) => {
            Err(e).context("Control loop aborted on a critical match failure")
        }
        Err(e) => Err(e.into()),
    }
}

fn classify(config: &AgentConfig, image: &Path) -> Result<()> {
    let catalogs = load_catalogs(config)?;
    let detector = ArenaDetector::new(&catalogs, &config.vocabulary, &config.perception);
    let frame = Frame::load(image).with_context(|| format!("Failed to load {}", image.display()))?;

    match detector.classifier().best_mode(&frame) {
        Some(m) => println!("{} ({}, score {:.3})", detector.classify(&frame), m.label, m.score),
        None => println!("{}", detector.classify(&frame)),
    }
    Ok(())
}

fn read_slots(config: &AgentConfig, image: &Path) -> Result<()> {
    let catalogs = load_catalogs(config)?;
    let detector = ArenaDetector::new(&catalogs, &config.vocabulary, &config.perception);
    let frame = Frame::load(image).with_context(|| format!("Failed to load {}", image.display()))?;

    let snapshot = detector.read_slots(&frame).context("Slot readout failed")?;
    for record in snapshot.iter() {
        println!("{} {}: {} x{}", record.side, record.slot + 1, record.label, record.count);
    }
    Ok(())
}

fn train(config: &AgentConfig) -> Result<()> {
    let store = DatasetStore::new(&config.paths.dataset, config.vocabulary.clone());
    let training = LogisticTrainer::default().train(&store)?;

    match training.holdout_accuracy {
        Some(acc) => println!("Trained on {} examples, holdout accuracy {:.2}%", training.examples, acc * 100.0),
        None => println!("Trained on {} examples, no holdout", training.examples),
    }
    Ok(())
}

fn clean(config: &AgentConfig, threshold: Option<f64>, output: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let mut settings = config.clean.clone();
    if let Some(threshold) = threshold {
        settings.balance_threshold = threshold;
    }

    let store = DatasetStore::new(&config.paths.dataset, config.vocabulary.clone());
    let report = DatasetCleaner::new(&config.vocabulary, settings).clean_store(&store)?;
    println!("Dropped {} rows, kept {}", report.dropped.len(), report.kept.len());

    if dry_run {
        return Ok(());
    }

    let target = match output {
        Some(path) => DatasetStore::new(path, config.vocabulary.clone()),
        None => store,
    };
    target
        .replace_rows(&report.kept)
        .with_context(|| format!("Failed to write {}", target.path().display()))?;
    info!("Cleaned dataset written to {}", target.path().display());
    Ok(())
}
