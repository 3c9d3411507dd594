//! Flight Delay Pipeline - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, run_training, ServiceConfig};
use clap::{Parser, Subcommand};
use dataset::{read_csv, TargetKind};
use inference_engine::{Evaluation, InferenceEngine, TrainingParams};
use std::path::{Path, PathBuf};
use storage::EncodingStore;
use tracing::info;

/// Number of importances printed after training
const TOP_FEATURES: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "flight-delay", version, about = "Flight delay training and prediction service")]
struct Cli {
    /// Configuration file (defaults to ./flight-delay.toml when present)
    #[arg(long, global = true, env = "FLIGHT_DELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit encodings and the delay model on a historical CSV
    Train {
        /// Historical flights CSV
        #[arg(long)]
        dataset: PathBuf,
        /// Train against the delay in minutes instead of the minor-delay flag
        #[arg(long)]
        regression: bool,
        /// Anomaly score threshold; overrides the configured one
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Serve predictions over HTTP
    Serve {
        /// Listen address; overrides the configured one
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("Failed to set tracing subscriber")?;
    let cli = Cli::parse();

    info!("=== Flight Delay Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Train {
            dataset,
            regression,
            threshold,
        } => {
            if regression {
                config.target = TargetKind::Regression;
            }
            if threshold.is_some() {
                config.anomaly_threshold = threshold;
            }
            train(&config, &dataset)
        }
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            run_server(&config)
                .await
                .map_err(|e| anyhow::anyhow!(e))
                .context("API server failed")
        }
    }
}

fn train(config: &ServiceConfig, dataset: &Path) -> anyhow::Result<()> {
    let options = config.training_options()?;
    let rows = read_csv(dataset).with_context(|| format!("Failed to read {}", dataset.display()))?;

    let store = EncodingStore::new(&config.encoding_map_path);
    let engine = InferenceEngine::new(&config.model_path);
    let run = run_training(&rows, &store, &engine, &options, TrainingParams::default()).context("Training failed")?;

    let report = &run.clean_report;
    println!(
        "Cleaned {} of {} rows ({} missing, {} invalid dropped)",
        report.kept_rows, report.input_rows, report.dropped_missing, report.dropped_invalid
    );
    if let Some(anomalies) = &run.anomaly_report {
        println!(
            "Removed {} anomalous rows ({:.3}%)",
            anomalies.removed_rows(),
            anomalies.removed_fraction() * 100.0
        );
    }

    let outcome = &run.outcome;
    match outcome.evaluation {
        Evaluation::Accuracy(accuracy) => println!(
            "Test accuracy: {:.4} on {} rows",
            accuracy, outcome.test_rows
        ),
        Evaluation::MeanAbsoluteError(mae) => println!(
            "Test MAE: {:.2} minutes on {} rows",
            mae, outcome.test_rows
        ),
    }

    println!("Top features:");
    for (feature, importance) in outcome.importance.iter().take(TOP_FEATURES) {
        println!("  {:<16} {:.4}", feature, importance);
    }
    println!(
        "Encodings: {}  Model: {}",
        config.encoding_map_path.display(),
        config.model_path.display()
    );
    Ok(())
}
