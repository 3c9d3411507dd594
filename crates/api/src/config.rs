//! Service Configuration
//!
//! Layered: built-in defaults, then `flight-delay.toml` (or an explicit file),
//! then `FLIGHT_DELAY__*` environment variables.

use config::{Config, ConfigError, Environment, File};
use dataset::{Criterion, DatasetConfig, DatasetError, TargetKind, TrainingOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "flight-delay";

/// Service and training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub encoding_map_path: PathBuf,
    pub model_path: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    /// `zscore` or `r-zscore`
    pub anomaly_criterion: String,
    /// No anomaly filtering when unset
    pub anomaly_threshold: Option<f64>,
    pub target: TargetKind,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            encoding_map_path: PathBuf::from("artifacts/encodings.json"),
            model_path: PathBuf::from("artifacts/model.json"),
            test_fraction: 0.2,
            seed: 42,
            anomaly_criterion: "r-zscore".to_string(),
            anomaly_threshold: None,
            target: TargetKind::Classification,
        }
    }
}

impl ServiceConfig {
    /// Load configuration; `path` overrides the default file, which is optional
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("FLIGHT_DELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Training options derived from the configuration
    pub fn training_options(&self) -> Result<TrainingOptions, DatasetError> {
        Ok(TrainingOptions {
            target: self.target,
            criterion: self.anomaly_criterion.parse::<Criterion>()?,
            threshold: self.anomaly_threshold,
            split: DatasetConfig {
                test_fraction: self.test_fraction,
                seed: self.seed,
            },
        })
    }
}
