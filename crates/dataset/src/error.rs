//! Dataset Error Types

use data_cleaner::CleanError;
use feature_engine::FeatureError;
use thiserror::Error;

/// Errors raised by the dataset pipeline
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Inference-time category absent from the persisted encoding map
    #[error("Unknown category {value:?} for column {column}")]
    UnknownCategory { column: String, value: String },

    /// Anomaly criterion other than `zscore` / `r-zscore`
    #[error("Unsupported anomaly criterion {0:?}, expected 'zscore' or 'r-zscore'")]
    UnsupportedCriterion(String),

    /// Operation invoked out of order
    #[error("Invalid pipeline state: {0}")]
    State(&'static str),

    /// Inference requested before any encoding map was trained
    #[error("No encoding map has been trained yet")]
    EncodingMapMissing,

    /// Parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No rows left to work on
    #[error("Dataset is empty")]
    Empty,

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Feature(FeatureError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<FeatureError> for DatasetError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::UnknownCategory { column, value } => {
                DatasetError::UnknownCategory { column, value }
            }
            other => DatasetError::Feature(other),
        }
    }
}
