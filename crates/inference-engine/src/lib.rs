//! Delay Inference Engine
//!
//! Reference delay model trained on the encoded feature matrix, plus the
//! engine that persists it and serves predictions from a swappable snapshot.

mod engine;
mod model;

pub use engine::{InferenceEngine, Prediction, TrainingOutcome};
pub use model::{
    evaluate, DelayModel, Evaluation, LinearModel, ModelArtifact, TrainingParams,
    MODEL_FORMAT_VERSION,
};

use dataset::TargetKind;
use storage::StorageError;
use thiserror::Error;

/// Errors during training or inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model has not been trained")]
    NotTrained,
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Cannot fit a model on an empty training set")]
    EmptyTrainingSet,
    #[error("Model trained for {expected:?} cannot use a {found:?} target")]
    TargetMismatch { expected: TargetKind, found: TargetKind },
    #[error("Invalid training parameter: {0}")]
    InvalidParameter(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Model artifact error: {0}")]
    Artifact(#[from] StorageError),
}
