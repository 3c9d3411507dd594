//! Inference Engine Implementation

use dataset::{FeatureMatrix, TargetKind, TrainTestSplit};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::model::{evaluate, DelayModel, Evaluation, LinearModel, TrainingParams};
use crate::InferenceError;
use feature_engine::MINOR_DELAY_THRESHOLD_MINUTES;

/// One model output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    /// Probability that the delay is minor (<= 15 minutes)
    MinorDelay { probability: f64 },
    /// Predicted delay in minutes
    DelayMinutes { minutes: f64 },
}

impl Prediction {
    fn from_score(target: TargetKind, score: f64) -> Self {
        match target {
            TargetKind::Classification => Prediction::MinorDelay { probability: score },
            TargetKind::Regression => Prediction::DelayMinutes { minutes: score },
        }
    }

    /// Minor-delay decision for either kind of model
    pub fn is_minor_delay(&self) -> bool {
        match *self {
            Prediction::MinorDelay { probability } => probability > 0.5,
            Prediction::DelayMinutes { minutes } => minutes <= MINOR_DELAY_THRESHOLD_MINUTES,
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub target: TargetKind,
    pub training_rows: usize,
    pub test_rows: usize,
    pub evaluation: Evaluation,
    pub importance: Vec<(String, f64)>,
}

/// Serves the current model snapshot and trains replacements
pub struct InferenceEngine {
    model_path: PathBuf,
    current: RwLock<Option<Arc<LinearModel>>>,
}

impl InferenceEngine {
    /// Create an engine backed by `model_path` without reading it
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        info!("Creating inference engine with model: {}", model_path.display());
        Self {
            model_path,
            current: RwLock::new(None),
        }
    }

    /// Create an engine and load the saved model if there is one
    pub fn open(model_path: impl Into<PathBuf>) -> Result<Self, InferenceError> {
        let engine = Self::new(model_path);
        engine.load()?;
        Ok(engine)
    }

    /// Re-read the saved model. Returns whether a model is now loaded.
    pub fn load(&self) -> Result<bool, InferenceError> {
        match LinearModel::load(&self.model_path)? {
            Some(model) => {
                self.install(model)?;
                Ok(true)
            }
            None => {
                warn!("No model at {} yet", self.model_path.display());
                Ok(self.is_loaded())
            }
        }
    }

    /// Swap in a fitted model
    pub fn install(&self, model: LinearModel) -> Result<(), InferenceError> {
        let mut current = self
            .current
            .write()
            .map_err(|e| InferenceError::Lock(format!("{}", e)))?;
        *current = Some(Arc::new(model));
        Ok(())
    }

    /// Current model, or `NotTrained`
    pub fn model(&self) -> Result<Arc<LinearModel>, InferenceError> {
        let current = self
            .current
            .read()
            .map_err(|e| InferenceError::Lock(format!("{}", e)))?;
        current.clone().ok_or(InferenceError::NotTrained)
    }

    /// Check if a model is loaded
    pub fn is_loaded(&self) -> bool {
        self.model().is_ok()
    }

    /// Get model path
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Fit a model on the split, score it on the held-out rows, save and install it
    pub fn train(
        &self,
        split: &TrainTestSplit,
        params: TrainingParams,
        encoding_fingerprint: &str,
    ) -> Result<TrainingOutcome, InferenceError> {
        let target = split.y_train.kind();
        let mut model = LinearModel::new(target, params);
        model.fit(&split.x_train, &split.y_train)?;
        model.set_encoding_fingerprint(encoding_fingerprint)?;

        let evaluation = evaluate(&model, &split.x_test, &split.y_test)?;
        let importance = model.feature_importance()?;
        info!("Held-out {:?} on {} rows", evaluation, split.x_test.len());

        model.save(&self.model_path)?;
        self.install(model)?;

        Ok(TrainingOutcome {
            target,
            training_rows: split.x_train.len(),
            test_rows: split.x_test.len(),
            evaluation,
            importance,
        })
    }

    /// Predict every row of `x` with the current model
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<Prediction>, InferenceError> {
        Self::predict_with(&*self.model()?, x)
    }

    /// Predict with a model snapshot the caller already holds
    pub fn predict_with(model: &LinearModel, x: &FeatureMatrix) -> Result<Vec<Prediction>, InferenceError> {
        let start = std::time::Instant::now();
        let target = model.target();

        let predictions = model
            .predict(x)?
            .into_iter()
            .map(|score| Prediction::from_score(target, score))
            .collect();

        debug!("Inference completed in {}us", start.elapsed().as_micros());
        Ok(predictions)
    }

    /// Importances of the current model, most important first
    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>, InferenceError> {
        self.model()?.feature_importance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::{split_train_test, TargetVector, FEATURE_COLUMNS, FEATURE_COUNT};

    fn split(target: TargetKind) -> TrainTestSplit {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let x = FeatureMatrix {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: values
                .iter()
                .map(|&v| {
                    let mut row = [0.0; FEATURE_COUNT];
                    row[12] = v;
                    row
                })
                .collect(),
        };
        let y = match target {
            TargetKind::Classification => {
                TargetVector::MinorDelay(values.iter().map(|&v| v < 25.0).collect())
            }
            TargetKind::Regression => TargetVector::DelayMinutes(values.iter().map(|v| 2.0 * v).collect()),
        };
        split_train_test(&x, &y, 0.2, 42).unwrap()
    }

    #[test]
    fn test_untrained_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::open(dir.path().join("model.json")).unwrap();
        assert!(!engine.is_loaded());
        assert!(matches!(
            engine.predict(&split(TargetKind::Classification).x_test),
            Err(InferenceError::NotTrained)
        ));
    }

    #[test]
    fn test_train_saves_and_installs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let engine = InferenceEngine::new(&path);
        let data = split(TargetKind::Classification);

        let outcome = engine
            .train(&data, TrainingParams::default(), "fingerprint")
            .unwrap();
        assert_eq!(outcome.test_rows, 10);
        assert_eq!(outcome.training_rows, 40);
        assert_eq!(outcome.importance[0].0, FEATURE_COLUMNS[12]);
        match outcome.evaluation {
            Evaluation::Accuracy(acc) => assert!(acc >= 0.9, "accuracy {}", acc),
            other => panic!("unexpected {:?}", other),
        }

        let predictions = engine.predict(&data.x_test).unwrap();
        assert_eq!(predictions.len(), 10);
        assert!(predictions
            .iter()
            .all(|p| matches!(p, Prediction::MinorDelay { probability } if (0.0..=1.0).contains(probability))));

        let reopened = InferenceEngine::open(&path).unwrap();
        assert_eq!(
            reopened.predict(&data.x_test).unwrap(),
            predictions
        );
        assert_eq!(
            reopened.model().unwrap().artifact().unwrap().encoding_fingerprint.as_deref(),
            Some("fingerprint")
        );
    }

    #[test]
    fn test_regression_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let engine = InferenceEngine::new(dir.path().join("model.json"));
        let data = split(TargetKind::Regression);
        engine.train(&data, TrainingParams::default(), "fp").unwrap();

        let predictions = engine.predict(&data.x_test).unwrap();
        assert!(predictions
            .iter()
            .all(|p| matches!(p, Prediction::DelayMinutes { .. })));
    }

    #[test]
    fn test_minor_delay_decision() {
        assert!(Prediction::MinorDelay { probability: 0.51 }.is_minor_delay());
        assert!(!Prediction::MinorDelay { probability: 0.5 }.is_minor_delay());
        assert!(Prediction::DelayMinutes { minutes: 15.0 }.is_minor_delay());
        assert!(!Prediction::DelayMinutes { minutes: 15.5 }.is_minor_delay());
    }
}
