//! Reference Delay Model
//!
//! Linear model over standardized features, trained with full-batch gradient
//! descent: least squares for the delay in minutes, logistic loss for the
//! minor-delay flag. Training is deterministic (zero-initialized weights, no
//! sampling).

use chrono::{DateTime, Utc};
use dataset::{FeatureMatrix, TargetKind, TargetVector};
use feature_engine::statistics::{mean, std_dev};
use serde::{Deserialize, Serialize};
use std::path::Path;
use storage::{read_json, write_json_atomic, StorageError};
use tracing::{debug, info};

use crate::InferenceError;

/// Bumped whenever `ModelArtifact` changes shape
pub const MODEL_FORMAT_VERSION: u32 = 1;

const PROBABILITY_EPSILON: f64 = 1e-6;

/// Model contract shared by training and serving
pub trait DelayModel {
    /// Target the model predicts
    fn target(&self) -> TargetKind;

    /// Fit on a feature matrix and its target
    fn fit(&mut self, x: &FeatureMatrix, y: &TargetVector) -> Result<(), InferenceError>;

    /// Probabilities in [0, 1] for classification, minutes for regression
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, InferenceError>;

    /// `(feature, importance)` pairs, most important first
    fn feature_importance(&self) -> Result<Vec<(String, f64)>, InferenceError>;
}

/// Gradient descent hyper-parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on the weights
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 300,
            l2: 0.0,
        }
    }
}

/// Persisted form of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub target: TargetKind,
    pub columns: Vec<String>,
    /// Per-column standardization
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub params: TrainingParams,
    pub training_rows: usize,
    /// Fingerprint of the encoding map the features were produced with
    pub encoding_fingerprint: Option<String>,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    fn linear_term(&self, row: &[f64]) -> f64 {
        row.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((x, m), s), w)| w * (x - m) / s)
            .sum::<f64>()
            + self.bias
    }
}

/// Linear / logistic regression trained by batch gradient descent
#[derive(Debug, Clone)]
pub struct LinearModel {
    target: TargetKind,
    params: TrainingParams,
    fitted: Option<ModelArtifact>,
}

impl LinearModel {
    pub fn new(target: TargetKind, params: TrainingParams) -> Self {
        Self {
            target,
            params,
            fitted: None,
        }
    }

    pub fn classifier() -> Self {
        Self::new(TargetKind::Classification, TrainingParams::default())
    }

    pub fn regressor() -> Self {
        Self::new(TargetKind::Regression, TrainingParams::default())
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fitted parameters, `None` before `fit`
    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.fitted.as_ref()
    }

    /// Record which encoding map the training features came from
    pub fn set_encoding_fingerprint(&mut self, fingerprint: impl Into<String>) -> Result<(), InferenceError> {
        let fitted = self.fitted.as_mut().ok_or(InferenceError::NotTrained)?;
        fitted.encoding_fingerprint = Some(fingerprint.into());
        Ok(())
    }

    /// Write the fitted model as JSON
    pub fn save(&self, path: &Path) -> Result<(), InferenceError> {
        let fitted = self.fitted.as_ref().ok_or(InferenceError::NotTrained)?;
        write_json_atomic(path, fitted)?;
        info!("Saved {:?} model to {}", self.target, path.display());
        Ok(())
    }

    /// Read a saved model; `None` when nothing has been saved yet
    pub fn load(path: &Path) -> Result<Option<Self>, InferenceError> {
        let Some(artifact) = read_json::<ModelArtifact>(path)? else {
            return Ok(None);
        };
        if artifact.format_version != MODEL_FORMAT_VERSION {
            return Err(StorageError::IncompatibleFormat {
                found: artifact.format_version,
                expected: MODEL_FORMAT_VERSION,
            }
            .into());
        }
        info!(
            "Loaded {:?} model from {} ({} columns, trained on {} rows)",
            artifact.target,
            path.display(),
            artifact.columns.len(),
            artifact.training_rows
        );
        Ok(Some(Self {
            target: artifact.target,
            params: artifact.params,
            fitted: Some(artifact),
        }))
    }

    fn link(&self, z: f64) -> f64 {
        match self.target {
            TargetKind::Regression => z,
            TargetKind::Classification => sigmoid(z),
        }
    }

    fn initial_bias(&self, targets: &[f64]) -> f64 {
        let m = mean(targets);
        match self.target {
            TargetKind::Regression => m,
            TargetKind::Classification => {
                let p = m.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
                (p / (1.0 - p)).ln()
            }
        }
    }

    fn check_params(&self) -> Result<(), InferenceError> {
        let p = &self.params;
        if !(p.learning_rate > 0.0 && p.learning_rate.is_finite()) {
            return Err(InferenceError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                p.learning_rate
            )));
        }
        if p.l2 < 0.0 {
            return Err(InferenceError::InvalidParameter(format!(
                "l2 must be non-negative, got {}",
                p.l2
            )));
        }
        Ok(())
    }
}

impl DelayModel for LinearModel {
    fn target(&self) -> TargetKind {
        self.target
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &TargetVector) -> Result<(), InferenceError> {
        self.check_params()?;
        if x.is_empty() {
            return Err(InferenceError::EmptyTrainingSet);
        }
        if y.kind() != self.target {
            return Err(InferenceError::TargetMismatch {
                expected: self.target,
                found: y.kind(),
            });
        }
        if y.len() != x.len() {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{} targets", x.len()),
                actual: format!("{} targets", y.len()),
            });
        }
        check_width(x.columns.len(), x)?;

        let n = x.len();
        let width = x.columns.len();
        let targets = y.as_f64();

        let (means, scales): (Vec<f64>, Vec<f64>) = (0..width)
            .map(|j| {
                let column: Vec<f64> = x.rows.iter().map(|r| r[j]).collect();
                let scale = std_dev(&column);
                let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };
                (mean(&column), scale)
            })
            .unzip();

        let standardized: Vec<Vec<f64>> = x
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .zip(means.iter().zip(&scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect();

        let mut weights = vec![0.0; width];
        let mut bias = self.initial_bias(&targets);
        let TrainingParams {
            learning_rate,
            epochs,
            l2,
        } = self.params;

        for epoch in 0..epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, target) in standardized.iter().zip(&targets) {
                let z = row.iter().zip(&weights).map(|(v, w)| v * w).sum::<f64>() + bias;
                let err = self.link(z) - target;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= learning_rate * (g / n as f64 + l2 * *w);
            }
            bias -= learning_rate * grad_b / n as f64;

            if epoch % 100 == 0 {
                debug!("Epoch {}: bias={:.4}", epoch, bias);
            }
        }

        self.fitted = Some(ModelArtifact {
            format_version: MODEL_FORMAT_VERSION,
            target: self.target,
            columns: x.columns.clone(),
            means,
            scales,
            weights,
            bias,
            params: self.params,
            training_rows: n,
            encoding_fingerprint: None,
            trained_at: Utc::now(),
        });
        info!("Fitted {:?} model on {} rows x {} columns", self.target, n, width);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, InferenceError> {
        let fitted = self.fitted.as_ref().ok_or(InferenceError::NotTrained)?;
        if x.columns != fitted.columns {
            return Err(InferenceError::InvalidInputShape {
                expected: fitted.columns.join(","),
                actual: x.columns.join(","),
            });
        }
        check_width(fitted.columns.len(), x)?;

        Ok(x.rows
            .iter()
            .map(|row| self.link(fitted.linear_term(row)))
            .collect())
    }

    fn feature_importance(&self) -> Result<Vec<(String, f64)>, InferenceError> {
        let fitted = self.fitted.as_ref().ok_or(InferenceError::NotTrained)?;
        let total: f64 = fitted.weights.iter().map(|w| w.abs()).sum();

        let mut importance: Vec<(String, f64)> = fitted
            .columns
            .iter()
            .zip(&fitted.weights)
            .map(|(column, w)| {
                let share = if total > 0.0 { w.abs() / total } else { 0.0 };
                (column.clone(), share)
            })
            .collect();
        importance.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(importance)
    }
}

/// Held-out score of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    /// Share of correctly classified rows (threshold 0.5)
    Accuracy(f64),
    /// Mean absolute error in minutes
    MeanAbsoluteError(f64),
}

/// Score `model` on a test split
pub fn evaluate<M: DelayModel + ?Sized>(
    model: &M,
    x: &FeatureMatrix,
    y: &TargetVector,
) -> Result<Evaluation, InferenceError> {
    if x.is_empty() {
        return Err(InferenceError::EmptyTrainingSet);
    }
    let predictions = model.predict(x)?;
    let n = predictions.len() as f64;

    match y {
        TargetVector::MinorDelay(labels) => {
            let correct = predictions
                .iter()
                .zip(labels)
                .filter(|&(p, &label)| (*p > 0.5) == label)
                .count();
            Ok(Evaluation::Accuracy(correct as f64 / n))
        }
        TargetVector::DelayMinutes(minutes) => {
            let total: f64 = predictions
                .iter()
                .zip(minutes)
                .map(|(p, m)| (p - m).abs())
                .sum();
            Ok(Evaluation::MeanAbsoluteError(total / n))
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn check_width(expected: usize, x: &FeatureMatrix) -> Result<(), InferenceError> {
    match x.rows.first() {
        Some(row) if row.len() != expected => Err(InferenceError::InvalidInputShape {
            expected: format!("{} columns", expected),
            actual: format!("{} columns", row.len()),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset::{FEATURE_COLUMNS, FEATURE_COUNT};
    use proptest::prelude::*;

    fn matrix(values: &[f64]) -> FeatureMatrix {
        FeatureMatrix {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: values
                .iter()
                .map(|&v| {
                    let mut row = [0.0; FEATURE_COUNT];
                    row[5] = v;
                    row
                })
                .collect(),
        }
    }

    fn separable() -> (FeatureMatrix, TargetVector) {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let labels = values.iter().map(|&v| v < 20.0).collect();
        (matrix(&values), TargetVector::MinorDelay(labels))
    }

    #[test]
    fn test_classifier_separates_classes() {
        let (x, y) = separable();
        let mut model = LinearModel::classifier();
        model.fit(&x, &y).unwrap();

        let scores = model.predict(&x).unwrap();
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        assert!(scores[0] > 0.5);
        assert!(scores[39] < 0.5);
        assert_eq!(evaluate(&model, &x, &y).unwrap(), Evaluation::Accuracy(1.0));
    }

    #[test]
    fn test_regressor_recovers_linear_relation() {
        let values: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let minutes = values.iter().map(|v| 3.0 * v + 5.0).collect();
        let x = matrix(&values);
        let y = TargetVector::DelayMinutes(minutes);

        let mut model = LinearModel::regressor();
        model.fit(&x, &y).unwrap();

        let predicted = model.predict(&matrix(&[10.0])).unwrap();
        assert!((predicted[0] - 35.0).abs() < 0.1, "got {}", predicted[0]);
        match evaluate(&model, &x, &y).unwrap() {
            Evaluation::MeanAbsoluteError(mae) => assert!(mae < 0.1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_importance_ranks_informative_feature_first() {
        let (x, y) = separable();
        let mut model = LinearModel::classifier();
        model.fit(&x, &y).unwrap();

        let importance = model.feature_importance().unwrap();
        assert_eq!(importance.len(), FEATURE_COUNT);
        assert_eq!(importance[0].0, FEATURE_COLUMNS[5]);
        assert!((importance[0].1 - 1.0).abs() < 1e-9);
        assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_unfitted_model() {
        let model = LinearModel::classifier();
        assert!(matches!(model.predict(&matrix(&[1.0])), Err(InferenceError::NotTrained)));
        assert!(matches!(model.feature_importance(), Err(InferenceError::NotTrained)));
    }

    #[test]
    fn test_fit_validation() {
        let mut model = LinearModel::classifier();
        assert!(matches!(
            model.fit(&matrix(&[]), &TargetVector::MinorDelay(vec![])),
            Err(InferenceError::EmptyTrainingSet)
        ));
        assert!(matches!(
            model.fit(&matrix(&[1.0]), &TargetVector::DelayMinutes(vec![1.0])),
            Err(InferenceError::TargetMismatch { .. })
        ));
        assert!(matches!(
            model.fit(&matrix(&[1.0, 2.0]), &TargetVector::MinorDelay(vec![true])),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_predict_rejects_other_columns() {
        let (x, y) = separable();
        let mut model = LinearModel::classifier();
        model.fit(&x, &y).unwrap();

        let mut renamed = matrix(&[1.0]);
        renamed.columns[0] = "week".to_string();
        assert!(matches!(
            model.predict(&renamed),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        assert!(LinearModel::load(&path).unwrap().is_none());

        let (x, y) = separable();
        let mut model = LinearModel::classifier();
        model.fit(&x, &y).unwrap();
        model.set_encoding_fingerprint("abc123").unwrap();
        model.save(&path).unwrap();

        let loaded = LinearModel::load(&path).unwrap().unwrap();
        assert_eq!(loaded.target(), TargetKind::Classification);
        assert_eq!(loaded.artifact(), model.artifact());
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_save_unfitted_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LinearModel::regressor().save(&dir.path().join("model.json")),
            Err(InferenceError::NotTrained)
        ));
    }

    proptest! {
        #[test]
        fn prop_classifier_scores_are_probabilities(
            values in prop::collection::vec(-1000.0f64..1000.0, 2..30),
            delay in -1e6f64..1e6,
        ) {
            let labels = values.iter().map(|&v| v > 0.0).collect();
            let mut model = LinearModel::new(
                TargetKind::Classification,
                TrainingParams { epochs: 20, ..TrainingParams::default() },
            );
            model.fit(&matrix(&values), &TargetVector::MinorDelay(labels)).unwrap();
            let score = model.predict(&matrix(&[delay])).unwrap()[0];
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
