//! Feature Matrix and Train/Test Split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::encoder::{EncodedRow, FEATURE_COLUMNS, FEATURE_COUNT};
use crate::DatasetError;

/// Which target a model is trained against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// `Retraso` in minutes
    Regression,
    /// `Atraso menor`
    Classification,
}

impl FromStr for TargetKind {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regression" => Ok(TargetKind::Regression),
            "classification" => Ok(TargetKind::Classification),
            other => Err(DatasetError::InvalidParameter(format!(
                "unknown target {:?}",
                other
            ))),
        }
    }
}

/// Row-major predictor matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<[f64; FEATURE_COUNT]>,
}

impl FeatureMatrix {
    pub fn from_rows(rows: &[EncodedRow]) -> Self {
        Self {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(|r| r.features).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i]).collect(),
        }
    }
}

/// Target column extracted from encoded rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetVector {
    DelayMinutes(Vec<f64>),
    MinorDelay(Vec<bool>),
}

impl TargetVector {
    /// Collect the requested target; `None` when any row has no observed delay
    pub fn from_rows(rows: &[EncodedRow], kind: TargetKind) -> Option<Self> {
        match kind {
            TargetKind::Regression => rows
                .iter()
                .map(|r| r.delay.minutes().ok())
                .collect::<Option<Vec<_>>>()
                .map(TargetVector::DelayMinutes),
            TargetKind::Classification => rows
                .iter()
                .map(|r| r.delay.is_minor().ok())
                .collect::<Option<Vec<_>>>()
                .map(TargetVector::MinorDelay),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TargetVector::DelayMinutes(v) => v.len(),
            TargetVector::MinorDelay(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            TargetVector::DelayMinutes(_) => TargetKind::Regression,
            TargetVector::MinorDelay(_) => TargetKind::Classification,
        }
    }

    /// Numeric view: minutes, or 1.0 / 0.0 for the binary target
    pub fn as_f64(&self) -> Vec<f64> {
        match self {
            TargetVector::DelayMinutes(v) => v.clone(),
            TargetVector::MinorDelay(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }

    fn select(&self, indices: &[usize]) -> Self {
        match self {
            TargetVector::DelayMinutes(v) => {
                TargetVector::DelayMinutes(indices.iter().map(|&i| v[i]).collect())
            }
            TargetVector::MinorDelay(v) => {
                TargetVector::MinorDelay(indices.iter().map(|&i| v[i]).collect())
            }
        }
    }
}

/// Disjoint train/test partitions
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub x_train: FeatureMatrix,
    pub x_test: FeatureMatrix,
    pub y_train: TargetVector,
    pub y_test: TargetVector,
}

/// Shuffle rows with `seed` and hold out `ceil(n * test_fraction)` of them
pub fn split_train_test(
    x: &FeatureMatrix,
    y: &TargetVector,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, DatasetError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DatasetError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    if x.len() != y.len() {
        return Err(DatasetError::InvalidParameter(format!(
            "feature rows ({}) and targets ({}) differ in length",
            x.len(),
            y.len()
        )));
    }

    let n = x.len();
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 || n_test >= n {
        return Err(DatasetError::InvalidParameter(format!(
            "cannot split {} rows with test_fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    Ok(TrainTestSplit {
        x_train: x.select(train_idx),
        x_test: x.select(test_idx),
        y_train: y.select(train_idx),
        y_test: y.select(test_idx),
    })
}
