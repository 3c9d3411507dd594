//! Delay Anomaly Filter
//!
//! Scores the regression target and keeps rows whose score is strictly below
//! the threshold. The filter is one-sided: very early departures (large
//! negative scores) are kept.

use data_cleaner::CleanedRow;
use feature_engine::statistics::{robust_zscore, round_to, zscore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::encoder::EncodedRow;
use crate::DatasetError;

/// Outlier score used by the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    /// `(x - mean) / stddev`
    ZScore,
    /// `0.6745 * (x - median) / MAD`
    RobustZScore,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::ZScore => "zscore",
            Criterion::RobustZScore => "r-zscore",
        }
    }

    /// Score every value
    pub fn scores(&self, values: &[f64]) -> Vec<f64> {
        match self {
            Criterion::ZScore => zscore(values),
            Criterion::RobustZScore => robust_zscore(values),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zscore" => Ok(Criterion::ZScore),
            "r-zscore" => Ok(Criterion::RobustZScore),
            other => Err(DatasetError::UnsupportedCriterion(other.to_string())),
        }
    }
}

/// Rows carrying the regression target
pub trait DelayTarget {
    fn delay_minutes(&self) -> Option<f64>;
}

impl DelayTarget for CleanedRow {
    fn delay_minutes(&self) -> Option<f64> {
        CleanedRow::delay_minutes(self)
    }
}

impl DelayTarget for EncodedRow {
    fn delay_minutes(&self) -> Option<f64> {
        self.delay.minutes().ok()
    }
}

/// Outcome of an anomaly filtering pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub criterion: Criterion,
    pub threshold: f64,
    pub input_rows: usize,
    pub kept_rows: usize,
}

impl AnomalyReport {
    pub fn removed_rows(&self) -> usize {
        self.input_rows - self.kept_rows
    }

    /// Fraction of rows removed, 0.0 for an empty input
    pub fn removed_fraction(&self) -> f64 {
        if self.input_rows == 0 {
            0.0
        } else {
            self.removed_rows() as f64 / self.input_rows as f64
        }
    }
}

/// Keep-mask over the rows: `true` where the score is below the threshold
pub fn anomaly_mask<T: DelayTarget>(
    rows: &[T],
    criterion: Criterion,
    threshold: f64,
) -> Result<Vec<bool>, DatasetError> {
    let delays = rows
        .iter()
        .map(DelayTarget::delay_minutes)
        .collect::<Option<Vec<f64>>>()
        .ok_or(DatasetError::State(
            "anomaly filtering needs rows with an observed delay",
        ))?;

    Ok(criterion
        .scores(&delays)
        .into_iter()
        .map(|score| score < threshold)
        .collect())
}

/// Drop rows whose delay score is not strictly below `threshold`
pub fn filter_anomalies<T: DelayTarget>(
    rows: Vec<T>,
    criterion: Criterion,
    threshold: f64,
) -> Result<(Vec<T>, AnomalyReport), DatasetError> {
    let mask = anomaly_mask(&rows, criterion, threshold)?;
    let input_rows = rows.len();
    let kept = apply_mask(rows, &mask);

    let report = AnomalyReport {
        criterion,
        threshold,
        input_rows,
        kept_rows: kept.len(),
    };
    record_report(&report);
    Ok((kept, report))
}

pub(crate) fn apply_mask<T>(rows: Vec<T>, mask: &[bool]) -> Vec<T> {
    rows.into_iter()
        .zip(mask)
        .filter_map(|(row, &keep)| keep.then_some(row))
        .collect()
}

pub(crate) fn record_report(report: &AnomalyReport) {
    let ratio = report.removed_fraction();
    metrics::gauge!("dataset_anomaly_removed_ratio").set(ratio);
    info!(
        "Reduced dataset by {}% after removing outliers ({} > {})",
        round_to(ratio * 100.0, 3),
        report.criterion,
        report.threshold
    );
}
