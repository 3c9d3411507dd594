//! Dataset Facade
//!
//! Sequences cleaning, encoding, anomaly removal and the target/train-test
//! splits. Every step that depends on a previous one checks for it and fails
//! with `DatasetError::State` instead of panicking.

use data_cleaner::{CleanReport, CleanedRow, Cleaner, RawRow};
use feature_engine::EncodingMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::anomaly::{anomaly_mask, apply_mask, record_report, AnomalyReport, Criterion};
use crate::encoder::{EncodedRow, Encoder};
use crate::loader::read_csv;
use crate::matrix::{split_train_test, FeatureMatrix, TargetKind, TargetVector, TrainTestSplit};
use crate::DatasetError;

/// Train/test split parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Options for a full training preparation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub target: TargetKind,
    pub criterion: Criterion,
    /// No anomaly filtering when `None`
    pub threshold: Option<f64>,
    pub split: DatasetConfig,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            target: TargetKind::Classification,
            criterion: Criterion::RobustZScore,
            threshold: None,
            split: DatasetConfig::default(),
        }
    }
}

/// Everything a training run needs from the dataset.
///
/// `encoding` is staged: it has not been persisted or installed yet. Publish
/// it with `EncodingStore::persist` once the model trained on it is saved.
#[derive(Debug, Clone)]
pub struct PreparedTraining {
    pub split: TrainTestSplit,
    pub encoding: EncodingMap,
    pub clean_report: CleanReport,
    pub anomaly_report: Option<AnomalyReport>,
}

/// Cleaned (and optionally encoded) flight rows
#[derive(Debug, Clone)]
pub struct Dataset {
    cleaned: Vec<CleanedRow>,
    report: CleanReport,
    encoded: Option<Vec<EncodedRow>>,
}

impl Dataset {
    /// Clean raw rows; failing rows are dropped and counted
    pub fn from_raw(rows: &[RawRow], cleaner: &Cleaner) -> Self {
        let (cleaned, report) = cleaner.clean(rows);

        metrics::counter!("cleaner_rows_dropped_total", "reason" => "missing")
            .increment(report.dropped_missing as u64);
        metrics::counter!("cleaner_rows_dropped_total", "reason" => "invalid")
            .increment(report.dropped_invalid as u64);

        Self {
            cleaned,
            report,
            encoded: None,
        }
    }

    /// Load and clean a historical CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, cleaner: &Cleaner) -> Result<Self, DatasetError> {
        let rows = read_csv(path)?;
        Ok(Self::from_raw(&rows, cleaner))
    }

    /// Clean a single request row, surfacing the first error
    pub fn from_request(row: &RawRow) -> Result<Self, DatasetError> {
        let cleaned = Cleaner::inference().clean_row(row)?;
        Ok(Self {
            cleaned: vec![cleaned],
            report: CleanReport {
                input_rows: 1,
                kept_rows: 1,
                ..CleanReport::default()
            },
            encoded: None,
        })
    }

    pub fn cleaned(&self) -> &[CleanedRow] {
        &self.cleaned
    }

    pub fn clean_report(&self) -> &CleanReport {
        &self.report
    }

    /// Encoded rows, `None` before `encode`
    pub fn encoded(&self) -> Option<&[EncodedRow]> {
        self.encoded.as_deref()
    }

    pub fn len(&self) -> usize {
        self.cleaned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned.is_empty()
    }

    /// Encode with `map`, or fit a new one. Returns the freshly fitted map.
    pub fn encode(&mut self, map: Option<&EncodingMap>) -> Result<Option<EncodingMap>, DatasetError> {
        let (encoded, fitted) = Encoder::encode(&self.cleaned, map)?;
        self.encoded = Some(encoded);
        Ok(fitted)
    }

    /// Fit encodings on this dataset and encode with them. The map is returned
    /// unpublished.
    pub fn encode_for_training(&mut self) -> Result<EncodingMap, DatasetError> {
        let map = Encoder::fit(&self.cleaned)?;
        self.encoded = Some(Encoder::transform(&self.cleaned, &map)?);
        Ok(map)
    }

    /// Encode with a published map, typically the store's current snapshot
    pub fn encode_for_inference(&mut self, map: &EncodingMap) -> Result<(), DatasetError> {
        self.encoded = Some(Encoder::transform(&self.cleaned, map)?);
        Ok(())
    }

    /// Drop rows whose delay score is not below `threshold`
    pub fn remove_anomalies(
        &mut self,
        criterion: Criterion,
        threshold: f64,
    ) -> Result<AnomalyReport, DatasetError> {
        let mask = anomaly_mask(&self.cleaned, criterion, threshold)?;
        let input_rows = self.cleaned.len();

        self.cleaned = apply_mask(std::mem::take(&mut self.cleaned), &mask);
        if let Some(encoded) = self.encoded.take() {
            self.encoded = Some(apply_mask(encoded, &mask));
        }

        let report = AnomalyReport {
            criterion,
            threshold,
            input_rows,
            kept_rows: self.cleaned.len(),
        };
        record_report(&report);
        Ok(report)
    }

    /// Separate predictors from the target.
    ///
    /// The target is `None` when any row lacks an observed delay (request rows).
    pub fn split_target(&self, kind: TargetKind) -> Result<(FeatureMatrix, Option<TargetVector>), DatasetError> {
        let encoded = self
            .encoded
            .as_deref()
            .ok_or(DatasetError::State("split_target called before encode"))?;
        Ok((
            FeatureMatrix::from_rows(encoded),
            TargetVector::from_rows(encoded, kind),
        ))
    }

    /// Train/test split of the encoded rows
    pub fn split_train_test(
        &self,
        kind: TargetKind,
        config: &DatasetConfig,
    ) -> Result<TrainTestSplit, DatasetError> {
        let (x, y) = self.split_target(kind)?;
        let y = y.ok_or(DatasetError::State(
            "train/test split needs rows with an observed delay",
        ))?;
        split_train_test(&x, &y, config.test_fraction, config.seed)
    }

    /// Clean, fit encodings, optionally filter anomalies, then split
    pub fn prepare_training(rows: &[RawRow], options: &TrainingOptions) -> Result<PreparedTraining, DatasetError> {
        let mut dataset = Self::from_raw(rows, &Cleaner::training());
        if dataset.is_empty() {
            warn!("No usable rows out of {}", rows.len());
            return Err(DatasetError::Empty);
        }

        let encoding = dataset.encode_for_training()?;
        let anomaly_report = options
            .threshold
            .map(|threshold| dataset.remove_anomalies(options.criterion, threshold))
            .transpose()?;

        let split = dataset.split_train_test(options.target, &options.split)?;
        info!(
            "Prepared {} training and {} test rows ({:?} target)",
            split.x_train.len(),
            split.x_test.len(),
            options.target
        );

        Ok(PreparedTraining {
            split,
            encoding,
            clean_report: dataset.report,
            anomaly_report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::flight;
    use storage::EncodingStore;

    fn history() -> Vec<RawRow> {
        let mut rows = Vec::new();
        for day in 1..=9 {
            let scheduled = format!("2017-01-0{} 10:00:00", day);
            let actual = format!("2017-01-0{} 10:{:02}:00", day, day * 3);
            let operator = if day % 2 == 0 { "A" } else { "B" };
            rows.push(flight(operator, &scheduled, Some(&actual)));
        }
        // far outlier: 10 hours late
        rows.push(flight("A", "2017-01-10 10:00:00", Some("2017-01-10 20:00:00")));
        rows
    }

    #[test]
    fn test_encode_persist_reload_reencode_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.json");
        let rows = history();

        let mut training = Dataset::from_raw(&rows, &Cleaner::training());
        let map = training.encode_for_training().unwrap();
        EncodingStore::new(&path).persist(map).unwrap();

        let reopened = EncodingStore::open(&path).unwrap().snapshot().unwrap().unwrap();
        let mut again = Dataset::from_raw(&rows, &Cleaner::training());
        again.encode_for_inference(&reopened).unwrap();

        assert_eq!(training.encoded(), again.encoded());
    }

    #[test]
    fn test_split_target_before_encode_is_state_error() {
        let dataset = Dataset::from_raw(&history(), &Cleaner::training());
        assert!(matches!(
            dataset.split_target(TargetKind::Classification),
            Err(DatasetError::State(_))
        ));
    }

    #[test]
    fn test_request_with_unseen_operator() {
        let map = Dataset::from_raw(&history(), &Cleaner::training())
            .encode_for_training()
            .unwrap();
        let mut request =
            Dataset::from_request(&flight("C", "2017-02-01 08:00:00", None)).unwrap();
        assert!(matches!(
            request.encode_for_inference(&map),
            Err(DatasetError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_request_has_features_but_no_target() {
        let map = Dataset::from_raw(&history(), &Cleaner::training())
            .encode_for_training()
            .unwrap();

        let mut request =
            Dataset::from_request(&flight("B", "2017-02-01 08:00:00", None)).unwrap();
        request.encode_for_inference(&map).unwrap();
        let (x, y) = request.split_target(TargetKind::Classification).unwrap();
        assert_eq!(x.len(), 1);
        assert!(y.is_none());
    }

    #[test]
    fn test_remove_anomalies_keeps_rows_aligned() {
        let mut dataset = Dataset::from_raw(&history(), &Cleaner::training());
        dataset.encode_for_training().unwrap();

        let report = dataset.remove_anomalies(Criterion::RobustZScore, 3.5).unwrap();
        assert_eq!(report.removed_rows(), 1);
        assert_eq!(dataset.len(), 9);
        assert_eq!(dataset.encoded().unwrap().len(), 9);
        assert!(dataset
            .encoded()
            .unwrap()
            .iter()
            .all(|row| row.delay.minutes().unwrap() < 600.0));
    }

    #[test]
    fn test_prepare_training() {
        let options = TrainingOptions {
            threshold: Some(3.5),
            ..TrainingOptions::default()
        };

        let prepared = Dataset::prepare_training(&history(), &options).unwrap();
        assert_eq!(prepared.split.x_test.len(), 2);
        assert_eq!(prepared.split.x_train.len(), 7);
        assert_eq!(prepared.split.y_train.kind(), TargetKind::Classification);
        assert_eq!(prepared.anomaly_report.unwrap().kept_rows, 9);
        assert_eq!(prepared.encoding.training_rows, 10);
    }

    #[test]
    fn test_prepare_training_on_unusable_rows() {
        let rows = vec![flight("A", "2017-01-01 10:00:00", None)];
        assert!(matches!(
            Dataset::prepare_training(&rows, &TrainingOptions::default()),
            Err(DatasetError::Empty)
        ));
    }
}
