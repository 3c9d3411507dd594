//! Offline Training Run
//!
//! The freshly fitted encoding map is published only after the model trained
//! on it has been saved, so a failed run leaves the served pair untouched.

use data_cleaner::{CleanReport, RawRow};
use dataset::{AnomalyReport, Dataset, TrainingOptions};
use inference_engine::{InferenceEngine, TrainingOutcome, TrainingParams};
use storage::EncodingStore;
use tracing::info;

use crate::ApiError;

/// Summary of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub clean_report: CleanReport,
    pub anomaly_report: Option<AnomalyReport>,
    pub outcome: TrainingOutcome,
    pub encoding_fingerprint: String,
}

/// Prepare, fit and evaluate, then save the model and publish its encodings
pub fn run_training(
    rows: &[RawRow],
    encodings: &EncodingStore,
    engine: &InferenceEngine,
    options: &TrainingOptions,
    params: TrainingParams,
) -> Result<TrainingRun, ApiError> {
    let prepared = Dataset::prepare_training(rows, options)?;
    let fingerprint = prepared.encoding.fingerprint.clone();

    let outcome = engine.train(&prepared.split, params, &fingerprint)?;
    encodings.persist(prepared.encoding)?;
    metrics::gauge!("encoding_map_generation").set(encodings.generation() as f64);
    info!("Published encoding map {} with its model", fingerprint);

    Ok(TrainingRun {
        clean_report: prepared.clean_report,
        anomaly_report: prepared.anomaly_report,
        outcome,
        encoding_fingerprint: fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::flight;

    fn history() -> Vec<RawRow> {
        (1..=20)
            .map(|day| {
                if day % 2 == 0 {
                    flight(day, "Grupo LATAM", 5)
                } else {
                    flight(day, "Sky Airline", 45)
                }
            })
            .collect()
    }

    #[test]
    fn test_model_and_map_share_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let encodings = EncodingStore::new(dir.path().join("encodings.json"));
        let engine = InferenceEngine::new(dir.path().join("model.json"));

        let run = run_training(&history(), &encodings, &engine, &TrainingOptions::default(), TrainingParams::default())
            .unwrap();
        let map = encodings.snapshot().unwrap().unwrap();
        assert_eq!(map.fingerprint, run.encoding_fingerprint);
        assert_eq!(
            engine.model().unwrap().artifact().unwrap().encoding_fingerprint.as_deref(),
            Some(run.encoding_fingerprint.as_str())
        );
        assert_eq!(run.outcome.test_rows, 4);
    }

    #[test]
    fn test_failed_run_keeps_published_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.json");
        let encodings = EncodingStore::new(&path);
        let engine = InferenceEngine::new(dir.path().join("model.json"));
        let options = TrainingOptions::default();

        let first = run_training(&history(), &encodings, &engine, &options, TrainingParams::default()).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();

        // one usable row cannot be split into train and test
        let single = vec![flight(3, "Grupo LATAM", 50)];
        assert!(run_training(&single, &encodings, &engine, &options, TrainingParams::default()).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), on_disk);
        assert_eq!(encodings.generation(), 1);
        assert_eq!(
            EncodingStore::open(&path).unwrap().snapshot().unwrap().unwrap().fingerprint,
            first.encoding_fingerprint
        );
    }
}
