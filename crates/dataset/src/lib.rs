//! Flight Dataset Pipeline
//!
//! Encoding, anomaly filtering, CSV loading and the train/test split on top of
//! the cleaned flight rows.

pub mod anomaly;
mod dataset;
pub mod encoder;
mod error;
mod loader;
pub mod matrix;

pub use anomaly::{filter_anomalies, AnomalyReport, Criterion, DelayTarget};
pub use dataset::{Dataset, DatasetConfig, PreparedTraining, TrainingOptions};
pub use encoder::{EncodedRow, Encoder, FEATURE_COLUMNS, FEATURE_COUNT};
pub use error::DatasetError;
pub use loader::{read_csv, read_csv_from_reader};
pub use matrix::{split_train_test, FeatureMatrix, TargetKind, TargetVector, TrainTestSplit};

#[cfg(test)]
pub(crate) mod test_support {
    use data_cleaner::RawRow;

    /// A complete historical row on the SCEL -> KMIA route
    pub fn flight(operator: &str, scheduled: &str, actual: Option<&str>) -> RawRow {
        let mut row: RawRow = [
            ("Fecha-I", scheduled),
            ("Vlo-I", "226"),
            ("Ori-I", "SCEL"),
            ("Des-I", "KMIA"),
            ("Emp-I", "AAL"),
            ("DIA", "1"),
            ("MES", "1"),
            ("AÑO", "2017"),
            ("TIPOVUELO", "I"),
            ("OPERA", operator),
            ("SIGLAORI", "Santiago"),
            ("SIGLADES", "Miami"),
        ]
        .into_iter()
        .collect();
        if let Some(actual) = actual {
            row.insert("Fecha-O", actual);
        }
        row
    }
}
