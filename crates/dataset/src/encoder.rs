//! Categorical and Temporal Encoder
//!
//! Replaces categorical columns by their target encoding and the scheduled
//! departure by its cyclic date parts. Row order and count are preserved.

use data_cleaner::{CleanedRow, Column};
use feature_engine::{CyclicDate, Delay, EncodingMap, EncodingMapBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DatasetError;

/// Number of predictor columns
pub const FEATURE_COUNT: usize = 17;

/// Predictor column names in matrix order
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "year",
    "month",
    "day",
    "hour",
    "Vlo-I",
    "Ori-I",
    "Des-I",
    "Emp-I",
    "DIA",
    "MES",
    "AÑO",
    "TIPOVUELO",
    "OPERA",
    "SIGLAORI",
    "SIGLADES",
    "Temporada alta",
    "Periodo día",
];

/// A fully numeric row plus its (optional) targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRow {
    /// Values in `FEATURE_COLUMNS` order
    pub features: [f64; FEATURE_COUNT],
    pub delay: Delay,
}

impl EncodedRow {
    /// Value of a named predictor column
    pub fn feature(&self, name: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|column| *column == name)
            .map(|idx| self.features[idx])
    }
}

/// Fit and apply target/cyclic encodings
pub struct Encoder;

impl Encoder {
    /// Encode rows with the supplied map, or fit a fresh one.
    ///
    /// The second element is `Some` only when a map was fitted and still needs
    /// to be persisted.
    pub fn encode(
        rows: &[CleanedRow],
        map: Option<&EncodingMap>,
    ) -> Result<(Vec<EncodedRow>, Option<EncodingMap>), DatasetError> {
        match map {
            Some(map) => Ok((Self::transform(rows, map)?, None)),
            None => {
                let fitted = Self::fit(rows)?;
                let encoded = Self::transform(rows, &fitted)?;
                Ok((encoded, Some(fitted)))
            }
        }
    }

    /// Fit the target encoding of every categorical column
    pub fn fit(rows: &[CleanedRow]) -> Result<EncodingMap, DatasetError> {
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }

        let targets = rows
            .iter()
            .map(CleanedRow::delay_minutes)
            .collect::<Option<Vec<f64>>>()
            .ok_or(DatasetError::State(
                "encodings can only be fitted on rows with an observed delay",
            ))?;

        let mut builder = EncodingMapBuilder::new(rows.len());
        for column in Column::CATEGORICAL {
            let values: Vec<&str> = rows
                .iter()
                .map(|row| row.categorical(column).unwrap_or_default())
                .collect();
            builder.fit_column(column.name(), &values, &targets)?;
        }

        let map = builder.build();
        info!(
            "Fitted encoding map on {} rows ({} entries, fingerprint {})",
            rows.len(),
            map.len(),
            map.fingerprint
        );
        Ok(map)
    }

    /// Encode rows with an existing map, failing on unseen categories
    pub fn transform(rows: &[CleanedRow], map: &EncodingMap) -> Result<Vec<EncodedRow>, DatasetError> {
        let encoded = rows
            .iter()
            .map(|row| Self::encode_row(row, map))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Encoded {} rows", encoded.len());
        Ok(encoded)
    }

    fn encode_row(row: &CleanedRow, map: &EncodingMap) -> Result<EncodedRow, DatasetError> {
        let mut features = [0.0; FEATURE_COUNT];
        let date = CyclicDate::encode(row.record.scheduled_departure).to_array();
        features[..date.len()].copy_from_slice(&date);

        let predictors = Column::INPUT
            .iter()
            .filter(|column| **column != Column::ScheduledDeparture);
        for (slot, column) in features[date.len()..].iter_mut().zip(predictors) {
            *slot = match column {
                Column::Day => row.record.day as f64,
                Column::Month => row.record.month as f64,
                Column::Year => row.record.year as f64,
                Column::HighSeason => {
                    if row.is_high_season() {
                        1.0
                    } else {
                        0.0
                    }
                }
                categorical => {
                    let value = row.categorical(*categorical).unwrap_or_default();
                    map.lookup(categorical.name(), value)?
                }
            };
        }

        Ok(EncodedRow {
            features,
            delay: row.delay(),
        })
    }
}
