//! Target and Cyclic Encoding Primitives
//!
//! `EncodingMap` is the persisted artefact shared by training and serving: it
//! maps (categorical column, category value) to the mean regression target
//! observed during training. A map is immutable once built.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;
use tracing::debug;

use crate::statistics::round_to;
use crate::FeatureError;

/// Bumped whenever the serialized layout of `EncodingMap` changes
pub const ENCODING_FORMAT_VERSION: u32 = 1;

/// Decimal places kept for encoded values
pub const ENCODING_DECIMALS: i32 = 3;

/// Category value -> mean target for one column
pub type ColumnEncoding = BTreeMap<String, f64>;

/// Learned target encodings for every categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingMap {
    /// Layout version of the persisted map
    pub format_version: u32,
    /// Digest of the training rows and learned means
    pub fingerprint: String,
    /// Number of rows the map was fitted on
    pub training_rows: usize,
    /// When the map was fitted
    pub created_at: DateTime<Utc>,
    columns: BTreeMap<String, ColumnEncoding>,
}

impl EncodingMap {
    /// Encoded value of a category, failing on columns or values never seen in training
    pub fn lookup(&self, column: &str, value: &str) -> Result<f64, FeatureError> {
        let encoding = self
            .columns
            .get(column)
            .ok_or_else(|| FeatureError::MissingColumn(column.to_string()))?;

        encoding
            .get(value)
            .copied()
            .ok_or_else(|| FeatureError::UnknownCategory {
                column: column.to_string(),
                value: value.to_string(),
            })
    }

    /// Total number of (column, value) entries
    pub fn len(&self) -> usize {
        self.columns.values().map(BTreeMap::len).sum()
    }

    /// Whether the map holds no encodings
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accumulates column encodings and seals them into an `EncodingMap`
#[derive(Debug, Default)]
pub struct EncodingMapBuilder {
    columns: BTreeMap<String, ColumnEncoding>,
    training_rows: usize,
}

impl EncodingMapBuilder {
    /// Start a map fitted on `training_rows` rows
    pub fn new(training_rows: usize) -> Self {
        Self {
            columns: BTreeMap::new(),
            training_rows,
        }
    }

    /// Fit the target encoding of one column, replacing any previous fit
    pub fn fit_column(
        &mut self,
        column: &str,
        values: &[&str],
        targets: &[f64],
    ) -> Result<&mut Self, FeatureError> {
        let encoding = target_encoding(values, targets)?;
        debug!("Fitted {} categories for column {}", encoding.len(), column);
        self.columns.insert(column.to_string(), encoding);
        Ok(self)
    }

    /// Seal the map, computing its fingerprint
    pub fn build(self) -> EncodingMap {
        let fingerprint = fingerprint(&self.columns, self.training_rows);
        EncodingMap {
            format_version: ENCODING_FORMAT_VERSION,
            fingerprint,
            training_rows: self.training_rows,
            created_at: Utc::now(),
            columns: self.columns,
        }
    }
}

/// Mean target per category value, rounded to 3 decimals
pub fn target_encoding(values: &[&str], targets: &[f64]) -> Result<ColumnEncoding, FeatureError> {
    if values.len() != targets.len() {
        return Err(FeatureError::LengthMismatch {
            values: values.len(),
            targets: targets.len(),
        });
    }

    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for (&value, &target) in values.iter().zip(targets) {
        let entry = sums.entry(value).or_insert((0.0, 0));
        entry.0 += target;
        entry.1 += 1;
    }

    Ok(sums
        .into_iter()
        .map(|(value, (sum, count))| {
            (value.to_string(), round_to(sum / count as f64, ENCODING_DECIMALS))
        })
        .collect())
}

fn fingerprint(columns: &BTreeMap<String, ColumnEncoding>, training_rows: usize) -> String {
    let mut context = md5::Context::new();
    context.consume(training_rows.to_le_bytes());
    for (column, encoding) in columns {
        context.consume(column.as_bytes());
        context.consume([0u8]);
        for (value, mean) in encoding {
            context.consume(value.as_bytes());
            context.consume([0u8]);
            context.consume(mean.to_le_bytes());
        }
    }
    format!("{:x}", context.compute())
}

/// Cyclic encoding of a departure timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclicDate {
    /// Calendar year, kept as a plain number
    pub year: f64,
    /// cos(2π · month / 12)
    pub month: f64,
    /// cos(2π · day / 31)
    pub day: f64,
    /// cos(2π · hour / 24)
    pub hour: f64,
}

impl CyclicDate {
    /// Names of the generated columns, in output order
    pub const COLUMNS: [&'static str; 4] = ["year", "month", "day", "hour"];

    /// Encode a timestamp
    pub fn encode(timestamp: NaiveDateTime) -> Self {
        Self {
            year: timestamp.year() as f64,
            month: cyclic_cos(timestamp.month(), 12.0),
            day: cyclic_cos(timestamp.day(), 31.0),
            hour: cyclic_cos(timestamp.hour(), 24.0),
        }
    }

    /// Values in `COLUMNS` order
    pub fn to_array(&self) -> [f64; 4] {
        [self.year, self.month, self.day, self.hour]
    }
}

/// Cosine of the fractional position of `value` in `period`, rounded to 3 decimals
pub fn cyclic_cos(value: u32, period: f64) -> f64 {
    round_to((TAU * value as f64 / period).cos(), ENCODING_DECIMALS)
}
