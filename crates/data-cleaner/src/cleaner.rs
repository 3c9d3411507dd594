//! Row Cleaner
//!
//! Projects raw rows onto the recognized schema, drops incomplete rows and
//! coerces every value to its declared type. Rows that fail are dropped and
//! counted; `clean_row` is the strict single-row variant.

use chrono::{DateTime, NaiveDateTime};
use feature_engine::{Delay, SyntheticFeatures};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::CleanError;
use crate::record::{CleanedRow, FlightRecord, RawRow, DATE_FORMAT};
use crate::schema::{Column, ColumnKind};

/// Most row errors kept in a report
pub const MAX_REPORTED_ERRORS: usize = 50;

const TIMESTAMP_FORMATS: [&str; 3] = [DATE_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

const MISSING_MARKERS: [&str; 7] = ["", "NaN", "nan", "NaT", "null", "NULL", "None"];

/// Whether the actual departure time is required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanMode {
    /// Historical rows: actual departure required, delay targets derived
    Training,
    /// Request rows: actual departure optional
    Inference,
}

/// Cleaner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Valid `DIA` range
    pub day_range: (i64, i64),
    /// Valid `MES` range
    pub month_range: (i64, i64),
    /// Valid `AÑO` range
    pub year_range: (i64, i64),
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            day_range: (1, 31),
            month_range: (1, 12),
            year_range: (1900, 2100),
        }
    }
}

/// A raw value coerced to its column's declared type
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Timestamp(NaiveDateTime),
    Integer(i64),
    Boolean(bool),
    Categorical(String),
}

/// A dropped row and why
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// Index of the row in the input
    pub row: usize,
    pub error: CleanError,
}

/// Outcome of a cleaning pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    /// Rows received
    pub input_rows: usize,
    /// Rows that survived
    pub kept_rows: usize,
    /// Rows dropped for a missing value
    pub dropped_missing: usize,
    /// Rows dropped for a value that failed to parse or was out of range
    pub dropped_invalid: usize,
    /// First `MAX_REPORTED_ERRORS` row errors
    pub errors: Vec<RowError>,
}

impl CleanReport {
    /// Total rows dropped
    pub fn dropped_rows(&self) -> usize {
        self.dropped_missing + self.dropped_invalid
    }
}

/// Flight row cleaner
pub struct Cleaner {
    config: CleanerConfig,
    mode: CleanMode,
}

impl Cleaner {
    /// Create a new cleaner
    pub fn new(config: CleanerConfig, mode: CleanMode) -> Self {
        Self { config, mode }
    }

    /// Cleaner with default ranges for historical data
    pub fn training() -> Self {
        Self::new(CleanerConfig::default(), CleanMode::Training)
    }

    /// Cleaner with default ranges for request data
    pub fn inference() -> Self {
        Self::new(CleanerConfig::default(), CleanMode::Inference)
    }

    /// Clean a batch, dropping rows that fail. Row order is preserved.
    pub fn clean(&self, rows: &[RawRow]) -> (Vec<CleanedRow>, CleanReport) {
        let mut report = CleanReport {
            input_rows: rows.len(),
            ..Default::default()
        };
        let mut cleaned = Vec::with_capacity(rows.len());

        for (idx, row) in rows.iter().enumerate() {
            match self.clean_row(row) {
                Ok(row) => cleaned.push(row),
                Err(error) => {
                    debug!("Dropping row {}: {}", idx, error);
                    if error.is_missing_value() {
                        report.dropped_missing += 1;
                    } else {
                        report.dropped_invalid += 1;
                    }
                    if report.errors.len() < MAX_REPORTED_ERRORS {
                        report.errors.push(RowError { row: idx, error });
                    }
                }
            }
        }

        report.kept_rows = cleaned.len();
        if report.dropped_rows() > 0 {
            warn!(
                "Dropped {} of {} rows ({} missing, {} invalid)",
                report.dropped_rows(),
                report.input_rows,
                report.dropped_missing,
                report.dropped_invalid
            );
        }
        info!("Cleaned {} rows ({:?} mode)", report.kept_rows, self.mode);

        (cleaned, report)
    }

    /// Clean one row, returning the first error
    pub fn clean_row(&self, row: &RawRow) -> Result<CleanedRow, CleanError> {
        let fields = self.coerce_fields(row)?;

        let scheduled = fields.timestamp(Column::ScheduledDeparture)?;
        let actual = fields.optional_timestamp(Column::ActualDeparture);

        let record = FlightRecord {
            scheduled_departure: scheduled,
            flight_number: fields.categorical(Column::FlightNumber)?,
            origin: fields.categorical(Column::Origin)?,
            destination: fields.categorical(Column::Destination)?,
            carrier: fields.categorical(Column::Carrier)?,
            day: fields.integer(Column::Day)? as u32,
            month: fields.integer(Column::Month)? as u32,
            year: fields.integer(Column::Year)? as i32,
            flight_type: fields.categorical(Column::FlightType)?,
            operator: fields.categorical(Column::Operator)?,
            origin_city: fields.categorical(Column::OriginCity)?,
            destination_city: fields.categorical(Column::DestinationCity)?,
            actual_departure: actual,
        };

        let mut synthetic = SyntheticFeatures::compute(scheduled, actual);
        // Delay target is an integer column
        if let Delay::Observed { minutes, is_minor } = synthetic.delay {
            synthetic.delay = Delay::Observed {
                minutes: minutes.trunc(),
                is_minor,
            };
        }

        Ok(CleanedRow { record, synthetic })
    }

    /// Coerce every present source column to its declared type, in schema order
    fn coerce_fields(&self, row: &RawRow) -> Result<Fields, CleanError> {
        let projected = project(row);
        let mut fields = BTreeMap::new();

        for column in Column::SOURCE {
            let Some(raw) = projected.get(&column) else {
                if self.is_required(column) {
                    return Err(Fields::missing(column));
                }
                continue;
            };
            let value = coerce(column, raw)?;
            if let Value::Integer(value) = value {
                self.check_range(column, value)?;
            }
            fields.insert(column, value);
        }
        Ok(Fields(fields))
    }

    fn is_required(&self, column: Column) -> bool {
        column != Column::ActualDeparture || self.mode == CleanMode::Training
    }

    fn check_range(&self, column: Column, value: i64) -> Result<(), CleanError> {
        let (min, max) = match column {
            Column::Day => self.config.day_range,
            Column::Month => self.config.month_range,
            Column::Year => self.config.year_range,
            _ => return Ok(()),
        };
        if value < min || value > max {
            return Err(CleanError::OutOfRange {
                column: column.name(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::training()
    }
}

/// Keep recognized, non-missing source columns. First occurrence wins.
fn project(row: &RawRow) -> BTreeMap<Column, &str> {
    let mut fields = BTreeMap::new();
    for (name, value) in row.iter() {
        let Some(column) = Column::from_source_name(name) else {
            continue;
        };
        if column.is_derived() || is_missing(value) {
            continue;
        }
        fields.entry(column).or_insert(value.trim());
    }
    fields
}

fn is_missing(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw.trim())
}

/// Coerced values of one row
struct Fields(BTreeMap<Column, Value>);

impl Fields {
    fn missing(column: Column) -> CleanError {
        CleanError::Schema {
            column: column.name(),
        }
    }

    fn timestamp(&self, column: Column) -> Result<NaiveDateTime, CleanError> {
        self.optional_timestamp(column)
            .ok_or_else(|| Self::missing(column))
    }

    fn optional_timestamp(&self, column: Column) -> Option<NaiveDateTime> {
        match self.0.get(&column) {
            Some(Value::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }

    fn integer(&self, column: Column) -> Result<i64, CleanError> {
        match self.0.get(&column) {
            Some(Value::Integer(value)) => Ok(*value),
            _ => Err(Self::missing(column)),
        }
    }

    fn categorical(&self, column: Column) -> Result<String, CleanError> {
        match self.0.get(&column) {
            Some(Value::Categorical(value)) => Ok(value.clone()),
            _ => Err(Self::missing(column)),
        }
    }
}

/// Coerce a raw value to the declared type of `column`
pub fn coerce(column: Column, raw: &str) -> Result<Value, CleanError> {
    let raw = raw.trim();
    match column.kind() {
        ColumnKind::Timestamp => parse_timestamp(column, raw).map(Value::Timestamp),
        ColumnKind::Integer => parse_integer(column, raw).map(Value::Integer),
        ColumnKind::Boolean => parse_boolean(column, raw).map(Value::Boolean),
        ColumnKind::Categorical => Ok(Value::Categorical(raw.to_string())),
    }
}

/// Parse a timestamp in any of the accepted layouts
pub fn parse_timestamp(column: Column, raw: &str) -> Result<NaiveDateTime, CleanError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .ok_or_else(|| CleanError::Parse {
            column: column.name(),
            value: raw.to_string(),
            reason: "expected timestamp like 2017-01-01 23:30:00".to_string(),
        })
}

fn parse_integer(column: Column, raw: &str) -> Result<i64, CleanError> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    // pandas exports integer columns with NaNs as floats ("12.0")
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
        _ => Err(CleanError::Parse {
            column: column.name(),
            value: raw.to_string(),
            reason: "expected an integer".to_string(),
        }),
    }
}

fn parse_boolean(column: Column, raw: &str) -> Result<bool, CleanError> {
    match raw {
        "1" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "false" | "False" | "FALSE" => Ok(false),
        _ => Err(CleanError::Parse {
            column: column.name(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::DayPeriod;
    use proptest::prelude::*;

    fn raw_flight(scheduled: &str, actual: Option<&str>) -> RawRow {
        let mut row: RawRow = [
            ("Fecha-I", scheduled),
            ("Vlo-I", "226"),
            ("Ori-I", "SCEL"),
            ("Des-I", "KMIA"),
            ("Emp-I", "AAL"),
            ("DIA", "1"),
            ("MES", "1"),
            ("AÑO", "2017"),
            ("DIANOM", "Domingo"),
            ("TIPOVUELO", "I"),
            ("OPERA", "American Airlines"),
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

    #[test]
    fn test_clean_derives_synthetic_features() {
        let cleaner = Cleaner::training();
        let row = cleaner
            .clean_row(&raw_flight("2017-01-01 23:30:00", Some("2017-01-02 00:10:30")))
            .unwrap();

        assert_eq!(row.delay_minutes(), Some(40.0));
        assert_eq!(row.is_minor_delay(), Some(false));
        assert!(row.is_high_season());
        assert_eq!(row.day_period(), DayPeriod::Night);
        assert_eq!(row.categorical(Column::Operator), Some("American Airlines"));
        assert_eq!(row.categorical(Column::Year), None);
    }

    #[test]
    fn test_training_requires_actual_departure() {
        let cleaner = Cleaner::training();
        let err = cleaner
            .clean_row(&raw_flight("2017-01-01 23:30:00", None))
            .unwrap_err();
        assert_eq!(err, CleanError::Schema { column: "Fecha-O" });
    }

    #[test]
    fn test_inference_without_actual_departure() {
        let cleaner = Cleaner::inference();
        let row = cleaner
            .clean_row(&raw_flight("2017-05-10 09:15:00", None))
            .unwrap();
        assert_eq!(row.delay(), Delay::NotComputable);
        assert_eq!(row.delay_minutes(), None);
        assert_eq!(row.day_period(), DayPeriod::Morning);
    }

    #[test]
    fn test_aliases_accepted() {
        let row: RawRow = [
            ("Fecha_I", "2017-05-10T09:15:00"),
            ("Vlo_I", "11"),
            ("Ori_I", "SCEL"),
            ("Des_I", "SCFA"),
            ("Emp_I", "LAN"),
            ("DIA", "10"),
            ("MES", "5"),
            ("ANO", "2017"),
            ("TIPOVUELO", "N"),
            ("OPERA", "Grupo LATAM"),
            ("SIGLAORI", "Santiago"),
            ("SIGLADES", "Antofagasta"),
        ]
        .into_iter()
        .collect();
        let cleaned = Cleaner::inference().clean_row(&row).unwrap();
        assert_eq!(cleaned.record.year, 2017);
        assert_eq!(cleaned.record.destination_city, "Antofagasta");
    }

    #[test]
    fn test_batch_drops_and_counts_bad_rows() {
        let mut missing = raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:05:00"));
        missing.insert("OPERA", "NaN");
        let mut bad_month = raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:05:00"));
        bad_month.insert("MES", "13");
        let mut bad_date = raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:05:00"));
        bad_date.insert("Fecha-I", "yesterday");

        let rows = vec![
            raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:05:00")),
            missing,
            bad_month,
            bad_date,
            raw_flight("2017-01-02 10:00:00", Some("2017-01-02 10:25:00")),
        ];

        let (cleaned, report) = Cleaner::training().clean(&rows);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(report.input_rows, 5);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(report.dropped_missing, 1);
        assert_eq!(report.dropped_invalid, 2);
        assert_eq!(report.errors[0].row, 1);
        // order preserved
        assert_eq!(cleaned[1].delay_minutes(), Some(25.0));
    }

    #[test]
    fn test_float_formatted_integers() {
        let mut row = raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:05:00"));
        row.insert("DIA", "1.0");
        assert_eq!(Cleaner::training().clean_row(&row).unwrap().record.day, 1);

        row.insert("DIA", "1.5");
        assert!(matches!(
            Cleaner::training().clean_row(&row),
            Err(CleanError::Parse { column: "DIA", .. })
        ));
    }

    #[test]
    fn test_delay_truncated_to_whole_minutes() {
        let row = Cleaner::training()
            .clean_row(&raw_flight("2017-01-01 10:00:00", Some("2017-01-01 10:15:50")))
            .unwrap();
        // 15.83 minutes: target truncates, minor flag uses the exact delay
        assert_eq!(row.delay_minutes(), Some(15.0));
        assert_eq!(row.is_minor_delay(), Some(false));
    }

    #[test]
    fn test_coerce_follows_declared_kind() {
        assert_eq!(coerce(Column::Month, " 12 ").unwrap(), Value::Integer(12));
        assert_eq!(
            coerce(Column::Operator, "Grupo LATAM").unwrap(),
            Value::Categorical("Grupo LATAM".to_string())
        );
        assert_eq!(coerce(Column::HighSeason, "True").unwrap(), Value::Boolean(true));
        assert!(matches!(
            coerce(Column::MinorDelay, "maybe"),
            Err(CleanError::Parse { column: "Atraso menor", .. })
        ));
        assert!(matches!(
            coerce(Column::ActualDeparture, "12"),
            Err(CleanError::Parse { column: "Fecha-O", .. })
        ));
    }

    #[test]
    fn test_fractional_seconds_survive_to_raw() {
        let cleaner = Cleaner::training();
        // 15 minutes and 0.1 seconds late
        let once = cleaner
            .clean_row(&raw_flight("2017-01-01T10:00:00.500", Some("2017-01-01 10:15:00.600")))
            .unwrap();
        assert_eq!(once.is_minor_delay(), Some(false));

        let raw = once.to_raw();
        assert_eq!(raw.get("Fecha-I"), Some("2017-01-01 10:00:00.500"));
        assert_eq!(cleaner.clean_row(&raw).unwrap(), once);
    }

    fn arb_raw_row() -> impl Strategy<Value = RawRow> {
        (
            (0u32..28, 0u32..24, 0u32..60, 0u32..1000),
            (-1800i64..14_400, 0i64..1000),
            prop::sample::select(vec!["LAN", "SKU", "", "NaN"]),
            prop::sample::select(vec!["1", "12", "13", "x"]),
        )
            .prop_map(|((day, hour, minute, millis), (delay_secs, delay_millis), carrier, month)| {
                let scheduled = chrono::NaiveDate::from_ymd_opt(2017, 3, day + 1)
                    .unwrap()
                    .and_hms_milli_opt(hour, minute, 0, millis)
                    .unwrap();
                let actual = scheduled
                    + chrono::Duration::seconds(delay_secs)
                    + chrono::Duration::milliseconds(delay_millis);
                let mut row = raw_flight(&scheduled.format(DATE_FORMAT).to_string(), None);
                row.insert("Fecha-O", actual.format(DATE_FORMAT).to_string());
                row.insert("Emp-I", carrier);
                row.insert("MES", month);
                row.insert("extra column", "ignored");
                row
            })
    }

    proptest! {
        #[test]
        fn prop_clean_is_idempotent(rows in prop::collection::vec(arb_raw_row(), 0..20)) {
            let cleaner = Cleaner::training();
            let (once, _) = cleaner.clean(&rows);
            let raw_again: Vec<RawRow> = once.iter().map(CleanedRow::to_raw).collect();
            let (twice, report) = cleaner.clean(&raw_again);
            prop_assert_eq!(report.dropped_rows(), 0);
            prop_assert_eq!(once, twice);
        }
    }
}
