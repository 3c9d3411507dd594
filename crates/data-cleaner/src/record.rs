//! Raw and Cleaned Flight Records

use chrono::NaiveDateTime;
use feature_engine::{DayPeriod, Delay, SyntheticFeatures};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::Column;

/// Timestamp layout used by the historical dataset. Fractional seconds are
/// optional when parsing and only written when present.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One untyped input row: source column name -> raw value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    values: BTreeMap<String, String>,
}

impl RawRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// Raw value of a source column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Iterate over (column, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of columns present
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Typed flight metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub scheduled_departure: NaiveDateTime,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub carrier: String,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    /// `I` (international) or `N` (domestic)
    pub flight_type: String,
    pub operator: String,
    pub origin_city: String,
    pub destination_city: String,
    /// Only known for historical flights
    pub actual_departure: Option<NaiveDateTime>,
}

/// Flight record with its synthetic features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRow {
    pub record: FlightRecord,
    pub synthetic: SyntheticFeatures,
}

impl CleanedRow {
    /// Value of a categorical column, `None` for non-categorical columns
    pub fn categorical(&self, column: Column) -> Option<&str> {
        let record = &self.record;
        let value = match column {
            Column::FlightNumber => record.flight_number.as_str(),
            Column::Origin => record.origin.as_str(),
            Column::Destination => record.destination.as_str(),
            Column::Carrier => record.carrier.as_str(),
            Column::FlightType => record.flight_type.as_str(),
            Column::Operator => record.operator.as_str(),
            Column::OriginCity => record.origin_city.as_str(),
            Column::DestinationCity => record.destination_city.as_str(),
            Column::DayPeriod => self.synthetic.day_period.as_str(),
            _ => return None,
        };
        Some(value)
    }

    /// Regression target, if the actual departure was known
    pub fn delay_minutes(&self) -> Option<f64> {
        self.synthetic.delay.minutes().ok()
    }

    /// Classification target, if the actual departure was known
    pub fn is_minor_delay(&self) -> Option<bool> {
        self.synthetic.delay.is_minor().ok()
    }

    pub fn is_high_season(&self) -> bool {
        self.synthetic.is_high_season
    }

    pub fn day_period(&self) -> DayPeriod {
        self.synthetic.day_period
    }

    pub fn delay(&self) -> Delay {
        self.synthetic.delay
    }

    /// Render back into a raw row with canonical source names
    pub fn to_raw(&self) -> RawRow {
        let r = &self.record;
        let mut row = RawRow::new();
        row.insert(
            Column::ScheduledDeparture.name(),
            r.scheduled_departure.format(DATE_FORMAT).to_string(),
        );
        row.insert(Column::FlightNumber.name(), r.flight_number.clone());
        row.insert(Column::Origin.name(), r.origin.clone());
        row.insert(Column::Destination.name(), r.destination.clone());
        row.insert(Column::Carrier.name(), r.carrier.clone());
        row.insert(Column::Day.name(), r.day.to_string());
        row.insert(Column::Month.name(), r.month.to_string());
        row.insert(Column::Year.name(), r.year.to_string());
        row.insert(Column::FlightType.name(), r.flight_type.clone());
        row.insert(Column::Operator.name(), r.operator.clone());
        row.insert(Column::OriginCity.name(), r.origin_city.clone());
        row.insert(Column::DestinationCity.name(), r.destination_city.clone());
        if let Some(actual) = r.actual_departure {
            row.insert(
                Column::ActualDeparture.name(),
                actual.format(DATE_FORMAT).to_string(),
            );
        }
        row
    }
}
