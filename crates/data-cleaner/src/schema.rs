//! Recognized Column Schema
//!
//! Source column names are resolved through a single lookup table so that the
//! historical dataset headers, the HTTP payload aliases and the snake_case
//! export all land on the same typed column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// `%Y-%m-%d %H:%M:%S` timestamp
    Timestamp,
    /// Whole number
    Integer,
    /// True/false flag
    Boolean,
    /// Free-form category, target encoded
    Categorical,
}

/// Every column the pipeline recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    ScheduledDeparture,
    FlightNumber,
    Origin,
    Destination,
    Carrier,
    Day,
    Month,
    Year,
    FlightType,
    Operator,
    OriginCity,
    DestinationCity,
    ActualDeparture,
    HighSeason,
    DayPeriod,
    MinorDelay,
    DelayMinutes,
}

/// Source name -> column. Canonical names first, then aliases.
const SOURCE_NAMES: &[(&str, Column)] = &[
    ("Fecha-I", Column::ScheduledDeparture),
    ("Vlo-I", Column::FlightNumber),
    ("Ori-I", Column::Origin),
    ("Des-I", Column::Destination),
    ("Emp-I", Column::Carrier),
    ("DIA", Column::Day),
    ("MES", Column::Month),
    ("AÑO", Column::Year),
    ("TIPOVUELO", Column::FlightType),
    ("OPERA", Column::Operator),
    ("SIGLAORI", Column::OriginCity),
    ("SIGLADES", Column::DestinationCity),
    ("Fecha-O", Column::ActualDeparture),
    ("Temporada alta", Column::HighSeason),
    ("Periodo día", Column::DayPeriod),
    ("Atraso menor", Column::MinorDelay),
    ("Diferencia en minutos", Column::DelayMinutes),
    // HTTP payload field names
    ("Fecha_I", Column::ScheduledDeparture),
    ("Vlo_I", Column::FlightNumber),
    ("Ori_I", Column::Origin),
    ("Des_I", Column::Destination),
    ("Emp_I", Column::Carrier),
    ("ANO", Column::Year),
    ("Fecha_O", Column::ActualDeparture),
    // snake_case export
    ("flight_date_i", Column::ScheduledDeparture),
    ("flight_number_i", Column::FlightNumber),
    ("city_code_from_i", Column::Origin),
    ("city_code_to_i", Column::Destination),
    ("airline_code_i", Column::Carrier),
    ("flight_date_o", Column::ActualDeparture),
    ("day", Column::Day),
    ("month", Column::Month),
    ("year", Column::Year),
    ("flight_type", Column::FlightType),
    ("operator", Column::Operator),
    ("city_name_from", Column::OriginCity),
    ("city_name_to", Column::DestinationCity),
];

impl Column {
    /// Columns read from raw records
    pub const SOURCE: [Column; 13] = [
        Column::ScheduledDeparture,
        Column::FlightNumber,
        Column::Origin,
        Column::Destination,
        Column::Carrier,
        Column::Day,
        Column::Month,
        Column::Year,
        Column::FlightType,
        Column::Operator,
        Column::OriginCity,
        Column::DestinationCity,
        Column::ActualDeparture,
    ];

    /// Predictor columns of a cleaned row
    pub const INPUT: [Column; 14] = [
        Column::ScheduledDeparture,
        Column::FlightNumber,
        Column::Origin,
        Column::Destination,
        Column::Carrier,
        Column::Day,
        Column::Month,
        Column::Year,
        Column::FlightType,
        Column::Operator,
        Column::OriginCity,
        Column::DestinationCity,
        Column::HighSeason,
        Column::DayPeriod,
    ];

    /// Target columns: classification first, regression second
    pub const OUTPUT: [Column; 2] = [Column::MinorDelay, Column::DelayMinutes];

    /// Columns replaced by their target encoding
    pub const CATEGORICAL: [Column; 9] = [
        Column::FlightNumber,
        Column::Origin,
        Column::Destination,
        Column::Carrier,
        Column::FlightType,
        Column::Operator,
        Column::OriginCity,
        Column::DestinationCity,
        Column::DayPeriod,
    ];

    /// Canonical column name
    pub fn name(&self) -> &'static str {
        SOURCE_NAMES
            .iter()
            .find(|(_, column)| column == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }

    /// Declared type
    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::ScheduledDeparture | Column::ActualDeparture => ColumnKind::Timestamp,
            Column::Day | Column::Month | Column::Year | Column::DelayMinutes => ColumnKind::Integer,
            Column::HighSeason | Column::MinorDelay => ColumnKind::Boolean,
            _ => ColumnKind::Categorical,
        }
    }

    /// Resolve a source column name (canonical or alias)
    pub fn from_source_name(name: &str) -> Option<Column> {
        let name = name.trim();
        SOURCE_NAMES
            .iter()
            .find(|(source, _)| *source == name)
            .map(|(_, column)| *column)
    }

    /// Whether the column is derived by the pipeline rather than read
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Column::HighSeason | Column::DayPeriod | Column::MinorDelay | Column::DelayMinutes
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
