//! Flight Data Cleaning
//!
//! Statically declared column schema, typed flight records and the cleaner
//! that turns raw rows into model-ready records.

mod cleaner;
mod error;
mod record;
mod schema;

pub use cleaner::{
    coerce, parse_timestamp, CleanMode, CleanReport, Cleaner, CleanerConfig, RowError, Value,
    MAX_REPORTED_ERRORS,
};
pub use error::CleanError;
pub use record::{CleanedRow, FlightRecord, RawRow, DATE_FORMAT};
pub use schema::{Column, ColumnKind};
