//! Cleaning Error Types

use thiserror::Error;

/// Errors while cleaning a single flight row
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CleanError {
    /// Required column absent or empty
    #[error("Missing required column: {column}")]
    Schema { column: &'static str },

    /// Value cannot be coerced to the declared column type
    #[error("Cannot parse {column} value {value:?}: {reason}")]
    Parse {
        column: &'static str,
        value: String,
        reason: String,
    },

    /// Calendar field outside its valid range
    #[error("{column} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        column: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl CleanError {
    /// Whether the row was rejected for a missing value
    pub fn is_missing_value(&self) -> bool {
        matches!(self, CleanError::Schema { .. })
    }
}
