//! Feature Error Types

use thiserror::Error;

/// Errors while deriving or encoding features
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// Feature needs the actual departure time, which is unknown
    #[error("{0} is not computable without the actual departure time")]
    NotComputable(&'static str),

    /// Category value was never seen while fitting the encodings
    #[error("Unknown category {value:?} for column {column}")]
    UnknownCategory { column: String, value: String },

    /// Encoding map holds no entry for the column
    #[error("No encoding fitted for column {0}")]
    MissingColumn(String),

    /// Categorical values and targets differ in length
    #[error("Length mismatch: {values} values, {targets} targets")]
    LengthMismatch { values: usize, targets: usize },
}
