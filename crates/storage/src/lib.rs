//! Storage Layer
//!
//! JSON persistence for the encoding map and model artifacts, plus the
//! process-wide encoding snapshot that is swapped as a whole on reload.

mod artifact;
mod encoding_store;

pub use artifact::{read_json, write_json_atomic};
pub use encoding_store::EncodingStore;

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Incompatible artifact format {found} (expected {expected})")]
    IncompatibleFormat { found: u32, expected: u32 },
    #[error("Lock error: {0}")]
    Lock(String),
}
