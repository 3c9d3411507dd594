//! CSV Loader
//!
//! Reads the historical flight CSV into untyped rows keyed by header name.

use data_cleaner::RawRow;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::DatasetError;

/// Load every row of a headed CSV file
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>, DatasetError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let rows = collect_rows(reader)?;
    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Load rows from any reader, e.g. an uploaded body or a test fixture
pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<Vec<RawRow>, DatasetError> {
    let reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    collect_rows(reader)
}

fn collect_rows<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<RawRow>, DatasetError> {
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;
        // Short rows leave trailing columns absent
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
