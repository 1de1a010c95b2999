//! Tabular source parsing
//!
//! Sources are CSV files with a header row. Each data row becomes a
//! [`RawRecord`] keyed by header name, values trimmed.

use csv::{ReaderBuilder, Trim};
use tracing::{debug, warn};

use seed_common::RawRecord;

use crate::error::{IngestError, Result};

/// Parse a whole CSV document.
///
/// Rows whose field count disagrees with the header, or that are not valid
/// UTF-8, are skipped with a warning. Only an unreadable header fails.
pub fn parse_records(key: &str, data: &[u8]) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::malformed(key, e.to_string()))?
        .clone();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.records() {
        match row {
            Ok(row) => records.push(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(field, value)| (field.to_string(), value.to_string()))
                    .collect(),
            ),
            Err(e) => {
                skipped += 1;
                let line = e.position().map(|p| p.line());
                warn!(key, ?line, error = %e, "Skipping malformed row");
            },
        }
    }

    debug!(key, rows = records.len(), skipped, "Parsed tabular source");
    Ok(records)
}
