//! Record source: loads the data rows that drive a batch.
//!
//! The first row is the header and names the fields. Rows shorter than the
//! header are padded with empty strings, cells past the header width are
//! dropped, so every record carries exactly the header's fields.

use std::io::Read;
use std::path::Path;

use crate::error::SourceError;
use crate::types::{FieldName, Record};

/// Load every data row of the delimited file at `path`.
///
/// Returns [`SourceError::NotFound`] if the file is absent and
/// [`SourceError::Empty`] if it holds a header but no rows.
pub fn load_at(path: &Path, delimiter: u8) -> Result<Vec<Record>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let reader = builder(delimiter)
        .from_path(path)
        .map_err(|e| unreadable(path, e))?;
    let records = collect(reader, path)?;
    tracing::info!("{} data rows read from {}", records.len(), path.display());
    Ok(records)
}

/// Same as [`load_at`] over an in-memory reader; `origin` labels errors.
pub fn load_from_reader<R: Read>(
    input: R,
    delimiter: u8,
    origin: &Path,
) -> Result<Vec<Record>, SourceError> {
    collect(builder(delimiter).from_reader(input), origin)
}

fn builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(delimiter).has_headers(true).flexible(true);
    builder
}

fn collect<R: Read>(mut reader: csv::Reader<R>, origin: &Path) -> Result<Vec<Record>, SourceError> {
    let headers: Vec<FieldName> = reader
        .headers()
        .map_err(|e| unreadable(origin, e))?
        .iter()
        .map(FieldName::from)
        .collect();
    tracing::debug!(
        "headers detected: {}",
        headers
            .iter()
            .map(FieldName::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| unreadable(origin, e))?;
        let pairs = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), row.get(i).unwrap_or_default()));
        records.push(Record::from_pairs(pairs));
    }

    if records.is_empty() {
        return Err(SourceError::Empty {
            path: origin.to_path_buf(),
        });
    }
    Ok(records)
}

fn unreadable(path: &Path, source: csv::Error) -> SourceError {
    SourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}
