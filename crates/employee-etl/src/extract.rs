//! Extract: tab-separated source file -> [`RawDataset`]

use crate::error::{EtlError, Result};
use crate::models::{RawDataset, RawRow, REQUIRED_COLUMNS};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Cell contents read as a missing value, following the usual dataframe
/// conventions for null markers.
pub const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Read the whole file at `path` into memory.
pub fn extract(path: impl AsRef<Path>) -> Result<RawDataset> {
    let path = path.as_ref();
    info!("Extracting rows from {}", path.display());

    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let dataset = read_tsv(file, path)?;

    info!("Extracted {} rows", dataset.len());
    Ok(dataset)
}

/// Parse tab-separated text with a header row. `path` is only used in errors.
pub fn read_tsv<R: Read>(reader: R, path: &Path) -> Result<RawDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(e, path))?
        .iter()
        .map(str::to_string)
        .collect();

    validate_headers(&headers)?;
    debug!(columns = ?headers, "Parsed header row");

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(e, path))?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);

        if record.len() > headers.len() {
            return Err(EtlError::parse(format!(
                "line {} has {} fields but the header has {}",
                line,
                record.len(),
                headers.len()
            )));
        }

        let mut values: Vec<Option<String>> = record.iter().map(cell_value).collect();
        values.resize(headers.len(), None);

        rows.push(RawRow { line, values });
    }

    Ok(RawDataset { headers, rows })
}

fn validate_headers(headers: &[String]) -> Result<()> {
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(EtlError::parse("input has no header row"));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(EtlError::parse(format!("duplicate column '{}' in header", duplicate)));
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h == required))
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::parse(format!(
            "missing required column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

fn cell_value(raw: &str) -> Option<String> {
    if NA_MARKERS.contains(&raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn csv_error(err: csv::Error, path: &Path) -> EtlError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => EtlError::io(path, source),
        _ => EtlError::parse(format!("{}: {}", path.display(), message)),
    }
}
