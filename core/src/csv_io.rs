//! The one CSV dialect shared by every stage.
//!
//! Quoting rule: a field that does not parse as an integer or float is
//! wrapped in double quotes, with embedded quotes doubled; numeric
//! fields are written bare. Flags are stored as 0/1 integers so they
//! stay bare too. An absent optional value is written as `""` and is
//! read back as absent. The first row is the header, whose names come
//! from the record type's serde field names.
//!
//! RULE: only this module touches CSV readers and writers.

use crate::error::{PipelineError, PipelineResult};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};
use std::path::Path;

fn csv_error(path: &Path, source: csv::Error) -> PipelineError {
    PipelineError::Csv { path: path.to_path_buf(), source }
}

/// Serialize `records` to any writer using the shared dialect.
pub fn write_records_to<W: Write, T: Serialize>(writer: W, records: &[T]) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse every record from any reader using the shared dialect.
pub fn read_records_from<R: Read, T: DeserializeOwned>(reader: R) -> csv::Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    rdr.deserialize().collect()
}

/// Write a whole table in one go. The file is replaced if it exists.
pub fn write_table<T: Serialize>(path: &Path, records: &[T]) -> PipelineResult<()> {
    let file = std::fs::File::create(path)?;
    write_records_to(std::io::BufWriter::new(file), records).map_err(|e| csv_error(path, e))?;
    log::info!("wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Read a table that must exist.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let rows = read_records_from(std::io::BufReader::new(file)).map_err(|e| csv_error(path, e))?;
    log::info!("read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read an upstream table that may legitimately be absent.
///
/// A missing file returns `Ok(None)` so callers fall back to synthesis.
/// A file that exists but cannot be read or parsed is an error.
pub fn read_optional_table<T: DeserializeOwned>(path: &Path) -> PipelineResult<Option<Vec<T>>> {
    if !path.exists() {
        log::warn!(
            "{} not found; continuing without it (synthetic fallback)",
            path.display()
        );
        return Ok(None);
    }
    read_table(path).map(Some)
}
