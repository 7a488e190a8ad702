//! Output persistence for traffic results.
//!
//! Supports appending serializable rows to CSV and writing pretty JSON
//! documents (traffic snapshots, GeoJSON layers) to disk.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Appends rows to a CSV file, creating it with headers if it does not
/// already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes a value as pretty-printed JSON to `path`.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
