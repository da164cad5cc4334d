//! CSV writers for tables, partition sets and aggregate records.
//!
//! Every file written here starts with a row-index column:
//! - plain tables write their source row index under an empty header
//! - ragged column sets write the row position under an empty header
//! - aggregate tables and keyed tables write their entity column

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use super::record::AggregateTable;
use super::table::{RaggedTable, Table, TableError};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// The data could not be laid out as a table.
    #[error("cannot lay out '{path}' as a table: {source}")]
    Layout {
        path: String,
        #[source]
        source: TableError,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates a directory and its parents if they don't exist.
fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| WriteError::CreateDirectory {
            path: dir.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Opens a CSV writer on a fresh file, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Writes all records and flushes, attaching the path to any failure.
fn write_records<I>(path: &Path, header: Vec<String>, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in rows {
        writer.write_record(&row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })
}

/// Write a table with its source row index as the first, unnamed column.
///
/// # Errors
///
/// Returns an error if parent directories or the file cannot be created or
/// written to.
pub fn write_table_csv(path: &Path, table: &Table) -> Result<()> {
    let mut header = Vec::with_capacity(table.num_columns() + 1);
    header.push(String::new());
    header.extend(table.column_names().iter().cloned());

    let width = header.len();
    let rows = (0..table.num_rows()).map(|r| {
        let mut row = Vec::with_capacity(width);
        row.push(table.index()[r].to_string());
        row.extend(table.row(r).map(ToString::to_string));
        row
    });

    write_records(path, header, rows)
}

/// Write a table whose first column already identifies each row.
pub fn write_keyed_csv(path: &Path, table: &Table) -> Result<()> {
    let header = table.column_names().to_vec();
    let rows = (0..table.num_rows()).map(|r| table.row(r).map(ToString::to_string).collect());
    write_records(path, header, rows)
}

/// Write a ragged column set, padding short columns with empty cells.
///
/// The first column is the row position.
pub fn write_ragged_csv(path: &Path, ragged: &RaggedTable) -> Result<()> {
    let mut header = Vec::with_capacity(ragged.num_columns() + 1);
    header.push(String::new());
    header.extend(ragged.column_names().map(str::to_string));

    let width = header.len();
    let rows = (0..ragged.max_len()).map(|r| {
        let mut row = Vec::with_capacity(width);
        row.push(r.to_string());
        row.extend(
            ragged
                .iter()
                .map(|(_, cells)| cells.get(r).map(ToString::to_string).unwrap_or_default()),
        );
        row
    });

    write_records(path, header, rows)
}

/// Write aggregate records with the entity as the first column.
pub fn write_aggregate_csv(path: &Path, records: &AggregateTable) -> Result<()> {
    let table = records.to_table().map_err(|e| WriteError::Layout {
        path: path.display().to_string(),
        source: e,
    })?;
    write_keyed_csv(path, &table)
}

/// Write each partition to `{dir}/{base}_{key}.csv` (or `{key}.csv` when
/// `base` is empty). Returns the written paths in key order.
pub fn write_partitions(
    dir: &Path,
    base: &str,
    partitions: &IndexMap<String, Table>,
) -> Result<Vec<PathBuf>> {
    ensure_dir(dir)?;

    let mut written = Vec::with_capacity(partitions.len());
    for (key, table) in partitions {
        let file_name = if base.is_empty() {
            format!("{key}.csv")
        } else {
            format!("{base}_{key}.csv")
        };
        let path = dir.join(file_name);
        write_table_csv(&path, table)?;
        written.push(path);
    }
    Ok(written)
}
