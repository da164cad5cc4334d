//! Data loaders for delimited tables and TFC grid exports.
//!
//! This module provides parsers for:
//! - Tabular CSV/TSV files with a header row of column names
//! - Tab-delimited TFC exports: two header lines followed by numeric rows,
//!   with blank rows separating one source section from the next

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use indexmap::IndexMap;
use log::{debug, info};
use thiserror::Error;

use super::grid::Grid;
use super::table::{Cell, Table};

/// Number of header lines preceding the numeric rows of a TFC export.
const TFC_HEADER_LINES: usize = 2;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("unreadable source '{}': {source}", path.display())]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("line {line}: section {section} has no label ({labels} labels supplied)")]
    OutOfRangeSection {
        line: usize,
        section: usize,
        labels: usize,
    },

    #[error("line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("duplicate section label: {0}")]
    DuplicateSection(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

fn unreadable<E>(path: &Path, err: E) -> LoaderError
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    LoaderError::UnreadableSource {
        path: path.to_path_buf(),
        source: err.into(),
    }
}

/// Field delimiter for a tabular file, chosen by extension.
fn delimiter_for(path: &Path) -> u8 {
    let tabbed = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "tsv" | "tab" | "txt"))
        .unwrap_or(false);
    if tabbed {
        b'\t'
    } else {
        b','
    }
}

/// Load a table from a CSV or TSV file.
///
/// The first row names the columns. Cell types are guessed per cell (see
/// [`Cell::parse`]). Rows shorter than the header are padded with empty
/// cells.
///
/// # Errors
///
/// Returns `UnreadableSource` if the file cannot be opened or parsed as
/// delimited text or has no header, and `MalformedRow` if a row is wider
/// than the header.
pub fn load_tabular<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| unreadable(path, e))?;
    let table = read_tabular_from(BufReader::new(file), delimiter_for(path), path)?;
    debug!(
        "Loaded {}: {} rows x {} columns",
        path.display(),
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

/// Read a table from any reader with the given field delimiter.
pub fn read_tabular<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
    read_tabular_from(reader, delimiter, Path::new("<stream>"))
}

fn read_tabular_from<R: Read>(reader: R, delimiter: u8, origin: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(origin, e))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(unreadable(origin, "missing header row"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| unreadable(origin, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        if record.len() > headers.len() {
            return Err(LoaderError::MalformedRow {
                line,
                reason: format!(
                    "{} cells but the header names {} columns",
                    record.len(),
                    headers.len()
                ),
            });
        }

        let mut row: Vec<Cell> = record.iter().map(Cell::parse).collect();
        row.resize(headers.len(), Cell::Empty);
        rows.push(row);
    }

    Table::from_rows(headers, rows).map_err(|e| unreadable(origin, e))
}

/// Load several tabular files and stack them into one table.
///
/// See [`Table::concat`] for how differing column sets are merged.
pub fn load_tabular_many<P: AsRef<Path>>(paths: &[P]) -> Result<Table> {
    let tables = paths
        .iter()
        .map(load_tabular)
        .collect::<Result<Vec<_>>>()?;
    let table = Table::concat(&tables);
    info!(
        "Loaded {} tabular sources ({} rows total)",
        tables.len(),
        table.num_rows()
    );
    Ok(table)
}

/// Load a TFC export as one grid per source section.
///
/// The file is tab-delimited. The first two lines are headers. Every
/// following line is either a row of numbers belonging to the current
/// section, or a separator (one cell or none after splitting) that advances
/// to the next section. Section `i` is stored under `section_labels[i]`;
/// every label appears in the result, in label order, even if its section
/// had no rows.
///
/// Trailing empty cells (rows end with a tab) are ignored.
///
/// # Errors
///
/// - `OutOfRangeSection` if a data row belongs to a section beyond the labels
/// - `MalformedRow` for non-numeric cells or a row whose length differs from
///   the first row of its section
/// - `UnreadableSource` if the file cannot be read or lacks the header lines
pub fn load_delimited<P, S>(path: P, section_labels: &[S]) -> Result<IndexMap<String, Grid>>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| unreadable(path, e))?;
    parse_sections(BufReader::new(file), section_labels, path)
}

/// Parse TFC content from a buffered reader. See [`load_delimited`].
pub fn parse_delimited<R, S>(reader: R, section_labels: &[S]) -> Result<IndexMap<String, Grid>>
where
    R: BufRead,
    S: AsRef<str>,
{
    parse_sections(reader, section_labels, Path::new("<stream>"))
}

fn parse_sections<R, S>(reader: R, labels: &[S], origin: &Path) -> Result<IndexMap<String, Grid>>
where
    R: BufRead,
    S: AsRef<str>,
{
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].iter().any(|l| l.as_ref() == label.as_ref()) {
            return Err(LoaderError::DuplicateSection(label.as_ref().to_string()));
        }
    }

    let mut sections: Vec<Vec<Vec<f64>>> = vec![Vec::new(); labels.len()];
    let mut section = 0usize;
    let mut lines_read = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| unreadable(origin, e))?;
        lines_read += 1;
        if idx < TFC_HEADER_LINES {
            continue;
        }

        let line_no = idx + 1;
        let cells: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        if cells.len() <= 1 {
            section += 1;
            continue;
        }

        let rows = sections
            .get_mut(section)
            .ok_or_else(|| LoaderError::OutOfRangeSection {
                line: line_no,
                section,
                labels: labels.len(),
            })?;

        let values = parse_grid_row(&cells, line_no)?;
        if let Some(first) = rows.first() {
            if first.len() != values.len() {
                return Err(LoaderError::MalformedRow {
                    line: line_no,
                    reason: format!(
                        "expected {} values like the section's first row, found {}",
                        first.len(),
                        values.len()
                    ),
                });
            }
        }
        rows.push(values);
    }

    if lines_read < TFC_HEADER_LINES {
        return Err(unreadable(origin, "missing TFC header lines"));
    }

    let mut grids = IndexMap::with_capacity(labels.len());
    for (label, rows) in labels.iter().zip(sections) {
        let grid = Grid::from_rows(rows).map_err(|e| LoaderError::MalformedRow {
            line: 0,
            reason: e.to_string(),
        })?;
        debug!("Section {}: {:?}", label.as_ref(), grid.shape());
        grids.insert(label.as_ref().to_string(), grid);
    }

    Ok(grids)
}

/// Convert one split TFC line to numbers, ignoring trailing empty cells.
fn parse_grid_row(cells: &[&str], line: usize) -> Result<Vec<f64>> {
    let used = cells
        .iter()
        .rposition(|c| !c.trim().is_empty())
        .map_or(0, |last| last + 1);

    if used == 0 {
        return Err(LoaderError::MalformedRow {
            line,
            reason: "row has cells but no values".to_string(),
        });
    }

    cells[..used]
        .iter()
        .enumerate()
        .map(|(col, raw)| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| LoaderError::MalformedRow {
                    line,
                    reason: format!("column {col}: '{raw}' is not a number"),
                })
        })
        .collect()
}
