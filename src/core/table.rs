//! Tabular data model.
//!
//! A [`Table`] is an ordered set of named, equal-length columns of [`Cell`]s
//! plus a row index recording each row's position in the table it was read
//! from. Filtering never renumbers rows, so a partition still knows where its
//! rows came from. A [`RaggedTable`] relaxes the equal-length invariant and
//! is what column-wise extraction and column combining produce.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised when a table's shape invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("column '{name}' has {found} cells, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("{names} column names given for {columns} columns")]
    ColumnCount { names: usize, columns: usize },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("no such column: {0}")]
    MissingColumn(String),
}

/// A single scalar cell.
#[derive(Debug, Clone, Default)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Guess a cell's type from its textual form.
    ///
    /// Empty strings and `NaN` become [`Cell::Empty`], integers become
    /// [`Cell::Int`], other numbers [`Cell::Float`], anything else text.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_nan() {
                return Cell::Empty;
            }
            return Cell::Float(f);
        }
        Cell::Text(raw.to_string())
    }

    /// Numeric view of the cell. Text and empty cells have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

/// Value equality: `Int(1) == Float(1.0)`, NaN equals nothing.
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Empty, Cell::Empty) => true,
            (Cell::Int(a), Cell::Int(b)) => a == b,
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => a == b,
            (Cell::Int(a), Cell::Float(b)) | (Cell::Float(b), Cell::Int(a)) => *a as f64 == *b,
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            // Debug keeps the trailing ".0" on integral floats
            Cell::Float(v) => write!(f, "{v:?}"),
            Cell::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Cell::Empty, Cell::Float)
    }
}

/// Column-oriented table with a source row index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<Cell>>,
    index: Vec<usize>,
}

impl Table {
    /// Build a table from named columns. The row index is `0..rows`.
    pub fn new(names: Vec<String>, columns: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        let rows = columns.first().map_or(0, Vec::len);
        Self::with_index(names, columns, (0..rows).collect())
    }

    /// Build a table with an explicit row index.
    pub fn with_index(
        names: Vec<String>,
        columns: Vec<Vec<Cell>>,
        index: Vec<usize>,
    ) -> Result<Self, TableError> {
        if names.len() != columns.len() {
            return Err(TableError::ColumnCount {
                names: names.len(),
                columns: columns.len(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != index.len() {
                return Err(TableError::LengthMismatch {
                    name: name.clone(),
                    expected: index.len(),
                    found: column.len(),
                });
            }
        }
        Ok(Self {
            names,
            columns,
            index,
        })
    }

    /// Build a table from row-major cells.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        let mut columns: Vec<Vec<Cell>> = names
            .iter()
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();

        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(TableError::RowWidth {
                    row: r,
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.push(cell);
            }
        }

        Self::new(names, columns)
    }

    /// Concatenate tables vertically.
    ///
    /// Columns are the union of all inputs in first-occurrence order; cells a
    /// source lacks are empty. Each source keeps its own row index, so the
    /// result may repeat index values.
    pub fn concat(tables: &[Table]) -> Table {
        let mut names: Vec<String> = Vec::new();
        for table in tables {
            for name in &table.names {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        let total: usize = tables.iter().map(Table::num_rows).sum();
        let mut columns: Vec<Vec<Cell>> = names.iter().map(|_| Vec::with_capacity(total)).collect();
        let mut index = Vec::with_capacity(total);

        for table in tables {
            for (name, out) in names.iter().zip(columns.iter_mut()) {
                match table.column(name) {
                    Some(cells) => out.extend_from_slice(cells),
                    None => out.extend(std::iter::repeat(Cell::Empty).take(table.num_rows())),
                }
            }
            index.extend_from_slice(&table.index);
        }

        Table {
            names,
            columns,
            index,
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.column_index(name).map(|i| self.columns[i].as_slice())
    }

    /// Column by position. Panics if `idx` is out of range.
    pub fn column_at(&self, idx: usize) -> &[Cell] {
        &self.columns[idx]
    }

    /// Source row positions, one per row.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Cells of row `r` in column order.
    pub fn row(&self, r: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.columns.iter().map(move |c| &c[r])
    }

    /// Distinct values of a column in first-occurrence order.
    pub fn distinct(&self, name: &str) -> Result<Vec<Cell>, TableError> {
        let cells = self
            .column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        let mut seen: Vec<Cell> = Vec::new();
        for cell in cells {
            if !seen.contains(cell) {
                seen.push(cell.clone());
            }
        }
        Ok(seen)
    }

    /// Positions of rows whose cells equal every `(column, value)` condition.
    pub fn rows_where(&self, conditions: &[(usize, &Cell)]) -> Vec<usize> {
        (0..self.num_rows())
            .filter(|&r| {
                conditions
                    .iter()
                    .all(|&(c, value)| self.columns[c][r] == *value)
            })
            .collect()
    }

    /// New table holding the given row positions, in the given order.
    pub fn take(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|column| rows.iter().map(|&r| column[r].clone()).collect())
            .collect();
        let index = rows.iter().map(|&r| self.index[r]).collect();

        Table {
            names: self.names.clone(),
            columns,
            index,
        }
    }

    /// New table with one column rewritten cell by cell.
    pub fn map_column<F>(&self, name: &str, f: F) -> Result<Table, TableError>
    where
        F: Fn(&Cell) -> Cell,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        let mut out = self.clone();
        out.columns[idx] = self.columns[idx].iter().map(f).collect();
        Ok(out)
    }
}

/// Named columns that may differ in length.
///
/// Produced by column-wise extraction: each column holds whatever its
/// partition yielded. Nothing is padded or truncated in memory; writers pad
/// short columns with empty cells because CSV rows must be rectangular.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaggedTable {
    columns: IndexMap<String, Vec<Cell>>,
}

impl RaggedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, replacing any column of the same name in place.
    /// Returns `true` if a column was replaced.
    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> bool {
        self.columns.insert(name.into(), cells).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Length of the longest column.
    pub fn max_len(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Whether all columns share one length.
    pub fn is_rectangular(&self) -> bool {
        let mut lens = self.columns.values().map(Vec::len);
        match lens.next() {
            Some(first) => lens.all(|l| l == first),
            None => true,
        }
    }
}
