//! Combination extraction: partition a table by every combination of values
//! in a set of grouping columns.
//!
//! Combinations are either enumerated from the data (the cartesian product of
//! each grouping column's distinct values, in first-occurrence order, last
//! column varying fastest) or supplied explicitly. Each combination filters
//! the table to the rows whose grouping cells equal the combination's values.
//! Combinations that match no rows still produce an (empty) entry.

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{ExtractConfig, LogConfig};
use crate::core::table::{Cell, RaggedTable, Table};

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("value '{value}' does not occur in column '{column}'")]
    UnknownValue { column: String, value: String },

    #[error("combination {index} has {found} values but {expected} grouping columns were given")]
    CombinationArity {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Which value combinations to extract.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Combinations {
    /// Every combination of each grouping column's distinct values.
    #[default]
    Distinct,
    /// Exactly these value tuples, in this order.
    Tuples(Vec<Vec<Cell>>),
    /// The cartesian product of these per-column value lists.
    PerColumn(Vec<Vec<Cell>>),
}

/// Output of [`CombinationExtractor::extract`].
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Joined combination label -> matching rows.
    Partitions(IndexMap<String, Table>),
    /// `{label}_{column}` -> that column's values within the partition.
    /// Columns are as long as their partitions, so lengths may differ.
    Columns(RaggedTable),
}

impl Extraction {
    /// Number of partitions or columns.
    pub fn len(&self) -> usize {
        match self {
            Extraction::Partitions(parts) => parts.len(),
            Extraction::Columns(cols) => cols.num_columns(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn partitions(&self) -> Option<&IndexMap<String, Table>> {
        match self {
            Extraction::Partitions(parts) => Some(parts),
            Extraction::Columns(_) => None,
        }
    }

    pub fn columns(&self) -> Option<&RaggedTable> {
        match self {
            Extraction::Columns(cols) => Some(cols),
            Extraction::Partitions(_) => None,
        }
    }
}

/// Distinct values of `column` in first-occurrence order.
pub fn distinct_values(table: &Table, column: &str) -> Result<Vec<Cell>> {
    table
        .distinct(column)
        .map_err(|_| ExtractError::UnknownColumn(column.to_string()))
}

/// Splits tables by grouping-column value combinations.
#[derive(Debug, Clone, Default)]
pub struct CombinationExtractor {
    config: ExtractConfig,
    log: LogConfig,
}

impl CombinationExtractor {
    pub fn new(config: ExtractConfig, log: LogConfig) -> Self {
        Self { config, log }
    }

    /// Separator placed between combination values in labels.
    pub fn separator(&self) -> &str {
        &self.config.separator
    }

    /// Join a combination's values into its label.
    pub fn label<'a, I>(&self, values: I) -> String
    where
        I: IntoIterator<Item = &'a Cell>,
    {
        values.into_iter().join(&self.config.separator)
    }

    /// Extract partitions (when `data_columns` is `None`) or labelled data
    /// columns from `table`.
    ///
    /// # Errors
    ///
    /// - `UnknownColumn` if a grouping or data column is missing
    /// - `UnknownValue` if an explicit value does not occur in its column
    /// - `CombinationArity` if an explicit combination has the wrong width
    pub fn extract(
        &self,
        table: &Table,
        grouping: &[&str],
        combinations: &Combinations,
        data_columns: Option<&[&str]>,
    ) -> Result<Extraction> {
        match data_columns {
            None => self
                .partitions(table, grouping, combinations)
                .map(Extraction::Partitions),
            Some(names) => self
                .columns(table, grouping, combinations, names)
                .map(Extraction::Columns),
        }
    }

    /// Extract partitions keyed by joined combination label.
    pub fn partitions(
        &self,
        table: &Table,
        grouping: &[&str],
        combinations: &Combinations,
    ) -> Result<IndexMap<String, Table>> {
        let matched = self.matched(table, grouping, combinations)?;
        let mut partitions: IndexMap<String, Table> = IndexMap::with_capacity(matched.len());
        for (label, partition) in matched {
            if partitions.insert(label.clone(), partition).is_some() {
                warn!("Combination label '{label}' repeats; keeping the later partition");
            }
        }
        Ok(partitions)
    }

    /// Extract labelled data columns (short-fat layout).
    pub fn columns(
        &self,
        table: &Table,
        grouping: &[&str],
        combinations: &Combinations,
        data_columns: &[&str],
    ) -> Result<RaggedTable> {
        resolve_columns(table, grouping)?;
        resolve_columns(table, data_columns)?;

        let mut columns = RaggedTable::new();
        for (label, partition) in self.matched(table, grouping, combinations)? {
            for name in data_columns {
                let cells = partition.column(name).map(<[Cell]>::to_vec).unwrap_or_default();
                let column_name = format!("{label}{}{name}", self.config.separator);
                if columns.push_column(column_name.clone(), cells) {
                    warn!("Column '{column_name}' repeats; keeping the later values");
                }
            }
        }
        Ok(columns)
    }

    /// Label and matching rows of every combination, in combination order.
    fn matched(
        &self,
        table: &Table,
        grouping: &[&str],
        combinations: &Combinations,
    ) -> Result<Vec<(String, Table)>> {
        let group_idx = resolve_columns(table, grouping)?;
        let tuples = self.combination_tuples(table, grouping, combinations)?;
        info!(
            "Extracting {} combinations of [{}] from {} rows",
            tuples.len(),
            grouping.join(", "),
            table.num_rows()
        );

        Ok(tuples
            .iter()
            .map(|tuple| {
                let conditions: Vec<(usize, &Cell)> =
                    group_idx.iter().copied().zip(tuple.iter()).collect();
                let partition = table.take(&table.rows_where(&conditions));
                let label = self.label(tuple.iter());
                self.preview(&label, &partition);
                (label, partition)
            })
            .collect())
    }

    /// Enumerate the value tuples to extract, validating explicit values.
    pub fn combination_tuples(
        &self,
        table: &Table,
        grouping: &[&str],
        combinations: &Combinations,
    ) -> Result<Vec<Vec<Cell>>> {
        let distinct: Vec<Vec<Cell>> = grouping
            .iter()
            .map(|c| distinct_values(table, c))
            .collect::<Result<_>>()?;

        match combinations {
            Combinations::Distinct => Ok(cartesian(&distinct)),
            Combinations::PerColumn(lists) => {
                check_arity(0, grouping.len(), lists.len())?;
                for ((column, values), known) in grouping.iter().zip(lists).zip(&distinct) {
                    for value in values {
                        check_known(column, value, known)?;
                    }
                }
                Ok(cartesian(lists))
            }
            Combinations::Tuples(tuples) => {
                for (i, tuple) in tuples.iter().enumerate() {
                    check_arity(i, grouping.len(), tuple.len())?;
                    for ((column, value), known) in grouping.iter().zip(tuple).zip(&distinct) {
                        check_known(column, value, known)?;
                    }
                }
                Ok(tuples.clone())
            }
        }
    }

    fn preview(&self, label: &str, partition: &Table) {
        if !self.log.debug_previews {
            return;
        }
        debug!("Combination {label}: {} rows", partition.num_rows());
        for r in 0..partition.num_rows().min(self.log.preview_rows) {
            debug!(
                "  [{}] {}",
                partition.index()[r],
                partition.row(r).join(" | ")
            );
        }
    }
}

fn resolve_columns(table: &Table, names: &[&str]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| ExtractError::UnknownColumn(name.to_string()))
        })
        .collect()
}

fn check_arity(index: usize, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(ExtractError::CombinationArity {
            index,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_known(column: &str, value: &Cell, known: &[Cell]) -> Result<()> {
    if !known.contains(value) {
        return Err(ExtractError::UnknownValue {
            column: column.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Row-major cartesian product; the last list varies fastest.
fn cartesian(lists: &[Vec<Cell>]) -> Vec<Vec<Cell>> {
    if lists.is_empty() {
        return vec![Vec::new()];
    }
    lists
        .iter()
        .map(|values| values.iter().cloned())
        .multi_cartesian_product()
        .collect()
}
