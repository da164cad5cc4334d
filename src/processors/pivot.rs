//! Long-to-short-fat conversion.
//!
//! A long table holds one row per (entity, label values) observation. The
//! short-fat form holds one row per entity and one column per combination of
//! label values, e.g. `Anode_SMA-Motor_Coherence`.

use itertools::Itertools;
use log::{info, warn};
use thiserror::Error;

use super::extraction::{distinct_values, CombinationExtractor, ExtractError};
use crate::config::PivotConfig;
use crate::core::table::{Cell, Table, TableError};

/// Errors that can occur during pivoting.
#[derive(Debug, Error)]
pub enum PivotError {
    #[error("column '{column}' has {distinct} distinct values but only {names} names were given")]
    RecodeMismatch {
        column: String,
        distinct: usize,
        names: usize,
    },

    #[error("nest columns [{}] are not an ordering of label columns [{}]", .nest.join(", "), .labels.join(", "))]
    NestOrder { labels: Vec<String>, nest: Vec<String> },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for pivot operations.
pub type Result<T> = std::result::Result<T, PivotError>;

fn present_values(table: &Table, column: &str) -> Result<Vec<Cell>> {
    let mut values = distinct_values(table, column)?;
    values.retain(|v| !v.is_empty());
    Ok(values)
}

/// Replace each value of `column` by `names[k]`, where `k` is the position of
/// the value among the column's distinct values in first-occurrence order.
/// Empty cells stay empty.
///
/// # Errors
///
/// - `Extract(UnknownColumn)` if the column is missing
/// - `RecodeMismatch` if there are more distinct values than names
pub fn recode_first_occurrence(table: &Table, column: &str, names: &[String]) -> Result<Table> {
    let codes = present_values(table, column)?;
    if codes.len() > names.len() {
        return Err(PivotError::RecodeMismatch {
            column: column.to_string(),
            distinct: codes.len(),
            names: names.len(),
        });
    }

    let recoded = table.map_column(column, |cell| {
        codes
            .iter()
            .position(|code| code == cell)
            .map_or(Cell::Empty, |k| Cell::Text(names[k].clone()))
    })?;
    Ok(recoded)
}

/// Apply every recode in `config.recodes` whose column is present.
pub fn apply_recodes(table: &Table, config: &PivotConfig) -> Result<Table> {
    let mut out = table.clone();
    for (column, names) in &config.recodes {
        if !out.has_column(column) {
            warn!("Recode column '{column}' not present; skipping");
            continue;
        }
        out = recode_first_occurrence(&out, column, names)?;
    }
    Ok(out)
}

/// Position in `label_columns` of each nest column, outermost first.
fn nest_positions(config: &PivotConfig) -> Result<Vec<usize>> {
    if config.nest_columns.is_empty() {
        return Ok((0..config.label_columns.len()).collect());
    }
    let positions: Vec<usize> = config
        .nest_columns
        .iter()
        .filter_map(|name| config.label_columns.iter().position(|l| l == name))
        .unique()
        .collect();
    if positions.len() != config.label_columns.len()
        || config.nest_columns.len() != config.label_columns.len()
    {
        return Err(PivotError::NestOrder {
            labels: config.label_columns.clone(),
            nest: config.nest_columns.clone(),
        });
    }
    Ok(positions)
}

/// Convert a long table to one row per index value.
///
/// Output columns are the index column, the carry column if configured, then
/// `{v1}_{v2}_..._{value_column}` for every combination of label values, with
/// the values named in `label_columns` order. Columns are nested in
/// `nest_columns` order (last nest column varying fastest), so the default
/// groups every condition under one connection. Label values come from
/// `config.value_orders` when given, otherwise from the data in
/// first-occurrence order. Each cell holds the value of the first matching
/// row, or is empty when no row matches.
pub fn short_fat(
    extractor: &CombinationExtractor,
    table: &Table,
    config: &PivotConfig,
) -> Result<Table> {
    let missing = |name: &str| ExtractError::UnknownColumn(name.to_string());
    let index_idx = table
        .column_index(&config.index_column)
        .ok_or_else(|| missing(&config.index_column))?;
    let value_idx = table
        .column_index(&config.value_column)
        .ok_or_else(|| missing(&config.value_column))?;
    let carry_idx = match &config.carry_column {
        Some(name) => Some(table.column_index(name).ok_or_else(|| missing(name))?),
        None => None,
    };
    let label_idx: Vec<usize> = config
        .label_columns
        .iter()
        .map(|name| table.column_index(name).ok_or_else(|| missing(name)))
        .collect::<std::result::Result<_, _>>()?;

    let label_values: Vec<Vec<Cell>> = config
        .label_columns
        .iter()
        .map(|name| match config.value_orders.get(name) {
            Some(order) => Ok(order.iter().map(|v| Cell::parse(v)).collect()),
            None => present_values(table, name),
        })
        .collect::<Result<_>>()?;

    let nest = nest_positions(config)?;
    let combos: Vec<Vec<Cell>> = if label_values.is_empty() {
        vec![Vec::new()]
    } else {
        nest.iter()
            .map(|&k| label_values[k].iter().cloned())
            .multi_cartesian_product()
            .map(|nested| {
                // back into label order
                let mut combo = vec![Cell::Empty; nested.len()];
                for (&k, value) in nest.iter().zip(nested) {
                    combo[k] = value;
                }
                combo
            })
            .collect()
    };

    let entities = present_values(table, &config.index_column)?;
    let values = table.column_at(value_idx);

    let mut names = vec![config.index_column.clone()];
    let mut columns: Vec<Vec<Cell>> = vec![entities.clone()];

    if let (Some(name), Some(idx)) = (&config.carry_column, carry_idx) {
        let carried = entities
            .iter()
            .map(|entity| {
                table
                    .rows_where(&[(index_idx, entity)])
                    .into_iter()
                    .map(|r| &table.column_at(idx)[r])
                    .find(|cell| !cell.is_empty())
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        names.push(name.clone());
        columns.push(carried);
    }

    for combo in &combos {
        let mut parts: Vec<String> = combo.iter().map(ToString::to_string).collect();
        parts.push(config.value_column.clone());
        names.push(parts.join(extractor.separator()));

        let column = entities
            .iter()
            .map(|entity| {
                let mut conditions = vec![(index_idx, entity)];
                conditions.extend(label_idx.iter().copied().zip(combo.iter()));
                table
                    .rows_where(&conditions)
                    .first()
                    .map(|&r| values[r].clone())
                    .unwrap_or_default()
            })
            .collect();
        columns.push(column);
    }

    info!(
        "Pivoted {} rows into {} {} rows x {} columns",
        table.num_rows(),
        entities.len(),
        config.index_column,
        combos.len()
    );
    Ok(Table::new(names, columns)?)
}
