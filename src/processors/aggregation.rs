//! Statistics over partitions and grids.

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use super::extraction::{CombinationExtractor, Combinations, ExtractError};
use crate::core::grid::{Axis, Grid, GridError, Window};
use crate::core::table::{Cell, Table};

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("coordinate {coordinate} is not on the {axis} axis")]
    CoordinateNotFound { axis: &'static str, coordinate: f64 },

    #[error("no usable values to aggregate")]
    EmptyGroup,

    #[error("block {block} has {found} values, expected {expected}")]
    UnexpectedBlockSize {
        block: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "window rows {row_from}..={row_to}, cols {col_from}..={col_to} does not fit a {rows}x{cols} grid"
    )]
    WindowOutOfBounds {
        row_from: usize,
        row_to: usize,
        col_from: usize,
        col_to: usize,
        rows: usize,
        cols: usize,
    },

    #[error("block count must be at least 1, got {0}")]
    InvalidBlockCount(usize),

    #[error("column '{column}' holds non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregateError>;

/// Mean and standard error of a group of values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupStats {
    pub mean: f64,
    /// Sample standard deviation over `sqrt(n)`; NaN when `n == 1`.
    pub standard_error: f64,
    pub n: usize,
}

fn locate(axis: &Axis, name: &'static str, coordinate: f64) -> Result<usize> {
    axis.position(coordinate)?
        .ok_or(AggregateError::CoordinateNotFound {
            axis: name,
            coordinate,
        })
}

/// Mean over the inclusive rectangle `window` of `grid`, where grid rows and
/// columns are labelled by `row_axis` and `col_axis`.
///
/// # Errors
///
/// - `CoordinateNotFound` if a window bound is not exactly on its axis
/// - `WindowOutOfBounds` if the bounds are inverted or exceed the grid
/// - `Grid(InvalidAxis)` if an axis cannot be generated
pub fn window_mean(grid: &Grid, row_axis: &Axis, col_axis: &Axis, window: &Window) -> Result<f64> {
    let r1 = locate(row_axis, "row", window.row_from)?;
    let r2 = locate(row_axis, "row", window.row_to)?;
    let c1 = locate(col_axis, "column", window.col_from)?;
    let c2 = locate(col_axis, "column", window.col_to)?;

    let (rows, cols) = grid.shape();
    if r1 > r2 || c1 > c2 || r2 >= rows || c2 >= cols {
        return Err(AggregateError::WindowOutOfBounds {
            row_from: r1,
            row_to: r2,
            col_from: c1,
            col_to: c2,
            rows,
            cols,
        });
    }

    let cells = grid.rows()[r1..=r2].iter().flat_map(|row| &row[c1..=c2]);
    let count = (r2 - r1 + 1) * (c2 - c1 + 1);
    let mean = cells.sum::<f64>() / count as f64;
    debug!("Window rows {r1}..={r2} cols {c1}..={c2}: mean {mean}");
    Ok(mean)
}

/// Mean and standard error of the present, non-NaN values.
pub fn group_average(values: &[Option<f64>]) -> Result<GroupStats> {
    let usable: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
    let n = usable.len();
    if n == 0 {
        return Err(AggregateError::EmptyGroup);
    }

    let mean = usable.iter().sum::<f64>() / n as f64;
    let standard_error = if n > 1 {
        let var = usable.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        var.sqrt() / (n as f64).sqrt()
    } else {
        f64::NAN
    };

    Ok(GroupStats {
        mean,
        standard_error,
        n,
    })
}

/// Numeric view of a column: empty cells become `None`.
///
/// # Errors
///
/// Returns `NonNumeric` on the first text cell.
pub fn numeric_column(table: &Table, column: &str) -> Result<Vec<Option<f64>>> {
    let cells = table
        .column(column)
        .ok_or_else(|| ExtractError::UnknownColumn(column.to_string()))?;
    cells
        .iter()
        .map(|cell| match cell {
            Cell::Text(text) => Err(AggregateError::NonNumeric {
                column: column.to_string(),
                value: text.clone(),
            }),
            other => Ok(other.as_f64()),
        })
        .collect()
}

/// Group statistics of `value_column` for every combination of
/// `group_columns`. Partitions without usable values map to `None`.
pub fn group_averages(
    extractor: &CombinationExtractor,
    table: &Table,
    group_columns: &[&str],
    value_column: &str,
) -> Result<IndexMap<String, Option<GroupStats>>> {
    numeric_column(table, value_column)?;
    let partitions = extractor.partitions(table, group_columns, &Combinations::Distinct)?;

    let mut out = IndexMap::with_capacity(partitions.len());
    for (label, partition) in &partitions {
        let stats = match group_average(&numeric_column(partition, value_column)?) {
            Ok(stats) => Some(stats),
            Err(AggregateError::EmptyGroup) => None,
            Err(e) => return Err(e),
        };
        out.insert(label.clone(), stats);
    }
    Ok(out)
}

/// Percentage (0 to 100) of `values` at or below `threshold`.
///
/// Returns `None` for empty input; callers are expected to report it.
pub fn percent_below_threshold(values: &[f64], threshold: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let below = values.iter().filter(|&&v| v <= threshold).count();
    Some(below as f64 / values.len() as f64 * 100.0)
}

/// Split `len` items into `k` contiguous chunks: the first `len % k` chunks
/// get one extra item.
fn block_bounds(len: usize, k: usize) -> Vec<(usize, usize)> {
    let base = len / k;
    let extra = len % k;
    let mut start = 0;
    (0..k)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let bounds = (start, start + size);
            start += size;
            bounds
        })
        .collect()
}

/// Mean of each of `block_count` contiguous, near-equal chunks of `seq`.
///
/// # Errors
///
/// - `InvalidBlockCount` if `block_count` is zero
/// - `EmptyGroup` if a chunk would be empty (`block_count > seq.len()`)
pub fn block_average(seq: &[f64], block_count: usize) -> Result<Vec<f64>> {
    if block_count == 0 {
        return Err(AggregateError::InvalidBlockCount(block_count));
    }
    block_bounds(seq.len(), block_count)
        .into_iter()
        .map(|(start, end)| {
            if start == end {
                return Err(AggregateError::EmptyGroup);
            }
            Ok(seq[start..end].iter().sum::<f64>() / (end - start) as f64)
        })
        .collect()
}

/// [`block_average`] that also requires every chunk to hold exactly
/// `expected_len` values.
pub fn block_average_checked(
    seq: &[f64],
    block_count: usize,
    expected_len: usize,
) -> Result<Vec<f64>> {
    if block_count == 0 {
        return Err(AggregateError::InvalidBlockCount(block_count));
    }
    for (block, (start, end)) in block_bounds(seq.len(), block_count).into_iter().enumerate() {
        if end - start != expected_len {
            return Err(AggregateError::UnexpectedBlockSize {
                block,
                expected: expected_len,
                found: end - start,
            });
        }
    }
    block_average(seq, block_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW_AXIS: Axis = Axis::new(50.0, 4.0, -2.0);
    const COL_AXIS: Axis = Axis::new(-400.0, 200.0, 25.0);

    fn ramp_grid(rows: usize, cols: usize) -> Grid {
        Grid::from_rows(
            (0..rows)
                .map(|r| (0..cols).map(|c| (r * cols + c) as f64).collect())
                .collect(),
        )
        .unwrap()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_full_window_equals_grid_mean() {
        let grid = ramp_grid(24, 25);
        let window = Window::new(50.0, 4.0, -400.0, 200.0);
        let mean = window_mean(&grid, &ROW_AXIS, &COL_AXIS, &window).unwrap();
        assert_close(mean, grid.mean().unwrap());
    }

    #[test]
    fn test_default_window_selects_expected_cells() {
        let grid = ramp_grid(24, 25);
        let window = Window::new(18.0, 12.0, -100.0, 0.0);
        let mean = window_mean(&grid, &ROW_AXIS, &COL_AXIS, &window).unwrap();

        // rows 16..=19, cols 12..=16
        let mut sum = 0.0;
        for r in 16..=19 {
            for c in 12..=16 {
                sum += (r * 25 + c) as f64;
            }
        }
        assert_close(mean, sum / 20.0);
    }

    #[test]
    fn test_window_coordinate_not_on_axis() {
        let grid = ramp_grid(24, 25);
        let window = Window::new(19.0, 12.0, -100.0, 0.0);
        let err = window_mean(&grid, &ROW_AXIS, &COL_AXIS, &window).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::CoordinateNotFound { axis: "row", .. }
        ));
    }

    #[test]
    fn test_window_inverted_or_outside_grid() {
        let grid = ramp_grid(24, 25);
        let inverted = Window::new(12.0, 18.0, -100.0, 0.0);
        assert!(matches!(
            window_mean(&grid, &ROW_AXIS, &COL_AXIS, &inverted),
            Err(AggregateError::WindowOutOfBounds { .. })
        ));

        let small = ramp_grid(10, 25);
        let window = Window::new(18.0, 12.0, -100.0, 0.0);
        assert!(matches!(
            window_mean(&small, &ROW_AXIS, &COL_AXIS, &window),
            Err(AggregateError::WindowOutOfBounds { rows: 10, .. })
        ));
    }

    #[test]
    fn test_window_invalid_axis() {
        let grid = ramp_grid(2, 2);
        let bad = Axis::new(0.0, 10.0, 0.0);
        let err = window_mean(&grid, &bad, &bad, &Window::new(0.0, 0.0, 0.0, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Grid(GridError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn test_group_average_ignores_missing() {
        let stats = group_average(&[Some(1.0), None, Some(3.0), Some(f64::NAN)]).unwrap();
        assert_eq!(stats.n, 2);
        assert_close(stats.mean, 2.0);
        // sample sd sqrt(2), over sqrt(2)
        assert_close(stats.standard_error, 1.0);
    }

    #[test]
    fn test_group_average_is_order_invariant() {
        let a = group_average(&[Some(2.0), Some(4.0), Some(9.0)]).unwrap();
        let b = group_average(&[Some(9.0), Some(2.0), Some(4.0)]).unwrap();
        assert_close(a.mean, b.mean);
        assert_close(a.standard_error, b.standard_error);
    }

    #[test]
    fn test_group_average_edge_sizes() {
        assert!(matches!(
            group_average(&[None, None]),
            Err(AggregateError::EmptyGroup)
        ));
        let single = group_average(&[Some(5.0)]).unwrap();
        assert_eq!(single.n, 1);
        assert!(single.standard_error.is_nan());
    }

    #[test]
    fn test_group_averages_per_partition() {
        let table = Table::from_rows(
            vec!["GROUP".to_string(), "LOG_RT".to_string()],
            vec![
                vec!["A".into(), 1.0.into()],
                vec!["B".into(), Cell::Empty],
                vec!["A".into(), 3.0.into()],
            ],
        )
        .unwrap();

        let stats =
            group_averages(&CombinationExtractor::default(), &table, &["GROUP"], "LOG_RT").unwrap();
        assert_close(stats["A"].unwrap().mean, 2.0);
        assert!(stats["B"].is_none());
    }

    #[test]
    fn test_numeric_column_rejects_text() {
        let table = Table::from_rows(
            vec!["LOG_RT".to_string()],
            vec![vec![1.0.into()], vec!["slow".into()]],
        )
        .unwrap();
        let err = numeric_column(&table, "LOG_RT").unwrap_err();
        assert!(matches!(err, AggregateError::NonNumeric { ref value, .. } if value == "slow"));
    }

    #[test]
    fn test_percent_below_threshold() {
        assert_eq!(percent_below_threshold(&[], 1.0), None);
        assert_eq!(
            percent_below_threshold(&[1.0, 2.0, 3.0, 4.0], 2.0),
            Some(50.0)
        );
        assert_eq!(percent_below_threshold(&[5.0], 1.0), Some(0.0));
    }

    #[test]
    fn test_block_average_even_split() {
        let seq: Vec<f64> = (1..=12).map(f64::from).collect();
        assert_eq!(block_average(&seq, 3).unwrap(), vec![2.5, 6.5, 10.5]);
    }

    #[test]
    fn test_block_average_uneven_split() {
        // chunks [1,2,3] [4,5] [6,7]
        let seq: Vec<f64> = (1..=7).map(f64::from).collect();
        assert_eq!(block_average(&seq, 3).unwrap(), vec![2.0, 4.5, 6.5]);
    }

    #[test]
    fn test_block_average_rejects_bad_counts() {
        assert!(matches!(
            block_average(&[1.0], 0),
            Err(AggregateError::InvalidBlockCount(0))
        ));
        assert!(matches!(
            block_average(&[1.0, 2.0], 3),
            Err(AggregateError::EmptyGroup)
        ));
    }

    #[test]
    fn test_block_average_checked() {
        let seq: Vec<f64> = (1..=12).map(f64::from).collect();
        assert_eq!(
            block_average_checked(&seq, 3, 4).unwrap(),
            vec![2.5, 6.5, 10.5]
        );

        let err = block_average_checked(&seq[..11], 3, 4).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::UnexpectedBlockSize {
                block: 2,
                expected: 4,
                found: 3
            }
        ));
    }
}
