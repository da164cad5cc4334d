//! Numeric grids addressed by generated coordinate axes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for grid construction and axis generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid axis ({start}, {stop}, {step}): step must be non-zero and point towards stop")]
    InvalidAxis { start: f64, stop: f64, step: f64 },

    #[error("axis ({start}, {stop}, {step}) would have {points} points, limit is {max}")]
    AxisTooLong {
        start: f64,
        stop: f64,
        step: f64,
        points: f64,
        max: usize,
    },
}

/// Upper bound on the number of points an [`Axis`] may generate.
pub const MAX_AXIS_POINTS: usize = 1_000_000;

/// Row-major 2-D array of `f64` with uniform row length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<f64>>,
}

impl Grid {
    /// Build a grid, checking that every row has the first row's length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, GridError> {
        if let Some(first) = rows.first() {
            let expected = first.len();
            if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
                return Err(GridError::Ragged {
                    row,
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(Self { rows })
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// `(rows, cols)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_cols())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Mean of every cell, `None` for an empty grid.
    pub fn mean(&self) -> Option<f64> {
        let count = self.num_rows() * self.num_cols();
        if count == 0 {
            return None;
        }
        let sum: f64 = self.rows.iter().flatten().sum();
        Some(sum / count as f64)
    }
}

/// Coordinate axis generated from `start` towards `stop` in `step`
/// increments, inclusive of `stop` when it lies on the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Axis {
    pub const fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Generate the coordinates `start + i * step`.
    pub fn coordinates(&self) -> Result<Vec<f64>, GridError> {
        let span = self.stop - self.start;
        let valid = self.step != 0.0
            && self.step.is_finite()
            && span.is_finite()
            && span * self.step >= 0.0;
        if !valid {
            return Err(GridError::InvalidAxis {
                start: self.start,
                stop: self.stop,
                step: self.step,
            });
        }

        // small epsilon so that an exactly reachable stop is not lost to rounding
        let points = (span / self.step + 1e-9).floor() + 1.0;
        if !points.is_finite() || points > MAX_AXIS_POINTS as f64 {
            return Err(GridError::AxisTooLong {
                start: self.start,
                stop: self.stop,
                step: self.step,
                points,
                max: MAX_AXIS_POINTS,
            });
        }
        let count = points as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }

    /// Position of `coordinate` on the axis by exact equality.
    pub fn position(&self, coordinate: f64) -> Result<Option<usize>, GridError> {
        Ok(self.coordinates()?.iter().position(|&c| c == coordinate))
    }
}

/// Inclusive rectangle in coordinate space: rows `row_from..=row_to`,
/// columns `col_from..=col_to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub row_from: f64,
    pub row_to: f64,
    pub col_from: f64,
    pub col_to: f64,
}

impl Window {
    pub const fn new(row_from: f64, row_to: f64, col_from: f64, col_to: f64) -> Self {
        Self {
            row_from,
            row_to,
            col_from,
            col_to,
        }
    }
}
