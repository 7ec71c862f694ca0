//! Grid, field and data point types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};

/// A spatial grid as known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// Catalog identifier
    pub id: i32,
    /// Number of columns (x)
    pub n_x: usize,
    /// Number of rows (y)
    pub n_y: usize,
}

impl Projection {
    pub fn new(id: i32, n_x: usize, n_y: usize) -> Self {
        Self { id, n_x, n_y }
    }

    /// Check if a cell lies inside this grid.
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.x < self.n_x && cell.y < self.n_y
    }

    /// Fail with `InvalidArgument` when the cell lies outside this grid.
    pub fn check_cell(&self, cell: GridCell) -> StoreResult<()> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(StoreError::invalid_argument(
                "cell",
                format!(
                    "({}, {}) outside projection {} grid {}x{}",
                    cell.x, cell.y, self.id, self.n_x, self.n_y
                ),
            ))
        }
    }
}

/// A forecast variable within a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub id: i32,
    pub metric_id: i32,
}

impl FieldRef {
    pub fn new(id: i32, metric_id: i32) -> Self {
        Self { id, metric_id }
    }
}

/// A single grid cell, column `x` of row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCell {
    pub x: usize,
    pub y: usize,
}

impl GridCell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// One decoded value for one field at one cell and time pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub field_id: i32,
    pub metric_id: i32,
    pub valid_time: DateTime<Utc>,
    pub run_time: DateTime<Utc>,
    pub value: f32,
}

/// Identifies one field message: (field, valid time, run time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldKey {
    pub field_id: i32,
    pub valid_time: DateTime<Utc>,
    pub run_time: DateTime<Utc>,
}

impl FieldKey {
    pub fn new(field_id: i32, valid_time: DateTime<Utc>, run_time: DateTime<Utc>) -> Self {
        Self {
            field_id,
            valid_time,
            run_time,
        }
    }
}

/// A full field grid in row-major order (row 0 first).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGrid {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl FieldGrid {
    /// Create a grid, checking that `data` holds exactly `width * height` values.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> StoreResult<Self> {
        if data.len() != width * height {
            return Err(StoreError::invalid_argument(
                "data",
                format!(
                    "expected {}x{} = {} values, got {}",
                    width,
                    height,
                    width * height,
                    data.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid from nested rows, which must all have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> StoreResult<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != width) {
            return Err(StoreError::invalid_argument(
                "rows",
                format!("row {} has {} values, expected {}", bad, rows[bad].len(), width),
            ));
        }
        Self::new(width, height, rows.into_iter().flatten().collect())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Values of row `y`, or `None` past the last row.
    pub fn row(&self, y: usize) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        Some(&self.data[start..start + self.width])
    }

    pub fn matches(&self, projection: &Projection) -> bool {
        self.width == projection.n_x && self.height == projection.n_y
    }
}

/// Input to a write: every message for a key, in submission order.
pub type FieldBatch = HashMap<FieldKey, Vec<FieldGrid>>;
