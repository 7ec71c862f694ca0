//! Synthetic grid values with known contents.

use wx_common::{FieldGrid, Projection};

/// Row-major values for a `width` x `height` grid where the cell at
/// (`col`, `row`) holds `col * 1000 + row`.
///
/// ```
/// use test_utils::indexed_grid;
///
/// let grid = indexed_grid(4, 2);
/// assert_eq!(grid[1], 1000.0); // col 1, row 0
/// assert_eq!(grid[4], 1.0);    // col 0, row 1
/// ```
pub fn indexed_grid(width: usize, height: usize) -> Vec<f32> {
    (0..height)
        .flat_map(|row| (0..width).map(move |col| test_grid_value(col, row, 0.0)))
        .collect()
}

/// Value [`field_grid`] puts at a cell for a given `bias`.
pub fn test_grid_value(col: usize, row: usize, bias: f32) -> f32 {
    (col * 1000 + row) as f32 + bias
}

/// A [`FieldGrid`] shaped for `projection`. Different biases tell grids
/// of different fields or times apart after they come back out.
pub fn field_grid(projection: &Projection, bias: f32) -> FieldGrid {
    let data = indexed_grid(projection.n_x, projection.n_y)
        .into_iter()
        .map(|v| v + bias)
        .collect();
    FieldGrid::new(projection.n_x, projection.n_y, data)
        .unwrap_or_else(|e| panic!("generated grid has wrong shape: {}", e))
}

/// One row of 2 m temperatures in Kelvin, warming west to east.
pub fn kelvin_row(width: usize) -> Vec<f32> {
    let step = 40.0 / width.max(1) as f32;
    (0..width).map(|col| 253.15 + col as f32 * step).collect()
}

/// A row cycling through floats that must survive storage bit for bit:
/// signed zeros, subnormals, extremes, infinities and NaN.
pub fn special_floats_row(width: usize) -> Vec<f32> {
    let specials = [
        0.0,
        -0.0,
        f32::MIN_POSITIVE / 2.0,
        f32::MAX,
        f32::MIN,
        f32::INFINITY,
        f32::NEG_INFINITY,
        f32::NAN,
        1.0e-30,
        -273.15,
    ];
    (0..width).map(|i| specials[i % specials.len()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_grid_layout() {
        let grid = indexed_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[3 * 10 + 7], test_grid_value(7, 3, 0.0));
    }

    #[test]
    fn test_field_grid_matches_projection() {
        let proj = Projection::new(1, 4, 3);
        let grid = field_grid(&proj, 0.5);
        assert!(grid.matches(&proj));
        assert_eq!(grid.row(2).unwrap()[3], test_grid_value(3, 2, 0.5));
    }

    #[test]
    fn test_kelvin_row_is_plausible() {
        let row = kelvin_row(360);
        assert_eq!(row.len(), 360);
        assert!(row.iter().all(|t| (253.0..294.0).contains(t)));
        assert!(row.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_special_floats_row_has_nan() {
        let row = special_floats_row(12);
        assert_eq!(row.len(), 12);
        assert!(row.iter().any(|v| v.is_nan()));
    }
}
