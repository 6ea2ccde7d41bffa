use crate::constants::GRID_CELL_SIZE_DEG;
use crate::error::Result;
use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed-size geographic bucket (~111 m at the equator). Cells group
/// nearby locations for spawn management and channel keying; two
/// coordinates share a cell iff their floored quotients by the cell size
/// match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub grid_x: i64,
    pub grid_y: i64,
}

impl GridCell {
    pub fn new(grid_x: i64, grid_y: i64) -> Self {
        GridCell { grid_x, grid_y }
    }

    /// Bucket a coordinate into its grid cell. The input is validated; the
    /// mapping itself is plain floor division, so it is deterministic for
    /// all in-range values.
    pub fn from_coordinates(lat: f64, lng: f64) -> Result<Self> {
        let coord = Coordinates::new(lat, lng)?;

        Ok(GridCell {
            grid_x: (coord.lng / GRID_CELL_SIZE_DEG).floor() as i64,
            grid_y: (coord.lat / GRID_CELL_SIZE_DEG).floor() as i64,
        })
    }

    /// The cell's center point. Centering (rather than the corner) keeps the
    /// reverse mapping close to the coordinate that produced the cell.
    pub fn center(&self) -> Coordinates {
        Coordinates {
            lat: self.grid_y as f64 * GRID_CELL_SIZE_DEG + GRID_CELL_SIZE_DEG / 2.0,
            lng: self.grid_x as f64 * GRID_CELL_SIZE_DEG + GRID_CELL_SIZE_DEG / 2.0,
        }
    }

    /// This cell plus its 8 surrounding cells, for loading spawns in the
    /// immediate neighborhood.
    pub fn neighbors(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(9);
        for dx in -1..=1 {
            for dy in -1..=1 {
                cells.push(GridCell {
                    grid_x: self.grid_x + dx,
                    grid_y: self.grid_y + dy,
                });
            }
        }
        cells
    }

    /// Manhattan distance in grid-cell units (not meters).
    pub fn manhattan_distance(&self, other: &GridCell) -> i64 {
        (self.grid_x - other.grid_x).abs() + (self.grid_y - other.grid_y).abs()
    }

    /// Whether two coordinates land in the same cell.
    pub fn same_cell(a: &Coordinates, b: &Coordinates) -> bool {
        let cell_a = GridCell::from_coordinates(a.lat, a.lng);
        let cell_b = GridCell::from_coordinates(b.lat, b.lng);
        matches!((cell_a, cell_b), (Ok(a), Ok(b)) if a == b)
    }
}

/// Canonical identifier: `"{grid_x}:{grid_y}"`.
impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.grid_x, self.grid_y)
    }
}

impl FromStr for GridCell {
    type Err = String;

    /// Parses the canonical id back into a cell. Fails on anything without
    /// exactly one `:` separator or with non-integer components.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (x, y) = match (parts.next(), parts.next(), parts.next()) {
            (Some(x), Some(y), None) => (x, y),
            _ => return Err(format!("Invalid grid cell id: {}", s)),
        };

        let grid_x = x
            .parse::<i64>()
            .map_err(|_| format!("Invalid grid cell id: {}", s))?;
        let grid_y = y
            .parse::<i64>()
            .map_err(|_| format!("Invalid grid cell id: {}", s))?;

        Ok(GridCell { grid_x, grid_y })
    }
}
