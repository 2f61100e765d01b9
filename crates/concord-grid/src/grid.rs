//! Bounded grids.

use crate::GridPos;

/// A bounded `rows × cols` grid anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid {
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u32,
}

impl Grid {
    /// Create a grid with the given dimensions.
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells.
    pub const fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether the position lies inside the grid.
    pub fn contains(&self, pos: GridPos) -> bool {
        (0..self.rows as i64).contains(&pos.row) && (0..self.cols as i64).contains(&pos.col)
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = GridPos> + '_ {
        let cols = self.cols as i64;
        (0..self.rows as i64).flat_map(move |row| (0..cols).map(move |col| GridPos::new(row, col)))
    }

    /// Orthogonal neighbors of `pos` that fall inside the grid.
    pub fn neighbors_of(&self, pos: GridPos) -> impl Iterator<Item = GridPos> + '_ {
        pos.orthogonal_neighbors()
            .into_iter()
            .filter(move |n| self.contains(*n))
    }
}
