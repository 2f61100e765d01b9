//! Grid positions.
//!
//! Cells are addressed by `(row, col)` with rows growing downward. The
//! ordering is row-major, which gives every map keyed by position a stable
//! iteration order.

use std::ops::{Add, Neg, Sub};

/// A cell position on a 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridPos {
    /// Row index
    pub row: i64,
    /// Column index
    pub col: i64,
}

impl GridPos {
    /// Top-left cell.
    pub const ORIGIN: Self = Self { row: 0, col: 0 };

    /// The four orthogonal steps: up, right, down, left.
    pub const ORTHOGONAL: [Self; 4] = [
        Self { row: -1, col: 0 },
        Self { row: 0, col: 1 },
        Self { row: 1, col: 0 },
        Self { row: 0, col: -1 },
    ];

    /// Create a new position.
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Manhattan distance.
    pub fn manhattan(&self, other: &Self) -> u64 {
        (self.row - other.row).unsigned_abs() + (self.col - other.col).unsigned_abs()
    }

    /// Chebyshev distance (king moves).
    pub fn chebyshev(&self, other: &Self) -> u64 {
        (self.row - other.row)
            .unsigned_abs()
            .max((self.col - other.col).unsigned_abs())
    }

    /// The four orthogonal neighbors, unbounded.
    pub fn orthogonal_neighbors(&self) -> [Self; 4] {
        Self::ORTHOGONAL.map(|d| *self + d)
    }
}

impl From<(i64, i64)> for GridPos {
    fn from((row, col): (i64, i64)) -> Self {
        Self { row, col }
    }
}

impl Add for GridPos {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            row: self.row + other.row,
            col: self.col + other.col,
        }
    }
}

impl Sub for GridPos {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            row: self.row - other.row,
            col: self.col - other.col,
        }
    }
}

impl Neg for GridPos {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            row: -self.row,
            col: -self.col,
        }
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
