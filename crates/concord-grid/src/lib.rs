//! Concord Grid
//!
//! Positions and bounded grids for the entities that analyzers propose on.
//!
//! An entity is identified by where it sits, nothing else. Two analyzers
//! talking about the same cell always talk about the same `GridPos`, so
//! proposals from independent analyzers line up without any coordination.

mod grid;
mod pos;

pub use grid::Grid;
pub use pos::GridPos;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_positions_are_sorted() {
        let grid = Grid::new(4, 4);
        let cells: Vec<_> = grid.positions().collect();
        let mut sorted = cells.clone();
        sorted.sort();
        assert_eq!(cells, sorted);
    }
}
