//! Mapping of workspace indices onto a two dimensional grid.
//!
//! This is what pagers draw and what directional workspace switching walks.
//! The layout is recomputed from scratch on every call; nothing is cached.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::common::config::MAX_WORKSPACES;
use crate::layout_engine::orientation::{Corner, Direction, Orientation};

/// Largest explicit row or column count. A grid never needs more of either
/// than there are workspaces.
pub const MAX_DIMENSION: usize = MAX_WORKSPACES;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Workspace(usize),
    /// Grid position past the last workspace in a ragged layout.
    Absent,
}

impl Cell {
    pub fn workspace(self) -> Option<usize> {
        match self {
            Cell::Workspace(index) => Some(index),
            Cell::Absent => None,
        }
    }
}

/// User or pager supplied grid shape. `None` for a dimension means it is
/// derived from the other one and the workspace count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutParams {
    pub rows: Option<NonZeroUsize>,
    pub cols: Option<NonZeroUsize>,
    pub orientation: Orientation,
    pub corner: Corner,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            rows: NonZeroUsize::new(1),
            cols: None,
            orientation: Orientation::Horizontal,
            corner: Corner::TopLeft,
        }
    }
}

impl LayoutParams {
    /// Builds params from signed counts where anything `<= 0` means auto.
    pub fn from_raw(rows: i64, cols: i64, orientation: Orientation, corner: Corner) -> Self {
        Self {
            rows: dimension(rows),
            cols: dimension(cols),
            orientation,
            corner,
        }
    }

    pub fn raw_rows(&self) -> usize { self.rows.map_or(0, NonZeroUsize::get) }

    pub fn raw_cols(&self) -> usize { self.cols.map_or(0, NonZeroUsize::get) }
}

pub(crate) fn dimension(value: i64) -> Option<NonZeroUsize> {
    usize::try_from(value).ok().and_then(NonZeroUsize::new)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub rows: usize,
    pub cols: usize,
    grid: Vec<Cell>,
    pub current_row: usize,
    pub current_col: usize,
}

impl WorkspaceLayout {
    pub fn compute(params: LayoutParams, workspace_count: usize, active_index: usize) -> Self {
        let n = workspace_count;
        let (rows, cols) = match (params.rows, params.cols) {
            (None, None) => (1, n),
            (Some(rows), None) => (rows.get(), n.div_ceil(rows.get())),
            (None, Some(cols)) => (n.div_ceil(cols.get()), cols.get()),
            (Some(rows), Some(cols)) => (rows.get(), cols.get()),
        };
        let limit = n.max(MAX_DIMENSION);
        let rows = rows.clamp(1, limit);
        let cols = cols.clamp(1, limit);
        let grid_area = rows * cols;

        let mut slots: Vec<Option<usize>> = vec![None; grid_area];
        let mut next = 0;
        for (r, c) in fill_order(rows, cols, params.orientation, params.corner) {
            slots[r * cols + c] = Some(next);
            next += 1;
        }

        if next != grid_area || slots.iter().any(Option::is_none) {
            error!(
                filled = next,
                grid_area,
                ?params,
                "workspace grid fill did not cover every cell"
            );
            debug_assert!(false, "workspace grid fill did not cover every cell");
        }

        let grid: Vec<Cell> = slots
            .into_iter()
            .map(|slot| match slot {
                Some(index) if index < n => Cell::Workspace(index),
                _ => Cell::Absent,
            })
            .collect();

        let (current_row, current_col) = grid
            .iter()
            .position(|cell| *cell == Cell::Workspace(active_index))
            .map_or((0, 0), |i| (i / cols, i % cols));

        WorkspaceLayout {
            rows,
            cols,
            grid,
            current_row,
            current_col,
        }
    }

    pub fn grid_area(&self) -> usize { self.grid.len() }

    pub fn cells(&self) -> &[Cell] { &self.grid }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        if row >= self.rows || col >= self.cols {
            return Cell::Absent;
        }
        self.grid[row * self.cols + col]
    }

    /// The workspace one step away from the active one, if there is a
    /// workspace there. Movement does not wrap around the grid edges.
    pub fn neighbor(&self, direction: Direction) -> Option<usize> {
        let (dr, dc) = direction.delta();
        let row = self.current_row.checked_add_signed(dr)?;
        let col = self.current_col.checked_add_signed(dc)?;
        self.cell(row, col).workspace()
    }
}

/// Grid coordinates in the order workspace indices are assigned.
fn fill_order(
    rows: usize,
    cols: usize,
    orientation: Orientation,
    corner: Corner,
) -> impl Iterator<Item = (usize, usize)> {
    let row_at = move |i: usize| if corner.is_bottom() { rows - 1 - i } else { i };
    let col_at = move |i: usize| if corner.is_right() { cols - 1 - i } else { i };
    let (outer, inner) = match orientation {
        Orientation::Horizontal => (rows, cols),
        Orientation::Vertical => (cols, rows),
    };
    (0..outer).flat_map(move |o| {
        (0..inner).map(move |i| match orientation {
            Orientation::Horizontal => (row_at(o), col_at(i)),
            Orientation::Vertical => (row_at(i), col_at(o)),
        })
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;
    use test_log::test;

    use super::*;

    fn params(rows: i64, cols: i64, orientation: Orientation, corner: Corner) -> LayoutParams {
        LayoutParams::from_raw(rows, cols, orientation, corner)
    }

    fn rows_of(layout: &WorkspaceLayout) -> Vec<Vec<Option<usize>>> {
        (0..layout.rows)
            .map(|r| (0..layout.cols).map(|c| layout.cell(r, c).workspace()).collect())
            .collect()
    }

    #[test]
    fn top_left_horizontal_is_row_major() {
        let layout =
            WorkspaceLayout::compute(params(2, 4, Orientation::Horizontal, Corner::TopLeft), 8, 0);
        assert_eq!(
            rows_of(&layout),
            vec![
                vec![Some(0), Some(1), Some(2), Some(3)],
                vec![Some(4), Some(5), Some(6), Some(7)],
            ]
        );
    }

    #[test]
    fn top_right_horizontal_runs_right_to_left() {
        let layout =
            WorkspaceLayout::compute(params(2, 4, Orientation::Horizontal, Corner::TopRight), 8, 0);
        assert_eq!(layout.cell(0, 0), Cell::Workspace(3));
        assert_eq!(layout.cell(0, 3), Cell::Workspace(0));
        assert_eq!(layout.cell(1, 0), Cell::Workspace(7));
        assert_eq!(layout.cell(1, 3), Cell::Workspace(4));
        assert_eq!((layout.current_row, layout.current_col), (0, 3));
    }

    #[test]
    fn vertical_variants() {
        let layout =
            WorkspaceLayout::compute(params(2, 3, Orientation::Vertical, Corner::TopLeft), 6, 0);
        assert_eq!(
            rows_of(&layout),
            vec![vec![Some(0), Some(2), Some(4)], vec![Some(1), Some(3), Some(5)]]
        );

        let layout = WorkspaceLayout::compute(
            params(2, 3, Orientation::Vertical, Corner::BottomRight),
            6,
            0,
        );
        assert_eq!(
            rows_of(&layout),
            vec![vec![Some(5), Some(3), Some(1)], vec![Some(4), Some(2), Some(0)]]
        );

        let layout =
            WorkspaceLayout::compute(params(2, 3, Orientation::Vertical, Corner::BottomLeft), 6, 0);
        assert_eq!(
            rows_of(&layout),
            vec![vec![Some(1), Some(3), Some(5)], vec![Some(0), Some(2), Some(4)]]
        );
    }

    #[test]
    fn ragged_layout_marks_trailing_cells_absent() {
        let layout =
            WorkspaceLayout::compute(params(2, 0, Orientation::Horizontal, Corner::TopLeft), 5, 4);
        assert_eq!((layout.rows, layout.cols), (2, 3));
        assert_eq!(
            rows_of(&layout),
            vec![vec![Some(0), Some(1), Some(2)], vec![Some(3), Some(4), None]]
        );
        assert_eq!((layout.current_row, layout.current_col), (1, 1));
    }

    #[test]
    fn both_dimensions_auto_means_a_single_row() {
        let layout =
            WorkspaceLayout::compute(params(0, -1, Orientation::Horizontal, Corner::TopLeft), 4, 2);
        assert_eq!((layout.rows, layout.cols), (1, 4));
        assert_eq!((layout.current_row, layout.current_col), (0, 2));
    }

    #[test]
    fn every_workspace_appears_exactly_once_in_every_variant() {
        for n in 1..=13 {
            for (rows, cols) in [(0, 0), (1, 0), (2, 0), (3, 0), (0, 2), (0, 5)] {
                for orientation in Orientation::iter() {
                    for corner in Corner::iter() {
                        let active = (n * 7 + 3) % n;
                        let p = params(rows, cols, orientation, corner);
                        let layout = WorkspaceLayout::compute(p, n, active);
                        assert_eq!(layout.grid_area(), layout.rows * layout.cols);

                        let mut seen = vec![0; n];
                        for cell in layout.cells() {
                            if let Cell::Workspace(index) = *cell {
                                assert!(index < n);
                                seen[index] += 1;
                            }
                        }
                        assert_eq!(seen, vec![1; n], "{p:?} with {n} workspaces");
                        assert_eq!(
                            layout.cell(layout.current_row, layout.current_col),
                            Cell::Workspace(active)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn huge_dimensions_are_clamped() {
        let huge = i64::from(i32::MAX);
        let layout = WorkspaceLayout::compute(
            params(huge, huge, Orientation::Horizontal, Corner::TopLeft),
            4,
            3,
        );
        assert_eq!((layout.rows, layout.cols), (MAX_DIMENSION, MAX_DIMENSION));
        assert_eq!(layout.cell(0, 3), Cell::Workspace(3));
        assert_eq!((layout.current_row, layout.current_col), (0, 3));
    }

    #[test]
    fn neighbors_stop_at_edges_and_holes() {
        let layout =
            WorkspaceLayout::compute(params(2, 3, Orientation::Horizontal, Corner::TopLeft), 5, 2);
        assert_eq!(layout.neighbor(Direction::Left), Some(1));
        assert_eq!(layout.neighbor(Direction::Right), None);
        assert_eq!(layout.neighbor(Direction::Up), None);
        assert_eq!(layout.neighbor(Direction::Down), None);

        let layout =
            WorkspaceLayout::compute(params(2, 3, Orientation::Horizontal, Corner::TopLeft), 5, 1);
        assert_eq!(layout.neighbor(Direction::Down), Some(4));
    }
}
