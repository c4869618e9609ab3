use std::collections::HashSet;

use crate::models::{ItemId, DEFAULT_CELL_HEIGHT};

/// Coarse 1-D bucket index over the vertical axis.
///
/// Cell `k` covers `[k * cell_height, (k + 1) * cell_height)`. An item is
/// registered in every cell its vertical span touches, so a query returns a
/// superset of the truly intersecting items; callers filter by exact position.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_height: f64,
    cells: Vec<Vec<ItemId>>,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_HEIGHT)
    }
}

impl SpatialGrid {
    pub fn new(cell_height: f64) -> Self {
        let cell_height = if cell_height.is_finite() && cell_height > 0.0 {
            cell_height
        } else {
            DEFAULT_CELL_HEIGHT
        };
        Self {
            cell_height,
            cells: Vec::new(),
        }
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    /// Number of allocated cells (one past the lowest registered cell).
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn bucket(&self, cell: usize) -> &[ItemId] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    fn cell_index(&self, y: f64) -> usize {
        (y.max(0.0) / self.cell_height).floor() as usize
    }

    /// Registers `id` in every cell from `floor(start_y / h)` to `floor(end_y / h)`.
    pub fn insert(&mut self, id: ItemId, start_y: f64, end_y: f64) {
        let first = self.cell_index(start_y);
        let last = self.cell_index(end_y.max(start_y));
        if last >= self.cells.len() {
            self.cells.resize_with(last + 1, Vec::new);
        }
        for cell in &mut self.cells[first..=last] {
            cell.push(id);
        }
    }

    /// Ids registered in any cell touched by `[start, end]`, deduplicated,
    /// in first-seen order.
    pub fn candidates(&self, start: f64, end: f64) -> Vec<ItemId> {
        if self.cells.is_empty() || end < 0.0 || end < start {
            return Vec::new();
        }
        let first = self.cell_index(start);
        let last = self.cell_index(end).min(self.cells.len() - 1);
        if first > last {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for cell in &self.cells[first..=last] {
            for id in cell {
                if seen.insert(*id) {
                    out.push(*id);
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
