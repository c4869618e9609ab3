use std::cmp::Ordering;
use std::collections::HashMap;

use super::{LayoutPass, SpatialGrid};
use crate::models::{ItemId, ItemPosition};

/// A finished layout pass together with the spatial index built over it.
///
/// Snapshots are built whole and swapped in by the worker; they are never
/// patched in place.
#[derive(Debug, Clone)]
pub struct LayoutSnapshot {
    positions: Vec<ItemPosition>,
    index: HashMap<ItemId, usize>,
    grid: SpatialGrid,
    total_height: f64,
}

impl LayoutSnapshot {
    pub fn empty(cell_height: f64) -> Self {
        Self {
            positions: Vec::new(),
            index: HashMap::new(),
            grid: SpatialGrid::new(cell_height),
            total_height: 0.0,
        }
    }

    /// Indexes every position of `pass` into a fresh spatial grid.
    pub fn build(pass: LayoutPass, cell_height: f64) -> Self {
        let mut grid = SpatialGrid::new(cell_height);
        let mut index = HashMap::with_capacity(pass.positions.len());

        for (i, pos) in pass.positions.iter().enumerate() {
            grid.insert(pos.id, pos.y, pos.bottom());
            index.insert(pos.id, i);
        }

        Self {
            positions: pass.positions,
            index,
            grid,
            total_height: pass.total_height,
        }
    }

    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    pub fn positions(&self) -> &[ItemPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn position(&self, id: ItemId) -> Option<&ItemPosition> {
        self.index.get(&id).map(|&i| &self.positions[i])
    }

    /// Items whose `[y, y + height)` span intersects `[start, end]`, sorted
    /// by `(y, x)` for a stable render order.
    pub fn query(&self, start: f64, end: f64) -> Vec<ItemPosition> {
        let mut visible: Vec<ItemPosition> = self
            .grid
            .candidates(start, end)
            .into_iter()
            .filter_map(|id| self.position(id))
            .filter(|pos| pos.intersects_band(start, end))
            .copied()
            .collect();
        visible.sort_by(render_order);
        visible
    }
}

fn render_order(a: &ItemPosition, b: &ItemPosition) -> Ordering {
    a.y.total_cmp(&b.y)
        .then_with(|| a.x.total_cmp(&b.x))
        .then_with(|| a.id.cmp(&b.id))
}
