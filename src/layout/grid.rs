use super::{column_fit, LayoutAlgorithm, LayoutPass};
use crate::models::{ItemPosition, LayoutConfig, LayoutItemInput, LayoutMode};

/// Uniform grid of square cells fitted to the container width.
///
/// Aspect ratios are ignored; item `i` lands in row `i / columns`, column
/// `i % columns`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridLayout;

impl GridLayout {
    /// Row and column of the item at `index`.
    pub fn cell_of(index: usize, columns: usize) -> (usize, usize) {
        (index / columns, index % columns)
    }

    /// Column count and fitted cell size for `config`.
    pub fn fit(config: &LayoutConfig) -> (usize, f64) {
        column_fit(config.container_width, config.item_size, config.gap)
    }
}

impl LayoutAlgorithm for GridLayout {
    fn mode(&self) -> LayoutMode {
        LayoutMode::Grid
    }

    fn compute(&self, items: &[LayoutItemInput], config: &LayoutConfig) -> LayoutPass {
        let (columns, cell) = Self::fit(config);
        let stride = cell + config.gap;

        let positions = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (row, col) = Self::cell_of(index, columns);
                ItemPosition::new(item.id, col as f64 * stride, row as f64 * stride, cell, cell)
            })
            .collect();

        let rows = items.len().div_ceil(columns);
        LayoutPass {
            positions,
            total_height: rows as f64 * stride,
        }
    }
}
