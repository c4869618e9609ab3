use super::{column_fit, LayoutAlgorithm, LayoutPass};
use crate::models::{ItemPosition, LayoutConfig, LayoutItemInput, LayoutMode};

/// Column-balanced vertical masonry.
///
/// Every item takes the full column width; its height follows its aspect
/// ratio. Items go, in input order, to the currently shortest column (lowest
/// index on ties), so the result is deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct MasonryLayout;

impl MasonryLayout {
    /// Lays out `items` and also returns the accumulated heights of the
    /// occupied columns (each including the trailing gap of its last item).
    pub fn compute_columns(
        &self,
        items: &[LayoutItemInput],
        config: &LayoutConfig,
    ) -> (LayoutPass, Vec<f64>) {
        let (columns, column_width) = column_fit(config.container_width, config.item_size, config.gap);
        // Columns past the item count are never picked.
        let mut heights = vec![0.0f64; columns.min(items.len()).max(1)];
        let mut positions = Vec::with_capacity(items.len());

        for item in items {
            let column = shortest_column(&heights);
            let height = column_width / item.effective_aspect_ratio();
            positions.push(ItemPosition::new(
                item.id,
                column as f64 * (column_width + config.gap),
                heights[column],
                column_width,
                height,
            ));
            heights[column] += height + config.gap;
        }

        let total_height = heights.iter().copied().fold(0.0, f64::max);
        (
            LayoutPass {
                positions,
                total_height,
            },
            heights,
        )
    }
}

impl LayoutAlgorithm for MasonryLayout {
    fn mode(&self) -> LayoutMode {
        LayoutMode::MasonryVertical
    }

    fn compute(&self, items: &[LayoutItemInput], config: &LayoutConfig) -> LayoutPass {
        self.compute_columns(items, config).0
    }
}

fn shortest_column(heights: &[f64]) -> usize {
    let mut best = 0;
    for (index, height) in heights.iter().enumerate().skip(1) {
        if *height < heights[best] {
            best = index;
        }
    }
    best
}
