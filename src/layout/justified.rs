use super::{LayoutAlgorithm, LayoutPass};
use crate::models::{
    ItemPosition, LayoutConfig, LayoutItemInput, LayoutMode, DEFAULT_LAST_ROW_MAX_STRETCH,
};

/// Row-justified horizontal masonry.
///
/// Items are scaled to the target row height (`item_size`) and streamed
/// left-to-right; a row closes when the next item would overflow the
/// container. Each closed row is then scaled uniformly so that items plus
/// gaps fill the container width exactly.
#[derive(Debug, Clone)]
pub struct JustifiedLayout {
    /// The final row keeps its natural size when justifying it would stretch
    /// it by more than this factor (default: 1.2).
    pub last_row_max_stretch: f64,
}

impl Default for JustifiedLayout {
    fn default() -> Self {
        Self {
            last_row_max_stretch: DEFAULT_LAST_ROW_MAX_STRETCH,
        }
    }
}

/// A closed row: the item index range it covers and its justification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBreak {
    /// Start index in the items array (inclusive)
    pub start_index: usize,
    /// End index in the items array (exclusive)
    pub end_index: usize,
    /// Factor applied to every item's natural width and to the row height
    pub scale: f64,
    /// The justified height of this row
    pub row_height: f64,
}

impl RowBreak {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index == self.start_index
    }
}

impl JustifiedLayout {
    pub fn with_last_row_max_stretch(last_row_max_stretch: f64) -> Self {
        Self {
            last_row_max_stretch,
        }
    }

    /// Computes row breaks without producing positions.
    ///
    /// # Algorithm
    /// 1. Natural width of each item is `item_size * aspect_ratio`.
    /// 2. An item joins the open row unless `row_width + gap + width` would
    ///    exceed the container; a row always holds at least one item.
    /// 3. A closed row gets `scale = (container - gaps) / sum(widths)`.
    ///    The final row falls back to scale 1.0 when that would exceed
    ///    `last_row_max_stretch`.
    pub fn compute_breaks(&self, items: &[LayoutItemInput], config: &LayoutConfig) -> Vec<RowBreak> {
        let mut breaks = Vec::new();
        let mut row_start = 0usize;
        let mut row_width = 0.0f64;
        let mut natural_sum = 0.0f64;

        for (index, item) in items.iter().enumerate() {
            let item_w = self.natural_width(item, config);
            if index > row_start {
                let required_width = row_width + config.gap + item_w;
                if required_width > config.container_width {
                    breaks.push(self.close_row(row_start, index, natural_sum, config, false));
                    row_start = index;
                    row_width = 0.0;
                    natural_sum = 0.0;
                } else {
                    row_width += config.gap;
                }
            }
            row_width += item_w;
            natural_sum += item_w;
        }

        if row_start < items.len() {
            breaks.push(self.close_row(row_start, items.len(), natural_sum, config, true));
        }

        breaks
    }

    /// Positions items from previously computed breaks.
    pub fn positions_from_breaks(
        &self,
        items: &[LayoutItemInput],
        breaks: &[RowBreak],
        config: &LayoutConfig,
    ) -> LayoutPass {
        let mut positions = Vec::with_capacity(items.len());
        let mut y = 0.0f64;

        for brk in breaks {
            let mut x = 0.0f64;
            for item in &items[brk.start_index..brk.end_index] {
                let width = self.natural_width(item, config) * brk.scale;
                positions.push(ItemPosition::new(item.id, x, y, width, brk.row_height));
                x += width + config.gap;
            }
            y += brk.row_height + config.gap;
        }

        LayoutPass {
            positions,
            total_height: y,
        }
    }

    fn natural_width(&self, item: &LayoutItemInput, config: &LayoutConfig) -> f64 {
        config.item_size * item.effective_aspect_ratio()
    }

    fn close_row(
        &self,
        start_index: usize,
        end_index: usize,
        natural_sum: f64,
        config: &LayoutConfig,
        is_last: bool,
    ) -> RowBreak {
        let gaps = (end_index - start_index - 1) as f64 * config.gap;
        let mut scale = (config.container_width - gaps) / natural_sum;
        if is_last && scale > self.last_row_max_stretch {
            scale = 1.0;
        }
        RowBreak {
            start_index,
            end_index,
            scale,
            row_height: config.item_size * scale,
        }
    }
}

impl LayoutAlgorithm for JustifiedLayout {
    fn mode(&self) -> LayoutMode {
        LayoutMode::MasonryHorizontal
    }

    fn compute(&self, items: &[LayoutItemInput], config: &LayoutConfig) -> LayoutPass {
        let breaks = self.compute_breaks(items, config);
        self.positions_from_breaks(items, &breaks, config)
    }
}
