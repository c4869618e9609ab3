//! Packing algorithms and the spatial index built over their output.
//!
//! - `MasonryLayout` - column-balanced vertical masonry
//! - `JustifiedLayout` - row-justified horizontal masonry
//! - `GridLayout` - uniform square cells
//! - `SpatialGrid` / `LayoutSnapshot` - visibility queries over a finished pass
//! - `LayoutCache` - recent passes keyed by item list and config

pub mod grid;
pub mod justified;
pub mod layout_cache;
pub mod masonry;
pub mod snapshot;
pub mod spatial;

pub use grid::GridLayout;
pub use justified::{JustifiedLayout, RowBreak};
pub use layout_cache::LayoutCache;
pub use masonry::MasonryLayout;
pub use snapshot::LayoutSnapshot;
pub use spatial::SpatialGrid;

use crate::error::LayoutError;
use crate::models::{ItemPosition, LayoutConfig, LayoutItemInput, LayoutMode, LayoutTuning};

/// Output of one layout pass: one position per input item, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPass {
    pub positions: Vec<ItemPosition>,
    pub total_height: f64,
}

impl LayoutPass {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// A packing algorithm. Implementations are pure functions of their input.
///
/// Callers guarantee a validated config, a positive container width and a
/// non-empty item list; `compute_layout` enforces this.
pub trait LayoutAlgorithm {
    fn mode(&self) -> LayoutMode;

    fn compute(&self, items: &[LayoutItemInput], config: &LayoutConfig) -> LayoutPass;
}

/// Returns the algorithm for `mode`.
pub fn algorithm_for(mode: LayoutMode, tuning: &LayoutTuning) -> Box<dyn LayoutAlgorithm> {
    match mode {
        LayoutMode::MasonryVertical => Box::new(MasonryLayout),
        LayoutMode::MasonryHorizontal => {
            Box::new(JustifiedLayout::with_last_row_max_stretch(tuning.last_row_max_stretch))
        }
        LayoutMode::Grid => Box::new(GridLayout),
    }
}

/// Runs a full layout pass for `items`.
///
/// An empty item list or a non-positive container width yields an empty pass,
/// not an error.
pub fn compute_layout(
    items: &[LayoutItemInput],
    config: &LayoutConfig,
    tuning: &LayoutTuning,
) -> Result<LayoutPass, LayoutError> {
    config.validate()?;
    if items.is_empty() || config.container_width <= 0.0 {
        return Ok(LayoutPass::empty());
    }
    Ok(algorithm_for(config.mode, tuning).compute(items, config))
}

/// Column count and fitted column width shared by masonry-v and grid.
pub(crate) fn column_fit(container_width: f64, item_size: f64, gap: f64) -> (usize, f64) {
    let columns = ((container_width + gap) / (item_size + gap)).floor().max(1.0) as usize;
    let width = (container_width - (columns - 1) as f64 * gap) / columns as f64;
    (columns, width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ratios: &[f64]) -> Vec<LayoutItemInput> {
        ratios
            .iter()
            .enumerate()
            .map(|(i, ar)| LayoutItemInput::new(i as i64, *ar))
            .collect()
    }

    #[test]
    fn test_column_fit() {
        assert_eq!(column_fit(600.0, 280.0, 16.0), (2, 292.0));
        assert_eq!(column_fit(500.0, 100.0, 10.0), (4, 117.5));
        // Narrower than one item still yields one full-width column.
        assert_eq!(column_fit(100.0, 280.0, 16.0), (1, 100.0));
    }

    #[test]
    fn test_empty_items_every_mode() {
        for mode in [
            LayoutMode::MasonryVertical,
            LayoutMode::MasonryHorizontal,
            LayoutMode::Grid,
        ] {
            let config = LayoutConfig {
                mode,
                container_width: 1200.0,
                ..LayoutConfig::default()
            };
            let pass = compute_layout(&[], &config, &LayoutTuning::default()).unwrap();
            assert!(pass.is_empty());
            assert_eq!(pass.total_height, 0.0);
        }
    }

    #[test]
    fn test_non_positive_width_is_empty() {
        for width in [0.0, -250.0] {
            let config = LayoutConfig {
                container_width: width,
                ..LayoutConfig::default()
            };
            let pass =
                compute_layout(&items(&[1.0, 2.0]), &config, &LayoutTuning::default()).unwrap();
            assert!(pass.is_empty());
            assert_eq!(pass.total_height, 0.0);
        }
    }

    #[test]
    fn test_invalid_config_is_error() {
        let config = LayoutConfig {
            container_width: 800.0,
            item_size: -5.0,
            ..LayoutConfig::default()
        };
        let result = compute_layout(&items(&[1.0]), &config, &LayoutTuning::default());
        assert!(matches!(result, Err(LayoutError::InvalidConfig { .. })));
    }

    #[test]
    fn test_packing_completeness_every_mode() {
        let ratios: Vec<f64> = (0..97).map(|i| 0.4 + (i % 11) as f64 * 0.27).collect();
        let input = items(&ratios);

        for mode in [
            LayoutMode::MasonryVertical,
            LayoutMode::MasonryHorizontal,
            LayoutMode::Grid,
        ] {
            let config = LayoutConfig {
                mode,
                container_width: 1337.0,
                item_size: 190.0,
                gap: 8.0,
                buffer: 0.0,
            };
            let pass = compute_layout(&input, &config, &LayoutTuning::default()).unwrap();
            assert_eq!(pass.positions.len(), input.len(), "mode {mode}");

            let mut ids: Vec<i64> = pass.positions.iter().map(|p| p.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), input.len(), "every id exactly once in {mode}");

            for pos in &pass.positions {
                assert!(pos.x >= 0.0 && pos.y >= 0.0);
                assert!(pos.width > 0.0 && pos.height > 0.0);
                assert!(pos.bottom() <= pass.total_height + 1e-6);
            }
        }
    }

    #[test]
    fn test_repeated_layout_is_identical() {
        let input = items(&[1.0, 0.75, 1.5, 2.2, 0.6, 1.0, 1.33]);
        for mode in [
            LayoutMode::MasonryVertical,
            LayoutMode::MasonryHorizontal,
            LayoutMode::Grid,
        ] {
            let config = LayoutConfig {
                mode,
                container_width: 1024.0,
                ..LayoutConfig::default()
            };
            let tuning = LayoutTuning::default();
            let first = compute_layout(&input, &config, &tuning).unwrap();
            let second = compute_layout(&input, &config, &tuning).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_algorithm_for_mode() {
        let tuning = LayoutTuning::default();
        for mode in [
            LayoutMode::MasonryVertical,
            LayoutMode::MasonryHorizontal,
            LayoutMode::Grid,
        ] {
            assert_eq!(algorithm_for(mode, &tuning).mode(), mode);
        }
    }
}
