use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LayoutError;

/// Height of one spatial index bucket in logical pixels.
pub const DEFAULT_CELL_HEIGHT: f64 = 1000.0;

/// The final justified row is left at natural size when filling the
/// container would stretch it beyond this factor.
pub const DEFAULT_LAST_ROW_MAX_STRETCH: f64 = 1.2;

/// Width changes at or below this many pixels do not trigger a relayout
/// (scrollbar appearance jitters the content width by a pixel).
pub const DEFAULT_RESIZE_THRESHOLD: f64 = 1.0;

pub const DEFAULT_RESIZE_DEBOUNCE: Duration = Duration::from_millis(50);

/// Distance kept between a focused item and the viewport edge after scrolling it into view.
pub const DEFAULT_SCROLL_MARGIN: f64 = 16.0;

pub const DEFAULT_NAVIGATION_EPSILON: f64 = 1.0;

/// Number of recent layout passes the worker keeps around.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Upper bound on the column count a config may produce.
pub const MAX_COLUMNS: usize = 4096;

/// Packing algorithm used for a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutMode {
    /// Column-balanced masonry (items keep column width, height follows aspect).
    #[default]
    MasonryVertical,
    /// Row-justified masonry (items keep row height, rows fill the width).
    MasonryHorizontal,
    /// Uniform square cells.
    Grid,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MasonryVertical => "masonry-v",
            Self::MasonryHorizontal => "masonry-h",
            Self::Grid => "grid",
        }
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "masonry-v" | "masonry-vertical" | "masonry" => Ok(Self::MasonryVertical),
            "masonry-h" | "masonry-horizontal" | "justified" => Ok(Self::MasonryHorizontal),
            "grid" => Ok(Self::Grid),
            _ => Err(LayoutError::UnknownMode(s.to_string())),
        }
    }
}

/// Full layout configuration for one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    /// Available content width in pixels. Zero or negative lays out nothing.
    pub container_width: f64,
    /// Column width target (masonry-v), row height target (masonry-h) or cell size (grid).
    pub item_size: f64,
    pub gap: f64,
    /// Extra pixels above and below the viewport included in the visible set.
    pub buffer: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::MasonryVertical,
            container_width: 0.0,
            item_size: 280.0,
            gap: 16.0,
            buffer: 600.0,
        }
    }
}

impl LayoutConfig {
    /// Returns a copy with every field present in `patch` replaced.
    pub fn merged(&self, patch: &LayoutConfigPatch) -> Self {
        Self {
            mode: patch.mode.unwrap_or(self.mode),
            container_width: patch.container_width.unwrap_or(self.container_width),
            item_size: patch.item_size.unwrap_or(self.item_size),
            gap: patch.gap.unwrap_or(self.gap),
            buffer: patch.buffer.unwrap_or(self.buffer),
        }
    }

    /// Rejects values no algorithm can place items with.
    ///
    /// A non-positive container width is valid: it lays out zero items.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !self.container_width.is_finite() {
            return Err(LayoutError::invalid_config(
                "container_width",
                self.container_width,
            ));
        }
        if !self.item_size.is_finite() || self.item_size <= 0.0 {
            return Err(LayoutError::invalid_config("item_size", self.item_size));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(LayoutError::invalid_config("gap", self.gap));
        }
        if !self.buffer.is_finite() || self.buffer < 0.0 {
            return Err(LayoutError::invalid_config("buffer", self.buffer));
        }
        if self.container_width > 0.0
            && (self.container_width + self.gap) / (self.item_size + self.gap) > MAX_COLUMNS as f64
        {
            return Err(LayoutError::invalid_config("item_size", self.item_size));
        }
        Ok(())
    }
}

/// Partial reconfiguration. Absent fields keep their previous value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutConfigPatch {
    pub mode: Option<LayoutMode>,
    pub container_width: Option<f64>,
    pub item_size: Option<f64>,
    pub gap: Option<f64>,
    pub buffer: Option<f64>,
}

impl LayoutConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: LayoutMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn container_width(mut self, width: f64) -> Self {
        self.container_width = Some(width);
        self
    }

    pub fn item_size(mut self, size: f64) -> Self {
        self.item_size = Some(size);
        self
    }

    pub fn gap(mut self, gap: f64) -> Self {
        self.gap = Some(gap);
        self
    }

    pub fn buffer(mut self, buffer: f64) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<LayoutConfig> for LayoutConfigPatch {
    fn from(config: LayoutConfig) -> Self {
        Self {
            mode: Some(config.mode),
            container_width: Some(config.container_width),
            item_size: Some(config.item_size),
            gap: Some(config.gap),
            buffer: Some(config.buffer),
        }
    }
}

/// Tuned constants of the engine. None of them affect correctness; they
/// trade visual jank against responsiveness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutTuning {
    pub cell_height: f64,
    pub last_row_max_stretch: f64,
    pub resize_threshold: f64,
    pub resize_debounce: Duration,
    pub scroll_margin: f64,
    pub navigation_epsilon: f64,
    pub cache_capacity: usize,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            cell_height: DEFAULT_CELL_HEIGHT,
            last_row_max_stretch: DEFAULT_LAST_ROW_MAX_STRETCH,
            resize_threshold: DEFAULT_RESIZE_THRESHOLD,
            resize_debounce: DEFAULT_RESIZE_DEBOUNCE,
            scroll_margin: DEFAULT_SCROLL_MARGIN,
            navigation_epsilon: DEFAULT_NAVIGATION_EPSILON,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merge_keeps_absent_fields() {
        let base = LayoutConfig {
            container_width: 1200.0,
            ..LayoutConfig::default()
        };
        let merged = base.merged(&LayoutConfigPatch::new().mode(LayoutMode::Grid).gap(4.0));

        assert_eq!(merged.mode, LayoutMode::Grid);
        assert_eq!(merged.gap, 4.0);
        assert_eq!(merged.container_width, 1200.0);
        assert_eq!(merged.item_size, base.item_size);
        assert_eq!(merged.buffer, base.buffer);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let base = LayoutConfig::default();
        let patch = LayoutConfigPatch::new();
        assert!(patch.is_empty());
        assert_eq!(base.merged(&patch), base);
    }

    #[test]
    fn test_validate() {
        assert!(LayoutConfig::default().validate().is_ok());

        let negative_width = LayoutConfig {
            container_width: -10.0,
            ..LayoutConfig::default()
        };
        assert!(negative_width.validate().is_ok());

        let zero_size = LayoutConfig {
            item_size: 0.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            zero_size.validate(),
            Err(LayoutError::InvalidConfig {
                field: "item_size",
                ..
            })
        ));

        let nan_width = LayoutConfig {
            container_width: f64::NAN,
            ..LayoutConfig::default()
        };
        assert!(nan_width.validate().is_err());

        let negative_gap = LayoutConfig {
            gap: -1.0,
            ..LayoutConfig::default()
        };
        assert!(negative_gap.validate().is_err());

        let tiny_size = LayoutConfig {
            container_width: 1000.0,
            item_size: 1e-13,
            gap: 0.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(
            tiny_size.validate(),
            Err(LayoutError::InvalidConfig {
                field: "item_size",
                ..
            })
        ));

        let max_columns = LayoutConfig {
            container_width: MAX_COLUMNS as f64,
            item_size: 1.0,
            gap: 0.0,
            ..LayoutConfig::default()
        };
        assert!(max_columns.validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("grid".parse::<LayoutMode>().unwrap(), LayoutMode::Grid);
        assert_eq!(
            "Masonry-H".parse::<LayoutMode>().unwrap(),
            LayoutMode::MasonryHorizontal
        );
        assert_eq!(
            LayoutMode::MasonryVertical.as_str().parse::<LayoutMode>().unwrap(),
            LayoutMode::MasonryVertical
        );
        assert!("spiral".parse::<LayoutMode>().is_err());
    }
}
