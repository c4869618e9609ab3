/// Stable identifier of a library item (the item source's row id).
pub type ItemId = i64;

/// Minimal projection of a library item handed to the layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutItemInput {
    pub id: ItemId,
    /// Width divided by height. Always positive once constructed through `new`.
    pub aspect_ratio: f64,
}

impl LayoutItemInput {
    /// Creates an input, falling back to a square tile for unusable ratios.
    pub fn new(id: ItemId, aspect_ratio: f64) -> Self {
        Self {
            id,
            aspect_ratio: sanitize_aspect_ratio(aspect_ratio),
        }
    }

    pub fn square(id: ItemId) -> Self {
        Self {
            id,
            aspect_ratio: 1.0,
        }
    }

    /// Aspect ratio used by the packing algorithms.
    ///
    /// Fields are public, so a caller may have written a zero or negative
    /// ratio directly; those are laid out as squares.
    pub fn effective_aspect_ratio(&self) -> f64 {
        sanitize_aspect_ratio(self.aspect_ratio)
    }
}

/// Returns `aspect_ratio` if it is finite and positive, 1.0 otherwise.
pub fn sanitize_aspect_ratio(aspect_ratio: f64) -> f64 {
    if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        1.0
    }
}

/// Pixel dimensions as reported by the item source.
///
/// Either dimension may be unknown (not yet probed, unsupported format).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaDimensions {
    pub id: ItemId,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl MediaDimensions {
    pub fn new(id: ItemId, width: Option<i32>, height: Option<i32>) -> Self {
        Self { id, width, height }
    }

    pub fn aspect_ratio(&self) -> f64 {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => w as f64 / h as f64,
            _ => 1.0,
        }
    }
}

impl From<MediaDimensions> for LayoutItemInput {
    fn from(dims: MediaDimensions) -> Self {
        Self::new(dims.id, dims.aspect_ratio())
    }
}

impl From<&MediaDimensions> for LayoutItemInput {
    fn from(dims: &MediaDimensions) -> Self {
        Self::new(dims.id, dims.aspect_ratio())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_aspect_falls_back_to_square() {
        assert_eq!(LayoutItemInput::new(1, 0.0).aspect_ratio, 1.0);
        assert_eq!(LayoutItemInput::new(2, -3.0).aspect_ratio, 1.0);
        assert_eq!(LayoutItemInput::new(3, f64::NAN).aspect_ratio, 1.0);
        assert_eq!(LayoutItemInput::new(4, f64::INFINITY).aspect_ratio, 1.0);
        assert_eq!(LayoutItemInput::new(5, 1.5).aspect_ratio, 1.5);
    }

    #[test]
    fn test_effective_aspect_for_direct_writes() {
        let item = LayoutItemInput {
            id: 9,
            aspect_ratio: -2.0,
        };
        assert_eq!(item.effective_aspect_ratio(), 1.0);
    }

    #[test]
    fn test_dimensions_conversion() {
        let wide: LayoutItemInput = MediaDimensions::new(1, Some(1920), Some(1080)).into();
        assert!((wide.aspect_ratio - 16.0 / 9.0).abs() < 1e-9);

        let unknown: LayoutItemInput = MediaDimensions::new(2, None, Some(1080)).into();
        assert_eq!(unknown.aspect_ratio, 1.0);

        let broken: LayoutItemInput = (&MediaDimensions::new(3, Some(0), Some(0))).into();
        assert_eq!(broken.aspect_ratio, 1.0);
        assert_eq!(broken.id, 3);
    }
}
