use super::ItemId;

/// Absolute placement of one item inside the scroll container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemPosition {
    pub id: ItemId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ItemPosition {
    pub fn new(id: ItemId, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True if `[y, y + height)` intersects the closed band `[start, end]`.
    pub fn intersects_band(&self, start: f64, end: f64) -> bool {
        self.y <= end && self.bottom() > start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_intersection_edges() {
        let pos = ItemPosition::new(1, 0.0, 100.0, 50.0, 100.0);
        assert!(pos.intersects_band(0.0, 100.0));
        assert!(pos.intersects_band(150.0, 160.0));
        assert!(pos.intersects_band(199.0, 500.0));
        // Half-open on the bottom edge.
        assert!(!pos.intersects_band(200.0, 500.0));
        assert!(!pos.intersects_band(0.0, 99.9));
    }

    #[test]
    fn test_center() {
        let pos = ItemPosition::new(1, 10.0, 20.0, 100.0, 50.0);
        assert_eq!(pos.center(), (60.0, 45.0));
        assert_eq!(pos.right(), 110.0);
        assert_eq!(pos.bottom(), 70.0);
    }
}
