use crate::models::{ItemId, ItemPosition};

/// Navigation direction for focus movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Closest item from `current` in `direction`, among `candidates`.
///
/// A candidate qualifies if its center lies strictly beyond `current`'s
/// center (by more than `epsilon`) along the direction's axis. The winner has
/// the lowest `2 * primary + secondary` distance, so movement stays within a
/// row or column instead of jumping diagonally. Ties go to the earliest
/// candidate.
pub fn nearest_in_direction(
    current: &ItemPosition,
    candidates: &[ItemPosition],
    direction: Direction,
    epsilon: f64,
) -> Option<ItemId> {
    let (cx, cy) = current.center();
    let mut best: Option<(f64, ItemId)> = None;

    for candidate in candidates {
        if candidate.id == current.id {
            continue;
        }
        let (x, y) = candidate.center();
        let (dx, dy) = (x - cx, y - cy);

        let (ahead, primary, secondary) = match direction {
            Direction::Up => (dy < -epsilon, -dy, dx.abs()),
            Direction::Down => (dy > epsilon, dy, dx.abs()),
            Direction::Left => (dx < -epsilon, -dx, dy.abs()),
            Direction::Right => (dx > epsilon, dx, dy.abs()),
        };
        if !ahead {
            continue;
        }

        let score = primary * 2.0 + secondary;
        if best.map_or(true, |(best_score, _)| score < best_score) {
            best = Some((score, candidate.id));
        }
    }

    best.map(|(_, id)| id)
}

/// Index adjacent to `index` in item order: up/left step back, down/right
/// step forward. `None` at either end.
pub fn linear_neighbor(len: usize, index: usize, direction: Direction) -> Option<usize> {
    match direction {
        Direction::Up | Direction::Left => index.checked_sub(1),
        Direction::Down | Direction::Right => {
            let next = index + 1;
            (next < len).then_some(next)
        }
    }
}

/// Smallest scroll that brings `pos` fully into the viewport, keeping
/// `margin` pixels between it and the edge it was beyond.
///
/// `None` when the item is already fully visible.
pub fn scroll_into_view(
    pos: &ItemPosition,
    scroll_top: f64,
    viewport_height: f64,
    margin: f64,
) -> Option<f64> {
    if pos.y < scroll_top {
        Some((pos.y - margin).max(0.0))
    } else if pos.bottom() > scroll_top + viewport_height {
        Some((pos.bottom() - viewport_height + margin).max(0.0))
    } else {
        None
    }
}

/// Approximate scroll offset of the item at `index` when its position is not
/// known: average item height times index.
pub fn estimate_offset(index: usize, count: usize, total_height: f64) -> f64 {
    if count == 0 || !total_height.is_finite() || total_height <= 0.0 {
        return 0.0;
    }
    total_height / count as f64 * index as f64
}
