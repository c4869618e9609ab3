use crate::models::{ItemPosition, LayoutConfigPatch, LayoutItemInput};

/// Messages sent to the layout worker.
///
/// Everything is moved across the channel; the worker never shares memory
/// with its sender.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutRequest {
    /// Replace the item list and relayout.
    SetItems(Vec<LayoutItemInput>),
    /// Merge into the current config and relayout.
    Configure(LayoutConfigPatch),
    /// Change the container width; ignored below the resize threshold.
    Resize { width: f64 },
    /// Query the visible set. Never relayouts.
    Scroll { scroll_top: f64, viewport_height: f64 },
    /// Relayout with the current state.
    Invalidate,
}

impl LayoutRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::SetItems(_) => RequestKind::SetItems,
            Self::Configure(_) => RequestKind::Configure,
            Self::Resize { .. } => RequestKind::Resize,
            Self::Scroll { .. } => RequestKind::Scroll,
            Self::Invalidate => RequestKind::Invalidate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    SetItems,
    Configure,
    Resize,
    Scroll,
    Invalidate,
}

impl RequestKind {
    /// True for requests answered by `LayoutComplete` (or an error).
    pub fn triggers_relayout(self) -> bool {
        !matches!(self, Self::Scroll)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetItems => "SET_ITEMS",
            Self::Configure => "CONFIGURE",
            Self::Resize => "RESIZE",
            Self::Scroll => "SCROLL",
            Self::Invalidate => "INVALIDATE",
        }
    }
}

/// Messages sent back by the layout worker.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutResponse {
    /// A relayout finished. Positions are not pushed; the controller follows
    /// up with a `Scroll` query.
    LayoutComplete { total_height: f64 },
    /// Visible positions for the last `Scroll` query, sorted by `(y, x)`.
    VisibleUpdate(Vec<ItemPosition>),
    /// The request failed; worker state is unchanged.
    Error { request: RequestKind, message: String },
}
