//! Virtualized viewport layout engine for a media library browser.
//!
//! Computes, for large sets of mixed-aspect items, where each item goes and
//! which items intersect the viewport, without touching off-screen items.
//!
//! - `layout` - masonry (vertical and horizontal) and grid packing, the
//!   spatial index and the layout cache
//! - `worker` - the background thread that owns all layout state
//! - `controller` - the main-thread façade with scroll throttling and resize debouncing
//! - `navigation` - geometric keyboard navigation and shortcut dispatch
//! - `bench` - headless benchmark driver used by the binary

pub mod bench;
pub mod controller;
pub mod error;
pub mod layout;
pub mod models;
pub mod navigation;
pub mod worker;

pub use controller::{ViewportController, ViewportControllerBuilder};
pub use error::LayoutError;
pub use layout::{compute_layout, LayoutPass};
pub use models::{
    ItemId, ItemPosition, LayoutConfig, LayoutConfigPatch, LayoutItemInput, LayoutMode,
    LayoutTuning, MediaDimensions,
};
pub use navigation::KeyboardNavigator;
