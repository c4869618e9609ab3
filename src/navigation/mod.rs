//! Keyboard navigation over the virtual item set.
//!
//! - `geometry` - directional nearest-neighbour search and scroll math
//! - `shortcuts` - key chords, navigation actions and the dispatch registry
//! - `keyboard` - `KeyboardNavigator`, focus/selection state driving the controller

pub mod geometry;
pub mod keyboard;
pub mod shortcuts;

pub use geometry::Direction;
pub use keyboard::{KeyboardNavigator, ScrollContainer};
pub use shortcuts::{default_bindings, Key, KeyChord, Modifiers, NavAction, ShortcutRegistry};
