//! Main-thread side of the viewport.
//!
//! - `ViewportController` - posts requests to the layout worker, throttles
//!   scroll to one query per frame and debounces resize
//! - `Observable` - reactive state (`visible_items`, `total_height`,
//!   `is_calculating`) for the render layer
//! - `Clock` - time source for the resize debounce

pub mod clock;
pub mod observable;
pub mod viewport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use observable::{Observable, SubscriptionId};
pub use viewport::{
    ControllerStats, ErrorCallback, FatalCallback, PrioritySink, ViewportController,
    ViewportControllerBuilder,
};
