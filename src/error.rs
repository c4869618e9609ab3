use thiserror::Error;

/// Errors produced by the layout engine.
///
/// None of these cross the worker boundary as panics; the worker reports them
/// as `LayoutResponse::Error` and the controller surfaces them as callbacks.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid layout config: {field} = {value}")]
    InvalidConfig { field: &'static str, value: f64 },

    #[error("invalid scroll request: scroll_top = {scroll_top}, viewport_height = {viewport_height}")]
    InvalidScroll { scroll_top: f64, viewport_height: f64 },

    #[error("unknown layout mode: {0:?}")]
    UnknownMode(String),

    #[error("layout pass panicked: {0}")]
    Panicked(String),

    #[error("failed to spawn layout worker")]
    Spawn(#[source] std::io::Error),

    #[error("layout worker disconnected")]
    Disconnected,
}

impl LayoutError {
    pub(crate) fn invalid_config(field: &'static str, value: f64) -> Self {
        Self::InvalidConfig { field, value }
    }
}
