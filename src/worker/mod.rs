//! Background layout worker.
//!
//! - `protocol` - request/response messages crossing the thread boundary
//! - `state` - `LayoutWorker`, the single-threaded owner of all layout state
//! - `thread` - `WorkerHandle`, spawning and talking to the worker thread

pub mod protocol;
pub mod state;
pub mod thread;

pub use protocol::{LayoutRequest, LayoutResponse, RequestKind};
pub use state::LayoutWorker;
pub use thread::WorkerHandle;
