//! Dedicated layout thread.
//!
//! - One OS thread per viewport, owning a `LayoutWorker` exclusively
//! - Requests and responses travel over unbounded flume channels, in order
//! - Termination is immediate: the thread stops before its next message

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use super::protocol::{LayoutRequest, LayoutResponse};
use super::state::LayoutWorker;
use crate::error::LayoutError;
use crate::models::{LayoutConfig, LayoutTuning};

/// Main-thread end of a running layout worker.
pub struct WorkerHandle {
    /// Sender for requests; `None` once terminated.
    request_tx: Option<Sender<LayoutRequest>>,
    /// Responses from the worker, in request order.
    event_rx: Receiver<LayoutResponse>,
    /// Flag checked by the worker before each message.
    shutdown: Arc<AtomicBool>,
    /// Worker thread handle. Never joined: termination does not wait.
    worker: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawns a worker thread with an initial config.
    pub fn spawn(config: LayoutConfig, tuning: LayoutTuning) -> Result<Self, LayoutError> {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker_shutdown = Arc::clone(&shutdown);
        let worker = thread::Builder::new()
            .name("layout-worker".to_string())
            .spawn(move || {
                let state = LayoutWorker::new(config, tuning);
                worker_loop(state, request_rx, event_tx, worker_shutdown);
            })
            .map_err(LayoutError::Spawn)?;

        debug!(mode = %config.mode, "Started layout worker");

        Ok(Self {
            request_tx: Some(request_tx),
            event_rx,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Wraps existing channel ends without a thread behind them.
    #[cfg(test)]
    pub(crate) fn from_channels(
        request_tx: Sender<LayoutRequest>,
        event_rx: Receiver<LayoutResponse>,
    ) -> Self {
        Self {
            request_tx: Some(request_tx),
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Posts a request. Fails once the worker is gone.
    pub fn send(&self, request: LayoutRequest) -> Result<(), LayoutError> {
        let tx = self.request_tx.as_ref().ok_or(LayoutError::Disconnected)?;
        trace!(request = request.kind().as_str(), "Posting layout request");
        tx.send(request).map_err(|_| LayoutError::Disconnected)
    }

    /// Next response if one is ready.
    ///
    /// `Err(Disconnected)` means the worker exited without being terminated.
    pub fn try_recv(&self) -> Result<Option<LayoutResponse>, LayoutError> {
        match self.event_rx.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LayoutError::Disconnected),
        }
    }

    /// Blocks up to `timeout` for the next response.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<LayoutResponse>, LayoutError> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(response) => Ok(Some(response)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(LayoutError::Disconnected),
        }
    }

    /// Stops the worker without draining queued requests. Idempotent.
    pub fn terminate(&mut self) {
        if self.is_terminated() {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        // Closing the channel wakes a worker blocked in recv.
        self.request_tx = None;
        debug!("Layout worker terminated");
    }

    pub fn is_terminated(&self) -> bool {
        self.request_tx.is_none()
    }

    /// True once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Worker thread loop.
fn worker_loop(
    mut state: LayoutWorker,
    rx: Receiver<LayoutRequest>,
    tx: Sender<LayoutResponse>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Layout worker started");

    while let Ok(request) = rx.recv() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let Some(response) = state.handle(request) else {
            continue;
        };

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if let Err(e) = tx.send(response) {
            warn!(error = ?e, "Failed to send layout response");
            break;
        }
    }

    debug!(passes = state.passes(), "Layout worker stopped");
}
