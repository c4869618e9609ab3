use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn};

use super::clock::{Clock, SystemClock};
use super::observable::Observable;
use crate::error::LayoutError;
use crate::models::{
    ItemId, ItemPosition, LayoutConfig, LayoutConfigPatch, LayoutItemInput, LayoutTuning,
};
use crate::worker::{LayoutRequest, LayoutResponse, RequestKind, WorkerHandle};

/// Receives the ids of every visible-set update, in render order.
///
/// The thumbnail service uses this to load what is on screen first; each
/// call replaces the previous priority set.
pub trait PrioritySink {
    fn set_priority(&self, ids: Vec<ItemId>);
}

impl<F> PrioritySink for F
where
    F: Fn(Vec<ItemId>),
{
    fn set_priority(&self, ids: Vec<ItemId>) {
        self(ids)
    }
}

/// Callback type for non-fatal layout errors
pub type ErrorCallback = Box<dyn Fn(&str)>;

/// Callback type for worker loss
pub type FatalCallback = Box<dyn Fn(&LayoutError)>;

/// Message counters, mostly for tests and the benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub messages_sent: u64,
    pub scroll_messages: u64,
    /// Scroll calls overwritten before their frame fired.
    pub scrolls_coalesced: u64,
    pub resizes_sent: u64,
    pub layouts_completed: u64,
    pub visible_updates: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScrollPosition {
    scroll_top: f64,
    viewport_height: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingResize {
    width: f64,
    deadline: Instant,
}

/// Width change the mirror took ahead of the worker's answer.
#[derive(Debug, Clone, Copy)]
struct ResizeAttempt {
    previous: f64,
    requested: f64,
}

#[derive(Debug)]
struct ControllerState {
    /// Mirror of the worker's config, for synchronous reads.
    config: LayoutConfig,
    last_scroll: ScrollPosition,
    pending_scroll: Option<ScrollPosition>,
    pending_resize: Option<PendingResize>,
    /// One entry per relayout request awaiting its response, in send order.
    in_flight_layouts: VecDeque<Option<ResizeAttempt>>,
    outstanding_scrolls: usize,
    disposed: bool,
    failed: bool,
    stats: ControllerStats,
}

/// Main-thread façade over one layout worker.
///
/// All methods take `&self`; the controller is meant to be shared through an
/// `Rc` between the scroll container, the renderer and keyboard navigation.
/// Responses are applied when the host calls `on_frame`, `pump_events` or
/// `wait_for_events`.
pub struct ViewportController {
    worker: RefCell<WorkerHandle>,
    state: RefCell<ControllerState>,
    tuning: LayoutTuning,
    clock: Rc<dyn Clock>,
    priority_sink: Option<Rc<dyn PrioritySink>>,
    visible_items: Observable<Vec<ItemPosition>>,
    total_height: Observable<f64>,
    is_calculating: Observable<bool>,
    on_error: RefCell<Option<ErrorCallback>>,
    on_fatal: RefCell<Option<FatalCallback>>,
}

impl ViewportController {
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ViewportControllerBuilder {
        ViewportControllerBuilder::new()
    }

    /// Replaces the item list. Marks the controller as calculating.
    pub fn set_items(&self, items: Vec<LayoutItemInput>) {
        trace!(item_count = items.len(), "Setting viewport items");
        self.post_relayout(LayoutRequest::SetItems(items));
    }

    /// Merges `patch` into the local config and forwards it.
    ///
    /// The local mirror only takes the merged config if it validates, matching
    /// what the worker will commit.
    pub fn set_config(&self, patch: LayoutConfigPatch) {
        if self.is_disposed() {
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            let merged = state.config.merged(&patch);
            if merged.validate().is_ok() {
                state.config = merged;
            }
        }
        self.post_relayout(LayoutRequest::Configure(patch));
    }

    /// Forces a relayout with the current items and config.
    pub fn invalidate(&self) {
        self.post_relayout(LayoutRequest::Invalidate);
    }

    /// Debounces a container width change.
    ///
    /// Widths within the resize threshold of the current width produce no
    /// message and cancel any pending resize.
    pub fn handle_resize(&self, width: f64) {
        if !width.is_finite() {
            warn!(width, "Ignoring non-finite container width");
            return;
        }
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return;
        }
        if (width - state.config.container_width).abs() <= self.tuning.resize_threshold {
            state.pending_resize = None;
            return;
        }
        state.pending_resize = Some(PendingResize {
            width,
            deadline: self.clock.now() + self.tuning.resize_debounce,
        });
    }

    /// Records a scroll position; the latest one is sent on the next frame.
    pub fn handle_scroll(&self, scroll_top: f64, viewport_height: f64) {
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return;
        }
        let position = ScrollPosition {
            scroll_top,
            viewport_height,
        };
        if state.pending_scroll.replace(position).is_some() {
            state.stats.scrolls_coalesced += 1;
        }
        state.last_scroll = position;
    }

    /// Animation-frame hook: fires a due resize, sends at most one scroll
    /// query and applies whatever responses have arrived.
    pub fn on_frame(&self) -> usize {
        self.fire_due_resize();

        let pending = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return 0;
            }
            state.pending_scroll.take()
        };
        if let Some(position) = pending {
            self.post_scroll(position);
        }

        self.pump_events()
    }

    /// Applies every response already received. Returns how many were applied.
    pub fn pump_events(&self) -> usize {
        let mut applied = 0;
        while !self.is_disposed() {
            let next = self.worker.borrow().try_recv();
            match next {
                Ok(Some(response)) => {
                    self.apply_response(response);
                    applied += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
        }
        applied
    }

    /// Blocks up to `timeout` for one response, then drains the rest.
    pub fn wait_for_events(&self, timeout: Duration) -> usize {
        if self.is_disposed() {
            return 0;
        }
        let first = self.worker.borrow().recv_timeout(timeout);
        match first {
            Ok(Some(response)) => {
                self.apply_response(response);
                1 + self.pump_events()
            }
            Ok(None) => 0,
            Err(err) => {
                self.fail(err);
                0
            }
        }
    }

    /// Runs frames until nothing is pending or in flight, or `timeout` passes.
    ///
    /// Returns true when the controller went idle.
    pub fn settle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.on_frame();
            if self.is_idle() || self.is_disposed() || self.is_failed() {
                return self.is_idle();
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_for_events((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Position of `id` if it is in the current visible set.
    ///
    /// Answered from local state; items outside the rendered window are
    /// unknown and resolve to `None`.
    pub async fn get_item_position(&self, id: ItemId) -> Option<ItemPosition> {
        self.visible_items
            .with(|items| items.iter().find(|pos| pos.id == id).copied())
    }

    /// Terminates the worker and drops all pending work. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.pending_scroll = None;
            state.pending_resize = None;
            state.in_flight_layouts.clear();
            state.outstanding_scrolls = 0;
        }
        self.worker.borrow_mut().terminate();
        self.is_calculating.set_if_changed(false);
        debug!("Viewport controller disposed");
    }

    pub fn visible_items(&self) -> &Observable<Vec<ItemPosition>> {
        &self.visible_items
    }

    pub fn total_height(&self) -> &Observable<f64> {
        &self.total_height
    }

    pub fn is_calculating(&self) -> &Observable<bool> {
        &self.is_calculating
    }

    pub fn config(&self) -> LayoutConfig {
        self.state.borrow().config
    }

    pub fn tuning(&self) -> &LayoutTuning {
        &self.tuning
    }

    /// Last scroll position handed to `handle_scroll`, as `(scroll_top, viewport_height)`.
    pub fn last_scroll(&self) -> (f64, f64) {
        let last = self.state.borrow().last_scroll;
        (last.scroll_top, last.viewport_height)
    }

    pub fn stats(&self) -> ControllerStats {
        self.state.borrow().stats
    }

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    /// True after the worker was lost. The controller does not restart it.
    pub fn is_failed(&self) -> bool {
        self.state.borrow().failed
    }

    /// Nothing pending locally and no request awaiting a response.
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.pending_scroll.is_none()
            && state.pending_resize.is_none()
            && state.in_flight_layouts.is_empty()
            && state.outstanding_scrolls == 0
    }

    pub fn has_pending_resize(&self) -> bool {
        self.state.borrow().pending_resize.is_some()
    }

    /// Connect callback for `ERROR` responses
    pub fn connect_error<F>(&self, callback: F)
    where
        F: Fn(&str) + 'static,
    {
        *self.on_error.borrow_mut() = Some(Box::new(callback));
    }

    /// Connect callback for worker loss
    pub fn connect_fatal<F>(&self, callback: F)
    where
        F: Fn(&LayoutError) + 'static,
    {
        *self.on_fatal.borrow_mut() = Some(Box::new(callback));
    }

    fn fire_due_resize(&self) {
        let (width, attempt) = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            match state.pending_resize {
                Some(resize) if self.clock.now() >= resize.deadline => {
                    state.pending_resize = None;
                    // The config may have moved while the timer was pending.
                    if (resize.width - state.config.container_width).abs()
                        <= self.tuning.resize_threshold
                    {
                        return;
                    }
                    let resized = LayoutConfig {
                        container_width: resize.width,
                        ..state.config
                    };
                    // An invalid width is still forwarded so the error surfaces.
                    let attempt = if resized.validate().is_ok() {
                        let attempt = ResizeAttempt {
                            previous: state.config.container_width,
                            requested: resize.width,
                        };
                        state.config = resized;
                        Some(attempt)
                    } else {
                        None
                    };
                    state.stats.resizes_sent += 1;
                    (resize.width, attempt)
                }
                _ => return,
            }
        };
        debug!(width, "Forwarding debounced resize");
        self.post_tracked_relayout(LayoutRequest::Resize { width }, attempt);
    }

    fn post_relayout(&self, request: LayoutRequest) {
        self.post_tracked_relayout(request, None);
    }

    fn post_tracked_relayout(&self, request: LayoutRequest, attempt: Option<ResizeAttempt>) {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed || state.failed {
                return;
            }
            state.in_flight_layouts.push_back(attempt);
        }
        self.is_calculating.set_if_changed(true);
        self.post(request);
    }

    fn post_scroll(&self, position: ScrollPosition) {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed || state.failed {
                return;
            }
            state.outstanding_scrolls += 1;
            state.stats.scroll_messages += 1;
        }
        self.post(LayoutRequest::Scroll {
            scroll_top: position.scroll_top,
            viewport_height: position.viewport_height,
        });
    }

    fn post(&self, request: LayoutRequest) {
        let sent = self.worker.borrow().send(request);
        match sent {
            Ok(()) => self.state.borrow_mut().stats.messages_sent += 1,
            Err(err) => self.fail(err),
        }
    }

    fn apply_response(&self, response: LayoutResponse) {
        if self.is_disposed() {
            return;
        }
        match response {
            LayoutResponse::LayoutComplete { total_height } => {
                let (calculating, rescroll) = {
                    let mut state = self.state.borrow_mut();
                    state.in_flight_layouts.pop_front();
                    state.stats.layouts_completed += 1;
                    // The re-query below supersedes anything still pending.
                    state.pending_scroll = None;
                    (!state.in_flight_layouts.is_empty(), state.last_scroll)
                };
                self.total_height.set_if_changed(total_height);
                self.is_calculating.set_if_changed(calculating);
                self.post_scroll(rescroll);
            }
            LayoutResponse::VisibleUpdate(positions) => {
                {
                    let mut state = self.state.borrow_mut();
                    state.outstanding_scrolls = state.outstanding_scrolls.saturating_sub(1);
                    state.stats.visible_updates += 1;
                }
                if let Some(sink) = &self.priority_sink {
                    sink.set_priority(positions.iter().map(|pos| pos.id).collect());
                }
                self.visible_items.set(positions);
            }
            LayoutResponse::Error { request, message } => {
                let calculating = {
                    let mut state = self.state.borrow_mut();
                    state.stats.errors += 1;
                    if request.triggers_relayout() {
                        // The worker kept its old width; follow it unless a
                        // later change already replaced the requested one.
                        if let Some(Some(attempt)) = state.in_flight_layouts.pop_front() {
                            if state.config.container_width == attempt.requested {
                                state.config.container_width = attempt.previous;
                            }
                        }
                    } else {
                        state.outstanding_scrolls = state.outstanding_scrolls.saturating_sub(1);
                    }
                    !state.in_flight_layouts.is_empty()
                };
                warn!(request = request.as_str(), %message, "Layout worker reported an error");
                self.is_calculating.set_if_changed(calculating);
                if let Some(ref callback) = *self.on_error.borrow() {
                    callback(&message);
                }
            }
        }
    }

    fn fail(&self, err: LayoutError) {
        {
            let mut state = self.state.borrow_mut();
            if state.failed || state.disposed {
                return;
            }
            state.failed = true;
            state.pending_scroll = None;
            state.pending_resize = None;
            state.in_flight_layouts.clear();
            state.outstanding_scrolls = 0;
        }
        error!(error = %err, "Layout worker lost");
        self.is_calculating.set_if_changed(false);
        if let Some(ref callback) = *self.on_fatal.borrow() {
            callback(&err);
        }
    }

    #[cfg(test)]
    fn with_worker(worker: WorkerHandle, config: LayoutConfig) -> Self {
        ViewportControllerBuilder::new()
            .config(config)
            .assemble(worker)
    }
}

impl Drop for ViewportController {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builder for ViewportController with configuration options.
pub struct ViewportControllerBuilder {
    config: LayoutConfig,
    tuning: LayoutTuning,
    clock: Rc<dyn Clock>,
    priority_sink: Option<Rc<dyn PrioritySink>>,
}

impl ViewportControllerBuilder {
    pub fn new() -> Self {
        Self {
            config: LayoutConfig::default(),
            tuning: LayoutTuning::default(),
            clock: Rc::new(SystemClock),
            priority_sink: None,
        }
    }

    pub fn config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tuning(mut self, tuning: LayoutTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn priority_sink(mut self, sink: Rc<dyn PrioritySink>) -> Self {
        self.priority_sink = Some(sink);
        self
    }

    /// Validates the initial config and spawns the worker.
    pub fn build(self) -> Result<ViewportController, LayoutError> {
        self.config.validate()?;
        let worker = WorkerHandle::spawn(self.config, self.tuning)?;
        Ok(self.assemble(worker))
    }

    fn assemble(self, worker: WorkerHandle) -> ViewportController {
        ViewportController {
            worker: RefCell::new(worker),
            state: RefCell::new(ControllerState {
                config: self.config,
                last_scroll: ScrollPosition {
                    scroll_top: 0.0,
                    viewport_height: 0.0,
                },
                pending_scroll: None,
                pending_resize: None,
                in_flight_layouts: VecDeque::new(),
                outstanding_scrolls: 0,
                disposed: false,
                failed: false,
                stats: ControllerStats::default(),
            }),
            tuning: self.tuning,
            clock: self.clock,
            priority_sink: self.priority_sink,
            visible_items: Observable::new(Vec::new()),
            total_height: Observable::new(0.0),
            is_calculating: Observable::new(false),
            on_error: RefCell::new(None),
            on_fatal: RefCell::new(None),
        }
    }
}

impl Default for ViewportControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::controller::ManualClock;
    use crate::models::LayoutMode;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config() -> LayoutConfig {
        LayoutConfig {
            mode: LayoutMode::Grid,
            container_width: 500.0,
            item_size: 100.0,
            gap: 10.0,
            buffer: 0.0,
        }
    }

    fn items(count: i64) -> Vec<LayoutItemInput> {
        (0..count).map(LayoutItemInput::square).collect()
    }

    fn manual_controller(clock: &ManualClock) -> ViewportController {
        ViewportController::builder()
            .config(config())
            .clock(Rc::new(clock.clone()))
            .build()
            .unwrap()
    }

    fn ids(controller: &ViewportController) -> Vec<ItemId> {
        controller
            .visible_items()
            .with(|items| items.iter().map(|p| p.id).collect())
    }

    #[test]
    fn test_layout_complete_requeries_visible_set() {
        let controller = ViewportController::new(config()).unwrap();
        controller.handle_scroll(0.0, 120.0);
        controller.set_items(items(10));
        assert!(controller.is_calculating().get());

        assert!(controller.settle(TIMEOUT));
        assert!(!controller.is_calculating().get());
        // 3 rows of 117.5 + 10.
        assert_eq!(controller.total_height().get(), 3.0 * 127.5);
        // Band [0, 120] touches the first row only.
        assert_eq!(ids(&controller), vec![0, 1, 2, 3]);
        assert_eq!(controller.stats().layouts_completed, 1);
    }

    #[test]
    fn test_relayout_refreshes_without_scrolling() {
        let controller = ViewportController::new(config()).unwrap();
        controller.handle_scroll(0.0, 100.0);
        controller.set_items(items(10));
        assert!(controller.settle(TIMEOUT));
        assert_eq!(ids(&controller).len(), 4);

        // Narrower container: two columns, same scroll position.
        controller.set_config(LayoutConfigPatch::new().container_width(210.0));
        assert!(controller.settle(TIMEOUT));
        assert_eq!(ids(&controller), vec![0, 1]);
    }

    #[test]
    fn test_scroll_throttled_to_one_per_frame() {
        let controller = ViewportController::new(config()).unwrap();
        controller.set_items(items(100));
        assert!(controller.settle(TIMEOUT));
        let sent_before = controller.stats().scroll_messages;

        for step in 0..10 {
            controller.handle_scroll(step as f64 * 50.0, 300.0);
        }
        controller.on_frame();
        let stats = controller.stats();
        assert_eq!(stats.scroll_messages, sent_before + 1);
        assert_eq!(stats.scrolls_coalesced, 9);

        assert!(controller.settle(TIMEOUT));
        let visible = controller.visible_items().get();
        assert!(visible.iter().all(|p| p.intersects_band(450.0, 750.0)));
        assert_eq!(controller.last_scroll(), (450.0, 300.0));
    }

    #[test]
    fn test_resize_below_threshold_sends_nothing() {
        let clock = ManualClock::new();
        let controller = manual_controller(&clock);
        let sent = controller.stats().messages_sent;

        controller.handle_resize(500.5);
        controller.handle_resize(499.0);
        clock.advance(Duration::from_millis(100));
        controller.on_frame();

        assert_eq!(controller.stats().messages_sent, sent);
        assert!(!controller.has_pending_resize());
    }

    #[test]
    fn test_resize_debounced() {
        let clock = ManualClock::new();
        let controller = manual_controller(&clock);
        controller.set_items(items(10));
        assert!(controller.settle(TIMEOUT));

        controller.handle_resize(700.0);
        clock.advance(Duration::from_millis(20));
        controller.handle_resize(900.0);
        clock.advance(Duration::from_millis(40));
        controller.on_frame();
        // Second call restarted the window; 40ms in, nothing fired yet.
        assert_eq!(controller.stats().resizes_sent, 0);
        assert_eq!(controller.config().container_width, 500.0);

        clock.advance(Duration::from_millis(10));
        controller.on_frame();
        assert_eq!(controller.stats().resizes_sent, 1);
        assert_eq!(controller.config().container_width, 900.0);
        assert!(controller.settle(TIMEOUT));
        // 900px fits 8 columns of 100 + 10.
        assert_eq!(controller.total_height().get(), 2.0 * (103.75 + 10.0));
    }

    #[test]
    fn test_resize_back_to_current_width_cancels() {
        let clock = ManualClock::new();
        let controller = manual_controller(&clock);

        controller.handle_resize(800.0);
        assert!(controller.has_pending_resize());
        controller.handle_resize(500.0);
        assert!(!controller.has_pending_resize());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = ViewportController::builder()
            .config(LayoutConfig {
                item_size: 0.0,
                ..config()
            })
            .build();
        assert!(matches!(
            result,
            Err(LayoutError::InvalidConfig {
                field: "item_size",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_resize_keeps_width_in_sync() {
        let clock = ManualClock::new();
        let controller = ViewportController::builder()
            .config(LayoutConfig {
                item_size: 1.0,
                gap: 0.0,
                ..config()
            })
            .clock(Rc::new(clock.clone()))
            .build()
            .unwrap();
        let errors = Rc::new(Cell::new(0));
        let errors_clone = Rc::clone(&errors);
        controller.connect_error(move |_| errors_clone.set(errors_clone.get() + 1));
        controller.set_items(items(4));
        assert!(controller.settle(TIMEOUT));

        // 5000 one-pixel columns is past the column limit.
        controller.handle_resize(5000.0);
        clock.advance(Duration::from_millis(60));
        controller.on_frame();
        assert_eq!(controller.stats().resizes_sent, 1);
        assert_eq!(controller.config().container_width, 500.0);
        assert!(controller.settle(TIMEOUT));
        assert_eq!(errors.get(), 1);

        controller.handle_resize(500.5);
        assert!(!controller.has_pending_resize());
        controller.on_frame();
        assert!(controller.is_idle());
        assert!(!controller.is_calculating().get());
    }

    #[test]
    fn test_rejected_resize_restores_width() {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();
        let clock = ManualClock::new();
        let controller = ViewportControllerBuilder::new()
            .config(config())
            .clock(Rc::new(clock.clone()))
            .assemble(WorkerHandle::from_channels(request_tx, event_rx));

        controller.handle_resize(800.0);
        clock.advance(Duration::from_millis(60));
        controller.on_frame();
        assert_eq!(controller.config().container_width, 800.0);
        assert!(matches!(
            request_rx.try_recv(),
            Ok(LayoutRequest::Resize { width }) if width == 800.0
        ));
        assert!(controller.is_calculating().get());

        event_tx
            .send(LayoutResponse::Error {
                request: RequestKind::Resize,
                message: "layout pass panicked".to_string(),
            })
            .unwrap();
        controller.pump_events();

        assert_eq!(controller.config().container_width, 500.0);
        assert!(!controller.is_calculating().get());
        assert!(controller.is_idle());
        controller.handle_resize(500.5);
        assert!(!controller.has_pending_resize());
    }

    #[test]
    fn test_error_is_not_fatal() {
        let controller = ViewportController::new(config()).unwrap();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_clone = Rc::clone(&errors);
        controller.connect_error(move |message| errors_clone.borrow_mut().push(message.to_string()));

        controller.set_items(items(4));
        assert!(controller.settle(TIMEOUT));
        controller.set_config(LayoutConfigPatch::new().gap(-5.0));
        assert!(controller.settle(TIMEOUT));

        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("gap"));
        assert_eq!(controller.config().gap, 10.0);
        assert!(!controller.is_failed());
        assert!(!controller.is_calculating().get());
        assert_eq!(ids(&controller).len(), 4);
    }

    #[test]
    fn test_priority_sink_receives_visible_ids() {
        let received = Rc::new(RefCell::new(Vec::new()));
        let received_clone = Rc::clone(&received);
        let sink: Rc<dyn PrioritySink> = Rc::new(move |ids: Vec<ItemId>| {
            *received_clone.borrow_mut() = ids;
        });
        let controller = ViewportController::builder()
            .config(config())
            .priority_sink(sink)
            .build()
            .unwrap();

        controller.handle_scroll(0.0, 120.0);
        controller.set_items(items(10));
        assert!(controller.settle(TIMEOUT));
        assert_eq!(*received.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_dispose_is_idempotent_and_final() {
        let controller = ViewportController::new(config()).unwrap();
        let notified = Rc::new(Cell::new(0));
        let notified_clone = Rc::clone(&notified);
        controller
            .visible_items()
            .subscribe(move |_| notified_clone.set(notified_clone.get() + 1));

        controller.set_items(items(10));
        controller.handle_scroll(0.0, 500.0);
        controller.dispose();
        controller.dispose();

        let sent = controller.stats().messages_sent;
        controller.set_items(items(3));
        controller.handle_scroll(10.0, 500.0);
        controller.handle_resize(900.0);
        assert_eq!(controller.on_frame(), 0);
        assert_eq!(controller.wait_for_events(Duration::from_millis(20)), 0);

        assert!(controller.is_disposed());
        assert_eq!(controller.stats().messages_sent, sent);
        assert_eq!(notified.get(), 0);
        assert!(!controller.is_calculating().get());
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded::<LayoutResponse>();
        let controller =
            ViewportController::with_worker(WorkerHandle::from_channels(request_tx, event_rx), config());

        let fatal = Rc::new(Cell::new(false));
        let fatal_clone = Rc::clone(&fatal);
        controller.connect_fatal(move |err| {
            assert!(matches!(err, LayoutError::Disconnected));
            fatal_clone.set(true);
        });

        controller.set_items(items(5));
        assert!(controller.is_calculating().get());
        drop(event_tx);
        drop(request_rx);
        controller.pump_events();

        assert!(fatal.get());
        assert!(controller.is_failed());
        assert!(!controller.is_calculating().get());
    }

    #[tokio::test]
    async fn test_get_item_position() {
        let controller = ViewportController::new(config()).unwrap();
        controller.handle_scroll(0.0, 120.0);
        controller.set_items(items(10));
        assert!(controller.settle(TIMEOUT));

        let pos = controller.get_item_position(3).await.unwrap();
        assert_eq!((pos.x, pos.y), (382.5, 0.0));
        // Item 7 is laid out but outside the visible band.
        assert!(controller.get_item_position(7).await.is_none());
    }
}
