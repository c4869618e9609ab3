use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::protocol::{LayoutRequest, LayoutResponse, RequestKind};
use crate::error::LayoutError;
use crate::layout::layout_cache::CacheKey;
use crate::layout::{compute_layout, LayoutCache, LayoutSnapshot};
use crate::models::{LayoutConfig, LayoutItemInput, LayoutTuning};

/// Owner of all layout state: items, config, the current snapshot (positions
/// plus spatial grid) and the pass cache.
///
/// Every relayout builds a complete new snapshot before anything is
/// committed, so a failing request leaves the previous state intact.
pub struct LayoutWorker {
    items: Vec<LayoutItemInput>,
    list_hash: u64,
    config: LayoutConfig,
    tuning: LayoutTuning,
    snapshot: LayoutSnapshot,
    cache: LayoutCache,
    passes: u64,
}

impl LayoutWorker {
    pub fn new(config: LayoutConfig, tuning: LayoutTuning) -> Self {
        Self {
            items: Vec::new(),
            list_hash: LayoutCache::compute_list_hash(&[]),
            config,
            tuning,
            snapshot: LayoutSnapshot::empty(tuning.cell_height),
            cache: LayoutCache::with_capacity(tuning.cache_capacity),
            passes: 0,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn items(&self) -> &[LayoutItemInput] {
        &self.items
    }

    pub fn snapshot(&self) -> &LayoutSnapshot {
        &self.snapshot
    }

    pub fn cache(&self) -> &LayoutCache {
        &self.cache
    }

    /// Number of committed relayouts.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Handles one request. Returns `None` when the request needs no answer
    /// (a resize below the threshold).
    ///
    /// Errors and panics are converted into `LayoutResponse::Error`.
    pub fn handle(&mut self, request: LayoutRequest) -> Option<LayoutResponse> {
        let kind = request.kind();
        self.guarded(kind, move |worker| worker.apply(request))
    }

    pub(crate) fn guarded<F>(&mut self, kind: RequestKind, op: F) -> Option<LayoutResponse>
    where
        F: FnOnce(&mut Self) -> Result<Option<LayoutResponse>, LayoutError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(self)));
        let err = match outcome {
            Ok(Ok(response)) => return response,
            Ok(Err(err)) => err,
            Err(payload) => LayoutError::Panicked(panic_message(payload.as_ref())),
        };

        warn!(request = kind.as_str(), error = %err, "Layout request failed");
        Some(LayoutResponse::Error {
            request: kind,
            message: err.to_string(),
        })
    }

    fn apply(&mut self, request: LayoutRequest) -> Result<Option<LayoutResponse>, LayoutError> {
        match request {
            LayoutRequest::SetItems(items) => {
                let list_hash = LayoutCache::compute_list_hash(&items);
                let config = self.config;
                let snapshot = self.relayout(&items, list_hash, &config)?;
                self.items = items;
                self.list_hash = list_hash;
                Ok(Some(self.commit(snapshot)))
            }
            LayoutRequest::Configure(patch) => {
                let config = self.config.merged(&patch);
                let snapshot = self.relayout_current(&config)?;
                self.config = config;
                Ok(Some(self.commit(snapshot)))
            }
            LayoutRequest::Resize { width } => {
                if !width.is_finite() {
                    return Err(LayoutError::invalid_config("container_width", width));
                }
                if (width - self.config.container_width).abs() <= self.tuning.resize_threshold {
                    trace!(width, "Resize below threshold, skipping relayout");
                    return Ok(None);
                }
                let config = LayoutConfig {
                    container_width: width,
                    ..self.config
                };
                let snapshot = self.relayout_current(&config)?;
                self.config = config;
                Ok(Some(self.commit(snapshot)))
            }
            LayoutRequest::Scroll {
                scroll_top,
                viewport_height,
            } => {
                if !scroll_top.is_finite() || !viewport_height.is_finite() || viewport_height < 0.0
                {
                    return Err(LayoutError::InvalidScroll {
                        scroll_top,
                        viewport_height,
                    });
                }
                let start = scroll_top - self.config.buffer;
                let end = scroll_top + viewport_height + self.config.buffer;
                let visible = self.snapshot.query(start, end);
                trace!(scroll_top, visible = visible.len(), "Visibility query");
                Ok(Some(LayoutResponse::VisibleUpdate(visible)))
            }
            LayoutRequest::Invalidate => {
                let config = self.config;
                let snapshot = self.relayout_current(&config)?;
                Ok(Some(self.commit(snapshot)))
            }
        }
    }

    fn relayout_current(&mut self, config: &LayoutConfig) -> Result<LayoutSnapshot, LayoutError> {
        let items = std::mem::take(&mut self.items);
        let result = self.relayout(&items, self.list_hash, config);
        self.items = items;
        result
    }

    fn relayout(
        &mut self,
        items: &[LayoutItemInput],
        list_hash: u64,
        config: &LayoutConfig,
    ) -> Result<LayoutSnapshot, LayoutError> {
        config.validate()?;
        let started = Instant::now();
        let key = CacheKey::new(list_hash, config);

        let pass = match self.cache.get(&key) {
            Some(pass) => pass,
            None => {
                let pass = compute_layout(items, config, &self.tuning)?;
                if !pass.is_empty() {
                    self.cache.insert(key, pass.clone());
                }
                pass
            }
        };

        let snapshot = LayoutSnapshot::build(pass, self.tuning.cell_height);
        debug!(
            mode = %config.mode,
            item_count = items.len(),
            total_height = snapshot.total_height(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Layout pass computed"
        );
        Ok(snapshot)
    }

    fn commit(&mut self, snapshot: LayoutSnapshot) -> LayoutResponse {
        let total_height = snapshot.total_height();
        self.snapshot = snapshot;
        self.passes += 1;
        LayoutResponse::LayoutComplete { total_height }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemPosition, LayoutConfigPatch, LayoutMode};

    fn items(count: usize) -> Vec<LayoutItemInput> {
        (0..count)
            .map(|i| LayoutItemInput::new(i as i64, [1.0, 2.0, 0.5, 1.0][i % 4]))
            .collect()
    }

    fn worker(width: f64) -> LayoutWorker {
        let config = LayoutConfig {
            container_width: width,
            item_size: 280.0,
            gap: 16.0,
            buffer: 0.0,
            ..LayoutConfig::default()
        };
        LayoutWorker::new(config, LayoutTuning::default())
    }

    fn total_height(response: Option<LayoutResponse>) -> f64 {
        match response {
            Some(LayoutResponse::LayoutComplete { total_height }) => total_height,
            other => panic!("expected LayoutComplete, got {:?}", other),
        }
    }

    fn visible(response: Option<LayoutResponse>) -> Vec<ItemPosition> {
        match response {
            Some(LayoutResponse::VisibleUpdate(positions)) => positions,
            other => panic!("expected VisibleUpdate, got {:?}", other),
        }
    }

    fn scroll(top: f64, height: f64) -> LayoutRequest {
        LayoutRequest::Scroll {
            scroll_top: top,
            viewport_height: height,
        }
    }

    #[test]
    fn test_set_items_then_scroll() {
        let mut worker = worker(600.0);
        assert_eq!(total_height(worker.handle(LayoutRequest::SetItems(items(4)))), 762.0);

        let positions = visible(worker.handle(scroll(0.0, 1000.0)));
        let ids: Vec<i64> = positions.iter().map(|p| p.id).collect();
        // Sorted by (y, x): both tops at y=0, then 162, then 308.
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_items_zero_height() {
        let mut worker = worker(600.0);
        assert_eq!(total_height(worker.handle(LayoutRequest::SetItems(Vec::new()))), 0.0);
        assert!(visible(worker.handle(scroll(0.0, 800.0))).is_empty());
    }

    #[test]
    fn test_scroll_band_uses_buffer() {
        let mut worker = worker(600.0);
        worker.handle(LayoutRequest::SetItems(items(40)));

        let far = worker.snapshot().total_height() - 100.0;
        let without_buffer = visible(worker.handle(scroll(far, 50.0)));
        worker.handle(LayoutRequest::Configure(LayoutConfigPatch::new().buffer(2000.0)));
        let with_buffer = visible(worker.handle(scroll(far, 50.0)));
        assert!(with_buffer.len() > without_buffer.len());
    }

    #[test]
    fn test_scroll_outside_items_is_empty() {
        let mut worker = worker(600.0);
        worker.handle(LayoutRequest::SetItems(items(8)));
        let below = worker.snapshot().total_height() + 10.0;
        assert!(visible(worker.handle(scroll(below, 500.0))).is_empty());
    }

    #[test]
    fn test_configure_twice_is_idempotent() {
        let mut worker = worker(1000.0);
        worker.handle(LayoutRequest::SetItems(items(50)));

        let patch = LayoutConfigPatch::new()
            .mode(LayoutMode::MasonryHorizontal)
            .item_size(180.0);
        let first_height = total_height(worker.handle(LayoutRequest::Configure(patch)));
        let first = worker.snapshot().positions().to_vec();
        let second_height = total_height(worker.handle(LayoutRequest::Configure(patch)));
        let second = worker.snapshot().positions().to_vec();

        assert_eq!(first_height, second_height);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resize_threshold() {
        let mut worker = worker(1000.0);
        worker.handle(LayoutRequest::SetItems(items(10)));
        let passes = worker.passes();

        assert!(worker.handle(LayoutRequest::Resize { width: 1000.8 }).is_none());
        assert!(worker.handle(LayoutRequest::Resize { width: 999.0 }).is_none());
        assert_eq!(worker.passes(), passes);
        assert_eq!(worker.config().container_width, 1000.0);

        total_height(worker.handle(LayoutRequest::Resize { width: 1200.0 }));
        assert_eq!(worker.config().container_width, 1200.0);
        assert_eq!(worker.passes(), passes + 1);
    }

    #[test]
    fn test_invalidate_relayouts_same_state() {
        let mut worker = worker(900.0);
        let before = total_height(worker.handle(LayoutRequest::SetItems(items(12))));
        let positions = worker.snapshot().positions().to_vec();
        let after = total_height(worker.handle(LayoutRequest::Invalidate));
        assert_eq!(before, after);
        assert_eq!(positions, worker.snapshot().positions());
        assert_eq!(worker.passes(), 2);
    }

    #[test]
    fn test_invalid_config_keeps_state() {
        let mut worker = worker(600.0);
        worker.handle(LayoutRequest::SetItems(items(4)));
        let before = worker.snapshot().positions().to_vec();

        let response = worker.handle(LayoutRequest::Configure(LayoutConfigPatch::new().item_size(0.0)));
        assert!(matches!(
            response,
            Some(LayoutResponse::Error {
                request: RequestKind::Configure,
                ..
            })
        ));
        assert_eq!(worker.config().item_size, 280.0);
        assert_eq!(worker.snapshot().positions(), before.as_slice());
    }

    #[test]
    fn test_tiny_item_size_is_error() {
        let config = LayoutConfig {
            container_width: 1000.0,
            item_size: 1e-13,
            gap: 0.0,
            ..LayoutConfig::default()
        };
        let mut worker = LayoutWorker::new(config, LayoutTuning::default());

        let response = worker.handle(LayoutRequest::SetItems(vec![LayoutItemInput::new(0, 1.0)]));
        assert!(matches!(
            response,
            Some(LayoutResponse::Error {
                request: RequestKind::SetItems,
                ..
            })
        ));
        assert!(worker.items().is_empty());
        assert_eq!(worker.passes(), 0);
    }

    #[test]
    fn test_malformed_scroll_is_error() {
        let mut worker = worker(600.0);
        worker.handle(LayoutRequest::SetItems(items(4)));
        for request in [scroll(f64::NAN, 100.0), scroll(0.0, -1.0)] {
            assert!(matches!(
                worker.handle(request),
                Some(LayoutResponse::Error {
                    request: RequestKind::Scroll,
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let mut worker = worker(600.0);
        worker.handle(LayoutRequest::SetItems(items(4)));
        let before = worker.snapshot().positions().to_vec();

        let response = worker.guarded(RequestKind::Invalidate, |_| panic!("boom"));
        match response {
            Some(LayoutResponse::Error { request, message }) => {
                assert_eq!(request, RequestKind::Invalidate);
                assert!(message.contains("boom"));
            }
            other => panic!("expected error, got {:?}", other),
        }

        // Still fully functional afterwards.
        assert_eq!(worker.snapshot().positions(), before.as_slice());
        assert_eq!(visible(worker.handle(scroll(0.0, 1000.0))).len(), 4);
    }

    #[test]
    fn test_mode_toggle_hits_cache() {
        let mut worker = worker(1000.0);
        worker.handle(LayoutRequest::SetItems(items(30)));
        let masonry = worker.snapshot().positions().to_vec();

        worker.handle(LayoutRequest::Configure(LayoutConfigPatch::new().mode(LayoutMode::Grid)));
        let hits = worker.cache().hits();
        worker.handle(LayoutRequest::Configure(
            LayoutConfigPatch::new().mode(LayoutMode::MasonryVertical),
        ));

        assert_eq!(worker.cache().hits(), hits + 1);
        assert_eq!(worker.snapshot().positions(), masonry.as_slice());
    }
}
