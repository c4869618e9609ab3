use std::num::NonZeroUsize;

use lru::LruCache;
use xxhash_rust::xxh3::xxh3_64;

use super::LayoutPass;
use crate::models::{LayoutConfig, LayoutItemInput, LayoutMode, DEFAULT_CACHE_CAPACITY};

/// Key for the layout cache, combining the item list hash with the
/// layout-relevant config fields.
///
/// Floats are keyed by their exact bits: a hit must reproduce the very pass
/// the algorithm would compute. `buffer` only affects visibility queries and
/// is not part of the key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct CacheKey {
    list_hash: u64,
    mode: LayoutMode,
    container_width: u64,
    item_size: u64,
    gap: u64,
}

impl CacheKey {
    pub fn new(list_hash: u64, config: &LayoutConfig) -> Self {
        Self {
            list_hash,
            mode: config.mode,
            container_width: config.container_width.to_bits(),
            item_size: config.item_size.to_bits(),
            gap: config.gap.to_bits(),
        }
    }
}

/// Recently computed layout passes.
///
/// Owned exclusively by the layout worker, so no locking is involved.
pub struct LayoutCache {
    entries: LruCache<CacheKey, LayoutPass>,
    hits: u64,
    misses: u64,
}

impl LayoutCache {
    /// Creates an empty cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Computes a fast hash of the item list.
    /// The hash covers (id + effective aspect ratio) for each item in order,
    /// so any change to the set, the order or an item's shape changes it.
    pub fn compute_list_hash(items: &[LayoutItemInput]) -> u64 {
        let mut hasher_input = Vec::with_capacity(items.len() * 16);

        for item in items {
            hasher_input.extend_from_slice(&item.id.to_le_bytes());
            hasher_input.extend_from_slice(&item.effective_aspect_ratio().to_bits().to_le_bytes());
        }

        xxh3_64(&hasher_input)
    }

    /// Returns a copy of the cached pass and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<LayoutPass> {
        match self.entries.get(key) {
            Some(pass) => {
                self.hits += 1;
                Some(pass.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores a pass, evicting the least recently used entry at capacity.
    pub fn insert(&mut self, key: CacheKey, pass: LayoutPass) {
        self.entries.put(key, pass);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}
