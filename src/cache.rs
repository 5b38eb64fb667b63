//! # cache.rs - Pattern-keyed result cache
//!
//! Memoizes per-chunk result lists keyed by the pattern fingerprint, so a
//! growing query can restrict scoring to the previous result set instead
//! of rescanning every item (the extension rule), and an unchanged query
//! can reuse its results outright.
//!
//! Three rules bound the cache:
//! - **Skip**: chunks where the pattern selected fewer than
//!   [`QUERY_CACHE_MIN`] items are not stored; rescoring them is cheaper
//!   than the bookkeeping.
//! - **Size cap**: result sets over [`MERGER_CACHE_MAX`] items are never
//!   stored.
//! - **LRU bound**: at most a fixed number of fingerprints are retained.
//!
//! Entries record the sealed-chunk count of the snapshot they were built
//! from and are never applied to chunks that did not exist then; the
//! partial tail chunk is always rescored.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::item::CHUNK_SIZE;
use crate::result::MatchResult;

/// Minimum per-chunk match count worth caching (chunks below this are
/// cheap to redo).
pub const QUERY_CACHE_MIN: usize = CHUNK_SIZE / 5;

/// Result sets larger than this are never cached.
pub const MERGER_CACHE_MAX: usize = 100_000;

/// Default number of fingerprints retained.
const CACHE_CAPACITY: usize = 64;

/// Cached per-chunk results for one fingerprint. `None` marks a chunk
/// excluded by the skip rule (it must be rescanned in full).
#[derive(Clone)]
pub struct CacheEntry {
    /// Sealed chunks covered by `lists`; later chunks were not seen
    pub sealed_chunks: usize,
    /// Snapshot item count at store time
    pub item_count: usize,
    pub lists: Arc<Vec<Option<Arc<Vec<MatchResult>>>>>,
}

/// Bounded LRU map from pattern fingerprint to cached results. Owned and
/// mutated only by the coordinator thread; entries handed to matcher
/// workers are immutable `Arc` snapshots.
pub struct PatternCache {
    map: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for PatternCache {
    fn default() -> Self {
        PatternCache::with_capacity(CACHE_CAPACITY)
    }
}

impl PatternCache {
    pub fn new() -> Self {
        PatternCache::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        PatternCache {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Exact fingerprint hit.
    pub fn get_exact(&mut self, fingerprint: &str) -> Option<CacheEntry> {
        let entry = self.map.get(fingerprint).cloned()?;
        self.touch(fingerprint);
        Some(entry)
    }

    /// Extension lookup: the longest cached fingerprint contained in the
    /// new one. The caller guarantees the pattern kinds admit extension
    /// (see `Pattern::cacheable`).
    pub fn get_extension(&mut self, fingerprint: &str) -> Option<CacheEntry> {
        let best_key = self
            .map
            .keys()
            .filter(|key| !key.is_empty() && fingerprint.contains(key.as_str()))
            .max_by_key(|key| key.len())?
            .clone();
        let entry = self.map.get(&best_key).cloned();
        self.touch(&best_key);
        entry
    }

    /// Insert an entry, evicting the least recently used fingerprint when
    /// over capacity. The size-cap and skip rules are applied by the
    /// caller, which knows the match counts.
    pub fn store(&mut self, fingerprint: String, entry: CacheEntry) {
        if self.map.insert(fingerprint.clone(), entry).is_none() {
            self.order.push_back(fingerprint);
            while self.map.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                } else {
                    break;
                }
            }
        } else {
            self.touch(&fingerprint);
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn touch(&mut self, fingerprint: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == fingerprint) {
            let key = self.order.remove(pos).unwrap_or_else(|| fingerprint.to_string());
            self.order.push_back(key);
        }
    }
}
