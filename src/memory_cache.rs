//! Byte-bounded LRU cache of decoded bitmaps.
//!
//! Capacity is measured in bytes of pixel payload. Recency is updated on
//! both `get` and `put`; overflow evicts least-recently-used entries until
//! the cache fits again, including the entry just inserted if it alone is
//! larger than the whole capacity.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::bitmap::{Bitmap, CacheKey};

/// Result of a `put`. Evictions are a capacity policy outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PutOutcome {
    /// Entries evicted to make room (the new entry included, if it did not fit).
    pub evicted: usize,
    /// Whether the inserted entry is resident after the put.
    pub retained: bool,
}

struct CacheState {
    entries: LruCache<CacheKey, Arc<Bitmap>>,
    bytes_used: usize,
}

pub struct MemoryCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` bytes of pixels.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                bytes_used: 0,
            }),
            capacity,
        }
    }

    /// Look up `key`, marking it most recently used. Recycled bitmaps are
    /// dropped and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Bitmap>> {
        let mut state = self.state.lock();
        let bitmap = state.entries.get(key).cloned()?;
        if bitmap.is_recycled() {
            state.entries.pop(key);
            state.bytes_used = state.bytes_used.saturating_sub(bitmap.byte_size());
            return None;
        }
        Some(bitmap)
    }

    /// Insert or replace `key`, then evict until the cache fits.
    pub fn put(&self, key: CacheKey, bitmap: Arc<Bitmap>) -> PutOutcome {
        let cost = bitmap.byte_size();
        let mut state = self.state.lock();

        if let Some(previous) = state.entries.pop(&key) {
            state.bytes_used = state.bytes_used.saturating_sub(previous.byte_size());
        }
        state.entries.put(key.clone(), bitmap);
        state.bytes_used += cost;

        let mut outcome = PutOutcome {
            evicted: 0,
            retained: true,
        };
        while state.bytes_used > self.capacity {
            let Some((evicted_key, evicted)) = state.entries.pop_lru() else {
                break;
            };
            state.bytes_used = state.bytes_used.saturating_sub(evicted.byte_size());
            outcome.evicted += 1;
            if evicted_key == key {
                outcome.retained = false;
            }
        }

        if outcome.evicted > 0 {
            tracing::debug!(
                "Cache evicted {} entries for {} ({} / {} bytes)",
                outcome.evicted,
                key,
                state.bytes_used,
                self.capacity
            );
        }
        outcome
    }

    /// Whether `key` is resident, without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.bytes_used = 0;
    }

    pub fn bytes_used(&self) -> usize {
        self.state.lock().bytes_used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}
