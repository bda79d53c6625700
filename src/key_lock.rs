//! Per-cache-key locks used to coalesce concurrent decodes of the same key.
//!
//! The registry only keeps weak references: a lock lives as long as some
//! task holds it, and a later task for the same key gets a fresh lock (by
//! then the earlier decode is already in the cache).

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::bitmap::CacheKey;

/// How long a waiter blocks before re-checking for interruption.
const ACQUIRE_SLICE: Duration = Duration::from_millis(25);

/// Dead entries are pruned once the map grows past this many entries.
const PRUNE_THRESHOLD: usize = 64;

/// Serialises the decode-or-cache-check section for one key.
#[derive(Default)]
pub struct KeyLock {
    inner: Mutex<()>,
}

impl KeyLock {
    /// Block until the lock is held, or return `None` as soon as
    /// `interrupted` reports true.
    pub fn acquire(&self, interrupted: impl Fn() -> bool) -> Option<MutexGuard<'_, ()>> {
        loop {
            if interrupted() {
                return None;
            }
            if let Some(guard) = self.inner.try_lock_for(ACQUIRE_SLICE) {
                return Some(guard);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

#[derive(Default)]
pub struct KeyLockRegistry {
    locks: Mutex<HashMap<CacheKey, Weak<KeyLock>>>,
}

impl KeyLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `key`. Every caller that obtains it while another holder
    /// is alive gets the same lock.
    pub fn lock_for(&self, key: &CacheKey) -> Arc<KeyLock> {
        let mut locks = self.locks.lock();

        if let Some(lock) = locks.get(key).and_then(Weak::upgrade) {
            return lock;
        }

        if locks.len() >= PRUNE_THRESHOLD {
            locks.retain(|_, lock| lock.strong_count() > 0);
        }

        let lock = Arc::new(KeyLock::default());
        locks.insert(key.clone(), Arc::downgrade(&lock));
        lock
    }

    /// Drop every entry. Holders keep their locks; new callers get new ones.
    pub fn clear(&self) {
        self.locks.lock().clear();
    }

    /// Number of entries, including ones whose lock is already gone.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }

    /// Number of entries whose lock is still held by some task.
    #[cfg(test)]
    fn live_len(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| lock.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_key_shares_a_lock_while_alive() {
        let registry = KeyLockRegistry::new();
        let a = registry.lock_for(&CacheKey::from("k"));
        let b = registry.lock_for(&CacheKey::from("k"));
        let other = registry.lock_for(&CacheKey::from("other"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn entries_are_weak() {
        let registry = KeyLockRegistry::new();
        let lock = registry.lock_for(&CacheKey::from("k"));
        assert_eq!(registry.live_len(), 1);
        drop(lock);
        assert_eq!(registry.live_len(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dead_entries_are_pruned_as_the_map_grows() {
        let registry = KeyLockRegistry::new();
        for i in 0..(PRUNE_THRESHOLD * 3) {
            let _lock = registry.lock_for(&CacheKey::from(format!("key-{i}")));
        }
        assert!(registry.len() <= PRUNE_THRESHOLD + 1);
    }

    #[test]
    fn holders_are_serialised() {
        let registry = Arc::new(KeyLockRegistry::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let lock = registry.lock_for(&CacheKey::from("shared"));
                    let _guard = lock.acquire(|| false).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiting_is_abandoned_on_interrupt() {
        let lock = Arc::new(KeyLock::default());
        let _held = lock.inner.lock();
        let stop = Arc::new(AtomicBool::new(false));

        let waiter = {
            let lock = Arc::clone(&lock);
            let stop = Arc::clone(&stop);
            thread::spawn(move || lock.acquire(|| stop.load(Ordering::SeqCst)).is_none())
        };
        thread::sleep(Duration::from_millis(40));
        stop.store(true, Ordering::SeqCst);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn clear_empties_registry_without_breaking_holders() {
        let registry = KeyLockRegistry::new();
        let lock = registry.lock_for(&CacheKey::from("k"));
        let guard = lock.acquire(|| false);
        registry.clear();

        assert!(registry.is_empty());
        assert!(guard.is_some());
        assert!(lock.is_locked());
    }
}
