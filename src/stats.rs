//! Counters for monitoring the engine.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EngineStats {
    pub(crate) submitted: AtomicU64,
    pub(crate) immediate_hits: AtomicU64,
    pub(crate) decodes: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) painted: AtomicU64,
    pub(crate) display_skipped: AtomicU64,
    pub(crate) cancelled: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) discarded: AtomicU64,
}

impl EngineStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            submitted: load(&self.submitted),
            immediate_hits: load(&self.immediate_hits),
            decodes: load(&self.decodes),
            coalesced: load(&self.coalesced),
            delivered: load(&self.delivered),
            painted: load(&self.painted),
            display_skipped: load(&self.display_skipped),
            cancelled: load(&self.cancelled),
            failed: load(&self.failed),
            discarded: load(&self.discarded),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Load tasks handed to the dispatcher
    pub submitted: u64,
    /// `display()` calls answered synchronously from the cache
    pub immediate_hits: u64,
    /// Decoder invocations
    pub decodes: u64,
    /// Tasks that found their key cached once they held the key lock
    pub coalesced: u64,
    /// Display tasks posted to the UI context
    pub delivered: u64,
    /// Display tasks that painted
    pub painted: u64,
    /// Display tasks that found their target reclaimed or reassigned
    pub display_skipped: u64,
    /// Load tasks that ended stale or interrupted
    pub cancelled: u64,
    /// Load tasks whose decode failed
    pub failed: u64,
    /// Queued tasks dropped by `stop()`
    pub discarded: u64,
}

impl StatsSnapshot {
    /// Load tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.delivered + self.cancelled + self.failed + self.discarded
    }
}
