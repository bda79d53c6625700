//! Pause/resume gate and the stop epoch.
//!
//! Pausing only holds back tasks that have not started yet: a task consults
//! the gate once, before it takes its key lock. `stop()` bumps the epoch,
//! which interrupts every task created under an older epoch, including ones
//! blocked here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub struct PauseGate {
    paused: AtomicBool,
    epoch: AtomicU64,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Clear the flag and wake every waiting task.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Current stop epoch; tasks capture it when they are created.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Whether a task created under `epoch` has been interrupted since.
    pub fn is_interrupted(&self, epoch: u64) -> bool {
        self.epoch() != epoch
    }

    /// Interrupt every task created so far and wake the ones waiting here.
    /// The pause flag itself is left as is.
    pub fn interrupt_all(&self) -> u64 {
        let next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let _guard = self.lock.lock();
        self.condvar.notify_all();
        next
    }

    /// Block while paused. Returns `false` if the task was interrupted
    /// before or while waiting.
    pub fn wait_if_paused(&self, epoch: u64) -> bool {
        if !self.is_paused() {
            return !self.is_interrupted(epoch);
        }

        let mut guard = self.lock.lock();
        while self.is_paused() {
            if self.is_interrupted(epoch) {
                return false;
            }
            self.condvar.wait(&mut guard);
        }
        !self.is_interrupted(epoch)
    }
}
