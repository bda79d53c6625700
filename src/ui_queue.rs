//! UI-affinity execution context.
//!
//! Everything that mutates a display target runs through a [`UiExecutor`]:
//! a single-threaded, ordered context. Toolkits with their own main-loop
//! dispatch implement the trait directly; [`UiQueue`] is a channel-backed
//! implementation whose owner pumps it once per frame.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Schedules work for later, ordered, single-threaded execution.
pub trait UiExecutor: Send + Sync {
    fn post(&self, job: UiJob);
}

/// Channel-backed UI context. `post` may be called from any thread; the
/// `run_*` methods must only be called from the UI thread.
pub struct UiQueue {
    tx: Sender<UiJob>,
    rx: Receiver<UiJob>,
}

impl UiQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Run every job that is already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Run at most `max` queued jobs, to bound the work done in one frame.
    pub fn run_pending_max(&self, max: usize) -> usize {
        let mut ran = 0;
        while ran < max {
            match self.rx.try_recv() {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Pump jobs until `done` returns true or `timeout` elapses. Returns
    /// whether `done` was satisfied.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(Duration::from_millis(10));
            match self.rx.recv_timeout(slice) {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UiExecutor for UiQueue {
    fn post(&self, job: UiJob) {
        // The queue owns both ends, so the send cannot fail while `self` lives.
        let _ = self.tx.send(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn jobs_run_in_post_order_on_the_pumping_thread() {
        let queue = Arc::new(UiQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let poster = {
            let queue = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            std::thread::spawn(move || {
                for i in 0..5 {
                    let seen = Arc::clone(&seen);
                    queue.post(Box::new(move || {
                        seen.lock().unwrap().push((i, std::thread::current().id()))
                    }));
                }
            })
        };
        poster.join().unwrap();

        assert_eq!(queue.pending(), 5);
        assert_eq!(queue.run_pending(), 5);
        let seen = seen.lock().unwrap();
        let order: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, id)| *id == std::thread::current().id()));
    }

    #[test]
    fn run_pending_max_bounds_a_frame() {
        let queue = UiQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let count = Arc::clone(&count);
            queue.post(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(queue.run_pending_max(4), 4);
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(queue.pending(), 6);
    }

    #[test]
    fn run_until_gives_up_after_timeout() {
        let queue = UiQueue::new();
        assert!(!queue.run_until(Duration::from_millis(30), || false));
        assert!(queue.run_until(Duration::from_millis(30), || true));
    }
}
