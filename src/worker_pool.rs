//! Fixed-size worker pool with a FIFO or LIFO task queue.
//!
//! Workers block on the queue until a job arrives or the pool is shut down.
//! `shutdown_now` discards queued jobs and tells idle workers to exit; a
//! worker that is in the middle of a job finishes it first (jobs cancel
//! themselves cooperatively).

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::config::QueueProcessingType;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

/// Blocking job queue shared by the workers of one pool.
struct TaskQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    discipline: QueueProcessingType,
}

impl TaskQueue {
    fn new(discipline: QueueProcessingType) -> Self {
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            discipline,
        }
    }

    /// Returns the job back if the queue has been shut down.
    fn push(&self, job: Job) -> Result<(), Job> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(job);
        }
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Next job, or `None` once the queue is shut down.
    fn pop(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            let job = match self.discipline {
                QueueProcessingType::Fifo => state.jobs.pop_front(),
                QueueProcessingType::Lifo => state.jobs.pop_back(),
            };
            if job.is_some() {
                return job;
            }
            self.available.wait(&mut state);
        }
    }

    fn shutdown_now(&self) -> Vec<Job> {
        let mut state = self.state.lock();
        state.shutdown = true;
        let drained = state.jobs.drain(..).collect();
        drop(state);
        self.available.notify_all();
        drained
    }

    fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

static POOL_NUMBER: AtomicUsize = AtomicUsize::new(1);

pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` named worker threads (`<prefix><pool>-thread-<n>`).
    pub fn new(size: usize, discipline: QueueProcessingType, name_prefix: &str) -> Self {
        let queue = Arc::new(TaskQueue::new(discipline));
        let pool_number = POOL_NUMBER.fetch_add(1, Ordering::Relaxed);

        let mut workers = Vec::with_capacity(size);
        for n in 1..=size.max(1) {
            let queue = Arc::clone(&queue);
            let spawned = std::thread::Builder::new()
                .name(format!("{name_prefix}{pool_number}-thread-{n}"))
                .spawn(move || {
                    while let Some(job) = queue.pop() {
                        // A panicking job must not take the worker down with it.
                        if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::warn!("Loader job panicked; worker continues");
                        }
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::warn!("Failed to spawn loader worker {}: {}", n, e),
            }
        }

        tracing::info!(
            "Worker pool {} started: {} threads, {} order",
            pool_number,
            workers.len(),
            discipline.as_str()
        );

        Self { queue, workers }
    }

    /// Queue a job. Returns it back if the pool has been shut down (or has
    /// no threads to run it).
    pub fn execute(&self, job: Job) -> Result<(), Job> {
        if self.workers.is_empty() {
            return Err(job);
        }
        self.queue.push(job)
    }

    /// Stop accepting jobs, drop queued ones and release idle workers.
    /// Returns how many queued jobs were discarded. Does not wait for
    /// running jobs.
    pub fn shutdown_now(&self) -> usize {
        let discarded = self.queue.shutdown_now();
        discarded.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue.is_shutdown()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    fn size(&self) -> usize {
        self.workers.len()
    }

    /// Shut down and wait for every worker to exit.
    #[cfg(test)]
    fn join(mut self) {
        self.queue.shutdown_now();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Detach: workers exit on their own once the queue reports shutdown.
        self.queue.shutdown_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Runs one blocking job, queues three more behind it, then releases the
    /// blocker and reports the order the queued jobs ran in.
    fn run_order(discipline: QueueProcessingType) -> Vec<u32> {
        let pool = WorkerPool::new(1, discipline, "test-pool-");
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (order_tx, order_rx) = mpsc::channel();

        pool.execute(Box::new(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        }))
        .ok()
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        for i in 1..=3 {
            let order_tx = order_tx.clone();
            pool.execute(Box::new(move || order_tx.send(i).unwrap())).ok().unwrap();
        }
        release_tx.send(()).unwrap();

        let order = (0..3)
            .map(|_| order_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        pool.join();
        order
    }

    #[test]
    fn fifo_runs_oldest_first() {
        assert_eq!(run_order(QueueProcessingType::Fifo), vec![1, 2, 3]);
    }

    #[test]
    fn lifo_runs_newest_first() {
        assert_eq!(run_order(QueueProcessingType::Lifo), vec![3, 2, 1]);
    }

    #[test]
    fn shutdown_discards_queued_and_rejects_new_jobs() {
        let pool = WorkerPool::new(1, QueueProcessingType::Fifo, "test-pool-");
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        pool.execute(Box::new(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        }))
        .ok()
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        for _ in 0..4 {
            pool.execute(Box::new(|| panic!("discarded job must not run"))).ok().unwrap();
        }
        assert_eq!(pool.queued(), 4);
        assert_eq!(pool.shutdown_now(), 4);
        assert!(pool.is_shutdown());
        assert!(pool.execute(Box::new(|| {})).is_err());

        release_tx.send(()).unwrap();
        pool.join();
    }

    #[test]
    fn worker_survives_a_panicking_job() {
        let pool = WorkerPool::new(1, QueueProcessingType::Fifo, "test-pool-");
        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(|| panic!("decoder blew up"))).ok().unwrap();
        pool.execute(Box::new(move || tx.send(42).unwrap())).ok().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.join();
    }

    #[test]
    fn threads_are_named_after_the_prefix() {
        let pool = WorkerPool::new(2, QueueProcessingType::Fifo, "thumbs-");
        assert_eq!(pool.size(), 2);
        let (tx, rx) = mpsc::channel();
        pool.execute(Box::new(move || {
            tx.send(std::thread::current().name().map(str::to_string)).unwrap();
        }))
        .ok()
        .unwrap();
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("thumbs-"));
        assert!(name.contains("-thread-"));
        pool.join();
    }
}
