//! The loader engine.
//!
//! `display()` is called on the UI-affinity context. It records the target's
//! new assignment, answers synchronously from the memory cache when it can,
//! and otherwise hands a [`LoadTask`] to the dispatcher thread. The
//! dispatcher never blocks the caller: it (re)creates the worker pool on
//! demand and queues the task there.
//!
//! Engines are shared as `Arc<Engine>`; dropping the last handle shuts the
//! engine down.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::bitmap::CacheKey;
use crate::config::EngineConfig;
use crate::decode::DecoderSet;
use crate::display_task::{DisplayOutcome, DisplayTask};
use crate::load_task::{LoadRequest, LoadTask, TaskContext};
use crate::memory_cache::MemoryCache;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::target::{DisplayTarget, TargetId};
use crate::ui_queue::UiExecutor;
use crate::worker_pool::WorkerPool;

const DISPATCH_POLL: Duration = Duration::from_millis(100);

/// What `display()` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// Served from the memory cache and painted before returning.
    Delivered,
    /// Handed to the worker pool; the target was cleared to its placeholder.
    Submitted,
    /// Engine shut down, or the target was reclaimed.
    Rejected,
}

pub struct Engine {
    config: EngineConfig,
    ctx: Arc<TaskContext>,
    /// `None` once shut down
    submit_tx: RwLock<Option<Sender<LoadTask>>>,
    /// Dispatcher's receiving end, kept so `stop()` can drain undispatched tasks
    submit_rx: Receiver<LoadTask>,
    /// Current worker pool; `None` until first use and after `stop()`
    pool: Arc<Mutex<Option<WorkerPool>>>,
    shut_down: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Start an engine with its dispatcher thread. Worker threads are only
    /// spawned when the first task arrives.
    pub fn new(config: EngineConfig, decoders: DecoderSet, ui: Arc<dyn UiExecutor>) -> io::Result<Arc<Self>> {
        let ctx = Arc::new(TaskContext::new(config.cache_capacity(), decoders, ui));
        let (submit_tx, submit_rx) = crossbeam_channel::unbounded::<LoadTask>();
        let pool = Arc::new(Mutex::new(None));
        let shut_down = Arc::new(AtomicBool::new(false));

        let dispatcher = {
            let pool = Arc::clone(&pool);
            let shut_down = Arc::clone(&shut_down);
            let ctx = Arc::clone(&ctx);
            let config = config.clone();
            let submit_rx = submit_rx.clone();
            std::thread::Builder::new()
                .name(format!("{}dispatcher", config.thread_name_prefix))
                .spawn(move || Self::dispatcher_loop(submit_rx, pool, shut_down, ctx, config))?
        };

        tracing::info!(
            "Image loader started: cache {} KiB, {} workers, {} order",
            config.cache_capacity() / 1024,
            config.thread_pool_size,
            config.queue_processing.as_str()
        );

        Ok(Arc::new(Self {
            config,
            ctx,
            submit_tx: RwLock::new(Some(submit_tx)),
            submit_rx,
            pool,
            shut_down,
            dispatcher: Mutex::new(Some(dispatcher)),
        }))
    }

    /// Engine with the built-in picture and album-art decoders.
    pub fn from_config(config: EngineConfig, ui: Arc<dyn UiExecutor>) -> io::Result<Arc<Self>> {
        let decoders = DecoderSet::with_defaults(config.downscale_filter);
        Self::new(config, decoders, ui)
    }

    fn dispatcher_loop(
        submit_rx: Receiver<LoadTask>,
        pool: Arc<Mutex<Option<WorkerPool>>>,
        shut_down: Arc<AtomicBool>,
        ctx: Arc<TaskContext>,
        config: EngineConfig,
    ) {
        loop {
            if shut_down.load(Ordering::Acquire) {
                break;
            }

            let task = match submit_rx.recv_timeout(DISPATCH_POLL) {
                Ok(task) => task,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // Checked under the pool lock: `stop()` bumps the epoch before it
            // takes the pool, so a task from before the stop never revives it.
            let mut guard = pool.lock();
            if ctx.gate.is_interrupted(task.epoch()) {
                EngineStats::bump(&ctx.stats.discarded);
                tracing::trace!("Dropping {} queued before stop", task.cache_key());
                continue;
            }
            let workers = guard.get_or_insert_with(|| {
                WorkerPool::new(
                    config.thread_pool_size,
                    config.queue_processing,
                    &config.thread_name_prefix,
                )
            });
            if workers
                .execute(Box::new(move || {
                    let _ = task.run();
                }))
                .is_err()
            {
                EngineStats::bump(&ctx.stats.discarded);
                tracing::warn!("Worker pool rejected a load task");
            }
        }

        let leftover = submit_rx.try_iter().count();
        if leftover > 0 {
            EngineStats::add(&ctx.stats.discarded, leftover as u64);
        }
        tracing::debug!("Dispatcher exited, {} undispatched tasks dropped", leftover);
    }

    /// Show `request.uri` in `request.target`, replacing whatever the target
    /// was assigned before. Must be called on the UI-affinity context.
    pub fn display(&self, request: LoadRequest) -> DisplayStatus {
        if self.is_shut_down() {
            tracing::warn!("display({}) after shutdown ignored", request.uri);
            return DisplayStatus::Rejected;
        }

        let target_id = request.target.id();
        self.ctx.targets.assign(target_id, request.cache_key.clone());

        if let Some(bitmap) = self.ctx.cache.get(&request.cache_key) {
            EngineStats::bump(&self.ctx.stats.immediate_hits);
            tracing::debug!("{} served from memory cache for {}", request.cache_key, target_id);
            let display = DisplayTask::new(
                bitmap,
                request.cache_key,
                Arc::downgrade(&request.target),
                target_id,
                Arc::clone(&self.ctx),
            );
            return match display.run() {
                DisplayOutcome::Painted => DisplayStatus::Delivered,
                DisplayOutcome::Skipped(_) => {
                    self.ctx.targets.clear(target_id);
                    DisplayStatus::Rejected
                }
            };
        }

        request.target.clear(request.placeholder.clone());

        let task = LoadTask::new(request, Arc::clone(&self.ctx));
        let sent = match self.submit_tx.read().as_ref() {
            Some(tx) => tx.send(task).is_ok(),
            None => false,
        };
        if sent {
            EngineStats::bump(&self.ctx.stats.submitted);
            DisplayStatus::Submitted
        } else {
            self.ctx.targets.clear(target_id);
            tracing::warn!("Load task for {} rejected: dispatcher stopped", target_id);
            DisplayStatus::Rejected
        }
    }

    /// Shorthand for a picture request keyed by its URI.
    pub fn display_uri(&self, uri: impl Into<String>, target: Arc<dyn DisplayTarget>) -> DisplayStatus {
        self.display(LoadRequest::new(uri, target))
    }

    /// Forget the target's assignment; its in-flight task cancels itself at
    /// the next checkpoint.
    pub fn cancel(&self, target: &dyn DisplayTarget) {
        self.cancel_id(target.id());
    }

    pub fn cancel_id(&self, target: TargetId) {
        if let Some(key) = self.ctx.targets.clear(target) {
            tracing::debug!("Cancelled {} for {}", key, target);
        }
    }

    /// Hold back tasks that have not started yet.
    pub fn pause(&self) {
        self.ctx.gate.pause();
        tracing::debug!("Loading paused");
    }

    pub fn resume(&self) {
        self.ctx.gate.resume();
        tracing::debug!("Loading resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.gate.is_paused()
    }

    /// Interrupt every pending and running task, discard both queues and
    /// forget all assignments and key locks. The memory cache is kept and
    /// the next `display()` starts a fresh pool.
    pub fn stop(&self) {
        let epoch = self.ctx.gate.interrupt_all();
        let undispatched = self.submit_rx.try_iter().count();
        let discarded = undispatched
            + match self.pool.lock().take() {
                Some(pool) => pool.shutdown_now(),
                None => 0,
            };
        EngineStats::add(&self.ctx.stats.discarded, discarded as u64);
        self.ctx.targets.clear_all();
        self.ctx.key_locks.clear();
        tracing::info!("Image loader stopped (epoch {}), {} queued tasks discarded", epoch, discarded);
    }

    /// Stop for good: end the dispatcher, stop the pool and empty the
    /// memory cache. Idempotent; also run when the last handle is dropped.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.submit_tx.write().take();
        if let Some(handle) = self.dispatcher.lock().take() {
            let _ = handle.join();
        }
        self.stop();
        self.ctx.cache.invalidate_all();
        tracing::info!("Image loader shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.ctx.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// What `target` is currently waiting for, if anything.
    pub fn current_key(&self, target: TargetId) -> Option<CacheKey> {
        self.ctx.targets.current_key(target)
    }

    pub fn target_count(&self) -> usize {
        self.ctx.targets.len()
    }

    pub fn key_lock_count(&self) -> usize {
        self.ctx.key_locks.len()
    }

    /// Tasks waiting in the worker pool's queue.
    pub fn queued(&self) -> usize {
        self.pool.lock().as_ref().map_or(0, WorkerPool::queued)
    }

    /// Whether a worker pool currently exists.
    pub fn has_pool(&self) -> bool {
        self.pool.lock().is_some()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
