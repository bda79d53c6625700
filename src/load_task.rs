//! Load task: decode-or-fetch for one request, then hand off to the UI.
//!
//! A task walks through
//! `Created → WaitingForResume? → LockAcquired → CacheCheck → Decoding? →
//! Transforming? → Delivering` and ends delivered, cancelled or failed.
//! Staleness (target reclaimed or reassigned) and interruption (engine
//! stopped) are checked after waking from pause, right after taking the key
//! lock, right after decoding and right before writing the cache. A task
//! that trips a check releases its lock and leaves the cache untouched.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use crate::bitmap::{Bitmap, CacheKey};
use crate::decode::{DecoderKind, DecoderSet};
use crate::display_task::DisplayTask;
use crate::error::{CancelReason, DecodeError, TaskError};
use crate::key_lock::KeyLockRegistry;
use crate::memory_cache::MemoryCache;
use crate::pause::PauseGate;
use crate::shape::ShapeTransform;
use crate::stats::EngineStats;
use crate::target::{DisplayTarget, TargetId};
use crate::target_registry::TargetRegistry;
use crate::ui_queue::UiExecutor;

/// One display request. Immutable once handed to the engine.
#[derive(Clone)]
pub struct LoadRequest {
    pub uri: String,
    pub cache_key: CacheKey,
    pub target: Arc<dyn DisplayTarget>,
    /// Decode at `1/scale_factor` of the target size (0 is treated as 1)
    pub scale_factor: u32,
    pub kind: DecoderKind,
    pub shape: Option<ShapeTransform>,
    /// Shown while the real image loads
    pub placeholder: Option<Arc<Bitmap>>,
}

impl LoadRequest {
    /// A picture request whose cache key is the URI itself.
    pub fn new(uri: impl Into<String>, target: Arc<dyn DisplayTarget>) -> Self {
        let uri = uri.into();
        Self {
            cache_key: CacheKey::new(&uri),
            uri,
            target,
            scale_factor: 1,
            kind: DecoderKind::Picture,
            shape: None,
            placeholder: None,
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.cache_key = key.into();
        self
    }

    pub fn with_kind(mut self, kind: DecoderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_shape(mut self, shape: ShapeTransform) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_placeholder(mut self, placeholder: Arc<Bitmap>) -> Self {
        self.placeholder = Some(placeholder);
        self
    }
}

/// Decode box for the target's current geometry.
fn decode_box(target: &dyn DisplayTarget, scale_factor: u32) -> (u32, u32) {
    let scale = scale_factor.max(1);
    (target.width() / scale, target.height() / scale)
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("uri", &self.uri)
            .field("cache_key", &self.cache_key)
            .field("target", &self.target.id())
            .field("scale_factor", &self.scale_factor)
            .field("kind", &self.kind)
            .field("shape", &self.shape)
            .finish()
    }
}

/// State shared by every task of one engine.
pub struct TaskContext {
    pub cache: MemoryCache,
    pub targets: TargetRegistry,
    pub key_locks: KeyLockRegistry,
    pub gate: PauseGate,
    pub decoders: DecoderSet,
    pub ui: Arc<dyn UiExecutor>,
    pub stats: EngineStats,
}

impl TaskContext {
    pub fn new(cache_capacity: usize, decoders: DecoderSet, ui: Arc<dyn UiExecutor>) -> Self {
        Self {
            cache: MemoryCache::new(cache_capacity),
            targets: TargetRegistry::new(),
            key_locks: KeyLockRegistry::new(),
            gate: PauseGate::new(),
            decoders,
            ui,
            stats: EngineStats::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadState {
    Created,
    WaitingForResume,
    LockAcquired,
    CacheCheck,
    Decoding,
    Transforming,
    Delivering,
}

/// How a delivered task got its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// This task ran the decoder.
    Decoded,
    /// Another task for the same key had already cached it.
    Cached,
}

/// Queued and running tasks only hold the target weakly; a target the UI
/// has dropped counts as reclaimed.
pub struct LoadTask {
    uri: String,
    cache_key: CacheKey,
    target: Weak<dyn DisplayTarget>,
    target_id: TargetId,
    scale_factor: u32,
    kind: DecoderKind,
    shape: Option<ShapeTransform>,
    ctx: Arc<TaskContext>,
    /// Stop epoch at creation; a different current epoch means interrupted
    epoch: u64,
    state: LoadState,
}

impl LoadTask {
    pub fn new(request: LoadRequest, ctx: Arc<TaskContext>) -> Self {
        let epoch = ctx.gate.epoch();
        Self {
            target: Arc::downgrade(&request.target),
            target_id: request.target.id(),
            uri: request.uri,
            cache_key: request.cache_key,
            scale_factor: request.scale_factor,
            kind: request.kind,
            shape: request.shape,
            ctx,
            epoch,
            state: LoadState::Created,
        }
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    /// Stop epoch captured when the task was created.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Run to a terminal state. Outcomes are counted and logged here; the
    /// result is only for callers that want to inspect it.
    pub fn run(mut self) -> Result<Delivery, TaskError> {
        let outcome = self.load();
        let stats = &self.ctx.stats;
        match &outcome {
            Ok(Delivery::Decoded) => {}
            Ok(Delivery::Cached) => {
                EngineStats::bump(&stats.coalesced);
                tracing::debug!("{} served from cache after waiting on its key lock", self.cache_key);
            }
            Err(TaskError::Cancelled(reason)) => {
                EngineStats::bump(&stats.cancelled);
                if self.target.strong_count() == 0 {
                    self.ctx.targets.release(self.target_id, &self.cache_key);
                }
                tracing::debug!(
                    "Load of {} for {} cancelled in {:?}: {:?}",
                    self.cache_key,
                    self.target_id,
                    self.state,
                    reason
                );
            }
            Err(TaskError::Failed(e)) => {
                EngineStats::bump(&stats.failed);
                tracing::warn!("Failed to load {}: {}", self.uri, e);
            }
        }
        outcome
    }

    fn load(&mut self) -> Result<Delivery, TaskError> {
        let ctx = Arc::clone(&self.ctx);
        let epoch = self.epoch;

        if ctx.gate.is_paused() {
            self.transition(LoadState::WaitingForResume);
        }
        if !ctx.gate.wait_if_paused(epoch) {
            return Err(TaskError::Cancelled(CancelReason::Interrupted));
        }
        self.check_not_stale()?;

        let key = self.cache_key.clone();
        let key_lock = ctx.key_locks.lock_for(&key);
        let guard = key_lock
            .acquire(|| ctx.gate.is_interrupted(epoch))
            .ok_or(TaskError::Cancelled(CancelReason::Interrupted))?;
        self.transition(LoadState::LockAcquired);
        self.check_not_stale()?;

        self.transition(LoadState::CacheCheck);
        let (bitmap, delivery) = match ctx.cache.get(&key) {
            Some(bitmap) => (bitmap, Delivery::Cached),
            None => {
                self.transition(LoadState::Decoding);
                let decoded = self.decode()?;
                self.check_not_stale()?;

                let bitmap = Arc::new(self.apply_shape(decoded));
                self.check_not_stale()?;
                ctx.cache.put(key.clone(), Arc::clone(&bitmap));
                (bitmap, Delivery::Decoded)
            }
        };
        drop(guard);

        self.transition(LoadState::Delivering);
        let display = DisplayTask::new(bitmap, key, self.target.clone(), self.target_id, Arc::clone(&ctx));
        ctx.ui.post(Box::new(move || {
            display.run();
        }));
        EngineStats::bump(&ctx.stats.delivered);
        Ok(delivery)
    }

    fn decode(&self) -> Result<Bitmap, TaskError> {
        let (max_width, max_height) = match self.target.upgrade() {
            Some(target) => decode_box(target.as_ref(), self.scale_factor),
            None => return Err(TaskError::Cancelled(CancelReason::Reclaimed)),
        };
        let decoder = self.ctx.decoders.get(self.kind)?;
        EngineStats::bump(&self.ctx.stats.decodes);

        let uri = self.uri.as_str();
        match std::panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(uri, max_width, max_height))) {
            Ok(result) => result.map_err(TaskError::Failed),
            Err(_) => Err(TaskError::Failed(DecodeError::Malformed(format!("{uri}: decoder panicked")))),
        }
    }

    /// Transform failures fall back to the untransformed image.
    fn apply_shape(&mut self, decoded: Bitmap) -> Bitmap {
        let Some(shape) = self.shape else {
            return decoded;
        };
        self.transition(LoadState::Transforming);
        match shape.apply(&decoded) {
            Ok(shaped) => shaped,
            Err(e) => {
                tracing::debug!("{:?} failed for {}: {}; using unshaped image", shape, self.uri, e);
                decoded
            }
        }
    }

    fn check_not_stale(&self) -> Result<(), TaskError> {
        match self.stale_reason() {
            Some(reason) => Err(TaskError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    fn stale_reason(&self) -> Option<CancelReason> {
        if self.ctx.gate.is_interrupted(self.epoch) {
            Some(CancelReason::Interrupted)
        } else if self.target_gone() {
            Some(CancelReason::Reclaimed)
        } else if !self.ctx.targets.is_current(self.target_id, &self.cache_key) {
            Some(CancelReason::Reassigned)
        } else {
            None
        }
    }

    fn target_gone(&self) -> bool {
        match self.target.upgrade() {
            Some(target) => target.is_reclaimed(),
            None => true,
        }
    }

    fn transition(&mut self, next: LoadState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        tracing::trace!("{}: {:?} -> {:?}", self.cache_key, self.state, next);
        self.state = next;
    }
}
