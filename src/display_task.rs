//! Final hop of a load: paint on the UI context if the target still wants it.

use std::sync::{Arc, Weak};

use crate::bitmap::{Bitmap, CacheKey};
use crate::error::CancelReason;
use crate::load_task::TaskContext;
use crate::stats::EngineStats;
use crate::target::{DisplayTarget, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    Painted,
    Skipped(CancelReason),
}

/// Runs on the UI-affinity context only. The target is held weakly until
/// the paint.
pub struct DisplayTask {
    image: Arc<Bitmap>,
    cache_key: CacheKey,
    target: Weak<dyn DisplayTarget>,
    target_id: TargetId,
    ctx: Arc<TaskContext>,
}

impl DisplayTask {
    pub fn new(
        image: Arc<Bitmap>,
        cache_key: CacheKey,
        target: Weak<dyn DisplayTarget>,
        target_id: TargetId,
        ctx: Arc<TaskContext>,
    ) -> Self {
        Self {
            image,
            cache_key,
            target,
            target_id,
            ctx,
        }
    }

    /// Paint only if the target is alive and its current assignment is still
    /// this task's key; a painted target's assignment is cleared.
    pub fn run(self) -> DisplayOutcome {
        let id = self.target_id;
        let target = match self.target.upgrade() {
            Some(target) if !target.is_reclaimed() => target,
            _ => return self.skip(CancelReason::Reclaimed),
        };
        if !self.ctx.targets.is_current(id, &self.cache_key) {
            return self.skip(CancelReason::Reassigned);
        }

        target.paint(self.image);
        self.ctx.targets.clear(id);
        EngineStats::bump(&self.ctx.stats.painted);
        DisplayOutcome::Painted
    }

    fn skip(&self, reason: CancelReason) -> DisplayOutcome {
        if self.target.strong_count() == 0 {
            self.ctx.targets.release(self.target_id, &self.cache_key);
        }
        EngineStats::bump(&self.ctx.stats.display_skipped);
        tracing::debug!("Not painting {} on {}: {:?}", self.cache_key, self.target_id, reason);
        DisplayOutcome::Skipped(reason)
    }
}
