//! Target registry: which cache key each display target currently wants.
//!
//! This is the only staleness oracle. A task whose key no longer matches the
//! registry entry of its target must not touch the UI.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::bitmap::CacheKey;
use crate::target::TargetId;

#[derive(Default)]
pub struct TargetRegistry {
    assignments: RwLock<HashMap<TargetId, CacheKey>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the most recent request for `target`, replacing any earlier one.
    pub fn assign(&self, target: TargetId, key: CacheKey) {
        self.assignments.write().insert(target, key);
    }

    /// Key `target` is currently supposed to show.
    pub fn current_key(&self, target: TargetId) -> Option<CacheKey> {
        self.assignments.read().get(&target).cloned()
    }

    /// Whether `target` is still assigned to exactly `key`.
    pub fn is_current(&self, target: TargetId, key: &CacheKey) -> bool {
        self.assignments.read().get(&target) == Some(key)
    }

    /// Forget `target`'s assignment.
    pub fn clear(&self, target: TargetId) -> Option<CacheKey> {
        self.assignments.write().remove(&target)
    }

    /// Forget `target`'s assignment only if it is still `key`.
    pub fn release(&self, target: TargetId, key: &CacheKey) -> bool {
        let mut assignments = self.assignments.write();
        if assignments.get(&target) == Some(key) {
            assignments.remove(&target);
            true
        } else {
            false
        }
    }

    /// Forget every assignment.
    pub fn clear_all(&self) {
        self.assignments.write().clear();
    }

    pub fn len(&self) -> usize {
        self.assignments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.read().is_empty()
    }
}
