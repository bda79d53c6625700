//! Display target adapter.
//!
//! A target is a reusable on-screen slot (a list row's image view, a grid
//! cell) owned by the UI layer. The engine only ever holds it through this
//! trait and asks it explicitly whether it is still alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::bitmap::Bitmap;

/// Stable identity of a display target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl TargetId {
    /// Process-unique id for adapters without a natural identity.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TargetId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// What the engine needs from a UI element.
///
/// `paint` and `clear` are only ever called on the UI-affinity context.
/// The other methods may be called from worker threads.
pub trait DisplayTarget: Send + Sync {
    /// Stable identity; two adapters for the same UI element must agree.
    fn id(&self) -> TargetId;

    /// `true` once the underlying element has been torn down.
    fn is_reclaimed(&self) -> bool;

    /// Laid-out width in pixels, `0` if not measured yet.
    fn width(&self) -> u32;

    /// Laid-out height in pixels, `0` if not measured yet.
    fn height(&self) -> u32;

    /// Show a decoded image.
    fn paint(&self, image: Arc<Bitmap>);

    /// Drop whatever is shown, optionally replacing it with a placeholder.
    fn clear(&self, placeholder: Option<Arc<Bitmap>>);
}

/// Liveness flag for targets backed by manually managed UI elements.
///
/// The element keeps one clone and calls [`Liveness::reclaim`] from its
/// teardown; the adapter answers `is_reclaimed` from another clone.
#[derive(Debug, Clone, Default)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reclaim(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_reclaimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TargetId::next();
        let b = TargetId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn liveness_is_shared_between_clones() {
        let owner = Liveness::new();
        let adapter = owner.clone();
        assert!(!adapter.is_reclaimed());
        owner.reclaim();
        assert!(adapter.is_reclaimed());
    }
}
