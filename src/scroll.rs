//! Scroll-driven pausing for list and grid views.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Idle,
    /// Finger (or wheel) is moving the content.
    TouchScroll,
    /// Content keeps moving after release.
    Fling,
}

/// Pauses the engine while the user scrolls and resumes it when scrolling
/// settles, so that rows flying past do not start decodes.
pub struct PauseOnScroll {
    engine: Arc<Engine>,
    pause_on_scroll: bool,
    pause_on_fling: bool,
}

impl PauseOnScroll {
    pub fn new(engine: Arc<Engine>, pause_on_scroll: bool, pause_on_fling: bool) -> Self {
        Self {
            engine,
            pause_on_scroll,
            pause_on_fling,
        }
    }

    /// Flags taken from the `[Scroll]` section of `config`.
    pub fn from_config(engine: Arc<Engine>, config: &EngineConfig) -> Self {
        Self::new(engine, config.pause_on_scroll, config.pause_on_fling)
    }

    pub fn on_scroll_state_changed(&self, state: ScrollState) {
        match state {
            ScrollState::Idle => self.engine.resume(),
            ScrollState::TouchScroll if self.pause_on_scroll => self.engine.pause(),
            ScrollState::Fling if self.pause_on_fling => self.engine.pause(),
            ScrollState::TouchScroll | ScrollState::Fling => {}
        }
    }
}
