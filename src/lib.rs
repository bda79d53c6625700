//! Asynchronous image loader for recycled display targets.
//!
//! Decodes pictures off the UI thread, keeps decoded bitmaps in a
//! byte-bounded LRU cache and delivers them to reusable on-screen slots
//! without ever painting an image a slot no longer wants.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_image_loader::{Engine, EngineConfig, UiQueue};
//!
//! let ui = Arc::new(UiQueue::new());
//! let engine = Engine::from_config(EngineConfig::default(), ui.clone()).unwrap();
//! # let row: Arc<dyn rust_image_loader::DisplayTarget> = unimplemented!();
//! // The engine only holds the row weakly; the UI keeps it alive.
//! engine.display_uri("/photos/cat.png", row.clone());
//! // once per frame, on the UI thread:
//! ui.run_pending();
//! ```

pub mod bitmap;
pub mod config;
pub mod decode;
pub mod display_task;
pub mod engine;
pub mod error;
pub mod key_lock;
pub mod load_task;
pub mod memory_cache;
pub mod pause;
pub mod scroll;
pub mod shape;
pub mod stats;
pub mod target;
pub mod target_registry;
pub mod ui_queue;
pub mod worker_pool;

#[cfg(test)]
mod test_support;

pub use bitmap::{Bitmap, CacheKey};
pub use config::{EngineConfig, QueueProcessingType};
pub use decode::{AlbumArtDecoder, Decoder, DecoderKind, DecoderSet, DownscaleFilter, PictureDecoder};
pub use display_task::DisplayOutcome;
pub use engine::{DisplayStatus, Engine};
pub use error::{CancelReason, DecodeError, ShapeError, TaskError};
pub use load_task::{Delivery, LoadRequest};
pub use memory_cache::MemoryCache;
pub use scroll::{PauseOnScroll, ScrollState};
pub use shape::ShapeTransform;
pub use stats::StatsSnapshot;
pub use target::{DisplayTarget, Liveness, TargetId};
pub use ui_queue::{UiExecutor, UiQueue};
