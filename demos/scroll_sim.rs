//! Simulated recycled list: a handful of rows scroll through a long feed of
//! images while the UI thread pumps deliveries once per frame.
//!
//! Run with `RUST_LOG=rust_image_loader=debug cargo run --example scroll_sim`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_image_loader::{
    Bitmap, DecodeError, DecoderKind, DecoderSet, DisplayTarget, Engine, EngineConfig, Liveness,
    LoadRequest, PauseOnScroll, ScrollState, ShapeTransform, TargetId, UiQueue,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ROWS: usize = 6;
const FEED_LEN: usize = 120;
const FRAME: Duration = Duration::from_millis(16);
/// Deliveries painted per frame
const PAINTS_PER_FRAME: usize = 4;

struct RowView {
    id: TargetId,
    liveness: Liveness,
    shown: Mutex<Option<(u32, u32)>>,
    paints: AtomicU64,
}

impl RowView {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::next(),
            liveness: Liveness::new(),
            shown: Mutex::new(None),
            paints: AtomicU64::new(0),
        })
    }
}

impl DisplayTarget for RowView {
    fn id(&self) -> TargetId {
        self.id
    }

    fn is_reclaimed(&self) -> bool {
        self.liveness.is_reclaimed()
    }

    fn width(&self) -> u32 {
        64
    }

    fn height(&self) -> u32 {
        64
    }

    fn paint(&self, image: Arc<Bitmap>) {
        if let Ok(mut shown) = self.shown.lock() {
            *shown = Some(image.dimensions());
        }
        self.paints.fetch_add(1, Ordering::Relaxed);
    }

    fn clear(&self, _placeholder: Option<Arc<Bitmap>>) {
        if let Ok(mut shown) = self.shown.lock() {
            *shown = None;
        }
    }
}

/// Pretends to read a photo from slow storage.
fn synthetic_decode(uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
    std::thread::sleep(Duration::from_millis(12));
    if uri.ends_with("13.jpg") {
        return Err(DecodeError::Malformed(uri.to_string()));
    }
    let shade = (uri.len() * 17 % 255) as u8;
    let (width, height) = (max_width.max(1), max_height.max(1));
    let pixels = [shade, 80, 160, 255].repeat((width * height) as usize);
    Bitmap::from_rgba(width, height, pixels).ok_or_else(|| DecodeError::Malformed(uri.to_string()))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => EngineConfig::load_from(&path),
        None => EngineConfig::default(),
    };

    let ui = Arc::new(UiQueue::new());
    let decoders = DecoderSet::empty().with(DecoderKind::Picture, synthetic_decode);
    let engine = match Engine::new(config.clone(), decoders, ui.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start loader: {e}");
            return;
        }
    };
    let scroll = PauseOnScroll::from_config(Arc::clone(&engine), &config);
    let rows: Vec<_> = (0..ROWS).map(|_| RowView::new()).collect();

    let bind = |first: usize| {
        for (offset, row) in rows.iter().enumerate() {
            let uri = format!("/feed/{}.jpg", first + offset);
            let mut request = LoadRequest::new(uri, row.clone());
            if (first + offset) % 5 == 0 {
                request = request
                    .with_shape(ShapeTransform::Round)
                    .with_cache_key(format!("/feed/{}.jpg#round", first + offset));
            }
            engine.display(request);
        }
    };

    // Fast fling: rows are rebound every frame while the engine is paused.
    scroll.on_scroll_state_changed(ScrollState::Fling);
    for first in (0..FEED_LEN - ROWS).step_by(3) {
        bind(first);
        ui.run_pending_max(PAINTS_PER_FRAME);
        std::thread::sleep(FRAME);
    }

    // Settle near the end and let the visible rows load.
    scroll.on_scroll_state_changed(ScrollState::Idle);
    bind(FEED_LEN - ROWS);
    ui.run_until(Duration::from_secs(5), || engine.target_count() == 0);

    // Slow drag back up: decodes keep running while the finger moves.
    let drag = PauseOnScroll::new(Arc::clone(&engine), false, true);
    drag.on_scroll_state_changed(ScrollState::TouchScroll);
    for first in (FEED_LEN / 2..FEED_LEN - ROWS).rev().step_by(ROWS) {
        bind(first);
        for _ in 0..4 {
            ui.run_pending_max(PAINTS_PER_FRAME);
            std::thread::sleep(FRAME);
        }
    }
    drag.on_scroll_state_changed(ScrollState::Idle);
    ui.run_until(Duration::from_secs(5), || engine.target_count() <= 1);

    for (i, row) in rows.iter().enumerate() {
        let shown = row.shown.lock().ok().and_then(|s| *s);
        println!("row {i}: {} paints, showing {:?}", row.paints.load(Ordering::Relaxed), shown);
    }

    let stats = engine.stats();
    println!("{stats:#?}");
    println!(
        "cache: {} entries, {} / {} bytes",
        engine.cache().len(),
        engine.cache().bytes_used(),
        engine.cache().capacity()
    );

    rows[0].liveness.reclaim();
    engine.stop();
}
