#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use rust_image_loader::{
    Bitmap, DecodeError, Decoder, DecoderKind, DecoderSet, DisplayTarget, Engine, EngineConfig, Liveness,
    QueueProcessingType, TargetId, UiQueue,
};

pub const DEADLINE: Duration = Duration::from_secs(10);

/// Poll `cond` until it holds or the deadline passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn config(pool_size: usize) -> EngineConfig {
    EngineConfig {
        thread_pool_size: pool_size,
        queue_processing: QueueProcessingType::Fifo,
        thread_name_prefix: "it-pool-".to_string(),
        ..EngineConfig::default()
    }
}

pub fn engine_with(pool_size: usize, decoder: Arc<TestDecoder>) -> (Arc<Engine>, Arc<UiQueue>) {
    let ui = Arc::new(UiQueue::new());
    let mut decoders = DecoderSet::empty();
    decoders.set(DecoderKind::Picture, decoder);
    let engine = Engine::new(config(pool_size), decoders, ui.clone()).unwrap();
    (engine, ui)
}

/// A list row image view.
pub struct Row {
    id: TargetId,
    liveness: Liveness,
    painted: Mutex<Vec<Arc<Bitmap>>>,
    clears: AtomicUsize,
}

impl Row {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::next(),
            liveness: Liveness::new(),
            painted: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
        })
    }

    pub fn painted(&self) -> Vec<Arc<Bitmap>> {
        self.painted.lock().unwrap().clone()
    }

    pub fn paint_count(&self) -> usize {
        self.painted.lock().unwrap().len()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn reclaim(&self) {
        self.liveness.reclaim();
    }
}

impl DisplayTarget for Row {
    fn id(&self) -> TargetId {
        self.id
    }

    fn is_reclaimed(&self) -> bool {
        self.liveness.is_reclaimed()
    }

    fn width(&self) -> u32 {
        48
    }

    fn height(&self) -> u32 {
        48
    }

    fn paint(&self, image: Arc<Bitmap>) {
        self.painted.lock().unwrap().push(image);
    }

    fn clear(&self, _placeholder: Option<Arc<Bitmap>>) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// One-shot latch that blocks decodes until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.condvar.wait(open).unwrap();
        }
    }
}

/// Decoder with per-URI output sizes, optionally held at a gate.
#[derive(Default)]
pub struct TestDecoder {
    calls: AtomicUsize,
    sizes: HashMap<String, (u32, u32)>,
    gate: Option<Arc<Gate>>,
}

impl TestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, uri: &str, width: u32, height: u32) -> Self {
        self.sizes.insert(uri.to_string(), (width, height));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for TestDecoder {
    fn decode(&self, uri: &str, _max_width: u32, _max_height: u32) -> Result<Bitmap, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if uri.starts_with("broken") {
            return Err(DecodeError::Malformed(uri.to_string()));
        }
        let (width, height) = self.sizes.get(uri).copied().unwrap_or((4, 4));
        Ok(Bitmap::new(RgbaImage::from_pixel(width, height, Rgba([30, 90, 200, 255]))))
    }
}
