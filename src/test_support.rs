//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};

use crate::bitmap::Bitmap;
use crate::decode::Decoder;
use crate::error::DecodeError;
use crate::target::{DisplayTarget, Liveness, TargetId};

pub fn solid(width: u32, height: u32) -> Bitmap {
    Bitmap::new(RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255])))
}

/// Target that records every paint and clear.
pub struct RecordingTarget {
    id: TargetId,
    pub liveness: Liveness,
    width: u32,
    height: u32,
    painted: Mutex<Vec<Arc<Bitmap>>>,
    cleared: Mutex<Vec<Option<Arc<Bitmap>>>>,
}

impl RecordingTarget {
    pub fn sized(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            id: TargetId::next(),
            liveness: Liveness::new(),
            width,
            height,
            painted: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        })
    }

    pub fn painted(&self) -> Vec<Arc<Bitmap>> {
        self.painted.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<Option<Arc<Bitmap>>> {
        self.cleared.lock().unwrap().clone()
    }
}

impl DisplayTarget for RecordingTarget {
    fn id(&self) -> TargetId {
        self.id
    }

    fn is_reclaimed(&self) -> bool {
        self.liveness.is_reclaimed()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn paint(&self, image: Arc<Bitmap>) {
        self.painted.lock().unwrap().push(image);
    }

    fn clear(&self, placeholder: Option<Arc<Bitmap>>) {
        self.cleared.lock().unwrap().push(placeholder);
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Decoder that returns a solid image and remembers what it was asked for.
pub struct CountingDecoder {
    pub calls: AtomicUsize,
    requests: Mutex<Vec<(String, u32, u32)>>,
    size: (u32, u32),
    failure: Option<DecodeError>,
    hook: Option<Hook>,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            size: (4, 4),
            failure: None,
            hook: None,
        }
    }

    pub fn failing(err: DecodeError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Run `hook` inside every decode call.
    pub fn on_decode(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn requests(&self) -> Vec<(String, u32, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Decoder for CountingDecoder {
    fn decode(&self, uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((uri.to_string(), max_width, max_height));
        if let Some(hook) = &self.hook {
            hook();
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(solid(self.size.0, self.size.1)),
        }
    }
}
