//! Decoded image payload and cache keys.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;

/// A decoded RGBA image, shared between the cache and the targets that show it.
pub struct Bitmap {
    image: RgbaImage,
    /// Set once the pixels must no longer be handed out
    recycled: AtomicBool,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            recycled: AtomicBool::new(false),
        }
    }

    /// Build from raw RGBA pixels. Returns `None` if the buffer length does
    /// not match `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, pixels).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Size of the pixel payload; this is what the memory cache accounts.
    pub fn byte_size(&self) -> usize {
        self.image.as_raw().len()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// Mark the pixels as released. The memory cache treats a recycled
    /// bitmap as absent.
    pub fn recycle(&self) {
        self.recycled.store(true, Ordering::Release);
    }

    pub fn is_recycled(&self) -> bool {
        self.recycled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("recycled", &self.is_recycled())
            .finish()
    }
}

/// Identifies a decode result independently of which target asked for it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_counts_rgba_payload() {
        let bitmap = Bitmap::new(RgbaImage::new(15, 10));
        assert_eq!(bitmap.byte_size(), 600);
        assert_eq!(bitmap.dimensions(), (15, 10));
    }

    #[test]
    fn from_rgba_rejects_short_buffers() {
        assert!(Bitmap::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(Bitmap::from_rgba(2, 2, vec![0; 16]).is_some());
    }

    #[test]
    fn recycle_is_sticky() {
        let bitmap = Bitmap::new(RgbaImage::new(1, 1));
        assert!(!bitmap.is_recycled());
        bitmap.recycle();
        assert!(bitmap.is_recycled());
    }

    #[test]
    fn cache_keys_compare_by_content() {
        assert_eq!(CacheKey::from("a/b.png"), CacheKey::from("a/b.png".to_string()));
        assert_ne!(CacheKey::from("a"), CacheKey::from("b"));
        assert_eq!(CacheKey::from("").as_str(), "");
    }
}
