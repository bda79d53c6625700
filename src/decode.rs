//! Decode collaborators.
//!
//! The engine never touches pixels itself: a [`Decoder`] turns a source URI
//! into a [`Bitmap`] no larger than the requested box. Each request carries a
//! [`DecoderKind`] that selects the decoder from a [`DecoderSet`].
//!
//! Two decoders are built in:
//! - [`PictureDecoder`] opens local pictures with the `image` crate.
//! - [`AlbumArtDecoder`] finds a sidecar cover image next to an audio file.
//!
//! Video thumbnails and application icons come from platform services and
//! must be registered by the embedding application.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::bitmap::Bitmap;
use crate::error::DecodeError;

/// Supported picture extensions
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "webp", "gif", "bmp", "ico", "tiff", "tif"];

/// Video extensions (thumbnail decoders)
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "webm", "avi", "mov", "wmv", "flv", "m4v", "3gp", "ogv"];

/// Audio extensions (album art decoders)
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wav", "wma"];

/// Application package extensions (icon decoders)
pub const SUPPORTED_PACKAGE_EXTENSIONS: &[&str] = &["apk", "appimage", "exe"];

/// Sidecar file names searched for album art, in order.
const ALBUM_ART_FILE_NAMES: &[&str] = &[
    "cover.jpg",
    "cover.png",
    "folder.jpg",
    "folder.png",
    "front.jpg",
    "front.png",
    "albumart.jpg",
    "albumartsmall.jpg",
];

/// Turns a source URI into a decoded image.
///
/// `max_width`/`max_height` bound the result; `0` means unbounded on that
/// axis. Implementations must be callable from several worker threads at
/// once and may perform blocking I/O.
pub trait Decoder: Send + Sync {
    fn decode(&self, uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&str, u32, u32) -> Result<Bitmap, DecodeError> + Send + Sync,
{
    fn decode(&self, uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
        self(uri, max_width, max_height)
    }
}

/// Which decoder a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecoderKind {
    /// Local picture file
    #[default]
    Picture,
    /// Preview frame of a video file
    VideoThumbnail,
    /// Album artwork for an audio file
    AlbumArt,
    /// Icon of an installed application or package file
    AppIcon,
}

impl DecoderKind {
    /// Guess the kind from a path's extension.
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        let ext = ext.as_str();
        if SUPPORTED_IMAGE_EXTENSIONS.contains(&ext) {
            Some(Self::Picture)
        } else if SUPPORTED_VIDEO_EXTENSIONS.contains(&ext) {
            Some(Self::VideoThumbnail)
        } else if SUPPORTED_AUDIO_EXTENSIONS.contains(&ext) {
            Some(Self::AlbumArt)
        } else if SUPPORTED_PACKAGE_EXTENSIONS.contains(&ext) {
            Some(Self::AppIcon)
        } else {
            None
        }
    }
}

/// The decoders available to an engine, one slot per [`DecoderKind`].
#[derive(Clone, Default)]
pub struct DecoderSet {
    picture: Option<Arc<dyn Decoder>>,
    video_thumbnail: Option<Arc<dyn Decoder>>,
    album_art: Option<Arc<dyn Decoder>>,
    app_icon: Option<Arc<dyn Decoder>>,
}

impl DecoderSet {
    /// No decoders at all; every request fails with `UnsupportedKind`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in picture and album-art decoders.
    pub fn with_defaults(filter: DownscaleFilter) -> Self {
        Self::empty()
            .with(DecoderKind::Picture, PictureDecoder::new(filter))
            .with(DecoderKind::AlbumArt, AlbumArtDecoder::new(filter))
    }

    /// Register (or replace) the decoder for `kind`.
    pub fn with(mut self, kind: DecoderKind, decoder: impl Decoder + 'static) -> Self {
        self.set(kind, Arc::new(decoder));
        self
    }

    pub fn set(&mut self, kind: DecoderKind, decoder: Arc<dyn Decoder>) {
        *self.slot_mut(kind) = Some(decoder);
    }

    pub fn get(&self, kind: DecoderKind) -> Result<&Arc<dyn Decoder>, DecodeError> {
        let slot = match kind {
            DecoderKind::Picture => &self.picture,
            DecoderKind::VideoThumbnail => &self.video_thumbnail,
            DecoderKind::AlbumArt => &self.album_art,
            DecoderKind::AppIcon => &self.app_icon,
        };
        slot.as_ref().ok_or(DecodeError::UnsupportedKind(kind))
    }

    pub fn decode(
        &self,
        kind: DecoderKind,
        uri: &str,
        max_width: u32,
        max_height: u32,
    ) -> Result<Bitmap, DecodeError> {
        self.get(kind)?.decode(uri, max_width, max_height)
    }

    fn slot_mut(&mut self, kind: DecoderKind) -> &mut Option<Arc<dyn Decoder>> {
        match kind {
            DecoderKind::Picture => &mut self.picture,
            DecoderKind::VideoThumbnail => &mut self.video_thumbnail,
            DecoderKind::AlbumArt => &mut self.album_art,
            DecoderKind::AppIcon => &mut self.app_icon,
        }
    }
}

/// Resampling used when a built-in decoder shrinks a picture. The names are
/// the `downscale_filter` values accepted in `config.ini`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownscaleFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl DownscaleFilter {
    const ALL: [Self; 5] = [
        Self::Nearest,
        Self::Triangle,
        Self::CatmullRom,
        Self::Gaussian,
        Self::Lanczos3,
    ];

    /// Case-insensitive lookup by config name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|filter| filter.name().eq_ignore_ascii_case(value))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Triangle => "triangle",
            Self::CatmullRom => "catmullrom",
            Self::Gaussian => "gaussian",
            Self::Lanczos3 => "lanczos3",
        }
    }

    fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Decodes local picture files and shrinks them to the requested box.
#[derive(Debug, Clone, Copy)]
pub struct PictureDecoder {
    filter: DownscaleFilter,
}

impl PictureDecoder {
    pub fn new(filter: DownscaleFilter) -> Self {
        Self { filter }
    }

    fn decode_path(&self, path: &Path, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
        let uri = path.to_string_lossy();
        let img = image::open(path).map_err(|e| DecodeError::from_image_error(&uri, e))?;
        let img = downscale_if_needed(img, max_width, max_height, self.filter);
        Ok(Bitmap::new(img.to_rgba8()))
    }
}

impl Default for PictureDecoder {
    fn default() -> Self {
        Self::new(DownscaleFilter::default())
    }
}

impl Decoder for PictureDecoder {
    fn decode(&self, uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
        self.decode_path(Path::new(uri), max_width, max_height)
    }
}

/// Finds album art stored as a sidecar picture next to an audio file
/// (`cover.jpg`, `folder.png`, `<track>.jpg`, ...) and decodes it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlbumArtDecoder {
    pictures: PictureDecoder,
}

impl AlbumArtDecoder {
    pub fn new(filter: DownscaleFilter) -> Self {
        Self {
            pictures: PictureDecoder::new(filter),
        }
    }

    /// First existing artwork candidate for `audio`.
    pub fn find_artwork(audio: &Path) -> Option<PathBuf> {
        let dir = audio.parent()?;

        if let Some(stem) = audio.file_stem() {
            let stem = stem.to_string_lossy();
            for ext in ["jpg", "jpeg", "png"] {
                let candidate = dir.join(format!("{stem}.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        ALBUM_ART_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

impl Decoder for AlbumArtDecoder {
    fn decode(&self, uri: &str, max_width: u32, max_height: u32) -> Result<Bitmap, DecodeError> {
        let artwork =
            Self::find_artwork(Path::new(uri)).ok_or_else(|| DecodeError::NotFound(uri.to_string()))?;
        self.pictures.decode_path(&artwork, max_width, max_height)
    }
}

/// Target dimensions for fitting `width`x`height` inside the box, preserving
/// aspect ratio. `None` when no shrinking is needed. Zero box sides are
/// unbounded.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }

    let scale_w = if max_width > 0 { max_width as f64 / width as f64 } else { f64::INFINITY };
    let scale_h = if max_height > 0 { max_height as f64 / height as f64 } else { f64::INFINITY };
    let scale = scale_w.min(scale_h);
    if scale >= 1.0 {
        return None;
    }

    // Preserve aspect ratio; clamp to at least 1x1.
    let new_w = ((width as f64) * scale).round().max(1.0) as u32;
    let new_h = ((height as f64) * scale).round().max(1.0) as u32;
    Some((new_w, new_h))
}

fn downscale_if_needed(img: DynamicImage, max_width: u32, max_height: u32, filter: DownscaleFilter) -> DynamicImage {
    let (w, h) = img.dimensions();
    match fit_within(w, h, max_width, max_height) {
        Some((new_w, new_h)) => img.resize_exact(new_w, new_h, filter.filter_type()),
        None => img,
    }
}
