//! Shape post-processing applied to decoded images before caching.

use image::{imageops, Rgba, RgbaImage};

use crate::bitmap::Bitmap;
use crate::error::ShapeError;

/// Optional shape applied to a decoded image before it is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeTransform {
    /// Centre-crop to a square and clear everything outside the inscribed circle.
    Round,
}

impl ShapeTransform {
    pub fn apply(&self, source: &Bitmap) -> Result<Bitmap, ShapeError> {
        match self {
            ShapeTransform::Round => round(source),
        }
    }
}

fn round(source: &Bitmap) -> Result<Bitmap, ShapeError> {
    let (width, height) = source.dimensions();
    let size = width.min(height);
    if size == 0 {
        return Err(ShapeError::EmptyImage { width, height });
    }

    let x = (width - size) / 2;
    let y = (height - size) / 2;
    let mut square: RgbaImage = imageops::crop_imm(source.as_rgba(), x, y, size, size).to_image();

    let radius = size as f32 / 2.0;
    for (px, py, pixel) in square.enumerate_pixels_mut() {
        let dx = px as f32 + 0.5 - radius;
        let dy = py as f32 + 0.5 - radius;
        let distance = (dx * dx + dy * dy).sqrt();
        // One-pixel soft edge.
        let coverage = (radius - distance + 0.5).clamp(0.0, 1.0);
        if coverage < 1.0 {
            let Rgba([r, g, b, a]) = *pixel;
            *pixel = Rgba([r, g, b, (a as f32 * coverage).round() as u8]);
        }
    }

    Ok(Bitmap::new(square))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_crops_to_centre_square() {
        let source = Bitmap::new(RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255])));
        let shaped = ShapeTransform::Round.apply(&source).unwrap();
        assert_eq!(shaped.dimensions(), (20, 20));

        let img = shaped.as_rgba();
        assert_eq!(img.get_pixel(10, 10)[3], 255);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(19, 19)[3], 0);
    }

    #[test]
    fn round_rejects_empty_images() {
        let source = Bitmap::new(RgbaImage::new(0, 5));
        assert_eq!(
            ShapeTransform::Round.apply(&source).unwrap_err(),
            ShapeError::EmptyImage { width: 0, height: 5 }
        );
    }
}
