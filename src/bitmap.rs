//! Source bitmaps and region extraction.

use image::{DynamicImage, GrayImage, ImageReader, Luma, RgbaImage};
use std::io::Cursor;

use crate::error::FontError;
use crate::geom::point_in_polygon;
use crate::regions::{Boundary, PixelBox};

/// An immutable pixel buffer: 8-bit grayscale or RGBA.
///
/// Owned by the request that loaded it and never mutated.
#[derive(Debug, Clone)]
pub struct SourceBitmap {
    image: DynamicImage,
}

impl SourceBitmap {
    pub fn from_luma(image: GrayImage) -> Result<Self, FontError> {
        Self::validated(DynamicImage::ImageLuma8(image))
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self, FontError> {
        Self::validated(DynamicImage::ImageRgba8(image))
    }

    /// Decode PNG/JPEG/BMP bytes. Reading the bytes is the caller's job.
    pub fn decode(bytes: &[u8]) -> Result<Self, FontError> {
        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| FontError::ImageLoad(e.to_string()))?
            .decode()
            .map_err(|e| FontError::ImageLoad(e.to_string()))?;
        let image = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgba8(_) => image,
            other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.into_rgba8()),
            other => DynamicImage::ImageLuma8(other.into_luma8()),
        };
        Self::validated(image)
    }

    fn validated(image: DynamicImage) -> Result<Self, FontError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FontError::InvalidInput(format!(
                "zero-dimension bitmap ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Grayscale view. Transparent pixels are composited over white so
    /// they read as background.
    pub fn to_luma(&self) -> GrayImage {
        match &self.image {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            DynamicImage::ImageRgba8(rgba) => {
                let (w, h) = rgba.dimensions();
                GrayImage::from_fn(w, h, |x, y| {
                    let [r, g, b, a] = rgba.get_pixel(x, y).0;
                    // Rec. 601 luma, the same weights `image` uses.
                    let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
                    let alpha = a as u32;
                    let composited = (luma * alpha + 255 * (255 - alpha)) / 255;
                    Luma([composited as u8])
                })
            }
            other => other.to_luma8(),
        }
    }
}

/// Crop a region's bounding box out of a grayscale bitmap.
///
/// The box is clamped to the image. A box that does not intersect the
/// image, or has zero area, is `InvalidInput`.
pub fn crop(gray: &GrayImage, bounds: PixelBox) -> Result<GrayImage, FontError> {
    let clamped = bounds
        .clamp_to(gray.width(), gray.height())
        .ok_or_else(|| FontError::InvalidInput(format!("region {bounds} lies outside the bitmap")))?;
    Ok(image::imageops::crop_imm(
        gray,
        clamped.min_x,
        clamped.min_y,
        clamped.width(),
        clamped.height(),
    )
    .to_image())
}

/// Clear every pixel of a binary (ink = 255) crop whose center lies
/// outside the polygon. `origin` is the crop's top-left corner in
/// source coordinates and `scale` the upscale factor applied since.
pub fn mask_polygon(binary: &mut GrayImage, polygon: &[(f64, f64)], origin: (f64, f64), scale: f64) {
    if polygon.len() < 3 {
        return;
    }
    let local: Vec<kurbo::Point> = polygon
        .iter()
        .map(|&(x, y)| kurbo::Point::new((x - origin.0) * scale, (y - origin.1) * scale))
        .collect();
    for (x, y, pixel) in binary.enumerate_pixels_mut() {
        let center = kurbo::Point::new(x as f64 + 0.5, y as f64 + 0.5);
        if !point_in_polygon(center, &local) {
            pixel.0[0] = 0;
        }
    }
}

/// Bounding box of a region boundary in source pixel coordinates.
pub fn boundary_box(boundary: &Boundary) -> Result<PixelBox, FontError> {
    match boundary {
        Boundary::Rect(rect) => Ok(*rect),
        Boundary::Polygon(points) => {
            if points.len() < 3 {
                return Err(FontError::InvalidInput(format!(
                    "polygon boundary needs at least 3 points, got {}",
                    points.len()
                )));
            }
            let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
            let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
            for &(x, y) in points {
                if !x.is_finite() || !y.is_finite() {
                    return Err(FontError::InvalidInput("non-finite polygon point".into()));
                }
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
            if max_x - min_x < 1.0 || max_y - min_y < 1.0 {
                return Err(FontError::InvalidInput("zero-area polygon boundary".into()));
            }
            Ok(PixelBox {
                min_x: min_x.max(0.0).floor() as u32,
                min_y: min_y.max(0.0).floor() as u32,
                max_x: (max_x.ceil() - 1.0).max(0.0) as u32,
                max_y: (max_y.ceil() - 1.0).max(0.0) as u32,
            })
        }
    }
}
