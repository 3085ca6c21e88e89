//! Pure bitmap transforms applied before tracing.
//!
//! Every function takes an immutable image and returns a new one, so
//! identical input always gives identical output.
//!
//! Binary images follow one convention throughout the crate:
//! ink (glyph) pixels are 255, background pixels are 0.

use image::{imageops, GrayImage, Luma};
use imageproc::contrast::{otsu_level, ThresholdType};

use crate::config::ThresholdMethod;
use crate::error::FontError;

/// Padding (pixels) kept around the ink by [`trim`].
pub const TRIM_PADDING: u32 = 2;

/// Cutoff used when the histogram has a single populated bin and
/// Otsu's between-class variance is zero everywhere.
const UNIFORM_CUTOFF: u8 = 127;

/// Grayscale → binary with a fixed cutoff. Pixels at or below `value`
/// (dark ink on a light sheet) become 255, the rest 0.
pub fn threshold(gray: &GrayImage, value: u8) -> GrayImage {
    imageproc::contrast::threshold(gray, value, ThresholdType::BinaryInverted)
}

/// Otsu cutoff: the level maximising between-class variance of the
/// 256-bin histogram.
pub fn otsu_cutoff(gray: &GrayImage) -> u8 {
    let mut pixels = gray.pixels().map(|p| p.0[0]);
    let Some(first) = pixels.next() else {
        return UNIFORM_CUTOFF;
    };
    if pixels.all(|v| v == first) {
        return UNIFORM_CUTOFF;
    }
    otsu_level(gray)
}

/// Threshold with the Otsu cutoff.
pub fn auto_threshold(gray: &GrayImage) -> GrayImage {
    let cutoff = otsu_cutoff(gray);
    tracing::debug!(cutoff, "otsu threshold");
    threshold(gray, cutoff)
}

/// Threshold with the configured method, optionally inverting.
pub fn binarize(gray: &GrayImage, method: ThresholdMethod, invert: bool) -> GrayImage {
    let binary = match method {
        ThresholdMethod::Fixed(t) => threshold(gray, t),
        ThresholdMethod::Otsu => auto_threshold(gray),
    };
    if invert {
        self::invert(&binary)
    } else {
        binary
    }
}

/// Swap foreground and background.
pub fn invert(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    imageops::invert(&mut out);
    out
}

/// Gaussian blur to soften jagged edges before thresholding.
/// `radius` is the blur sigma; values <= 0 return a copy.
pub fn smooth(gray: &GrayImage, radius: f32) -> GrayImage {
    if radius <= 0.0 || !radius.is_finite() {
        return gray.clone();
    }
    imageproc::filter::gaussian_blur_f32(gray, radius)
}

/// Crop a binary image to the tight box of pixels brighter than
/// `bg_threshold`, keeping [`TRIM_PADDING`] background pixels on every side.
///
/// An image with no foreground is returned unchanged.
pub fn trim(binary: &GrayImage, bg_threshold: u8) -> GrayImage {
    trim_with_origin(binary, bg_threshold).0
}

/// [`trim`], also returning where the original (0, 0) ended up in the
/// trimmed image, as a signed offset.
pub fn trim_with_origin(binary: &GrayImage, bg_threshold: u8) -> (GrayImage, (i64, i64)) {
    let (w, h) = binary.dimensions();
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel.0[0] > bg_threshold {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX {
        return (binary.clone(), (0, 0));
    }

    let crop_w = max_x - min_x + 1;
    let crop_h = max_y - min_y + 1;
    let mut out = GrayImage::from_pixel(crop_w + 2 * TRIM_PADDING, crop_h + 2 * TRIM_PADDING, Luma([0]));
    let inner = imageops::crop_imm(binary, min_x, min_y, crop_w, crop_h).to_image();
    imageops::replace(&mut out, &inner, TRIM_PADDING as i64, TRIM_PADDING as i64);
    debug_assert!(crop_w <= w && crop_h <= h);
    (
        out,
        (
            TRIM_PADDING as i64 - min_x as i64,
            TRIM_PADDING as i64 - min_y as i64,
        ),
    )
}

/// Resample to a larger canvas (Catmull-Rom) so the tracer sees more
/// edge detail. `factor` must be >= 1; 1 returns a copy.
pub fn upscale(gray: &GrayImage, factor: f64) -> Result<GrayImage, FontError> {
    if !factor.is_finite() || factor < 1.0 {
        return Err(FontError::InvalidInput(format!(
            "upscale factor must be >= 1, got {factor}"
        )));
    }
    if factor == 1.0 {
        return Ok(gray.clone());
    }
    let (w, h) = gray.dimensions();
    let new_w = (w as f64 * factor).round().max(1.0) as u32;
    let new_h = (h as f64 * factor).round().max(1.0) as u32;
    Ok(imageops::resize(gray, new_w, new_h, imageops::FilterType::CatmullRom))
}
