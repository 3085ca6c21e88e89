//! Vectorization: binary glyph bitmap → closed Bézier contours.
//!
//! 1. Boundary extraction on the pixel-corner grid
//! 2. Speckle suppression (`turdsize`)
//! 3. Optimal polygon + sub-pixel vertex refinement
//! 4. Corner detection (`alphamax`), cubic fitting, curve merging
//!    (`opttolerance`)
//! 5. Winding from the ink side of each boundary, then back to image (y-down) coordinates

pub mod curve;
pub mod decompose;
pub mod direction;
pub mod polygon;

use image::GrayImage;
use kurbo::{Affine, BezPath};
use rayon::prelude::*;

use crate::config::TracingSettings;
use crate::error::FontError;
use crate::outline::{to_path_data, GlyphOutline, RawCommand};

/// Traced outline of one bitmap, in its pixel coordinates (y-down).
#[derive(Debug, Clone, PartialEq)]
pub struct TracedOutline {
    pub outline: GlyphOutline,
    /// `M` absolute, `l`/`c` relative, `z`; one subpath per contour.
    pub commands: Vec<RawCommand>,
    /// `commands` as path-data text.
    pub path_data: String,
    pub width: u32,
    pub height: u32,
}

impl TracedOutline {
    pub fn contour_count(&self) -> usize {
        self.outline.contour_count()
    }

    pub fn is_empty(&self) -> bool {
        self.outline.is_empty()
    }
}

/// Trace a binary bitmap (ink = non-zero) into closed contours.
///
/// An all-background bitmap gives an empty outline. The result depends
/// only on the pixels and `settings`, so repeated calls produce
/// byte-identical path data.
pub fn trace(binary: &GrayImage, settings: &TracingSettings) -> Result<TracedOutline, FontError> {
    let (width, height) = binary.dimensions();
    if width == 0 || height == 0 {
        return Err(FontError::InvalidInput(format!(
            "cannot trace a {width}x{height} bitmap"
        )));
    }

    let mut contours = decompose::decompose(binary);
    let found = contours.len();
    contours.retain(|c| c.area().abs() >= settings.turdsize);
    tracing::debug!(found, kept = contours.len(), turdsize = settings.turdsize, "boundaries");

    let params = curve::CurveParams::from_settings(settings);
    // Curve fitting dominates; contours are independent.
    let paths: Vec<BezPath> = contours
        .par_iter()
        .map(|contour| {
            let poly = polygon::optimal_polygon(contour);
            // Decomposition knows which side the ink is on; keep it.
            direction::orient(&curve::polygon_to_bezpath(&poly, &params), poly.outer)
        })
        .filter(|path| !path.elements().is_empty())
        .collect();

    let to_image = Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, height as f64]);
    let outline = GlyphOutline::from_bezpaths(&paths).transformed(to_image);
    let commands = outline.to_raw();
    let path_data = to_path_data(&commands);

    Ok(TracedOutline {
        outline,
        commands,
        path_data,
        width,
        height,
    })
}
