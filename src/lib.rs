//! img2font: bitmap character sheets → binary fonts.
//!
//! Marked (or automatically detected) character regions are traced into
//! cubic outlines, normalised into font units, measured for typeface
//! metrics, spaced, kerned, and encoded as TrueType, OpenType/CFF or WOFF.
//!
//! # Example
//!
//! ```no_run
//! use img2font::{generate, CharacterRegion, GenerationRequest, PixelBox, SourceBitmap};
//!
//! let sheet = SourceBitmap::decode(&std::fs::read("sheet.png")?)?;
//! let bounds = PixelBox { min_x: 10, min_y: 10, max_x: 90, max_y: 110 };
//! let request = GenerationRequest {
//!     bitmaps: vec![sheet],
//!     regions: vec![CharacterRegion::rect("A", 0, bounds, 'A')],
//!     ..GenerationRequest::default()
//! };
//! let font = generate(&request)?;
//! std::fs::write("out.ttf", &font.data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

mod geom;

pub mod assemble;
pub mod bitmap;
pub mod config;
pub mod encode;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod outline;
pub mod pipeline;
pub mod preprocess;
pub mod regions;
pub mod vectorize;

// Re-export kurbo so downstream users get the same version
// used by GlyphOutline::contours (Vec<kurbo::BezPath>).
pub use kurbo;

pub use assemble::{FontDocument, GlyphRecord};
pub use bitmap::SourceBitmap;
pub use config::{FontAdjustments, FontMetadata, GenerationOptions, OutputFormat, ThresholdMethod, TracingSettings};
pub use error::FontError;
pub use metrics::{KerningPair, TypefaceMetrics};
pub use outline::{GlyphOutline, PathCommand};
pub use pipeline::{
    detect, generate, trace_bitmap, trace_region, GeneratedFont, GenerationRequest, GenerationSummary, GlyphOutcome,
    GlyphStatus,
};
pub use regions::{Boundary, CharacterRegion, DetectionParams, PixelBox};
pub use vectorize::TracedOutline;
