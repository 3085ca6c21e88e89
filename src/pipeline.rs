//! One font-generation request, end to end.
//!
//! ```text
//! bitmaps ─► luma ─► per region (parallel): crop → upscale → smooth →
//!            binarize → polygon mask → trim → trace → normalize
//!        ─► [join] metrics ─► assemble ─► encode
//! ```
//!
//! Per-glyph failures land in the batch outcome; only document-level
//! failures (pool creation, encoding) abort the request.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assemble::{FontDocument, MAX_COORDINATE, NOTDEF_CODE};
use crate::bitmap::{boundary_box, crop, mask_polygon, SourceBitmap};
use crate::config::{FontAdjustments, FontMetadata, GenerationOptions, OutputFormat, TracingSettings};
use crate::encode::encode;
use crate::error::FontError;
use crate::metrics::{normalization_target, TypefaceMetrics};
use crate::normalize::{normalize_outline, YAxis};
use crate::outline::GlyphOutline;
use crate::preprocess;
use crate::regions::{self, Boundary, CharacterRegion, DetectionParams};
use crate::vectorize::{self, TracedOutline};

/// Accepted `unitsPerEm` range.
const UPM_RANGE: std::ops::RangeInclusive<u16> = 16..=16384;

/// Everything one request needs. The request owns its bitmaps.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub bitmaps: Vec<SourceBitmap>,
    pub regions: Vec<CharacterRegion>,
    pub settings: TracingSettings,
    pub metadata: FontMetadata,
    pub adjustments: FontAdjustments,
    pub options: GenerationOptions,
}

/// What happened to one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GlyphStatus {
    Traced { contours: usize },
    /// No ink: encoded as a blank glyph.
    Empty,
    /// Not encoded.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphOutcome {
    pub region_id: String,
    pub codepoint: Option<char>,
    #[serde(flatten)]
    pub status: GlyphStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Caller-facing report on a finished request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// Glyphs in the font, `.notdef` and `space` included.
    pub glyph_count: usize,
    pub metrics: TypefaceMetrics,
    pub kerning_pairs: usize,
    pub format: OutputFormat,
    pub bytes: usize,
    pub glyphs: Vec<GlyphOutcome>,
}

#[derive(Debug, Clone)]
pub struct GeneratedFont {
    pub data: Vec<u8>,
    pub summary: GenerationSummary,
}

/// Crop one region out of a grayscale sheet and trace it.
///
/// This is the plain per-glyph call behind interactive previews: it has
/// no side effects and identical inputs give identical path data.
pub fn trace_region(gray: &GrayImage, boundary: &Boundary, settings: &TracingSettings) -> Result<TracedOutline, FontError> {
    let bounds = boundary_box(boundary)?
        .clamp_to(gray.width(), gray.height())
        .ok_or_else(|| FontError::InvalidInput("region lies outside the bitmap".to_string()))?;
    let cropped = crop(gray, bounds)?;
    let upscaled = preprocess::upscale(&cropped, settings.upscale_amount)?;
    let smoothed = preprocess::smooth(&upscaled, settings.smoothing);
    let mut binary = preprocess::binarize(&smoothed, settings.threshold, settings.invert);
    if let Boundary::Polygon(points) = boundary {
        let origin = (f64::from(bounds.min_x), f64::from(bounds.min_y));
        mask_polygon(&mut binary, points, origin, settings.upscale_amount);
    }
    let trimmed = preprocess::trim(&binary, 0);
    vectorize::trace(&trimmed, settings)
}

/// Trace a whole bitmap as one glyph (the legacy one-image-per-character form).
pub fn trace_bitmap(bitmap: &SourceBitmap, settings: &TracingSettings) -> Result<TracedOutline, FontError> {
    let gray = bitmap.to_luma();
    let whole = Boundary::Rect(regions::PixelBox {
        min_x: 0,
        min_y: 0,
        max_x: gray.width() - 1,
        max_y: gray.height() - 1,
    });
    trace_region(&gray, &whole, settings)
}

/// Find candidate character regions on a sheet, in reading order.
pub fn detect(
    bitmap: &SourceBitmap,
    bitmap_index: usize,
    settings: &TracingSettings,
    params: &DetectionParams,
) -> Vec<CharacterRegion> {
    let binary = preprocess::binarize(&bitmap.to_luma(), settings.threshold, settings.invert);
    regions::detect_regions(&binary, params)
        .iter()
        .enumerate()
        .map(|(i, c)| c.to_region(format!("{bitmap_index}-{i}"), bitmap_index))
        .collect()
}

/// Luma views of the request's bitmaps, converted once per bitmap.
#[derive(Debug, Default)]
struct LumaCache {
    images: BTreeMap<usize, GrayImage>,
}

impl LumaCache {
    fn for_regions(bitmaps: &[SourceBitmap], regions: &[CharacterRegion]) -> Self {
        let wanted: BTreeSet<usize> = regions.iter().map(|r| r.bitmap).filter(|&i| i < bitmaps.len()).collect();
        Self {
            images: wanted.into_iter().map(|i| (i, bitmaps[i].to_luma())).collect(),
        }
    }

    fn get(&self, index: usize) -> Result<&GrayImage, FontError> {
        self.images
            .get(&index)
            .ok_or_else(|| FontError::InvalidInput(format!("no bitmap with index {index}")))
    }
}

/// The code point to trace for a region, or why it is skipped.
fn precheck(region: &CharacterRegion, seen: &mut BTreeSet<char>) -> Result<char, String> {
    match region.codepoint {
        None => Err("no code point assigned".to_string()),
        Some(' ') => Err("space is generated automatically".to_string()),
        Some(NOTDEF_CODE) => Err("code 0 is reserved for .notdef".to_string()),
        Some(ch) if !seen.insert(ch) => Err(format!("duplicate mapping for {}", ch.escape_unicode())),
        Some(ch) => Ok(ch),
    }
}

fn process_region(
    cache: &LumaCache,
    region: &CharacterRegion,
    ch: char,
    request: &GenerationRequest,
) -> (GlyphOutcome, Option<GlyphOutline>) {
    let mut outcome = GlyphOutcome {
        region_id: region.id.clone(),
        codepoint: Some(ch),
        status: GlyphStatus::Empty,
        warnings: Vec::new(),
    };

    let traced = cache
        .get(region.bitmap)
        .and_then(|gray| trace_region(gray, &region.boundary, &request.settings))
        .and_then(|traced| {
            if traced.is_empty() {
                Err(FontError::TracingFailure(format!("region {} has no ink", region.id)))
            } else {
                Ok(traced)
            }
        });

    match traced {
        Ok(traced) => {
            let target = normalization_target(ch, request.options.units_per_em, request.options.proportional_case);
            let normalized = normalize_outline(&traced.outline, target, YAxis::Down);
            outcome.warnings = normalized.warnings;
            outcome.status = if normalized.outline.is_empty() {
                GlyphStatus::Empty
            } else {
                GlyphStatus::Traced {
                    contours: normalized.outline.contour_count(),
                }
            };
            (outcome, Some(normalized.outline))
        }
        Err(e @ FontError::TracingFailure(_)) => {
            tracing::warn!(region = %region.id, "{e}; using a blank glyph");
            outcome.warnings.push(e.to_string());
            (outcome, Some(GlyphOutline::empty()))
        }
        Err(e) => {
            tracing::warn!(region = %region.id, "skipped: {e}");
            outcome.status = GlyphStatus::Skipped { reason: e.to_string() };
            (outcome, None)
        }
    }
}

fn build_document(glyphs: &[(char, GlyphOutline)], request: &GenerationRequest) -> FontDocument {
    let metrics = TypefaceMetrics::compute(glyphs.iter().map(|(ch, o)| (*ch, o)), request.options.units_per_em);
    tracing::info!(
        cap_height = metrics.cap_height,
        x_height = metrics.x_height,
        ascender = metrics.ascender,
        descender = metrics.descender,
        "metrics"
    );
    FontDocument::new(request.metadata.clone(), glyphs, metrics, &request.adjustments)
}

/// Run a request: trace every region, derive metrics, assemble, encode.
pub fn generate(request: &GenerationRequest) -> Result<GeneratedFont, FontError> {
    let started = Instant::now();
    let upm = request.options.units_per_em;
    if !UPM_RANGE.contains(&upm) {
        return Err(FontError::InvalidInput(format!(
            "units per em must be within {}..={}, got {upm}",
            UPM_RANGE.start(),
            UPM_RANGE.end()
        )));
    }

    let cache = LumaCache::for_regions(&request.bitmaps, &request.regions);
    tracing::info!(
        bitmaps = request.bitmaps.len(),
        converted = cache.images.len(),
        regions = request.regions.len(),
        "loaded"
    );

    let mut seen = BTreeSet::new();
    let jobs: Vec<(&CharacterRegion, Result<char, String>)> = request
        .regions
        .iter()
        .map(|r| (r, precheck(r, &mut seen)))
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(request.options.workers.unwrap_or(0))
        .build()
        .map_err(|e| FontError::WorkerPool(e.to_string()))?;
    let trace_started = Instant::now();
    let results: Vec<(GlyphOutcome, Option<GlyphOutline>)> = pool.install(|| {
        jobs.par_iter()
            .map(|(region, job)| match job {
                Ok(ch) => process_region(&cache, region, *ch, request),
                Err(reason) => (
                    GlyphOutcome {
                        region_id: region.id.clone(),
                        codepoint: region.codepoint,
                        status: GlyphStatus::Skipped { reason: reason.clone() },
                        warnings: Vec::new(),
                    },
                    None,
                ),
            })
            .collect()
    });
    tracing::info!(
        threads = pool.current_num_threads(),
        elapsed_ms = trace_started.elapsed().as_millis() as u64,
        "traced"
    );

    let mut outcomes = Vec::with_capacity(results.len());
    let mut glyphs: Vec<(char, GlyphOutline)> = Vec::new();
    for (outcome, outline) in results {
        if let (Some(ch), Some(outline)) = (outcome.codepoint, outline) {
            glyphs.push((ch, outline));
        }
        outcomes.push(outcome);
    }

    // Join point: metrics need every outline.
    let mut doc = build_document(&glyphs, request);
    let oversized: BTreeSet<char> = doc
        .glyphs
        .iter()
        .filter(|g| !g.fits_font_units())
        .map(|g| g.codepoint)
        .collect();
    if !oversized.is_empty() {
        let reason = format!("outline exceeds {MAX_COORDINATE} font units");
        for outcome in &mut outcomes {
            let hit = outcome.codepoint.is_some_and(|ch| oversized.contains(&ch));
            if hit && !matches!(outcome.status, GlyphStatus::Skipped { .. }) {
                tracing::warn!(region = %outcome.region_id, "skipped: {reason}");
                outcome.status = GlyphStatus::Skipped { reason: reason.clone() };
            }
        }
        glyphs.retain(|(ch, _)| !oversized.contains(ch));
        doc = build_document(&glyphs, request);
    }
    let data = encode(&doc, request.options.format)?;

    let summary = GenerationSummary {
        glyph_count: doc.glyphs.len(),
        metrics: doc.metrics,
        kerning_pairs: doc.kerning.len(),
        format: request.options.format,
        bytes: data.len(),
        glyphs: outcomes,
    };
    tracing::info!(
        glyphs = summary.glyph_count,
        skipped = summary
            .glyphs
            .iter()
            .filter(|g| matches!(g.status, GlyphStatus::Skipped { .. }))
            .count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "generated font"
    );
    Ok(GeneratedFont { data, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::PixelBox;
    use image::Luma;

    fn sheet() -> SourceBitmap {
        // Two dark blocks on white: a tall bar and a square.
        let img = GrayImage::from_fn(120, 60, |x, y| {
            let bar = (10..20).contains(&x) && (10..50).contains(&y);
            let square = (60..100).contains(&x) && (10..50).contains(&y);
            Luma([if bar || square { 0 } else { 255 }])
        });
        SourceBitmap::from_luma(img).unwrap()
    }

    fn rect(id: &str, bitmap: usize, min_x: u32, max_x: u32, ch: char) -> CharacterRegion {
        CharacterRegion::rect(
            id,
            bitmap,
            PixelBox {
                min_x,
                min_y: 0,
                max_x,
                max_y: 59,
            },
            ch,
        )
    }

    fn request(regions: Vec<CharacterRegion>) -> GenerationRequest {
        GenerationRequest {
            bitmaps: vec![sheet()],
            regions,
            options: GenerationOptions {
                workers: Some(2),
                ..GenerationOptions::default()
            },
            ..GenerationRequest::default()
        }
    }

    #[test]
    fn detect_finds_both_blocks() {
        let found = detect(&sheet(), 0, &TracingSettings::default(), &DetectionParams::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "0-0");
        assert!(found.iter().all(|r| r.codepoint.is_none()));
    }

    #[test]
    fn generates_font_with_outcomes_in_region_order() {
        let req = request(vec![
            rect("bar", 0, 0, 40, 'I'),
            rect("square", 0, 50, 119, 'O'),
        ]);
        let font = generate(&req).unwrap();
        assert_eq!(font.summary.glyph_count, 4);
        assert_eq!(font.summary.bytes, font.data.len());
        let ids: Vec<_> = font.summary.glyphs.iter().map(|g| g.region_id.as_str()).collect();
        assert_eq!(ids, vec!["bar", "square"]);
        assert!(font
            .summary
            .glyphs
            .iter()
            .all(|g| matches!(g.status, GlyphStatus::Traced { contours: 1 })));
    }

    #[test]
    fn per_glyph_problems_do_not_abort() {
        let req = request(vec![
            rect("bar", 0, 0, 40, 'I'),
            rect("blank", 0, 25, 55, 'a'),
            rect("missing", 7, 0, 10, 'b'),
            rect("dup", 0, 50, 119, 'I'),
            CharacterRegion {
                codepoint: None,
                ..rect("unassigned", 0, 0, 10, 'x')
            },
            rect("nul", 0, 0, 40, '\0'),
        ]);
        let font = generate(&req).unwrap();
        let status: Vec<_> = font.summary.glyphs.iter().map(|g| &g.status).collect();
        assert!(matches!(status[0], GlyphStatus::Traced { .. }));
        assert_eq!(*status[1], GlyphStatus::Empty);
        assert!(matches!(status[2], GlyphStatus::Skipped { .. }));
        assert!(matches!(status[3], GlyphStatus::Skipped { .. }));
        assert!(matches!(status[4], GlyphStatus::Skipped { .. }));
        assert!(matches!(status[5], GlyphStatus::Skipped { .. }));
        // .notdef, space, I, a
        assert_eq!(font.summary.glyph_count, 4);
    }

    #[test]
    fn invalid_units_per_em_is_rejected() {
        let mut req = request(Vec::new());
        req.options.units_per_em = 4;
        assert!(matches!(generate(&req), Err(FontError::InvalidInput(_))));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = GlyphOutcome {
            region_id: "r1".to_string(),
            codepoint: Some('A'),
            status: GlyphStatus::Traced { contours: 2 },
            warnings: Vec::new(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "traced");
        assert_eq!(json["contours"], 2);
    }
}
