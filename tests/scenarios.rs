//! End-to-end behaviour on small synthetic sheets.

use image::{GrayImage, Luma};
use img2font::assemble::{assemble, MIN_ADVANCE};
use img2font::normalize::{normalize_outline, NormalizeTarget, YAxis};
use img2font::regions::detect_regions;
use img2font::{
    detect, generate, trace_bitmap, CharacterRegion, DetectionParams, FontAdjustments, GenerationOptions,
    GenerationRequest, GlyphOutline, GlyphStatus, OutputFormat, PixelBox, SourceBitmap, TracingSettings,
    TypefaceMetrics,
};
use kurbo::{Rect, Shape};

fn white(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([255]))
}

/// Paint an inclusive box of dark ink.
fn ink(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    for y in y0..=y1 {
        for x in x0..=x1 {
            img.put_pixel(x, y, Luma([0]));
        }
    }
}

fn rect_outline(x0: f64, y0: f64, x1: f64, y1: f64) -> GlyphOutline {
    GlyphOutline::from_bezpaths(&[Rect::new(x0, y0, x1, y1).to_path(0.1)])
}

#[test]
fn blank_bitmap_becomes_a_floor_width_glyph() {
    let sheet = SourceBitmap::from_luma(white(64, 64)).unwrap();
    let traced = trace_bitmap(&sheet, &TracingSettings::default()).unwrap();
    assert_eq!(traced.contour_count(), 0);

    let metrics = TypefaceMetrics::nominal(1000);
    let (records, cmap) = assemble(&[('A', traced.outline)], &metrics, &FontAdjustments::default());
    let record = &records[usize::from(cmap[&'A'])];
    assert!(record.outline.is_empty());
    assert_eq!(record.advance_width, MIN_ADVANCE);

    let request = GenerationRequest {
        bitmaps: vec![sheet],
        regions: vec![CharacterRegion::rect(
            "A",
            0,
            PixelBox { min_x: 0, min_y: 0, max_x: 63, max_y: 63 },
            'A',
        )],
        ..GenerationRequest::default()
    };
    let font = generate(&request).unwrap();
    assert_eq!(font.summary.glyphs[0].status, GlyphStatus::Empty);
    assert!(!font.summary.glyphs[0].warnings.is_empty());
    assert_eq!(font.summary.glyph_count, 3);
}

#[test]
fn filled_square_is_one_region_and_one_contour() {
    let mut img = white(64, 64);
    ink(&mut img, 10, 10, 50, 50);
    let sheet = SourceBitmap::from_luma(img).unwrap();

    let regions = detect(&sheet, 0, &TracingSettings::default(), &DetectionParams::default());
    assert_eq!(regions.len(), 1);
    let img2font::Boundary::Rect(bounds) = &regions[0].boundary else {
        panic!("detected regions are rectangles");
    };
    for (got, want) in [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y].into_iter().zip([10, 10, 50, 50]) {
        assert!(got.abs_diff(want) <= 1, "{bounds}");
    }

    let traced = trace_bitmap(&sheet, &TracingSettings::default()).unwrap();
    assert_eq!(traced.contour_count(), 1);
    assert!(traced.path_data.trim_end().ends_with('z'));

    // A square normalised to the cap height is 700 x 700.
    let normalized = normalize_outline(&traced.outline, NormalizeTarget::cap_height(1000), YAxis::Down);
    let area = normalized.outline.area().abs();
    let expected = 700.0 * 700.0;
    assert!((area - expected).abs() / expected < 0.05, "area {area}");
}

#[test]
fn reference_glyphs_set_cap_and_x_height() {
    let glyphs = [
        ('H', rect_outline(0.0, 0.0, 500.0, 700.0)),
        ('I', rect_outline(0.0, 0.0, 100.0, 700.0)),
        ('L', rect_outline(0.0, 0.0, 400.0, 700.0)),
        ('x', rect_outline(0.0, 0.0, 400.0, 500.0)),
        ('z', rect_outline(0.0, 0.0, 400.0, 500.0)),
    ];
    let metrics = TypefaceMetrics::compute(glyphs.iter().map(|(c, o)| (*c, o)), 1000);
    assert_eq!(metrics.cap_height, 700.0);
    assert_eq!(metrics.x_height, 500.0);
}

#[test]
fn dot_and_stem_merge_into_one_region() {
    let mut binary = GrayImage::new(100, 100);
    let mut fill = |x0: u32, y0: u32, x1: u32, y1: u32| {
        for y in y0..=y1 {
            for x in x0..=x1 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }
    };
    fill(20, 10, 25, 15); // dot
    fill(20, 20, 25, 49); // stem
    let found = detect_regions(&binary, &DetectionParams::default());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].bounds, PixelBox { min_x: 20, min_y: 10, max_x: 25, max_y: 49 });
}

#[test]
fn empty_character_set_still_encodes() {
    let font = generate(&GenerationRequest::default()).unwrap();
    assert_eq!(font.summary.glyph_count, 2);
    assert_eq!(font.summary.kerning_pairs, 0);

    let face = ttf_parser::Face::parse(&font.data, 0).unwrap();
    assert_eq!(face.number_of_glyphs(), 2);
    assert_eq!(face.glyph_index(' '), Some(ttf_parser::GlyphId(1)));
    assert_eq!(face.units_per_em(), 1000);
}

#[test]
fn tracing_is_idempotent() {
    let mut img = white(80, 80);
    ink(&mut img, 10, 10, 60, 20);
    ink(&mut img, 30, 10, 40, 70);
    ink(&mut img, 50, 50, 70, 75);
    let sheet = SourceBitmap::from_luma(img).unwrap();
    let settings = TracingSettings::default();

    let first = trace_bitmap(&sheet, &settings).unwrap();
    let second = trace_bitmap(&sheet, &settings).unwrap();
    assert!(!first.path_data.is_empty());
    assert_eq!(first.path_data, second.path_data);
}

#[test]
fn identical_requests_give_identical_fonts() {
    let mut img = white(120, 60);
    ink(&mut img, 10, 10, 40, 50);
    ink(&mut img, 70, 20, 100, 50);
    let request = GenerationRequest {
        bitmaps: vec![SourceBitmap::from_luma(img).unwrap()],
        regions: vec![
            CharacterRegion::rect("H", 0, PixelBox { min_x: 5, min_y: 5, max_x: 45, max_y: 55 }, 'H'),
            CharacterRegion::rect("o", 0, PixelBox { min_x: 65, min_y: 5, max_x: 105, max_y: 55 }, 'o'),
        ],
        ..GenerationRequest::default()
    };
    let a = generate(&request).unwrap();
    let b = generate(&request).unwrap();
    assert_eq!(a.data, b.data);
}

/// Signed shoelace area per contour, y-up.
#[derive(Default)]
struct ContourAreas {
    areas: Vec<f64>,
    points: Vec<(f64, f64)>,
}

impl ContourAreas {
    fn push(&mut self, x: f32, y: f32) {
        self.points.push((f64::from(x), f64::from(y)));
    }
}

impl ttf_parser::OutlineBuilder for ContourAreas {
    fn move_to(&mut self, x: f32, y: f32) {
        self.points.clear();
        self.push(x, y);
    }
    fn line_to(&mut self, x: f32, y: f32) {
        self.push(x, y);
    }
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.push(x1, y1);
        self.push(x, y);
    }
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.push(x1, y1);
        self.push(x2, y2);
        self.push(x, y);
    }
    fn close(&mut self) {
        let n = self.points.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 * y1 - x1 * y0
            })
            .sum();
        self.areas.push(twice / 2.0);
    }
}

#[test]
fn ring_counter_stays_open_in_the_font() {
    let mut img = white(100, 100);
    ink(&mut img, 10, 10, 89, 89);
    for y in 30..=69 {
        for x in 30..=69 {
            img.put_pixel(x, y, Luma([255]));
        }
    }
    let whole = PixelBox { min_x: 0, min_y: 0, max_x: 99, max_y: 99 };

    for format in [OutputFormat::TrueType, OutputFormat::OpenTypeCff] {
        let request = GenerationRequest {
            bitmaps: vec![SourceBitmap::from_luma(img.clone()).unwrap()],
            regions: vec![CharacterRegion::rect("O", 0, whole, 'O')],
            options: GenerationOptions { format, ..GenerationOptions::default() },
            ..GenerationRequest::default()
        };
        let font = generate(&request).unwrap();
        assert_eq!(font.summary.glyphs[0].status, GlyphStatus::Traced { contours: 2 });

        let face = ttf_parser::Face::parse(&font.data, 0).unwrap();
        let gid = face.glyph_index('O').unwrap();
        let mut contours = ContourAreas::default();
        face.outline_glyph(gid, &mut contours).unwrap();
        let mut areas = contours.areas;
        assert_eq!(areas.len(), 2, "{format:?}");
        areas.sort_by(|a, b| b.abs().total_cmp(&a.abs()));
        // Opposite windings: the counter is subtracted, not filled.
        assert!(areas[0] * areas[1] < 0.0, "{format:?} {areas:?}");
        // glyf outlines run clockwise, CFF counter-clockwise.
        match format {
            OutputFormat::TrueType => assert!(areas[0] < 0.0),
            _ => assert!(areas[0] > 0.0),
        }
        // 80 px square less a 40 px counter: three quarters of the outer area.
        let ratio = 1.0 - areas[1].abs() / areas[0].abs();
        assert!((ratio - 0.75).abs() < 0.05, "{format:?} {ratio}");
    }
}

#[test]
fn glyph_too_wide_for_the_font_is_skipped() {
    let mut img = white(500, 60);
    ink(&mut img, 20, 10, 29, 49); // I
    ink(&mut img, 60, 40, 459, 47); // 400 x 8 underscore
    let request = GenerationRequest {
        bitmaps: vec![SourceBitmap::from_luma(img).unwrap()],
        regions: vec![
            CharacterRegion::rect("I", 0, PixelBox { min_x: 15, min_y: 5, max_x: 35, max_y: 55 }, 'I'),
            CharacterRegion::rect("_", 0, PixelBox { min_x: 55, min_y: 5, max_x: 470, max_y: 55 }, '_'),
        ],
        ..GenerationRequest::default()
    };
    let font = generate(&request).unwrap();
    assert!(matches!(font.summary.glyphs[0].status, GlyphStatus::Traced { .. }));
    assert!(matches!(font.summary.glyphs[1].status, GlyphStatus::Skipped { .. }));
    assert_eq!(font.summary.glyph_count, 3);

    let face = ttf_parser::Face::parse(&font.data, 0).unwrap();
    assert!(face.glyph_index('I').is_some());
    assert_eq!(face.glyph_index('_'), None);
}
