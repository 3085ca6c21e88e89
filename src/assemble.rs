//! Glyph records: outlines placed inside their advance widths.

use std::collections::{BTreeMap, BTreeSet};

use kurbo::Affine;

use crate::config::{FontAdjustments, FontMetadata};
use crate::metrics::{kerning_pairs, KerningPair, TypefaceMetrics};
use crate::outline::GlyphOutline;

/// No glyph advances by less than this.
pub const MIN_ADVANCE: f64 = 100.0;
/// Per-character offsets are clamped to +/- this many units.
pub const MAX_OFFSET: f64 = 50.0;

pub const NOTDEF: &str = ".notdef";
pub const SPACE: &str = "space";
/// Largest coordinate magnitude a glyph may use. Keeps every point,
/// and the delta between any two points, inside a 16-bit field.
pub const MAX_COORDINATE: f64 = 16383.0;
/// Character code carried by `.notdef`.
pub const NOTDEF_CODE: char = '\0';

/// One glyph of the finished font.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRecord {
    pub name: String,
    /// Code 0 for `.notdef`. It stays out of the cmap: unmapped
    /// characters fall back to glyph 0 on their own.
    pub codepoint: char,
    /// Final outline in font units, baseline at y = 0.
    pub outline: GlyphOutline,
    pub advance_width: f64,
    pub left_side_bearing: f64,
    pub right_side_bearing: f64,
    /// Manual (x, y) offset after clamping.
    pub offset: (f64, f64),
}

impl GlyphRecord {
    fn blank(name: &str, codepoint: char, advance: f64) -> Self {
        Self {
            name: name.to_string(),
            codepoint,
            outline: GlyphOutline::empty(),
            advance_width: advance.max(MIN_ADVANCE),
            left_side_bearing: 0.0,
            right_side_bearing: 0.0,
            offset: (0.0, 0.0),
        }
    }

    /// Points, bearings and advance all fit the encoded font's fields.
    pub fn fits_font_units(&self) -> bool {
        let within = |v: f64| v.is_finite() && v.abs() <= MAX_COORDINATE;
        let outline = self
            .outline
            .control_bounds()
            .map_or(true, |b| [b.x0, b.y0, b.x1, b.y1].into_iter().all(within));
        outline && within(self.advance_width) && within(self.left_side_bearing) && within(self.right_side_bearing)
    }
}

/// PostScript-style glyph name for a code point.
pub fn glyph_name(ch: char) -> String {
    let cp = ch as u32;
    if cp <= 0xFFFF {
        format!("uni{cp:04X}")
    } else {
        format!("u{cp:05X}")
    }
}

/// Build glyph records: `.notdef` first, `space` second, then one per
/// mapped character in input order.
///
/// Returns the records and the code point → glyph index map. Duplicate
/// code points and explicit mappings of code 0 or space are skipped.
pub fn assemble(
    glyphs: &[(char, GlyphOutline)],
    metrics: &TypefaceMetrics,
    adjustments: &FontAdjustments,
) -> (Vec<GlyphRecord>, BTreeMap<char, u16>) {
    let em = metrics.units_per_em as f64;
    let word_spacing = adjustments.word_spacing.unwrap_or(metrics.word_spacing);

    let mut records = vec![
        GlyphRecord::blank(NOTDEF, NOTDEF_CODE, 0.5 * em),
        GlyphRecord::blank(SPACE, ' ', word_spacing),
    ];
    let mut cmap = BTreeMap::from([(' ', 1u16)]);

    for (ch, outline) in glyphs {
        if *ch == NOTDEF_CODE || cmap.contains_key(ch) {
            tracing::warn!(codepoint = %ch.escape_unicode(), "duplicate or reserved mapping skipped");
            continue;
        }
        let Ok(index) = u16::try_from(records.len()) else {
            tracing::warn!("glyph index space exhausted; remaining glyphs dropped");
            break;
        };
        records.push(place(*ch, outline, metrics, adjustments));
        cmap.insert(*ch, index);
    }

    (records, cmap)
}

/// Compute spacing for one glyph and move its outline into place.
fn place(ch: char, outline: &GlyphOutline, metrics: &TypefaceMetrics, adj: &FontAdjustments) -> GlyphRecord {
    let bounds = outline.bounds();
    let (ink_left, width) = bounds.map_or((0.0, 0.0), |b| (b.x0, b.width()));

    let (mut lsb, mut rsb) = metrics.side_bearings(ch, width);
    lsb += adj.letter_spacing / 2.0;
    rsb += adj.letter_spacing / 2.0;

    let natural = width + lsb + rsb;
    let scaled = natural * adj.char_width_percent / 100.0;
    let delta = scaled - natural;
    lsb += delta / 2.0;
    rsb += delta / 2.0;

    let mut advance = width + lsb + rsb;
    if advance < MIN_ADVANCE {
        let pad = (MIN_ADVANCE - advance) / 2.0;
        lsb += pad;
        rsb += pad;
        advance = MIN_ADVANCE;
    }

    let offset = adj
        .positions
        .get(&ch)
        .map(|&(x, y)| (x.clamp(-MAX_OFFSET, MAX_OFFSET), y.clamp(-MAX_OFFSET, MAX_OFFSET)))
        .unwrap_or((0.0, 0.0));

    let placed = if outline.is_empty() {
        GlyphOutline::empty()
    } else {
        outline.transformed(Affine::translate((
            lsb + offset.0 - ink_left,
            offset.1 + adj.baseline_offset,
        )))
    };

    GlyphRecord {
        name: glyph_name(ch),
        codepoint: ch,
        outline: placed,
        advance_width: advance,
        left_side_bearing: lsb,
        right_side_bearing: rsb,
        offset,
    }
}

/// Everything the encoder needs, assembled once and consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDocument {
    pub metadata: FontMetadata,
    pub glyphs: Vec<GlyphRecord>,
    pub cmap: BTreeMap<char, u16>,
    pub metrics: TypefaceMetrics,
    pub kerning: Vec<KerningPair>,
}

impl FontDocument {
    pub fn new(
        metadata: FontMetadata,
        glyphs: &[(char, GlyphOutline)],
        metrics: TypefaceMetrics,
        adjustments: &FontAdjustments,
    ) -> Self {
        let (records, cmap) = assemble(glyphs, &metrics, adjustments);
        let chars: BTreeSet<char> = cmap.keys().copied().collect();
        let kerning = kerning_pairs(&chars, metrics.units_per_em, &adjustments.kerning);
        let metrics = TypefaceMetrics {
            word_spacing: records[1].advance_width,
            ..metrics
        };
        tracing::info!(glyphs = records.len(), kerning = kerning.len(), "assembled font");
        Self {
            metadata,
            glyphs: records,
            cmap,
            metrics,
            kerning,
        }
    }

    pub fn glyph_index(&self, ch: char) -> Option<u16> {
        self.cmap.get(&ch).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::PathCommand;
    use kurbo::Point;

    fn rect(x0: f64, x1: f64, y1: f64) -> GlyphOutline {
        GlyphOutline::from_commands(vec![
            PathCommand::MoveTo(Point::new(x0, 0.0)),
            PathCommand::LineTo(Point::new(x1, 0.0)),
            PathCommand::LineTo(Point::new(x1, y1)),
            PathCommand::LineTo(Point::new(x0, y1)),
            PathCommand::Close,
        ])
    }

    fn metrics() -> TypefaceMetrics {
        TypefaceMetrics::nominal(1000)
    }

    #[test]
    fn notdef_and_space_come_first() {
        let (records, cmap) = assemble(&[('A', rect(0.0, 500.0, 700.0))], &metrics(), &FontAdjustments::default());
        assert_eq!(records[0].name, NOTDEF);
        assert_eq!(records[1].name, SPACE);
        assert!((records[1].advance_width - 250.0).abs() < 1e-9);
        assert_eq!(records[0].codepoint, NOTDEF_CODE);
        assert!(records[0].outline.is_empty());
        assert_eq!(records[1].codepoint, ' ');
        assert_eq!(records[2].name, "uni0041");
        assert!(!cmap.contains_key(&NOTDEF_CODE));
        assert_eq!(cmap[&' '], 1);
        assert_eq!(cmap[&'A'], 2);
    }

    #[test]
    fn blank_glyph_gets_floor_advance() {
        let (records, _) = assemble(&[('a', GlyphOutline::empty())], &metrics(), &FontAdjustments::default());
        assert_eq!(records[2].advance_width, MIN_ADVANCE);
        assert!(records[2].outline.is_empty());
    }

    #[test]
    fn advance_is_width_plus_bearings() {
        let (records, _) = assemble(&[('H', rect(30.0, 530.0, 700.0))], &metrics(), &FontAdjustments::default());
        let h = &records[2];
        assert!((h.advance_width - 550.0).abs() < 1e-9);
        let b = h.outline.bounds().unwrap();
        assert!((b.x0 - 25.0).abs() < 1e-9);
        assert!((b.x1 - 525.0).abs() < 1e-9);
    }

    #[test]
    fn adjustments_apply_in_order() {
        let mut adj = FontAdjustments {
            letter_spacing: 50.0,
            char_width_percent: 50.0,
            baseline_offset: -10.0,
            ..FontAdjustments::default()
        };
        adj.positions.insert('H', (80.0, -5.0));
        let (records, _) = assemble(&[('H', rect(0.0, 500.0, 700.0))], &metrics(), &adj);
        let h = &records[2];
        // (500 + 25 + 25 + 50) * 0.5 = 300, still above the floor.
        assert!((h.advance_width - 300.0).abs() < 1e-9);
        assert_eq!(h.offset, (50.0, -5.0));
        let b = h.outline.bounds().unwrap();
        assert!((b.y0 + 15.0).abs() < 1e-9);
        assert!((b.x0 - (h.left_side_bearing + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn duplicates_and_space_mappings_are_skipped() {
        let glyphs = vec![
            ('A', rect(0.0, 100.0, 700.0)),
            (' ', rect(0.0, 100.0, 700.0)),
            ('A', rect(0.0, 300.0, 700.0)),
            (NOTDEF_CODE, rect(0.0, 300.0, 700.0)),
        ];
        let (records, cmap) = assemble(&glyphs, &metrics(), &FontAdjustments::default());
        assert_eq!(records.len(), 3);
        assert!(records[0].outline.is_empty());
        assert_eq!(cmap.len(), 2);
    }

    #[test]
    fn document_kerning_uses_mapped_characters() {
        let glyphs = vec![('A', rect(0.0, 500.0, 700.0)), ('V', rect(0.0, 500.0, 700.0))];
        let doc = FontDocument::new(FontMetadata::default(), &glyphs, metrics(), &FontAdjustments::default());
        assert_eq!(doc.glyphs.len(), 4);
        assert_eq!(doc.glyph_index('V'), Some(3));
        assert!(doc.kerning.iter().any(|k| k.left == 'A' && k.right == 'V'));
        assert!(doc
            .kerning
            .iter()
            .all(|k| doc.cmap.contains_key(&k.left) && doc.cmap.contains_key(&k.right)));
    }

    #[test]
    fn oversized_outlines_do_not_fit() {
        let (records, _) = assemble(
            &[('I', rect(0.0, 100.0, 700.0)), ('_', rect(0.0, 35000.0, 640.0))],
            &metrics(),
            &FontAdjustments::default(),
        );
        assert!(records[2].fits_font_units());
        assert!(!records[3].fits_font_units());
    }

    #[test]
    fn names_cover_supplementary_planes() {
        assert_eq!(glyph_name('é'), "uni00E9");
        assert_eq!(glyph_name('😀'), "u1F600");
    }
}
