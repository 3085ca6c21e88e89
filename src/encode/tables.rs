//! The fixed-layout tables shared by both outline flavours.

use super::sfnt::{search_params, Writer};
use super::{fword, BBox};
use crate::assemble::FontDocument;
use crate::config::FontMetadata;
use crate::error::FontError;

/// Seconds between 1904-01-01 (sfnt epoch) and 1970-01-01.
const SFNT_EPOCH_OFFSET: i64 = 2_082_844_800;
const HEAD_MAGIC: u32 = 0x5F0F_3CF5;
/// Windows, Unicode BMP, US English.
const NAME_PLATFORM: (u16, u16, u16) = (3, 1, 0x0409);
/// Pairs that fit one format 0 subtable (16-bit length).
const MAX_KERN_PAIRS: usize = (u16::MAX as usize - 14) / 6;

/// Font-wide values derived from the encoded glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSummary {
    pub units_per_em: u16,
    pub num_glyphs: u16,
    pub bbox: BBox,
    pub advance_max: u16,
    pub avg_advance: i16,
    pub min_lsb: i16,
    pub min_rsb: i16,
    pub x_max_extent: i16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub x_height: i16,
    pub cap_height: i16,
    pub first_char: u16,
    pub last_char: u16,
    pub bold: bool,
    pub italic: bool,
}

impl FontSummary {
    pub fn new(doc: &FontDocument, advances: &[u16], bounds: &[Option<BBox>]) -> Result<Self, FontError> {
        let m = &doc.metrics;
        let inked: Vec<(u16, BBox)> = advances
            .iter()
            .zip(bounds)
            .filter_map(|(&adv, b)| b.map(|b| (adv, b)))
            .collect();
        let min_of = |f: &dyn Fn(&(u16, BBox)) -> i32| inked.iter().map(f).min().unwrap_or(0);
        let clamp16 = |v: i32| v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        let nonzero: Vec<u32> = advances.iter().filter(|&&a| a > 0).map(|&a| u32::from(a)).collect();
        let avg_advance = if nonzero.is_empty() {
            0
        } else {
            (nonzero.iter().sum::<u32>() as f64 / nonzero.len() as f64).round() as i32
        };
        let style = doc.metadata.style.to_ascii_lowercase();
        let bmp = |ch: &char| (*ch as u32).min(0xFFFF) as u16;

        Ok(Self {
            units_per_em: m.units_per_em,
            num_glyphs: advances.len() as u16,
            bbox: bounds.iter().flatten().copied().reduce(BBox::union).unwrap_or_default(),
            advance_max: advances.iter().copied().max().unwrap_or(0),
            avg_advance: clamp16(avg_advance),
            min_lsb: clamp16(min_of(&|(_, b)| i32::from(b.x_min))),
            min_rsb: clamp16(min_of(&|(adv, b)| i32::from(*adv) - i32::from(b.x_max))),
            x_max_extent: clamp16(inked.iter().map(|(_, b)| i32::from(b.x_max)).max().unwrap_or(0)),
            ascender: fword(m.ascender, "ascender")?,
            descender: fword(m.descender, "descender")?,
            line_gap: fword(m.line_gap, "line gap")?,
            x_height: fword(m.x_height, "x-height")?,
            cap_height: fword(m.cap_height, "cap height")?,
            first_char: doc.cmap.keys().next().map(bmp).unwrap_or(0),
            last_char: doc.cmap.keys().next_back().map(bmp).unwrap_or(0),
            bold: style.contains("bold"),
            italic: style.contains("italic") || style.contains("oblique"),
        })
    }

    fn em_fraction(&self, f: f64) -> i16 {
        (f64::from(self.units_per_em) * f).round() as i16
    }
}

/// `fontRevision` as 16.16 fixed from a "1.000"-style version string.
fn font_revision(version: &str) -> i32 {
    let numeric: String = version
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value = numeric.parse::<f64>().unwrap_or(1.0);
    (value * 65536.0).round() as i32
}

pub fn head(doc: &FontDocument, s: &FontSummary, long_loca: bool) -> Vec<u8> {
    let timestamp = doc.metadata.created.saturating_add(SFNT_EPOCH_OFFSET);
    let mut w = Writer::new();
    w.u32(0x0001_0000);
    w.i32(font_revision(&doc.metadata.version));
    w.u32(0); // checkSumAdjustment, patched by the sfnt writer
    w.u32(HEAD_MAGIC);
    // Baseline at y=0, left sidebearing at x=0, integer scaling.
    w.u16(0b1011);
    w.u16(s.units_per_em);
    w.i64(timestamp);
    w.i64(timestamp);
    w.i16(s.bbox.x_min);
    w.i16(s.bbox.y_min);
    w.i16(s.bbox.x_max);
    w.i16(s.bbox.y_max);
    w.u16(u16::from(s.bold) | (u16::from(s.italic) << 1));
    w.u16(8); // lowestRecPPEM
    w.i16(2); // fontDirectionHint
    w.i16(i16::from(long_loca));
    w.i16(0); // glyphDataFormat
    w.into_inner()
}

pub fn hhea(s: &FontSummary) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x0001_0000);
    w.i16(s.ascender);
    w.i16(s.descender);
    w.i16(s.line_gap);
    w.u16(s.advance_max);
    w.i16(s.min_lsb);
    w.i16(s.min_rsb);
    w.i16(s.x_max_extent);
    w.i16(1); // caretSlopeRise
    w.i16(0); // caretSlopeRun
    w.i16(0); // caretOffset
    for _ in 0..4 {
        w.i16(0);
    }
    w.i16(0); // metricDataFormat
    w.u16(s.num_glyphs);
    w.into_inner()
}

pub fn maxp_truetype(num_glyphs: u16, max_points: u16, max_contours: u16) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x0001_0000);
    w.u16(num_glyphs);
    w.u16(max_points);
    w.u16(max_contours);
    w.u16(0); // maxCompositePoints
    w.u16(0); // maxCompositeContours
    w.u16(2); // maxZones
    for _ in 0..8 {
        // twilight points, storage, function/instruction defs, stack,
        // instruction size, component elements and depth: no hinting.
        w.u16(0);
    }
    w.into_inner()
}

pub fn maxp_cff(num_glyphs: u16) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x0000_5000);
    w.u16(num_glyphs);
    w.into_inner()
}

pub fn os2(doc: &FontDocument, s: &FontSummary) -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(4);
    w.i16(s.avg_advance);
    w.u16(if s.bold { 700 } else { 400 });
    w.u16(5); // usWidthClass: medium
    w.u16(0); // fsType: installable
    // Subscript and superscript: size x, size y, offset x, offset y.
    for f in [0.65, 0.60, 0.0, 0.075, 0.65, 0.60, 0.0, 0.35] {
        w.i16(s.em_fraction(f));
    }
    w.i16(s.em_fraction(0.05)); // yStrikeoutSize
    w.i16((f64::from(s.x_height) / 2.0).round() as i16);
    w.i16(0); // sFamilyClass
    w.bytes(&[0; 10]); // panose

    let basic_latin = doc.cmap.keys().any(|&c| c != ' ' && c.is_ascii());
    let latin1 = doc.cmap.keys().any(|&c| ('\u{80}'..='\u{FF}').contains(&c));
    w.u32(u32::from(basic_latin) | (u32::from(latin1) << 1));
    w.u32(0);
    w.u32(0);
    w.u32(0);
    w.tag(*b"NONE");

    let mut selection = 0u16;
    if s.italic {
        selection |= 0x0001;
    }
    if s.bold {
        selection |= 0x0020;
    }
    if !s.italic && !s.bold {
        selection |= 0x0040;
    }
    selection |= 0x0080; // USE_TYPO_METRICS
    w.u16(selection);
    w.u16(s.first_char);
    w.u16(s.last_char);
    w.i16(s.ascender);
    w.i16(s.descender);
    w.i16(s.line_gap);
    w.u16(s.ascender.max(s.bbox.y_max).max(0) as u16);
    w.u16((-i32::from(s.descender.min(s.bbox.y_min))).max(0) as u16);
    w.u32(1); // ulCodePageRange1: Latin 1
    w.u32(0);
    w.i16(s.x_height);
    w.i16(s.cap_height);
    w.u16(0); // usDefaultChar
    w.u16(0x20); // usBreakChar
    w.u16(if doc.kerning.is_empty() { 1 } else { 2 });
    w.into_inner()
}

/// One full metric per glyph; the left side bearing is the ink's xMin.
pub fn hmtx(advances: &[u16], bounds: &[Option<BBox>]) -> Vec<u8> {
    let mut w = Writer::new();
    for (&advance, b) in advances.iter().zip(bounds) {
        w.u16(advance);
        w.i16(b.map_or(0, |b| b.x_min));
    }
    w.into_inner()
}

pub fn name(meta: &FontMetadata) -> Result<Vec<u8>, FontError> {
    let ps_name = meta.postscript_name();
    let version = format!("Version {}", meta.version);
    let unique = format!("{};{}", meta.version, ps_name);
    let full_name = meta.full_name();
    let entries: Vec<(u16, &str)> = [
        (0, meta.copyright.as_deref()),
        (1, Some(meta.family.as_str())),
        (2, Some(meta.style.as_str())),
        (3, Some(unique.as_str())),
        (4, Some(full_name.as_str())),
        (5, Some(version.as_str())),
        (6, Some(ps_name.as_str())),
        (8, meta.author.as_deref()),
        (9, meta.author.as_deref()),
        (10, meta.description.as_deref()),
    ]
    .into_iter()
    .filter_map(|(id, text)| text.filter(|t| !t.is_empty()).map(|t| (id, t)))
    .collect();

    let mut storage = Writer::new();
    let mut records = Writer::new();
    for &(id, text) in &entries {
        let encoded: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        let too_long = || FontError::EncodingConsistency(format!("name {id} is too long"));
        let length = u16::try_from(encoded.len()).map_err(|_| too_long())?;
        let offset = u16::try_from(storage.len()).map_err(|_| too_long())?;
        records.u16(NAME_PLATFORM.0);
        records.u16(NAME_PLATFORM.1);
        records.u16(NAME_PLATFORM.2);
        records.u16(id);
        records.u16(length);
        records.u16(offset);
        storage.bytes(&encoded);
    }

    let mut w = Writer::new();
    w.u16(0);
    w.u16(entries.len() as u16);
    w.u16((6 + 12 * entries.len()) as u16);
    w.bytes(&records.into_inner());
    w.bytes(&storage.into_inner());
    Ok(w.into_inner())
}

/// Version 3: no glyph names.
pub fn post(s: &FontSummary) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(0x0003_0000);
    w.i32(0); // italicAngle
    w.i16(s.em_fraction(-0.1));
    w.i16(s.em_fraction(0.05));
    w.u32(0); // isFixedPitch
    for _ in 0..4 {
        w.u32(0);
    }
    w.into_inner()
}

/// Legacy `kern` table with one format 0 subtable, or `None` when there
/// is nothing to kern.
pub fn kern(doc: &FontDocument) -> Result<Option<Vec<u8>>, FontError> {
    let mut pairs: Vec<(u16, u16, i16)> = Vec::with_capacity(doc.kerning.len());
    for pair in &doc.kerning {
        let (Some(left), Some(right)) = (doc.glyph_index(pair.left), doc.glyph_index(pair.right)) else {
            continue;
        };
        let value = fword(pair.value, "kerning value")?;
        if value != 0 {
            pairs.push((left, right, value));
        }
    }
    if pairs.is_empty() {
        return Ok(None);
    }
    pairs.sort_by_key(|&(l, r, _)| (l, r));
    pairs.dedup_by_key(|p| (p.0, p.1));
    if pairs.len() > MAX_KERN_PAIRS {
        tracing::warn!(pairs = pairs.len(), kept = MAX_KERN_PAIRS, "kern table truncated");
        pairs.truncate(MAX_KERN_PAIRS);
    }

    let n = pairs.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(n, 6);
    let mut w = Writer::new();
    w.u16(0); // version
    w.u16(1); // nTables
    w.u16(0); // subtable version
    w.u16(14 + 6 * n);
    w.u16(0x0001); // horizontal, format 0
    w.u16(n);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(range_shift);
    for (left, right, value) in pairs {
        w.u16(left);
        w.u16(right);
        w.i16(value);
    }
    Ok(Some(w.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontAdjustments;
    use crate::metrics::{KerningPair, TypefaceMetrics};

    fn doc() -> FontDocument {
        FontDocument::new(
            FontMetadata::default(),
            &[],
            TypefaceMetrics::nominal(1000),
            &FontAdjustments::default(),
        )
    }

    fn summary(doc: &FontDocument) -> FontSummary {
        let advances = vec![500, 250];
        FontSummary::new(doc, &advances, &[None, None]).unwrap()
    }

    #[test]
    fn fixed_layout_sizes() {
        let d = doc();
        let s = summary(&d);
        assert_eq!(head(&d, &s, false).len(), 54);
        assert_eq!(hhea(&s).len(), 36);
        assert_eq!(maxp_truetype(2, 0, 0).len(), 32);
        assert_eq!(maxp_cff(2).len(), 6);
        assert_eq!(os2(&d, &s).len(), 96);
        assert_eq!(post(&s).len(), 32);
        assert_eq!(hmtx(&[500, 250], &[None, None]).len(), 8);
    }

    #[test]
    fn revision_parses_version_strings() {
        assert_eq!(font_revision("1.000"), 0x0001_0000);
        assert_eq!(font_revision("Version 2.5"), 0x0002_8000);
        assert_eq!(font_revision("draft"), 0x0001_0000);
    }

    #[test]
    fn summary_uses_metrics() {
        let d = doc();
        let s = summary(&d);
        assert_eq!(s.ascender, 735);
        assert_eq!(s.descender, -250);
        assert_eq!(s.advance_max, 500);
        assert_eq!(s.first_char, 0x20);
    }

    #[test]
    fn name_skips_missing_entries() {
        let table = name(&FontMetadata::default()).unwrap();
        let count = u16::from_be_bytes([table[2], table[3]]);
        // family, style, unique id, full name, version, PostScript name
        assert_eq!(count, 6);
    }

    #[test]
    fn kern_pairs_are_sorted_by_glyph() {
        let mut d = doc();
        d.cmap.insert('A', 2);
        d.cmap.insert('V', 3);
        d.kerning = vec![
            KerningPair { left: 'V', right: 'A', value: -80.0 },
            KerningPair { left: 'A', right: 'V', value: -80.0 },
            KerningPair { left: 'A', right: 'Q', value: -10.0 },
        ];
        let table = kern(&d).unwrap().unwrap();
        assert_eq!(u16::from_be_bytes([table[10], table[11]]), 2);
        assert_eq!(u16::from_be_bytes([table[18], table[19]]), 2);
        assert_eq!(u16::from_be_bytes([table[20], table[21]]), 3);
        assert!(kern(&doc()).unwrap().is_none());
    }
}
