//! Typeface-wide metrics, spacing rules and kerning.
//!
//! Everything here is derived once per request from the complete set
//! of normalised outlines and is read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::normalize::NormalizeTarget;
use crate::outline::GlyphOutline;

const CAP_HEIGHT_REFS: &[char] = &['H', 'I', 'L', 'E', 'F'];
const X_HEIGHT_REFS: &[char] = &['x', 'z', 'v', 'w', 'r', 's'];
const ASCENDER_REFS: &[char] = &['h', 'd', 'l', 'b', 'k', 't', 'f'];
const DESCENDER_REFS: &[char] = &['g', 'p', 'q', 'y', 'j'];

/// Glyphs drawn past the flat reference lines by the overshoot.
const ROUND: &[char] = &[
    'O', 'o', 'C', 'c', 'G', 'g', 'Q', 'q', 'D', 'd', 'S', 's', '0', '6', '8', '9',
];
const NARROW: &[char] = &['i', 'l', 'I', 'J', 'f', 't', '1'];
/// Open on the right: the right bearing is widened.
const OPEN_RIGHT: &[char] = &['F', 'I', 'T'];

const NARROW_BEARING: f64 = 0.02;
const ROUND_BEARING: f64 = 0.07;
const DEFAULT_BEARING: f64 = 0.05;
const OPEN_RIGHT_FACTOR: f64 = 1.5;
const MIN_BEARING: f64 = 5.0;
const MAX_BEARING: f64 = 40.0;

/// Kerning at 1000 units per em, scaled to the actual em.
const KERNING_PATTERNS: &[(&str, f64)] = &[
    ("AV", -80.0),
    ("VA", -80.0),
    ("AW", -60.0),
    ("WA", -60.0),
    ("AY", -70.0),
    ("YA", -70.0),
    ("AT", -60.0),
    ("TA", -60.0),
    ("LT", -70.0),
    ("LV", -70.0),
    ("LW", -50.0),
    ("LY", -70.0),
    ("PA", -50.0),
    ("FA", -40.0),
    ("To", -40.0),
    ("Ta", -40.0),
    ("Te", -40.0),
    ("Tr", -30.0),
    ("Tu", -30.0),
    ("Ty", -30.0),
    ("Va", -40.0),
    ("Ve", -30.0),
    ("Vo", -30.0),
    ("Wa", -30.0),
    ("We", -20.0),
    ("Wo", -20.0),
    ("Ya", -50.0),
    ("Ye", -50.0),
    ("Yo", -50.0),
    ("Fa", -30.0),
    ("Fo", -20.0),
    ("Pa", -30.0),
    ("Po", -30.0),
    ("av", -20.0),
    ("va", -20.0),
    ("aw", -15.0),
    ("wa", -15.0),
    ("ov", -15.0),
    ("vo", -15.0),
    ("ow", -10.0),
    ("wo", -10.0),
    ("oy", -15.0),
    ("yo", -15.0),
    ("T.", -60.0),
    ("T,", -60.0),
    ("V.", -60.0),
    ("V,", -60.0),
    ("Y.", -60.0),
    ("Y,", -60.0),
    ("P.", -60.0),
    ("P,", -60.0),
    ("F.", -50.0),
    ("F,", -50.0),
    ("r.", -40.0),
    ("r,", -40.0),
    ("y.", -30.0),
    ("y,", -30.0),
];

/// Vertical metrics and spacing defaults for one typeface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypefaceMetrics {
    pub units_per_em: u16,
    pub ascender: f64,
    /// Negative: below the baseline.
    pub descender: f64,
    pub cap_height: f64,
    pub x_height: f64,
    pub line_gap: f64,
    pub overshoot: f64,
    pub default_side_bearing: f64,
    /// Advance of the space glyph.
    pub word_spacing: f64,
}

impl TypefaceMetrics {
    /// Metrics of an em with no reference glyphs.
    pub fn nominal(units_per_em: u16) -> Self {
        let em = units_per_em as f64;
        let cap_height = 0.70 * em;
        Self {
            units_per_em,
            ascender: 1.05 * cap_height,
            descender: -0.25 * em,
            cap_height,
            x_height: 0.70 * cap_height,
            line_gap: 0.20 * em,
            overshoot: 0.015 * em,
            default_side_bearing: (DEFAULT_BEARING * em).clamp(MIN_BEARING, MAX_BEARING),
            word_spacing: 0.25 * em,
        }
    }

    /// Measure the glyph set. Reference glyphs that are missing or blank
    /// leave the nominal value in place, so an empty set is fine.
    pub fn compute<'a>(glyphs: impl IntoIterator<Item = (char, &'a GlyphOutline)>, units_per_em: u16) -> Self {
        let bounds: BTreeMap<char, (f64, f64)> = glyphs
            .into_iter()
            .filter_map(|(ch, outline)| outline.bounds().map(|b| (ch, (b.y0, b.y1))))
            .collect();
        let y_max = |refs: &[char]| -> Vec<f64> {
            refs.iter().filter_map(|c| bounds.get(c)).map(|b| b.1).collect()
        };
        let y_min = |refs: &[char]| -> Vec<f64> {
            refs.iter().filter_map(|c| bounds.get(c)).map(|b| b.0).collect()
        };

        let mut m = Self::nominal(units_per_em);
        if let Some(cap) = mean(&y_max(CAP_HEIGHT_REFS)) {
            m.cap_height = cap;
            m.x_height = 0.70 * cap;
            m.ascender = 1.05 * cap;
        }
        if let Some(x) = mean(&y_max(X_HEIGHT_REFS)) {
            m.x_height = x;
        }
        if let Some(asc) = y_max(ASCENDER_REFS).into_iter().reduce(f64::max) {
            m.ascender = asc;
        }
        if let Some(desc) = y_min(DESCENDER_REFS).into_iter().reduce(f64::min) {
            m.descender = desc.min(0.0);
        }
        tracing::debug!(
            cap_height = m.cap_height,
            x_height = m.x_height,
            ascender = m.ascender,
            descender = m.descender,
            "typeface metrics"
        );
        m
    }

    /// Left and right side bearings for a glyph of ink width `width`.
    pub fn side_bearings(&self, ch: char, width: f64) -> (f64, f64) {
        let ratio = if NARROW.contains(&ch) {
            NARROW_BEARING
        } else if is_round(ch) {
            ROUND_BEARING
        } else {
            DEFAULT_BEARING
        };
        let base = ratio * width.max(0.0);
        let right = if OPEN_RIGHT.contains(&ch) {
            base * OPEN_RIGHT_FACTOR
        } else {
            base
        };
        (
            base.clamp(MIN_BEARING, MAX_BEARING),
            right.clamp(MIN_BEARING, MAX_BEARING),
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn is_round(ch: char) -> bool {
    ROUND.contains(&ch)
}

/// Where a glyph's ink is scaled to before the real metrics are known.
///
/// With `proportional` off every glyph fills the cap height on the
/// baseline. With it on, lowercase letters get x-height, ascender or
/// descender frames from the nominal metrics, and round glyphs reach
/// past them by the overshoot.
pub fn normalization_target(ch: char, units_per_em: u16, proportional: bool) -> NormalizeTarget {
    let m = TypefaceMetrics::nominal(units_per_em);
    if !proportional {
        return NormalizeTarget::cap_height(units_per_em);
    }
    let (bottom, top) = match ch {
        'b' | 'd' | 'f' | 'h' | 'k' | 'l' | 't' => (0.0, m.ascender),
        'g' | 'p' | 'q' | 'y' => (m.descender, m.x_height),
        'j' => (m.descender, m.cap_height),
        // Dotted: the dot sits well above the x-height.
        'i' => (0.0, m.cap_height),
        c if c.is_lowercase() => (0.0, m.x_height),
        _ => (0.0, m.cap_height),
    };
    let pad = if is_round(ch) { m.overshoot } else { 0.0 };
    NormalizeTarget {
        height: top - bottom + 2.0 * pad,
        bottom: bottom - pad,
    }
}

/// A pair adjustment in font units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KerningPair {
    pub left: char,
    pub right: char,
    pub value: f64,
}

/// Built-in pairs whose characters both exist, scaled to the em, with
/// `overrides` ("AV" → value) applied on top. A zero override removes
/// the pair. Sorted by (left, right).
pub fn kerning_pairs(chars: &BTreeSet<char>, units_per_em: u16, overrides: &BTreeMap<String, f64>) -> Vec<KerningPair> {
    let scale = units_per_em as f64 / 1000.0;
    let mut table: BTreeMap<(char, char), f64> = BTreeMap::new();

    for &(pair, value) in KERNING_PATTERNS {
        if let Some(key) = split_pair(pair) {
            table.insert(key, (value * scale).round());
        }
    }
    for (pair, &value) in overrides {
        match split_pair(pair) {
            Some(key) if value == 0.0 => {
                table.remove(&key);
            }
            Some(key) => {
                table.insert(key, value);
            }
            None => tracing::warn!(pair = %pair, "kerning override must name exactly two characters"),
        }
    }

    table
        .into_iter()
        .filter(|((l, r), _)| chars.contains(l) && chars.contains(r))
        .map(|((left, right), value)| KerningPair { left, right, value })
        .collect()
}

fn split_pair(pair: &str) -> Option<(char, char)> {
    let mut it = pair.chars();
    match (it.next(), it.next(), it.next()) {
        (Some(l), Some(r), None) => Some((l, r)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::PathCommand;
    use kurbo::Point;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn bar(y_min: f64, y_max: f64) -> GlyphOutline {
        GlyphOutline::from_commands(vec![
            PathCommand::MoveTo(Point::new(0.0, y_min)),
            PathCommand::LineTo(Point::new(100.0, y_min)),
            PathCommand::LineTo(Point::new(100.0, y_max)),
            PathCommand::LineTo(Point::new(0.0, y_max)),
            PathCommand::Close,
        ])
    }

    #[test]
    fn cap_and_x_height_from_reference_glyphs() {
        let glyphs = vec![
            ('H', bar(0.0, 700.0)),
            ('I', bar(0.0, 700.0)),
            ('L', bar(0.0, 700.0)),
            ('x', bar(0.0, 500.0)),
            ('z', bar(0.0, 500.0)),
        ];
        let m = TypefaceMetrics::compute(glyphs.iter().map(|(c, o)| (*c, o)), 1000);
        assert_eq!(m.cap_height, 700.0);
        assert_eq!(m.x_height, 500.0);
        assert!(close(m.ascender, 735.0));
        assert!(close(m.descender, -250.0));
        assert!(close(m.line_gap, 200.0));
        assert!(close(m.overshoot, 15.0));
    }

    #[test]
    fn empty_set_uses_nominal_values() {
        let m = TypefaceMetrics::compute(std::iter::empty(), 2048);
        assert_eq!(m, TypefaceMetrics::nominal(2048));
        assert!((m.cap_height - 1433.6).abs() < 1e-9);
        assert!((m.x_height - 0.49 * 2048.0).abs() < 1e-9);
    }

    #[test]
    fn descender_and_ascender_from_extremes() {
        let glyphs = vec![('g', bar(-200.0, 500.0)), ('p', bar(-240.0, 500.0)), ('h', bar(0.0, 760.0))];
        let m = TypefaceMetrics::compute(glyphs.iter().map(|(c, o)| (*c, o)), 1000);
        assert_eq!(m.descender, -240.0);
        assert_eq!(m.ascender, 760.0);
    }

    #[test]
    fn bearings_follow_glyph_class() {
        let m = TypefaceMetrics::nominal(1000);
        let check = |ch: char, width: f64, want: (f64, f64)| {
            let (l, r) = m.side_bearings(ch, width);
            assert!(close(l, want.0) && close(r, want.1), "{ch}: ({l}, {r})");
        };
        check('l', 100.0, (5.0, 5.0));
        check('O', 400.0, (28.0, 28.0));
        check('H', 500.0, (25.0, 25.0));
        check('W', 2000.0, (40.0, 40.0));
        check('T', 400.0, (20.0, 30.0));
        check('x', 0.0, (5.0, 5.0));
    }

    #[test]
    fn kerning_limited_to_present_characters() {
        let chars: BTreeSet<char> = "AVTo".chars().collect();
        let pairs = kerning_pairs(&chars, 1000, &BTreeMap::new());
        assert!(!pairs.is_empty());
        assert!(pairs.iter().all(|p| chars.contains(&p.left) && chars.contains(&p.right)));
        assert!(pairs.contains(&KerningPair { left: 'A', right: 'V', value: -80.0 }));
        assert!(pairs.contains(&KerningPair { left: 'T', right: 'o', value: -40.0 }));
    }

    #[test]
    fn kerning_overrides_and_scaling() {
        let chars: BTreeSet<char> = "AVo".chars().collect();
        let mut overrides = BTreeMap::new();
        overrides.insert("AV".to_string(), 0.0);
        overrides.insert("Vo".to_string(), -55.0);
        overrides.insert("oZ".to_string(), -10.0);
        overrides.insert("bad".to_string(), -10.0);
        let pairs = kerning_pairs(&chars, 2000, &overrides);
        assert!(pairs.iter().all(|p| !(p.left == 'A' && p.right == 'V')));
        assert!(pairs.contains(&KerningPair { left: 'V', right: 'A', value: -160.0 }));
        assert!(pairs.contains(&KerningPair { left: 'V', right: 'o', value: -55.0 }));
        assert!(pairs.iter().all(|p| p.right != 'Z'));
    }

    #[test]
    fn proportional_frames() {
        let cap = normalization_target('H', 1000, true);
        assert_eq!((cap.bottom, cap.height), (0.0, 700.0));
        let x = normalization_target('x', 1000, true);
        assert!((x.height - 490.0).abs() < 1e-9);
        let p = normalization_target('p', 1000, true);
        assert!((p.bottom + 250.0).abs() < 1e-9 && (p.height - 740.0).abs() < 1e-9);
        let o = normalization_target('o', 1000, true);
        assert!((o.bottom + 15.0).abs() < 1e-9 && (o.height - 520.0).abs() < 1e-9);
        assert_eq!(normalization_target('p', 1000, false), NormalizeTarget::cap_height(1000));
    }
}
