//! `glyf` and `loca`: quadratic TrueType outlines.

use kurbo::{BezPath, CubicBez, PathEl, Point};

use super::sfnt::Writer;
use super::{round_point, BBox};
use crate::assemble::FontDocument;
use crate::error::FontError;

/// Maximum distance (font units) between a cubic and its quadratic
/// approximation.
pub const QUAD_TOLERANCE: f64 = 0.5;

const ON_CURVE: u8 = 0x01;
const X_SHORT: u8 = 0x02;
const Y_SHORT: u8 = 0x04;
const REPEAT: u8 = 0x08;
const X_SAME_OR_POSITIVE: u8 = 0x10;
const Y_SAME_OR_POSITIVE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TtPoint {
    x: i16,
    y: i16,
    on_curve: bool,
}

/// Encoded outlines plus what `head`, `hmtx` and `maxp` need from them.
#[derive(Debug, Clone)]
pub struct GlyfData {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub long_offsets: bool,
    pub bounds: Vec<Option<BBox>>,
    pub max_points: u16,
    pub max_contours: u16,
}

/// Quadratic points of one contour, clockwise (TrueType convention),
/// or an empty list for contours that collapse when rounded.
fn contour_points(path: &BezPath) -> Result<Vec<TtPoint>, FontError> {
    let mut raw: Vec<(Point, bool)> = Vec::new();
    let mut current = Point::ZERO;
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => {
                raw.push((p, true));
                current = p;
            }
            PathEl::QuadTo(c, p) => {
                raw.push((c, false));
                raw.push((p, true));
                current = p;
            }
            PathEl::CurveTo(a, b, p) => {
                for (_, _, quad) in CubicBez::new(current, a, b, p).to_quads(QUAD_TOLERANCE) {
                    raw.push((quad.p1, false));
                    raw.push((quad.p2, true));
                }
                current = p;
            }
            PathEl::ClosePath => {}
        }
    }

    let mut points: Vec<TtPoint> = Vec::with_capacity(raw.len());
    for (p, on_curve) in raw {
        let (x, y) = round_point(p)?;
        let point = TtPoint { x, y, on_curve };
        if on_curve && points.last().is_some_and(|last| last.on_curve && last.x == x && last.y == y) {
            continue;
        }
        points.push(point);
    }
    let closes = match (points.first(), points.last()) {
        (Some(first), Some(last)) => points.len() > 1 && last.on_curve && (first.x, first.y) == (last.x, last.y),
        _ => false,
    };
    if closes {
        points.pop();
    }
    if points.len() < 3 {
        return Ok(Vec::new());
    }

    // Outer contours are counter-clockwise in the outline model.
    points[1..].reverse();
    Ok(points)
}

fn write_flags(w: &mut Writer, flags: &[u8]) {
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let repeats = flags[i + 1..]
            .iter()
            .take(255)
            .take_while(|&&f| f == flag)
            .count();
        if repeats > 0 {
            w.u8(flag | REPEAT);
            w.u8(repeats as u8);
        } else {
            w.u8(flag);
        }
        i += 1 + repeats;
    }
}

/// One coordinate delta: returns the flag bits and appends the operand.
fn delta(out: &mut Writer, d: i32, short: u8, same_or_positive: u8) -> Result<u8, FontError> {
    if d == 0 {
        return Ok(same_or_positive);
    }
    if d.abs() < 256 {
        out.u8(d.unsigned_abs() as u8);
        return Ok(if d > 0 { short | same_or_positive } else { short });
    }
    let d = i16::try_from(d)
        .map_err(|_| FontError::EncodingConsistency(format!("coordinate delta {d} out of range")))?;
    out.i16(d);
    Ok(0)
}

fn encode_glyph(contours: &[Vec<TtPoint>]) -> Result<(Vec<u8>, BBox, u16), FontError> {
    let all = contours.iter().flatten();
    let bbox = BBox::from_points(all.clone().map(|p| (p.x, p.y))).unwrap_or_default();
    let total = contours.iter().map(Vec::len).sum::<usize>();
    let total = u16::try_from(total)
        .map_err(|_| FontError::EncodingConsistency("glyph has more than 65535 points".to_string()))?;
    let count = i16::try_from(contours.len())
        .map_err(|_| FontError::EncodingConsistency("glyph has too many contours".to_string()))?;

    let mut w = Writer::new();
    w.i16(count);
    w.i16(bbox.x_min);
    w.i16(bbox.y_min);
    w.i16(bbox.x_max);
    w.i16(bbox.y_max);
    let mut end = 0usize;
    for contour in contours {
        end += contour.len();
        w.u16((end - 1) as u16);
    }
    w.u16(0); // instructionLength

    let mut flags = Vec::with_capacity(usize::from(total));
    let mut xs = Writer::new();
    let mut ys = Writer::new();
    let (mut px, mut py) = (0i32, 0i32);
    for p in all {
        let mut flag = if p.on_curve { ON_CURVE } else { 0 };
        flag |= delta(&mut xs, i32::from(p.x) - px, X_SHORT, X_SAME_OR_POSITIVE)?;
        flag |= delta(&mut ys, i32::from(p.y) - py, Y_SHORT, Y_SAME_OR_POSITIVE)?;
        flags.push(flag);
        px = i32::from(p.x);
        py = i32::from(p.y);
    }
    write_flags(&mut w, &flags);
    w.bytes(&xs.into_inner());
    w.bytes(&ys.into_inner());
    Ok((w.into_inner(), bbox, total))
}

/// Encode every glyph of the document.
pub fn build(doc: &FontDocument) -> Result<GlyfData, FontError> {
    let mut glyf = Writer::new();
    let mut offsets = Vec::with_capacity(doc.glyphs.len() + 1);
    let mut bounds = Vec::with_capacity(doc.glyphs.len());
    let (mut max_points, mut max_contours) = (0u16, 0u16);

    for record in &doc.glyphs {
        offsets.push(glyf.len());
        let contours = record
            .outline
            .contours()
            .iter()
            .map(contour_points)
            .filter(|c| !c.as_ref().is_ok_and(Vec::is_empty))
            .collect::<Result<Vec<_>, _>>()?;
        if contours.is_empty() {
            bounds.push(None);
            continue;
        }
        let (data, bbox, points) = encode_glyph(&contours)?;
        glyf.bytes(&data);
        glyf.align(4);
        bounds.push(Some(bbox));
        max_points = max_points.max(points);
        max_contours = max_contours.max(contours.len() as u16);
    }
    offsets.push(glyf.len());

    let long_offsets = glyf.len() > 0x1FFFE;
    let mut loca = Writer::new();
    for &offset in &offsets {
        if long_offsets {
            let offset = u32::try_from(offset)
                .map_err(|_| FontError::EncodingConsistency("glyf table exceeds 4 GiB".to_string()))?;
            loca.u32(offset);
        } else {
            loca.u16((offset / 2) as u16);
        }
    }

    Ok(GlyfData {
        glyf: glyf.into_inner(),
        loca: loca.into_inner(),
        long_offsets,
        bounds,
        max_points,
        max_contours,
    })
}
