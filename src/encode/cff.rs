//! `CFF `: version 1 Compact Font Format with Type 2 charstrings.
//!
//! One font, no subroutines. Offsets in the Top DICT are written in the
//! fixed five-byte form so the dictionary size does not depend on them.

use kurbo::{BezPath, PathEl, Shape};

use super::sfnt::Writer;
use super::{round_point, BBox};
use crate::assemble::FontDocument;
use crate::error::FontError;

/// First string id available to custom strings.
const FIRST_CUSTOM_SID: usize = 391;

mod op {
    pub const VERSION: u8 = 0;
    pub const NOTICE: u8 = 1;
    pub const FULL_NAME: u8 = 2;
    pub const FAMILY_NAME: u8 = 3;
    pub const WEIGHT: u8 = 4;
    pub const FONT_BBOX: u8 = 5;
    pub const CHARSET: u8 = 15;
    pub const CHAR_STRINGS: u8 = 17;
    pub const PRIVATE: u8 = 18;
    pub const DEFAULT_WIDTH_X: u8 = 20;
    pub const NOMINAL_WIDTH_X: u8 = 21;

    pub const RLINETO: u8 = 5;
    pub const RRCURVETO: u8 = 8;
    pub const ENDCHAR: u8 = 14;
    pub const RMOVETO: u8 = 21;
}

#[derive(Debug, Clone)]
pub struct CffData {
    pub table: Vec<u8>,
    pub bounds: Vec<Option<BBox>>,
}

/// String INDEX under construction.
#[derive(Debug, Default)]
struct Strings {
    custom: Vec<String>,
}

impl Strings {
    fn sid(&mut self, s: &str) -> u16 {
        match s {
            ".notdef" => 0,
            "space" => 1,
            _ => {
                let at = self.custom.iter().position(|c| c == s).unwrap_or_else(|| {
                    self.custom.push(s.to_string());
                    self.custom.len() - 1
                });
                (FIRST_CUSTOM_SID + at) as u16
            }
        }
    }
}

/// DICT operand.
fn dict_int(w: &mut Writer, v: i32) {
    match v {
        -107..=107 => w.u8((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            w.u8((v / 256 + 247) as u8);
            w.u8((v % 256) as u8);
        }
        -1131..=-108 => {
            let v = -v - 108;
            w.u8((v / 256 + 251) as u8);
            w.u8((v % 256) as u8);
        }
        -32768..=32767 => {
            w.u8(28);
            w.i16(v as i16);
        }
        _ => fixed_int(w, v),
    }
}

/// Five-byte DICT integer, independent of magnitude.
fn fixed_int(w: &mut Writer, v: i32) {
    w.u8(29);
    w.i32(v);
}

/// Charstring operand. Type 2 has no 32-bit integer form; values here
/// are font-unit deltas and always fit 16 bits.
fn charstring_int(w: &mut Writer, v: i32) -> Result<(), FontError> {
    match v {
        -107..=107 => w.u8((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            w.u8((v / 256 + 247) as u8);
            w.u8((v % 256) as u8);
        }
        -1131..=-108 => {
            let v = -v - 108;
            w.u8((v / 256 + 251) as u8);
            w.u8((v % 256) as u8);
        }
        -32768..=32767 => {
            w.u8(28);
            w.i16(v as i16);
        }
        _ => {
            return Err(FontError::EncodingConsistency(format!(
                "charstring operand {v} out of range"
            )))
        }
    }
    Ok(())
}

fn index(items: &[Vec<u8>]) -> Result<Vec<u8>, FontError> {
    let mut w = Writer::new();
    let count = u16::try_from(items.len())
        .map_err(|_| FontError::EncodingConsistency("CFF INDEX has too many entries".to_string()))?;
    w.u16(count);
    if items.is_empty() {
        return Ok(w.into_inner());
    }
    let last_offset = 1 + items.iter().map(Vec::len).sum::<usize>();
    let off_size: u8 = match last_offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    };
    w.u8(off_size);
    let mut offset = 1usize;
    let write_offset = |w: &mut Writer, o: usize| {
        let bytes = (o as u32).to_be_bytes();
        w.bytes(&bytes[4 - usize::from(off_size)..]);
    };
    write_offset(&mut w, offset);
    for item in items {
        offset += item.len();
        write_offset(&mut w, offset);
    }
    for item in items {
        w.bytes(item);
    }
    Ok(w.into_inner())
}

/// Integer outline of one glyph: rounded absolute points per element.
fn rounded(path: &BezPath) -> Result<BezPath, FontError> {
    let mut out = BezPath::new();
    let snap = |p: kurbo::Point| -> Result<kurbo::Point, FontError> {
        let (x, y) = round_point(p)?;
        Ok(kurbo::Point::new(f64::from(x), f64::from(y)))
    };
    for el in path.elements() {
        out.push(match *el {
            PathEl::MoveTo(p) => PathEl::MoveTo(snap(p)?),
            PathEl::LineTo(p) => PathEl::LineTo(snap(p)?),
            PathEl::QuadTo(a, p) => PathEl::QuadTo(snap(a)?, snap(p)?),
            PathEl::CurveTo(a, b, p) => PathEl::CurveTo(snap(a)?, snap(b)?, snap(p)?),
            PathEl::ClosePath => PathEl::ClosePath,
        });
    }
    Ok(out)
}

fn charstring(path: &BezPath, advance: u16) -> Result<Vec<u8>, FontError> {
    let mut w = Writer::new();
    // Widths are written relative to nominalWidthX = 0.
    charstring_int(&mut w, i32::from(advance))?;
    let mut current = (0i32, 0i32);
    let mut start = (0i32, 0i32);
    let mut pending_lines: Vec<(i32, i32)> = Vec::new();
    let to_i = |p: kurbo::Point| (p.x as i32, p.y as i32);

    let flush = |w: &mut Writer, lines: &mut Vec<(i32, i32)>| -> Result<(), FontError> {
        for (dx, dy) in lines.drain(..) {
            charstring_int(w, dx)?;
            charstring_int(w, dy)?;
            w.u8(op::RLINETO);
        }
        Ok(())
    };

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let p = to_i(p);
                flush(&mut w, &mut pending_lines)?;
                charstring_int(&mut w, p.0 - current.0)?;
                charstring_int(&mut w, p.1 - current.1)?;
                w.u8(op::RMOVETO);
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                let p = to_i(p);
                if p != current {
                    pending_lines.push((p.0 - current.0, p.1 - current.1));
                    current = p;
                }
            }
            PathEl::QuadTo(c, p) => {
                // Degree-elevated, handles rounded.
                let p0 = kurbo::Point::new(f64::from(current.0), f64::from(current.1));
                let a = to_i((p0 + (c - p0) * (2.0 / 3.0)).round());
                let b = to_i((p + (c - p) * (2.0 / 3.0)).round());
                let p = to_i(p);
                flush(&mut w, &mut pending_lines)?;
                for (x, y) in [(a.0 - current.0, a.1 - current.1), (b.0 - a.0, b.1 - a.1), (p.0 - b.0, p.1 - b.1)] {
                    charstring_int(&mut w, x)?;
                    charstring_int(&mut w, y)?;
                }
                w.u8(op::RRCURVETO);
                current = p;
            }
            PathEl::CurveTo(a, b, p) => {
                let (a, b, p) = (to_i(a), to_i(b), to_i(p));
                flush(&mut w, &mut pending_lines)?;
                for (x, y) in [(a.0 - current.0, a.1 - current.1), (b.0 - a.0, b.1 - a.1), (p.0 - b.0, p.1 - b.1)] {
                    charstring_int(&mut w, x)?;
                    charstring_int(&mut w, y)?;
                }
                w.u8(op::RRCURVETO);
                current = p;
            }
            PathEl::ClosePath => {
                // Contours close implicitly.
                if current == start {
                    if let Some(&(dx, dy)) = pending_lines.last() {
                        let from = (current.0 - dx, current.1 - dy);
                        if from != start {
                            pending_lines.pop();
                            current = from;
                        }
                    }
                }
                flush(&mut w, &mut pending_lines)?;
            }
        }
    }
    flush(&mut w, &mut pending_lines)?;
    w.u8(op::ENDCHAR);
    Ok(w.into_inner())
}

fn top_dict(
    w: &mut Writer,
    sids: &[u16; 4],
    weight: u16,
    bbox: BBox,
    charset: i32,
    char_strings: i32,
    private: (i32, i32),
) {
    let [version, notice, full_name, family_name] = *sids;
    for (sid, key) in [
        (version, op::VERSION),
        (notice, op::NOTICE),
        (full_name, op::FULL_NAME),
        (family_name, op::FAMILY_NAME),
        (weight, op::WEIGHT),
    ] {
        dict_int(w, i32::from(sid));
        w.u8(key);
    }
    for v in [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max] {
        dict_int(w, i32::from(v));
    }
    w.u8(op::FONT_BBOX);
    fixed_int(w, charset);
    w.u8(op::CHARSET);
    fixed_int(w, char_strings);
    w.u8(op::CHAR_STRINGS);
    fixed_int(w, private.0);
    fixed_int(w, private.1);
    w.u8(op::PRIVATE);
}

/// Build the `CFF ` table. `advances` are the rounded hmtx advances.
pub fn build(doc: &FontDocument, advances: &[u16]) -> Result<CffData, FontError> {
    let meta = &doc.metadata;
    let mut strings = Strings::default();
    let sids = [
        strings.sid(&meta.version),
        strings.sid(meta.copyright.as_deref().unwrap_or("")),
        strings.sid(&meta.full_name()),
        strings.sid(&meta.family),
    ];
    let weight = strings.sid(&meta.style);

    let mut charstrings = Vec::with_capacity(doc.glyphs.len());
    let mut bounds = Vec::with_capacity(doc.glyphs.len());
    let mut charset = Writer::new();
    charset.u8(0);
    for (i, (record, &advance)) in doc.glyphs.iter().zip(advances).enumerate() {
        let path = rounded(&record.outline.to_bezpath())?;
        charstrings.push(charstring(&path, advance)?);
        bounds.push(if path.elements().is_empty() {
            None
        } else {
            let r = path.bounding_box();
            Some(BBox {
                x_min: super::fword(r.x0.floor(), "x coordinate")?,
                y_min: super::fword(r.y0.floor(), "y coordinate")?,
                x_max: super::fword(r.x1.ceil(), "x coordinate")?,
                y_max: super::fword(r.y1.ceil(), "y coordinate")?,
            })
        });
        if i > 0 {
            charset.u16(strings.sid(&record.name));
        }
    }
    let font_bbox = bounds.iter().flatten().copied().reduce(BBox::union).unwrap_or_default();

    let mut private = Writer::new();
    dict_int(&mut private, 0);
    private.u8(op::DEFAULT_WIDTH_X);
    dict_int(&mut private, 0);
    private.u8(op::NOMINAL_WIDTH_X);
    let private = private.into_inner();

    let header = [1u8, 0, 4, 4];
    let name_index = index(&[doc.metadata.postscript_name().into_bytes()])?;
    let string_index = index(&strings.custom.iter().map(|s| s.as_bytes().to_vec()).collect::<Vec<_>>())?;
    let global_subrs = index(&[])?;
    let charset = charset.into_inner();
    let charstrings_index = index(&charstrings)?;

    // The Top DICT length does not depend on the offsets it holds.
    let mut probe = Writer::new();
    top_dict(&mut probe, &sids, weight, font_bbox, 0, 0, (0, 0));
    let top_index_len = index(&[probe.into_inner()])?.len();

    let charset_offset = header.len() + name_index.len() + top_index_len + string_index.len() + global_subrs.len();
    let charstrings_offset = charset_offset + charset.len();
    let private_offset = charstrings_offset + charstrings_index.len();
    let to_i32 = |v: usize| {
        i32::try_from(v).map_err(|_| FontError::EncodingConsistency("CFF table too large".to_string()))
    };

    let mut top = Writer::new();
    top_dict(
        &mut top,
        &sids,
        weight,
        font_bbox,
        to_i32(charset_offset)?,
        to_i32(charstrings_offset)?,
        (to_i32(private.len())?, to_i32(private_offset)?),
    );
    let top_index = index(&[top.into_inner()])?;
    if top_index.len() != top_index_len {
        return Err(FontError::EncodingConsistency("CFF Top DICT changed size".to_string()));
    }

    let mut out = Writer::new();
    out.bytes(&header);
    out.bytes(&name_index);
    out.bytes(&top_index);
    out.bytes(&string_index);
    out.bytes(&global_subrs);
    out.bytes(&charset);
    out.bytes(&charstrings_index);
    out.bytes(&private);

    Ok(CffData {
        table: out.into_inner(),
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(v: i32) -> Vec<u8> {
        let mut w = Writer::new();
        dict_int(&mut w, v);
        w.into_inner()
    }

    #[test]
    fn integer_operands() {
        assert_eq!(encoded(0), vec![139]);
        assert_eq!(encoded(100), vec![239]);
        assert_eq!(encoded(1000), vec![250, 124]);
        assert_eq!(encoded(-1000), vec![254, 124]);
        assert_eq!(encoded(10000), vec![28, 0x27, 0x10]);
        assert_eq!(encoded(100000), vec![29, 0x00, 0x01, 0x86, 0xA0]);
    }

    #[test]
    fn index_layout() {
        let data = index(&[b"ab".to_vec(), b"c".to_vec()]).unwrap();
        assert_eq!(data, vec![0, 2, 1, 1, 3, 4, b'a', b'b', b'c']);
        assert_eq!(index(&[]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn empty_glyph_is_width_and_endchar() {
        assert_eq!(charstring(&BezPath::new(), 100).unwrap(), vec![239, op::ENDCHAR]);
    }

    #[test]
    fn square_charstring_drops_closing_line() {
        let mut p = BezPath::new();
        p.move_to((10.0, 0.0));
        p.line_to((110.0, 0.0));
        p.line_to((110.0, 100.0));
        p.line_to((10.0, 100.0));
        p.line_to((10.0, 0.0));
        p.close_path();
        let cs = charstring(&p, 200).unwrap();
        assert_eq!(cs.iter().filter(|&&b| b == op::RLINETO).count(), 3);
        assert_eq!(*cs.last().unwrap(), op::ENDCHAR);
    }

    #[test]
    fn custom_strings_start_after_standard_set() {
        let mut s = Strings::default();
        assert_eq!(s.sid(".notdef"), 0);
        assert_eq!(s.sid("space"), 1);
        assert_eq!(s.sid("uni0041"), 391);
        assert_eq!(s.sid("uni0042"), 392);
        assert_eq!(s.sid("uni0041"), 391);
    }
}
