//! Binary font encoding.
//!
//! A [`FontDocument`] becomes an sfnt with either quadratic `glyf`
//! outlines (TrueType) or cubic `CFF ` outlines (OpenType/CFF). WOFF
//! output wraps the TrueType flavour. Every font is re-read and checked
//! before it is returned, so a caller never receives a file whose
//! offsets or checksums are inconsistent.

pub mod cff;
pub mod cmap;
pub mod glyf;
pub mod sfnt;
pub mod tables;
pub mod woff;

use std::time::Instant;

use kurbo::Point;

use crate::assemble::FontDocument;
use crate::config::OutputFormat;
use crate::error::FontError;

use sfnt::Table;

/// Integer bounding box in font units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl BBox {
    pub fn from_points(points: impl IntoIterator<Item = (i16, i16)>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<BBox>, (x, y)| {
            let b = acc.unwrap_or(BBox {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            });
            Some(BBox {
                x_min: b.x_min.min(x),
                y_min: b.y_min.min(y),
                x_max: b.x_max.max(x),
                y_max: b.y_max.max(y),
            })
        })
    }

    pub fn union(self, other: BBox) -> BBox {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

/// Round a font-unit value into a signed 16-bit field.
pub(crate) fn fword(value: f64, what: &str) -> Result<i16, FontError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < i16::MIN as f64 || rounded > i16::MAX as f64 {
        return Err(FontError::EncodingConsistency(format!(
            "{what} {value} does not fit a 16-bit field"
        )));
    }
    Ok(rounded as i16)
}

/// Round a font-unit value into an unsigned 16-bit field.
pub(crate) fn ufword(value: f64, what: &str) -> Result<u16, FontError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded > u16::MAX as f64 {
        return Err(FontError::EncodingConsistency(format!(
            "{what} {value} does not fit an unsigned 16-bit field"
        )));
    }
    Ok(rounded as u16)
}

pub(crate) fn round_point(p: Point) -> Result<(i16, i16), FontError> {
    Ok((fword(p.x, "x coordinate")?, fword(p.y, "y coordinate")?))
}

/// Serialize a document in the requested format.
pub fn encode(doc: &FontDocument, format: OutputFormat) -> Result<Vec<u8>, FontError> {
    let start = Instant::now();
    let num_glyphs = u16::try_from(doc.glyphs.len())
        .map_err(|_| FontError::EncodingConsistency("more than 65535 glyphs".to_string()))?;
    let advances = doc
        .glyphs
        .iter()
        .map(|g| ufword(g.advance_width, "advance width"))
        .collect::<Result<Vec<_>, _>>()?;

    let (sfnt_version, mut font_tables, bounds, long_loca, maxp) = match format {
        OutputFormat::TrueType | OutputFormat::Woff => {
            let glyf = glyf::build(doc)?;
            let maxp = tables::maxp_truetype(num_glyphs, glyf.max_points, glyf.max_contours);
            (
                sfnt::TRUETYPE_VERSION,
                vec![Table::new(b"glyf", glyf.glyf), Table::new(b"loca", glyf.loca)],
                glyf.bounds,
                glyf.long_offsets,
                maxp,
            )
        }
        OutputFormat::OpenTypeCff => {
            let cff = cff::build(doc, &advances)?;
            (
                sfnt::CFF_VERSION,
                vec![Table::new(b"CFF ", cff.table)],
                cff.bounds,
                false,
                tables::maxp_cff(num_glyphs),
            )
        }
    };

    let summary = tables::FontSummary::new(doc, &advances, &bounds)?;
    font_tables.extend([
        Table::new(b"head", tables::head(doc, &summary, long_loca)),
        Table::new(b"hhea", tables::hhea(&summary)),
        Table::new(b"maxp", maxp),
        Table::new(b"OS/2", tables::os2(doc, &summary)),
        Table::new(b"hmtx", tables::hmtx(&advances, &bounds)),
        Table::new(b"cmap", cmap::build(&doc.cmap)?),
        Table::new(b"name", tables::name(&doc.metadata)?),
        Table::new(b"post", tables::post(&summary)),
    ]);
    if let Some(kern) = tables::kern(doc)? {
        font_tables.push(Table::new(b"kern", kern));
    }

    let font = sfnt::build(sfnt_version, font_tables)?;
    sfnt::verify(&font)?;
    let bytes = match format {
        OutputFormat::Woff => woff::wrap(&font)?,
        OutputFormat::TrueType | OutputFormat::OpenTypeCff => font,
    };

    tracing::info!(
        %format,
        glyphs = num_glyphs,
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "encoded font"
    );
    Ok(bytes)
}
