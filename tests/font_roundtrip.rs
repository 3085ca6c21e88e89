//! Encoded fonts read back with an independent parser.

use std::io::Read as _;

use flate2::read::ZlibDecoder;
use img2font::encode::{encode, sfnt};
use img2font::{FontAdjustments, FontDocument, FontMetadata, GlyphOutline, OutputFormat, TypefaceMetrics};
use kurbo::{Rect, Shape};
use ttf_parser::{name_id, Face, GlyphId};

fn rect_outline(x0: f64, y0: f64, x1: f64, y1: f64) -> GlyphOutline {
    GlyphOutline::from_bezpaths(&[Rect::new(x0, y0, x1, y1).to_path(0.1)])
}

fn document() -> FontDocument {
    let glyphs = vec![
        ('H', rect_outline(0.0, 0.0, 500.0, 700.0)),
        ('A', rect_outline(0.0, 0.0, 560.0, 700.0)),
        ('V', rect_outline(0.0, 0.0, 560.0, 700.0)),
        ('x', rect_outline(0.0, 0.0, 420.0, 480.0)),
        ('p', rect_outline(0.0, -230.0, 420.0, 480.0)),
        // Outside the BMP: needs cmap format 12.
        ('\u{1F600}', rect_outline(0.0, 0.0, 600.0, 600.0)),
    ];
    let metrics = TypefaceMetrics::compute(glyphs.iter().map(|(c, o)| (*c, o)), 1000);
    let metadata = FontMetadata {
        family: "Sheet Sans".to_string(),
        author: Some("A. Letterer".to_string()),
        description: Some("Traced from a scanned sheet".to_string()),
        ..FontMetadata::default()
    };
    FontDocument::new(metadata, &glyphs, metrics, &FontAdjustments::default())
}

fn name(face: &Face, id: u16) -> Option<String> {
    face.names().into_iter().find(|n| n.name_id == id).and_then(|n| n.to_string())
}

fn check_face(face: &Face, doc: &FontDocument) {
    assert_eq!(face.units_per_em(), doc.metrics.units_per_em);
    assert_eq!(face.ascender(), doc.metrics.ascender.round() as i16);
    assert_eq!(face.descender(), doc.metrics.descender.round() as i16);
    assert_eq!(usize::from(face.number_of_glyphs()), doc.glyphs.len());

    for (&ch, &gid) in &doc.cmap {
        assert_eq!(face.glyph_index(ch), Some(GlyphId(gid)), "{}", ch.escape_unicode());
    }
    for (gid, record) in doc.glyphs.iter().enumerate() {
        let advance = face.glyph_hor_advance(GlyphId(gid as u16)).unwrap();
        assert_eq!(advance, record.advance_width.round() as u16, "{}", record.name);
        assert!(advance >= 100);
    }
    assert_eq!(name(face, name_id::FAMILY).as_deref(), Some("Sheet Sans"));
    assert_eq!(name(face, name_id::MANUFACTURER).as_deref(), Some("A. Letterer"));
    assert_eq!(name(face, name_id::DESIGNER).as_deref(), Some("A. Letterer"));
    assert_eq!(name(face, name_id::DESCRIPTION).as_deref(), Some("Traced from a scanned sheet"));
}

struct Bounds(Vec<(f32, f32)>);

impl ttf_parser::OutlineBuilder for Bounds {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.push((x, y));
    }
    fn line_to(&mut self, x: f32, y: f32) {
        self.0.push((x, y));
    }
    fn quad_to(&mut self, _: f32, _: f32, x: f32, y: f32) {
        self.0.push((x, y));
    }
    fn curve_to(&mut self, _: f32, _: f32, _: f32, _: f32, x: f32, y: f32) {
        self.0.push((x, y));
    }
    fn close(&mut self) {}
}

fn check_outline(face: &Face, doc: &FontDocument, ch: char) {
    let gid = GlyphId(doc.glyph_index(ch).unwrap());
    let record = &doc.glyphs[usize::from(gid.0)];
    let expected = record.outline.bounds().unwrap();

    let mut points = Bounds(Vec::new());
    let rect = face.outline_glyph(gid, &mut points).unwrap();
    assert_eq!(rect.x_min, expected.x0.round() as i16);
    assert_eq!(rect.y_min, expected.y0.round() as i16);
    assert_eq!(rect.x_max, expected.x1.round() as i16);
    assert_eq!(rect.y_max, expected.y1.round() as i16);
    assert!(points.0.len() >= 4);
}

#[test]
fn truetype_reads_back() {
    let doc = document();
    let data = encode(&doc, OutputFormat::TrueType).unwrap();
    let face = Face::parse(&data, 0).unwrap();
    check_face(&face, &doc);
    check_outline(&face, &doc, 'H');
    check_outline(&face, &doc, 'p');
    assert!(face.tables().glyf.is_some());

    let lsb = face.glyph_hor_side_bearing(GlyphId(doc.glyph_index('H').unwrap())).unwrap();
    assert_eq!(f64::from(lsb), doc.glyphs[2].left_side_bearing.round());
}

#[test]
fn cff_reads_back() {
    let doc = document();
    let data = encode(&doc, OutputFormat::OpenTypeCff).unwrap();
    assert_eq!(&data[0..4], b"OTTO");
    let face = Face::parse(&data, 0).unwrap();
    assert!(face.tables().cff.is_some());
    check_face(&face, &doc);
    check_outline(&face, &doc, 'H');
    check_outline(&face, &doc, 'x');
}

#[test]
fn kerning_pairs_land_in_the_kern_table() {
    let doc = document();
    assert!(doc.kerning.iter().any(|p| (p.left, p.right) == ('A', 'V')));
    for pair in &doc.kerning {
        assert!(doc.cmap.contains_key(&pair.left) && doc.cmap.contains_key(&pair.right));
    }

    let data = encode(&doc, OutputFormat::TrueType).unwrap();
    let face = Face::parse(&data, 0).unwrap();
    let kern = face.tables().kern.unwrap();
    let subtable = kern.subtables.into_iter().next().unwrap();
    assert!(subtable.horizontal);
    let a = GlyphId(doc.glyph_index('A').unwrap());
    let v = GlyphId(doc.glyph_index('V').unwrap());
    assert_eq!(subtable.glyphs_kerning(a, v), Some(-80));
    assert_eq!(subtable.glyphs_kerning(v, a), Some(-80));
}

#[test]
fn woff_tables_inflate_to_the_sfnt() {
    let doc = document();
    let sfnt_data = encode(&doc, OutputFormat::TrueType).unwrap();
    let woff = encode(&doc, OutputFormat::Woff).unwrap();
    assert_eq!(&woff[0..4], b"wOFF");

    let be32 = |at: usize| u32::from_be_bytes(woff[at..at + 4].try_into().unwrap()) as usize;
    let num_tables = u16::from_be_bytes([woff[12], woff[13]]) as usize;
    let (_, records) = sfnt::read_directory(&sfnt_data).unwrap();
    assert_eq!(num_tables, records.len());

    for (i, record) in records.iter().enumerate() {
        let entry = 44 + 20 * i;
        assert_eq!(&woff[entry..entry + 4], &record.tag);
        let (offset, comp_len, orig_len) = (be32(entry + 4), be32(entry + 8), be32(entry + 12));
        let original = &sfnt_data[record.offset..record.offset + record.length];
        assert_eq!(orig_len, original.len());
        let body = &woff[offset..offset + comp_len];
        if comp_len < orig_len {
            let mut inflated = Vec::new();
            ZlibDecoder::new(body).read_to_end(&mut inflated).unwrap();
            assert_eq!(inflated, original);
        } else {
            assert_eq!(body, original);
        }
    }
}

#[test]
fn unset_metadata_has_no_name_records() {
    let mut doc = document();
    doc.metadata.author = None;
    doc.metadata.description = None;
    let data = encode(&doc, OutputFormat::TrueType).unwrap();
    let face = Face::parse(&data, 0).unwrap();
    for id in [name_id::COPYRIGHT_NOTICE, name_id::MANUFACTURER, name_id::DESIGNER, name_id::DESCRIPTION] {
        assert_eq!(name(&face, id), None, "name id {id}");
    }
    assert_eq!(name(&face, name_id::POST_SCRIPT_NAME).as_deref(), Some("SheetSans-Regular"));
}

#[test]
fn encoded_fonts_pass_verification() {
    let doc = document();
    for format in [OutputFormat::TrueType, OutputFormat::OpenTypeCff] {
        let data = encode(&doc, format).unwrap();
        sfnt::verify(&data).unwrap();
    }
}
