//! `cmap`: format 4 for the BMP, format 12 when anything lies beyond it.

use std::collections::BTreeMap;

use super::sfnt::{search_params, Writer};
use crate::error::FontError;

/// A run of consecutive code points mapped to consecutive glyph ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32,
    end: u32,
    glyph: u16,
}

fn runs(mappings: impl Iterator<Item = (u32, u16)>) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (cp, gid) in mappings {
        if let Some(last) = runs.last_mut() {
            let next_gid = u32::from(last.glyph) + (last.end - last.start) + 1;
            if cp == last.end + 1 && u32::from(gid) == next_gid {
                last.end = cp;
                continue;
            }
        }
        runs.push(Run {
            start: cp,
            end: cp,
            glyph: gid,
        });
    }
    runs
}

fn format4(cmap: &BTreeMap<char, u16>) -> Result<Vec<u8>, FontError> {
    // U+FFFF is reserved for the terminating segment.
    let bmp = cmap
        .iter()
        .map(|(&ch, &gid)| (ch as u32, gid))
        .filter(|&(cp, _)| cp < 0xFFFF);
    let mut segments = runs(bmp);
    segments.push(Run {
        start: 0xFFFF,
        end: 0xFFFF,
        glyph: 0,
    });

    let seg_count = u16::try_from(segments.len())
        .ok()
        .filter(|&n| n <= 0x7FFF)
        .ok_or_else(|| FontError::EncodingConsistency("too many cmap segments".to_string()))?;
    let length = 16 + 8 * usize::from(seg_count);
    let length = u16::try_from(length)
        .map_err(|_| FontError::EncodingConsistency("cmap format 4 subtable too large".to_string()))?;
    let (search_range, entry_selector, range_shift) = search_params(seg_count, 2);

    let mut w = Writer::new();
    w.u16(4);
    w.u16(length);
    w.u16(0); // language
    w.u16(seg_count * 2);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(range_shift);
    for s in &segments {
        w.u16(s.end as u16);
    }
    w.u16(0); // reservedPad
    for s in &segments {
        w.u16(s.start as u16);
    }
    for s in &segments {
        // Glyph = (code + delta) mod 65536; the sentinel maps to glyph 0.
        let delta = if s.start == 0xFFFF {
            1
        } else {
            s.glyph.wrapping_sub(s.start as u16)
        };
        w.u16(delta);
    }
    for _ in &segments {
        w.u16(0); // idRangeOffset
    }
    Ok(w.into_inner())
}

fn format12(cmap: &BTreeMap<char, u16>) -> Vec<u8> {
    let groups = runs(cmap.iter().map(|(&ch, &gid)| (ch as u32, gid)));
    let mut w = Writer::new();
    w.u16(12);
    w.u16(0);
    w.u32(16 + 12 * groups.len() as u32);
    w.u32(0); // language
    w.u32(groups.len() as u32);
    for g in &groups {
        w.u32(g.start);
        w.u32(g.end);
        w.u32(u32::from(g.glyph));
    }
    w.into_inner()
}

/// Build the `cmap` table for a code point → glyph index map.
pub fn build(cmap: &BTreeMap<char, u16>) -> Result<Vec<u8>, FontError> {
    let bmp = format4(cmap)?;
    let full = cmap
        .keys()
        .any(|&ch| ch as u32 > 0xFFFF)
        .then(|| format12(cmap));

    // (platform, encoding), sorted.
    let records: Vec<(u16, u16)> = if full.is_some() {
        vec![(0, 3), (0, 4), (3, 1), (3, 10)]
    } else {
        vec![(0, 3), (3, 1)]
    };

    let mut w = Writer::new();
    w.u16(0);
    w.u16(records.len() as u16);
    let header_len = 4 + 8 * records.len() as u32;
    let bmp_offset = header_len;
    let full_offset = header_len + bmp.len() as u32;
    for &(platform, encoding) in &records {
        w.u16(platform);
        w.u16(encoding);
        w.u32(if matches!(encoding, 4 | 10) { full_offset } else { bmp_offset });
    }
    w.bytes(&bmp);
    if let Some(full) = &full {
        w.bytes(full);
    }
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_mappings_share_a_run() {
        let r = runs([(0x41, 2), (0x42, 3), (0x43, 4), (0x45, 5), (0x46, 9)].into_iter());
        assert_eq!(
            r,
            vec![
                Run { start: 0x41, end: 0x43, glyph: 2 },
                Run { start: 0x45, end: 0x45, glyph: 5 },
                Run { start: 0x46, end: 0x46, glyph: 9 },
            ]
        );
    }

    #[test]
    fn format4_layout() {
        let map = BTreeMap::from([(' ', 1), ('A', 2), ('B', 3)]);
        let table = format4(&map).unwrap();
        // Segments: [0x20], [0x41-0x42], sentinel.
        assert_eq!(u16::from_be_bytes([table[6], table[7]]), 6);
        assert_eq!(table.len(), 16 + 8 * 3);
        assert_eq!(u16::from_be_bytes([table[2], table[3]]) as usize, table.len());
    }

    #[test]
    fn supplementary_code_points_add_format12() {
        let map = BTreeMap::from([(' ', 1), ('😀', 2)]);
        let table = build(&map).unwrap();
        assert_eq!(u16::from_be_bytes([table[2], table[3]]), 4);
        let bmp_only = build(&BTreeMap::from([(' ', 1)])).unwrap();
        assert_eq!(u16::from_be_bytes([bmp_only[2], bmp_only[3]]), 2);
    }
}
