//! WOFF 1.0 wrapper around a finished sfnt.

use std::io::Write as _;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::sfnt::{read_directory, Writer};
use crate::error::FontError;

const SIGNATURE: [u8; 4] = *b"wOFF";
const HEADER_LEN: usize = 44;
const ENTRY_LEN: usize = 20;

fn compress(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    let zlib = |e: std::io::Error| FontError::EncodingConsistency(format!("zlib: {e}"));
    encoder.write_all(data).map_err(zlib)?;
    encoder.finish().map_err(zlib)
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Re-pack an sfnt as WOFF, compressing each table that gets smaller.
pub fn wrap(sfnt: &[u8]) -> Result<Vec<u8>, FontError> {
    let (flavor, records) = read_directory(sfnt)?;

    let mut bodies = Vec::with_capacity(records.len());
    for record in &records {
        let original = &sfnt[record.offset..record.offset + record.length];
        let compressed = compress(original)?;
        bodies.push(if compressed.len() < original.len() {
            compressed
        } else {
            original.to_vec()
        });
    }

    let sfnt_size = 12 + 16 * records.len() + records.iter().map(|r| padded(r.length)).sum::<usize>();
    let mut offset = HEADER_LEN + ENTRY_LEN * records.len();
    let mut directory = Writer::new();
    for (record, body) in records.iter().zip(&bodies) {
        directory.tag(record.tag);
        directory.u32(offset as u32);
        directory.u32(body.len() as u32);
        directory.u32(record.length as u32);
        directory.u32(record.checksum);
        offset += padded(body.len());
    }
    let total = offset;
    let too_large = || FontError::EncodingConsistency("font too large for WOFF".to_string());

    let mut w = Writer::new();
    w.tag(SIGNATURE);
    w.u32(flavor);
    w.u32(u32::try_from(total).map_err(|_| too_large())?);
    w.u16(records.len() as u16);
    w.u16(0); // reserved
    w.u32(u32::try_from(sfnt_size).map_err(|_| too_large())?);
    w.u16(1); // majorVersion
    w.u16(0); // minorVersion
    for _ in 0..5 {
        // No metadata or private block.
        w.u32(0);
    }
    w.bytes(&directory.into_inner());
    for body in &bodies {
        w.bytes(body);
        w.align(4);
    }
    let bytes = w.into_inner();
    debug_assert_eq!(bytes.len(), total);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sfnt::{build, Table, TRUETYPE_VERSION};
    use flate2::read::ZlibDecoder;
    use std::io::Read as _;

    fn font() -> Vec<u8> {
        let mut head = vec![0u8; 54];
        head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        build(
            TRUETYPE_VERSION,
            vec![
                Table::new(b"head", head),
                Table::new(b"name", vec![7; 400]),
                Table::new(b"post", vec![1, 2, 3]),
            ],
        )
        .unwrap()
    }

    fn u32_at(data: &[u8], at: usize) -> u32 {
        u32::from_be_bytes(data[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn header_describes_the_file() {
        let sfnt = font();
        let woff = wrap(&sfnt).unwrap();
        assert_eq!(&woff[0..4], b"wOFF");
        assert_eq!(u32_at(&woff, 4), TRUETYPE_VERSION);
        assert_eq!(u32_at(&woff, 8) as usize, woff.len());
        assert_eq!(u32_at(&woff, 16) as usize, sfnt.len());
    }

    #[test]
    fn tables_inflate_back_to_the_original() {
        let sfnt = font();
        let woff = wrap(&sfnt).unwrap();
        let (_, records) = read_directory(&sfnt).unwrap();
        for (i, record) in records.iter().enumerate() {
            let entry = HEADER_LEN + i * ENTRY_LEN;
            assert_eq!(&woff[entry..entry + 4], &record.tag);
            let offset = u32_at(&woff, entry + 4) as usize;
            let comp_len = u32_at(&woff, entry + 8) as usize;
            let orig_len = u32_at(&woff, entry + 12) as usize;
            assert_eq!(orig_len, record.length);
            let body = &woff[offset..offset + comp_len];
            let original = &sfnt[record.offset..record.offset + record.length];
            if comp_len < orig_len {
                let mut inflated = Vec::new();
                ZlibDecoder::new(body).read_to_end(&mut inflated).unwrap();
                assert_eq!(inflated, original);
            } else {
                assert_eq!(body, original);
            }
        }
    }
}
