//! sfnt container: table directory, padding, checksums, verification.

use crate::error::FontError;

pub const TRUETYPE_VERSION: u32 = 0x0001_0000;
pub const CFF_VERSION: u32 = u32::from_be_bytes(*b"OTTO");

/// Target of the whole-font checksum.
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
/// Offset of `checkSumAdjustment` inside `head`.
const HEAD_ADJUSTMENT_OFFSET: usize = 8;
const HEADER_LEN: usize = 12;
const RECORD_LEN: usize = 16;

/// Big-endian byte writer shared by the table builders.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn tag(&mut self, tag: [u8; 4]) {
        self.buf.extend_from_slice(&tag);
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Zero-pad to a multiple of `align` bytes.
    pub fn align(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// One finished table, unpadded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
}

impl Table {
    pub fn new(tag: &[u8; 4], data: Vec<u8>) -> Self {
        Self { tag: *tag, data }
    }
}

/// A table as located by [`read_directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub offset: usize,
    pub length: usize,
}

/// `(searchRange, entrySelector, rangeShift)` for a binary-searchable
/// array of `count` entries of `unit` bytes.
pub fn search_params(count: u16, unit: u16) -> (u16, u16, u16) {
    if count == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - count.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector).saturating_mul(unit);
    let range_shift = count.saturating_mul(unit).saturating_sub(search_range);
    (search_range, entry_selector, range_shift)
}

/// Sum of big-endian u32 words, the final partial word zero-padded.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Lay out tables behind a sorted directory and fix up
/// `head.checkSumAdjustment`.
pub fn build(sfnt_version: u32, mut tables: Vec<Table>) -> Result<Vec<u8>, FontError> {
    tables.sort_by(|a, b| a.tag.cmp(&b.tag));
    if tables.windows(2).any(|w| w[0].tag == w[1].tag) {
        return Err(FontError::EncodingConsistency("duplicate table tag".to_string()));
    }
    let count = u16::try_from(tables.len())
        .map_err(|_| FontError::EncodingConsistency("too many tables".to_string()))?;
    let (search_range, entry_selector, range_shift) = search_params(count, RECORD_LEN as u16);

    let mut out = Writer::new();
    out.u32(sfnt_version);
    out.u16(count);
    out.u16(search_range);
    out.u16(entry_selector);
    out.u16(range_shift);

    let mut offset = HEADER_LEN + RECORD_LEN * tables.len();
    let mut head_offset = None;
    for table in &tables {
        if &table.tag == b"head" {
            if table.data.len() < HEAD_ADJUSTMENT_OFFSET + 4 {
                return Err(FontError::EncodingConsistency("head table truncated".to_string()));
            }
            head_offset = Some(offset);
        }
        let length = u32::try_from(table.data.len())
            .map_err(|_| FontError::EncodingConsistency("table exceeds 4 GiB".to_string()))?;
        out.tag(table.tag);
        out.u32(checksum(&table.data));
        out.u32(offset as u32);
        out.u32(length);
        offset += padded_len(table.data.len());
    }
    for table in &tables {
        out.bytes(&table.data);
        out.align(4);
    }

    let mut bytes = out.into_inner();
    if let Some(head) = head_offset {
        let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&bytes));
        let at = head + HEAD_ADJUSTMENT_OFFSET;
        bytes[at..at + 4].copy_from_slice(&adjustment.to_be_bytes());
    }
    Ok(bytes)
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn inconsistent(msg: impl Into<String>) -> FontError {
    FontError::EncodingConsistency(msg.into())
}

/// Parse the table directory of an sfnt, checking only that every record
/// lies inside the file.
pub fn read_directory(font: &[u8]) -> Result<(u32, Vec<TableRecord>), FontError> {
    let version = read_u32(font, 0).ok_or_else(|| inconsistent("missing sfnt header"))?;
    let count = read_u16(font, 4).ok_or_else(|| inconsistent("missing sfnt header"))? as usize;
    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let at = HEADER_LEN + i * RECORD_LEN;
        let tag = font
            .get(at..at + 4)
            .and_then(|t| <[u8; 4]>::try_from(t).ok())
            .ok_or_else(|| inconsistent("table directory truncated"))?;
        let field = |n: usize| read_u32(font, at + 4 * n).ok_or_else(|| inconsistent("table directory truncated"));
        let record = TableRecord {
            tag,
            checksum: field(1)?,
            offset: field(2)? as usize,
            length: field(3)? as usize,
        };
        if record.offset + record.length > font.len() {
            return Err(inconsistent(format!(
                "table {} overruns the file",
                String::from_utf8_lossy(&record.tag)
            )));
        }
        records.push(record);
    }
    Ok((version, records))
}

/// Re-walk a finished sfnt and check the invariants renderers rely on.
pub fn verify(font: &[u8]) -> Result<(), FontError> {
    let (_, records) = read_directory(font)?;
    let count = records.len() as u16;
    let expected = search_params(count, RECORD_LEN as u16);
    let stored = (
        read_u16(font, 6).unwrap_or_default(),
        read_u16(font, 8).unwrap_or_default(),
        read_u16(font, 10).unwrap_or_default(),
    );
    if stored != expected {
        return Err(inconsistent("directory search parameters are wrong"));
    }
    if records.windows(2).any(|w| w[0].tag >= w[1].tag) {
        return Err(inconsistent("table directory is not sorted"));
    }
    if font.len() % 4 != 0 {
        return Err(inconsistent("file length is not 4-byte aligned"));
    }

    let mut head = None;
    for record in &records {
        let name = String::from_utf8_lossy(&record.tag).into_owned();
        if record.offset % 4 != 0 {
            return Err(inconsistent(format!("table {name} is misaligned")));
        }
        let mut data = font[record.offset..record.offset + record.length].to_vec();
        if &record.tag == b"head" {
            let adjustment = read_u32(&data, HEAD_ADJUSTMENT_OFFSET)
                .ok_or_else(|| inconsistent("head table truncated"))?;
            data[HEAD_ADJUSTMENT_OFFSET..HEAD_ADJUSTMENT_OFFSET + 4].fill(0);
            head = Some(adjustment);
        }
        if checksum(&data) != record.checksum {
            return Err(inconsistent(format!("checksum mismatch in table {name}")));
        }
    }

    let adjustment = head.ok_or_else(|| inconsistent("missing head table"))?;
    let whole = checksum(font);
    if whole != CHECKSUM_MAGIC {
        return Err(inconsistent(format!(
            "font checksum {whole:#010x} with adjustment {adjustment:#010x} does not reach {CHECKSUM_MAGIC:#010x}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_head() -> Vec<u8> {
        let mut data = vec![0u8; 54];
        data[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
        data
    }

    #[test]
    fn checksum_pads_the_last_word() {
        assert_eq!(checksum(b"ABCD"), 0x4142_4344);
        assert_eq!(checksum(b"ABCDE"), 0x4142_4344u32.wrapping_add(0x4500_0000));
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn search_params_match_the_format_tables() {
        assert_eq!(search_params(9, 16), (128, 3, 16));
        assert_eq!(search_params(1, 16), (16, 0, 0));
        assert_eq!(search_params(4, 2), (8, 2, 0));
    }

    #[test]
    fn built_font_verifies() {
        let tables = vec![
            Table::new(b"post", vec![0, 3, 0, 0, 1]),
            Table::new(b"head", fake_head()),
            Table::new(b"cmap", vec![1, 2, 3]),
        ];
        let font = build(TRUETYPE_VERSION, tables).unwrap();
        verify(&font).unwrap();
        let (version, records) = read_directory(&font).unwrap();
        assert_eq!(version, TRUETYPE_VERSION);
        let tags: Vec<_> = records.iter().map(|r| r.tag).collect();
        assert_eq!(tags, vec![*b"cmap", *b"head", *b"post"]);
        assert!(records.iter().all(|r| r.offset % 4 == 0));
    }

    #[test]
    fn corruption_is_detected() {
        let tables = vec![Table::new(b"head", fake_head()), Table::new(b"name", vec![9; 10])];
        let mut font = build(TRUETYPE_VERSION, tables).unwrap();
        let last = font.len() - 3;
        font[last] ^= 0xFF;
        assert!(matches!(verify(&font), Err(FontError::EncodingConsistency(_))));
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let tables = vec![Table::new(b"head", fake_head()), Table::new(b"head", fake_head())];
        assert!(build(TRUETYPE_VERSION, tables).is_err());
    }
}
