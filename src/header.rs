//! The 512 byte header block preceding every archive member.

use std::io::Write;

use log::trace;

use crate::constants::header::{CHECKSUM_RANGE, NAME_RANGE};
use crate::constants::*;
use crate::numeric::{decode_number, encode_checksum, encode_number, encode_permissions};
use crate::utils::padding_len;
use crate::Result;
use crate::TarError;

/// Identifies one field of the header.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum FieldId {
    Name,
    Mode,
    Uid,
    Gid,
    Size,
    Mtime,
    Checksum,
    TypeFlag,
    LinkName,
    Magic,
    Version,
    Uname,
    Gname,
    DevMajor,
    DevMinor,
    Prefix,
}

/// How the value of a field is turned into bytes.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum FieldKind {
    /// Raw bytes, truncated or null padded to the field length.
    Text,
    /// File mode with the type bits removed.
    Permissions,
    /// Octal or base-256 number.
    Number,
    /// Header checksum.
    Checksum,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct Field {
    pub id: FieldId,
    pub length: usize,
    pub kind: FieldKind,
}

const fn field(id: FieldId, length: usize, kind: FieldKind) -> Field {
    Field { id, length, kind }
}

/// Layout of a header, in the order the fields are written.
pub const FIELDS: [Field; 16] = [
    field(FieldId::Name, 100, FieldKind::Text),
    field(FieldId::Mode, 8, FieldKind::Permissions),
    field(FieldId::Uid, 8, FieldKind::Number),
    field(FieldId::Gid, 8, FieldKind::Number),
    field(FieldId::Size, 12, FieldKind::Number),
    field(FieldId::Mtime, 12, FieldKind::Number),
    field(FieldId::Checksum, 8, FieldKind::Checksum),
    field(FieldId::TypeFlag, 1, FieldKind::Text),
    field(FieldId::LinkName, 100, FieldKind::Text),
    field(FieldId::Magic, 6, FieldKind::Text),
    field(FieldId::Version, 2, FieldKind::Text),
    field(FieldId::Uname, 32, FieldKind::Text),
    field(FieldId::Gname, 32, FieldKind::Text),
    field(FieldId::DevMajor, 8, FieldKind::Number),
    field(FieldId::DevMinor, 8, FieldKind::Number),
    field(FieldId::Prefix, 155, FieldKind::Text),
];

/// Logical contents of one header block.
///
/// Device numbers and the path prefix are never used by this crate and are
/// always written as nulls. The magic and version are constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    pub name: Vec<u8>,
    pub mode: u32,
    pub uid: Option<u64>,
    pub gid: Option<u64>,
    pub size: u64,
    pub mtime: i64,
    pub typeflag: u8,
    pub linkname: Vec<u8>,
    pub uname: Option<String>,
    pub gname: Option<String>,
}

impl HeaderRecord {
    /// A regular file header with every other field left at its zero value.
    pub fn new<N: Into<Vec<u8>>>(name: N) -> HeaderRecord {
        HeaderRecord {
            name: name.into(),
            mode: 0,
            uid: None,
            gid: None,
            size: 0,
            mtime: 0,
            typeflag: TYPE_REGULAR,
            linkname: Vec::new(),
            uname: None,
            gname: None,
        }
    }

    /// The GNU record announcing that the next header has a name longer
    /// than the name field. Its content is the full name, null terminated.
    pub fn long_link_record(name: &[u8]) -> HeaderRecord {
        HeaderRecord {
            mode: defaults::MODE,
            uid: Some(0),
            gid: Some(0),
            size: name.len() as u64 + 1,
            typeflag: TYPE_LONG_LINK,
            uname: Some(LONG_LINK_OWNER.to_owned()),
            gname: Some(LONG_LINK_OWNER.to_owned()),
            ..HeaderRecord::new(LONG_LINK_NAME)
        }
    }

    /// Whether the name needs a long name record. Measured in bytes.
    pub fn has_long_name(&self) -> bool {
        self.name.len() > NAME_RANGE.len()
    }

    /// Number of bytes [`write_header`] produces, long name record included.
    pub fn encoded_len(&self) -> u64 {
        let block = BLOCK_SIZE as u64;
        if self.has_long_name() {
            let data = self.name.len() as u64 + 1;
            2 * block + data + padding_len(data)
        } else {
            block
        }
    }

    /// Encode into a full block, checksum included.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut block = Vec::with_capacity(BLOCK_SIZE);
        let mut checksum_at = None;

        for field in FIELDS.iter() {
            let encoded = match field.kind {
                FieldKind::Text => Some(self.text_of(field.id).to_vec()),
                FieldKind::Number => encode_number(self.number_of(field.id), field.length)?,
                FieldKind::Permissions => encode_permissions(Some(self.mode), field.length)?,
                FieldKind::Checksum => {
                    checksum_at = Some((block.len(), field.length));
                    Some(encode_checksum(None, field.length)?)
                }
            };
            block.extend(fit(encoded.as_deref().unwrap_or_default(), field.length));
        }

        if let Some((offset, length)) = checksum_at {
            let sum: u32 = block.iter().map(|&b| u32::from(b)).sum();
            let encoded = encode_checksum(Some(sum), length)?;
            block[offset..offset + length].copy_from_slice(&fit(&encoded, length));
        }

        let padding = padding_len(block.len() as u64) as usize;
        block.resize(block.len() + padding, 0);
        Ok(block)
    }

    fn text_of(&self, id: FieldId) -> &[u8] {
        match id {
            FieldId::Name => &self.name,
            FieldId::TypeFlag => std::slice::from_ref(&self.typeflag),
            FieldId::LinkName => &self.linkname,
            FieldId::Magic => MAGIC,
            FieldId::Version => VERSION,
            FieldId::Uname => self.uname.as_ref().map_or(&[][..], |name| name.as_bytes()),
            FieldId::Gname => self.gname.as_ref().map_or(&[][..], |name| name.as_bytes()),
            _ => &[],
        }
    }

    fn number_of(&self, id: FieldId) -> Option<i128> {
        match id {
            FieldId::Uid => self.uid.map(i128::from),
            FieldId::Gid => self.gid.map(i128::from),
            FieldId::Size => Some(i128::from(self.size)),
            FieldId::Mtime => Some(i128::from(self.mtime)),
            _ => None,
        }
    }
}

/// Truncate or null pad `bytes` to exactly `length` bytes.
fn fit(bytes: &[u8], length: usize) -> Vec<u8> {
    let mut fitted = bytes[..bytes.len().min(length)].to_vec();
    fitted.resize(length, 0);
    fitted
}

/// Write a header, preceded by a long name record when the name needs one.
pub fn write_header<W: Write + ?Sized>(sink: &mut W, header: &HeaderRecord) -> Result<()> {
    if header.has_long_name() {
        let record = HeaderRecord::long_link_record(&header.name);
        sink.write_all(&record.encode()?)?;

        let mut data = header.name.clone();
        data.push(0);
        let padding = padding_len(data.len() as u64) as usize;
        data.resize(data.len() + padding, 0);
        sink.write_all(&data)?;

        trace!("wrote long name record for {} byte name", header.name.len());
    }

    sink.write_all(&header.encode()?)?;
    trace!("wrote header for {:?} (size {})", String::from_utf8_lossy(&header.name), header.size);
    Ok(())
}

/// Check the stored checksum of an encoded header, returning it.
pub fn verify_checksum(block: &TarBlock) -> Result<u32> {
    let stored = decode_number(&block[CHECKSUM_RANGE])?;
    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(offset, &byte)| if CHECKSUM_RANGE.contains(&offset) { b' ' } else { byte })
        .map(u32::from)
        .sum();

    if stored != u64::from(computed) {
        return Err(TarError::CheckSum { stored, computed });
    }

    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::header::*;

    fn sample() -> HeaderRecord {
        HeaderRecord {
            mode: 0o100_644,
            uid: Some(1001),
            gid: Some(33),
            size: 1043,
            mtime: 1_613_419_894,
            uname: Some("discourse".to_owned()),
            gname: Some("www-data".to_owned()),
            ..HeaderRecord::new("file1.txt")
        }
    }

    fn as_block(encoded: &[u8]) -> TarBlock {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(encoded);
        block
    }

    #[test]
    fn test_field_table_layout() {
        let total: usize = FIELDS.iter().map(|field| field.length).sum();
        assert_eq!(500, total);
        assert_eq!(PREFIX_RANGE.end, total);

        let checksum_offset: usize = FIELDS
            .iter()
            .take_while(|field| field.kind != FieldKind::Checksum)
            .map(|field| field.length)
            .sum();
        assert_eq!(CHECKSUM_RANGE.start, checksum_offset);
    }

    #[test]
    fn test_encode_fields() {
        let block = sample().encode().unwrap();
        assert_eq!(BLOCK_SIZE, block.len());
        assert_eq!(b"file1.txt\0", &block[0..10]);
        assert_eq!(b"0000644\0", &block[MODE_RANGE]);
        assert_eq!(b"0001751\0", &block[OWNER_RANGE]);
        assert_eq!(b"0000041\0", &block[GROUP_RANGE]);
        assert_eq!(b"00000002023\0", &block[SIZE_RANGE]);
        assert_eq!(b"14012552566\0", &block[MTIME_RANGE]);
        assert_eq!(b"013130\0 ", &block[CHECKSUM_RANGE]);
        assert_eq!(TYPE_REGULAR, block[LINK_TYPE_OFFSET]);
        assert_eq!(b"ustar ", &block[MAGIC_RANGE]);
        assert_eq!(b" \0", &block[VERSION_RANGE]);
        assert_eq!(&[0u8; 8], &block[DEVMAJOR_RANGE]);
        assert_eq!(&[0u8; 8], &block[DEVMINOR_RANGE]);
        assert!(block[500..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_checksum_roundtrip() {
        let block = as_block(&sample().encode().unwrap());
        let mut spaced = block;
        spaced[CHECKSUM_RANGE].copy_from_slice(b"        ");
        let sum: u64 = spaced.iter().map(|&b| u64::from(b)).sum();

        assert_eq!(sum, decode_number(&block[CHECKSUM_RANGE]).unwrap());
        assert_eq!(sum, u64::from(verify_checksum(&block).unwrap()));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut block = as_block(&sample().encode().unwrap());
        block[0] = b'g';
        match verify_checksum(&block) {
            Err(TarError::CheckSum { stored, computed }) => assert_eq!(stored + 1, u64::from(computed)),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_long_name_is_measured_in_bytes() {
        assert!(!HeaderRecord::new("a".repeat(100)).has_long_name());
        assert!(HeaderRecord::new("a".repeat(101)).has_long_name());
        // 34 characters, 102 bytes.
        assert!(HeaderRecord::new("这".repeat(34)).has_long_name());
        assert!(!HeaderRecord::new("这".repeat(33)).has_long_name());
    }

    #[test]
    fn test_long_link_record() {
        let record = HeaderRecord::long_link_record(&[b'x'; 129]);
        assert_eq!(b"././@LongLink".to_vec(), record.name);
        assert_eq!(0o644, record.mode);
        assert_eq!((Some(0), Some(0)), (record.uid, record.gid));
        assert_eq!(130, record.size);
        assert_eq!(TYPE_LONG_LINK, record.typeflag);
        assert_eq!(Some("root"), record.uname.as_deref());
        assert_eq!(Some("root"), record.gname.as_deref());
    }

    #[test]
    fn test_write_long_name() {
        let name = "d/".repeat(60) + "file.txt";
        let header = HeaderRecord::new(name.clone());
        let mut out = Vec::new();
        write_header(&mut out, &header).unwrap();

        assert_eq!(3 * BLOCK_SIZE, out.len());
        assert_eq!(b"././@LongLink\0", &out[0..14]);
        assert_eq!(name.as_bytes(), &out[BLOCK_SIZE..BLOCK_SIZE + name.len()]);
        assert!(out[BLOCK_SIZE + name.len()..2 * BLOCK_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&name.as_bytes()[..100], &out[2 * BLOCK_SIZE..2 * BLOCK_SIZE + 100]);
    }

    #[test]
    fn test_write_short_name() {
        let mut out = Vec::new();
        write_header(&mut out, &sample()).unwrap();
        assert_eq!(sample().encode().unwrap(), out);
    }

    #[test]
    fn test_encoded_len_matches_output() {
        for name in &["a".repeat(100), "a".repeat(101), "a".repeat(511), "a".repeat(512)] {
            let header = HeaderRecord::new(name.clone());
            let mut out = Vec::new();
            write_header(&mut out, &header).unwrap();
            assert_eq!(out.len() as u64, header.encoded_len(), "name of {} bytes", name.len());
        }
        assert_eq!(4 * BLOCK_SIZE as u64, HeaderRecord::new("a".repeat(512)).encoded_len());
    }

    #[test]
    fn test_negative_mtime() {
        let header = HeaderRecord { mtime: -1, ..sample() };
        match header.encode() {
            Err(TarError::UnsupportedValue(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
