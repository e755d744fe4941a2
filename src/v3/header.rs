//! Header table of v3 result files.
//!
//! The table starts at offset 686 and is a run of fixed 344-byte strides.
//! Only the first 320 bytes of each stride carry data:
//!
//! ```text
//!  0   8  magic id
//!  8 296  label, Latin-1, null padded  ("run:prefix_data name")
//! 304  4  declared payload size        (i32 LE)
//! 308  4  offset to next record        (i32 LE)
//! 312  4  base address                 (i32 LE)
//! 316  4  offset from address to data  (i32 LE)
//! ```
//!
//! The table ends 342 bytes past the first occurrence of the run-log magic.
//! The instrument re-declares the same logical stream several times; records
//! sharing a data name are merged into one [`RecordDescriptor`] that keeps the
//! first position and the latest fields.

use std::io::{self, Cursor, Read};
use std::ops::Range;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::check::find_in;
use super::decode::{latin1_field, RecordError};
use super::magic::{RecordType, LOGBOOK_HEADER_ID};
use crate::index::EntryMap;

pub const HEADER_START:      usize = 686;
pub const HEADER_STRIDE:     usize = 344;
pub const HEADER_RECORD_LEN: usize = 320;
pub const LABEL_LEN:         usize = 296;
/// Distance from the sentinel magic to the end of the table.
pub const SENTINEL_TAIL:     usize = 342;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Header record at offset {offset} runs past end of file ({len} bytes)")]
    Truncated { offset: usize, len: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn serialize_magic<S: Serializer>(id: &[u8; 8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDescriptor {
    #[serde(serialize_with = "serialize_magic")]
    pub magic_id:  [u8; 8],
    pub run_name:  String,
    pub data_name: String,
    pub d_size:    i32,
    pub off_next:  i32,
    pub address:   i32,
    pub off_data:  i32,
}

impl RecordDescriptor {
    /// Parse one 320-byte header record.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut magic_id = [0u8; 8];
        reader.read_exact(&mut magic_id)?;
        let mut label = [0u8; LABEL_LEN];
        reader.read_exact(&mut label)?;
        let (run_name, data_name) = split_label(&latin1_field(&label));
        Ok(Self {
            magic_id,
            run_name,
            data_name,
            d_size:   reader.read_i32::<LittleEndian>()?,
            off_next: reader.read_i32::<LittleEndian>()?,
            address:  reader.read_i32::<LittleEndian>()?,
            off_data: reader.read_i32::<LittleEndian>()?,
        })
    }

    pub fn record_type(&self) -> RecordType {
        RecordType::from_magic(&self.magic_id)
    }

    /// `address + off_data`.
    pub fn start(&self) -> i64 {
        self.address as i64 + self.off_data as i64
    }

    /// `address + d_size`.
    pub fn end(&self) -> i64 {
        self.address as i64 + self.d_size as i64
    }

    /// Payload bounds, checked against a buffer of `len` bytes.
    ///
    /// Fails unless `0 <= start <= end <= len`.
    pub fn payload_range(&self, len: usize) -> Result<Range<usize>, RecordError> {
        let (start, end) = (self.start(), self.end());
        if start < 0 || start > end || end > len as i64 {
            return Err(RecordError::OutOfBounds { start, end, len });
        }
        Ok(start as usize..end as usize)
    }
}

/// Split a header label into `(run name, data name)`.
///
/// Without a colon the whole label is the data name.  With a colon the run
/// name is the text before it and the data name the text after the first
/// underscore.
pub fn split_label(label: &str) -> (String, String) {
    match label.find(':') {
        None => (String::new(), label.to_owned()),
        Some(colon) => {
            let run = label[..colon].to_owned();
            let data = match label.find('_') {
                Some(us) => label[us + 1..].to_owned(),
                None => label.to_owned(),
            };
            (run, data)
        }
    }
}

/// Result of walking the header table.
#[derive(Debug, Clone, Default)]
pub struct HeaderScan {
    pub records:   EntryMap<RecordDescriptor>,
    /// Offset of the first record that ran past the end of the file.
    pub truncated: Option<usize>,
}

impl HeaderScan {
    /// The truncation as an error, for reporting.
    pub fn truncation(&self, len: usize) -> Option<HeaderError> {
        self.truncated.map(|offset| HeaderError::Truncated { offset, len })
    }
}

/// Walk the header table and merge records by data name.
///
/// A file without the sentinel record has an empty table.  A table cut off
/// by the end of the file keeps every complete record before the cut.
pub fn scan(raw: &[u8]) -> Result<HeaderScan, HeaderError> {
    let mut scan = HeaderScan::default();
    let sentinel = match find_in(raw, &LOGBOOK_HEADER_ID, 0, raw.len()) {
        Some(s) => s,
        None => {
            log::warn!("header sentinel not found, header table is empty");
            return Ok(scan);
        }
    };
    let end = sentinel + SENTINEL_TAIL;

    let mut offset = HEADER_START;
    while offset < end {
        let Some(bytes) = raw.get(offset..offset + HEADER_RECORD_LEN) else {
            log::warn!("header table cut off at offset {offset} ({} bytes)", raw.len());
            scan.truncated = Some(offset);
            break;
        };
        let desc = RecordDescriptor::read(Cursor::new(bytes))?;
        merge(&mut scan.records, desc);
        offset += HEADER_STRIDE;
    }
    log::debug!("header table: {} record(s) up to offset {end}", scan.records.len());
    Ok(scan)
}

/// Look up `desc.data_name`, inserting on first sight; later fields win.
pub fn merge(table: &mut EntryMap<RecordDescriptor>, desc: RecordDescriptor) {
    let slot = table.get_or_insert_with(&desc.data_name, || desc.clone());
    *slot = desc;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(name: &str, size: i32) -> RecordDescriptor {
        RecordDescriptor {
            magic_id:  [0; 8],
            run_name:  String::new(),
            data_name: name.into(),
            d_size:    size,
            off_next:  0,
            address:   100,
            off_data:  10,
        }
    }

    #[test]
    fn label_split() {
        assert_eq!(split_label("Logbook"), ("".into(), "Logbook".into()));
        assert_eq!(
            split_label("Run 42:10_UV1_280nm"),
            ("Run 42".into(), "UV1_280nm".into())
        );
        assert_eq!(split_label("Run:Cond"), ("Run".into(), "Run:Cond".into()));
    }

    #[test]
    fn merge_keeps_position_and_latest_fields() {
        let mut t = EntryMap::new();
        merge(&mut t, desc("UV", 10));
        merge(&mut t, desc("Cond", 20));
        merge(&mut t, desc("UV", 30));
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["UV", "Cond"]);
        assert_eq!(t.get("UV").map(|d| d.d_size), Some(30));
    }

    #[test]
    fn payload_range_bounds() {
        assert_eq!(desc("a", 50).payload_range(200).unwrap(), 110..150);
        assert!(desc("a", 5).payload_range(200).is_err());
        assert!(desc("a", 500).payload_range(200).is_err());
        let mut d = desc("a", 50);
        d.address = -200;
        assert!(d.payload_range(200).is_err());
    }

    #[test]
    fn read_parses_fixed_layout() {
        let mut buf = vec![0xAB; 8];
        let mut label = b"Run:1_Cond".to_vec();
        label.resize(LABEL_LEN, 0);
        buf.extend_from_slice(&label);
        for v in [16i32, 344, 4000, 24] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(buf.len(), HEADER_RECORD_LEN);
        let d = RecordDescriptor::read(Cursor::new(&buf)).unwrap();
        assert_eq!(d.run_name, "Run");
        assert_eq!(d.data_name, "Cond");
        assert_eq!((d.d_size, d.off_next, d.address, d.off_data), (16, 344, 4000, 24));
        assert_eq!((d.start(), d.end()), (4024, 4016));
    }

    #[test]
    fn missing_sentinel_gives_empty_table() {
        let scan = scan(&[0u8; 2048]).unwrap();
        assert!(scan.records.is_empty());
        assert!(scan.truncated.is_none());
    }

    #[test]
    fn table_cut_off_keeps_complete_records() {
        let mut raw = vec![0u8; HEADER_START];
        for (magic, label) in [([0x11; 8], "R:1_UV"), ([0x22; 8], "R:1_Cond"), (LOGBOOK_HEADER_ID, "R:1_LogBook")] {
            let mut rec = magic.to_vec();
            let mut field = label.as_bytes().to_vec();
            field.resize(LABEL_LEN, 0);
            rec.extend_from_slice(&field);
            rec.resize(HEADER_STRIDE, 0);
            raw.extend_from_slice(&rec);
        }
        let cut = HEADER_START + 2 * HEADER_STRIDE + 100;
        raw.truncate(cut);

        let scan = scan(&raw).unwrap();
        assert_eq!(scan.records.keys().collect::<Vec<_>>(), vec!["UV", "Cond"]);
        assert_eq!(scan.truncated, Some(HEADER_START + 2 * HEADER_STRIDE));
        assert!(matches!(
            scan.truncation(raw.len()),
            Some(HeaderError::Truncated { len, .. }) if len == cut
        ));
    }
}
