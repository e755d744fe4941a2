//! Decoding of the files inside nested archives.
//!
//! ```text
//! sub-entry                         becomes
//! ──────────────────────────────    ─────────────────────────────
//! key contains "DataType"           Text, trimmed of \r and \n
//! parent contains "True", no "Xml"  Floats (47 B header, 49 B footer, f32 LE)
//! anything else, <= 24 bytes        Absent
//! anything else                     Xml, from the first '<' to the last '>'
//! ```

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use super::container::ContainerEntry;
use super::xml::{self, XmlError};
use crate::index::EntryMap;
use crate::recovery::{IssueKind, LoadReport};

pub const STREAM_HEADER_LEN: usize = 47;
pub const STREAM_FOOTER_LEN: usize = 49;
/// Sub-entries up to this size carry no document.
pub const ABSENT_MAX_LEN:    usize = 24;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Payload of {len} bytes is not a whole number of f32 values")]
    Misaligned { len: usize },
    #[error("Text is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// True for parent archives that hold coordinate streams.
pub fn is_stream_archive(parent: &str) -> bool {
    parent.contains("True") && !parent.contains("Xml")
}

/// Strip the fixed stream framing and widen every LE f32 to `f64`.
///
/// A stream too short for its framing decodes as empty.
pub fn decode_floats(bytes: &[u8]) -> Result<Vec<f64>, StreamError> {
    if bytes.len() <= STREAM_HEADER_LEN + STREAM_FOOTER_LEN {
        return Ok(Vec::new());
    }
    let payload = &bytes[STREAM_HEADER_LEN..bytes.len() - STREAM_FOOTER_LEN];
    if payload.len() % 4 != 0 {
        return Err(StreamError::Misaligned { len: payload.len() });
    }
    let mut cur = Cursor::new(payload);
    let mut values = Vec::with_capacity(payload.len() / 4);
    for _ in 0..payload.len() / 4 {
        values.push(cur.read_f32::<LittleEndian>()? as f64);
    }
    Ok(values)
}

pub fn decode_data_type(bytes: &[u8]) -> Result<String, StreamError> {
    let text = String::from_utf8(bytes.to_vec())?;
    Ok(text.trim_matches(|c| c == '\r' || c == '\n').to_owned())
}

/// Decode one file of the nested archive `parent`.
pub fn decode_sub_entry(parent: &str, key: &str, bytes: &[u8]) -> Result<ContainerEntry, StreamError> {
    if key.contains("DataType") {
        Ok(ContainerEntry::Text(decode_data_type(bytes)?))
    } else if is_stream_archive(parent) {
        Ok(ContainerEntry::Floats(decode_floats(bytes)?))
    } else if bytes.len() <= ABSENT_MAX_LEN {
        Ok(ContainerEntry::Absent)
    } else {
        Ok(ContainerEntry::Xml(xml::parse_embedded(bytes)?))
    }
}

/// Decode every raw file of a nested archive.  A file that fails is dropped
/// and reported as `parent/key`.
pub fn decode_archive(
    parent:  &str,
    archive: EntryMap<ContainerEntry>,
    report:  &mut LoadReport,
) -> EntryMap<ContainerEntry> {
    let mut out = EntryMap::new();
    for (key, entry) in archive {
        let decoded = match entry {
            ContainerEntry::Raw(bytes) => match decode_sub_entry(parent, &key, &bytes) {
                Ok(d) => d,
                Err(e) => {
                    report.push(format!("{parent}/{key}"), IssueKind::DecodeFailure { reason: e.to_string() });
                    continue;
                }
            },
            other => other,
        };
        out.insert(key, decoded);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(values: &[f32]) -> Vec<u8> {
        let mut v = vec![0xEE; STREAM_HEADER_LEN];
        for x in values {
            v.extend_from_slice(&x.to_le_bytes());
        }
        v.extend_from_slice(&[0xDD; STREAM_FOOTER_LEN]);
        v
    }

    #[test]
    fn floats_are_widened_exactly() {
        let x = -0.0016426085494458675_f64 as f32;
        let out = decode_floats(&framed(&[x, 1.5, 0.0])).unwrap();
        assert_eq!(out, vec![x as f64, 1.5, 0.0]);
        assert_eq!(out[0], -0.0016426085494458675_f64 as f32 as f64);
    }

    #[test]
    fn short_stream_is_empty() {
        assert!(decode_floats(&[0u8; 96]).unwrap().is_empty());
        assert!(decode_floats(&[]).unwrap().is_empty());
    }

    #[test]
    fn misaligned_stream_fails() {
        let mut bytes = framed(&[1.0]);
        bytes.insert(STREAM_HEADER_LEN, 0);
        assert!(matches!(decode_floats(&bytes), Err(StreamError::Misaligned { len: 5 })));
    }

    #[test]
    fn sub_entries_classified() {
        let parent = "Chrom.1_2_True";
        assert_eq!(
            decode_sub_entry(parent, "DataType", b"Float\r\n").unwrap(),
            ContainerEntry::Text("Float".into())
        );
        assert_eq!(
            decode_sub_entry(parent, "CoordinateData.Amplitudes", &framed(&[2.0])).unwrap(),
            ContainerEntry::Floats(vec![2.0])
        );
        assert_eq!(decode_sub_entry("Chrom.1", "Meta", b"<a/>").unwrap(), ContainerEntry::Absent);
        let doc = b"\xEF\xBB\xBF<Meta><Id>4</Id></Meta>\0";
        let entry = decode_sub_entry("Chrom.1", "Meta", doc).unwrap();
        assert_eq!(entry.as_xml().and_then(|x| x.child_text("Id")), Some("4"));
    }

    #[test]
    fn failing_sub_entry_is_dropped_and_reported() {
        let mut archive = EntryMap::new();
        archive.insert("DataType", ContainerEntry::Raw(b"Float".to_vec()));
        archive.insert("Broken", ContainerEntry::Raw(b"<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<".to_vec()));
        let mut report = LoadReport::default();
        let out = decode_archive("Chrom.1", archive, &mut report);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["DataType"]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].entry, "Chrom.1/Broken");
    }
}
