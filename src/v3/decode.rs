//! Payload decoders for v3 records.
//!
//! | Kind | Stride | Layout |
//! |------|--------|--------|
//! | annotation | 180 B | f64 time, f64 volume, 158 B label |
//! | text | n/a | Latin-1 text, declared size overshoots |
//! | curve | 8 B | i32 volume × 100, i32 amplitude × divisor |
//!
//! All volumes are reported relative to the injection baseline and rounded
//! to four decimals.

use std::io::{self, Cursor};

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;

use super::header::RecordDescriptor;
use super::magic::RecordKind;
use crate::block::DataBlock;

pub const ANNOTATION_STRIDE:    usize = 180;
pub const ANNOTATION_LEN:       usize = 174;
pub const ANNOTATION_LABEL_LEN: usize = 158;
pub const SAMPLE_STRIDE:        usize = 8;
/// Unit field position relative to the record's base address.
pub const UNIT_OFFSET:          i64   = 207;
pub const UNIT_LEN:             usize = 15;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Payload {start}..{end} outside buffer of {len} bytes")]
    OutOfBounds { start: i64, end: i64, len: usize },
    #[error("Stride at offset {offset} runs past end of buffer")]
    Truncated { offset: usize },
    #[error("Unit field at offset {offset} outside buffer")]
    UnitOutOfBounds { offset: i64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Latin-1 decode: every byte is one code point.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Latin-1 decode of a fixed-width field with trailing null padding.
pub fn latin1_field(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    latin1(&bytes[..end])
}

/// Round to four decimal places.
pub fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Amplitude divisor by sensor name.
pub fn sensor_divisor(name: &str) -> f64 {
    if name.contains("UV") || name == "Cond" || name == "Flow" {
        1000.0
    } else if name.contains("Pressure") {
        100.0
    } else {
        10.0
    }
}

/// Replace the bare `C` some files carry for temperature with `°C`.
pub fn fix_unit(unit: String) -> String {
    if unit == "C" {
        "°C".to_owned()
    } else {
        unit
    }
}

// ── Annotation ────────────────────────────────────────────────────────────────

/// Decode `(volume - baseline, label)` pairs.
pub fn read_annotations(
    raw:      &[u8],
    desc:     &RecordDescriptor,
    baseline: f64,
) -> Result<Vec<(f64, String)>, RecordError> {
    let range = desc.payload_range(raw.len())?;
    let mut out = Vec::with_capacity(range.len() / ANNOTATION_STRIDE + 1);
    for offset in range.step_by(ANNOTATION_STRIDE) {
        let bytes = raw
            .get(offset..offset + ANNOTATION_LEN)
            .ok_or(RecordError::Truncated { offset })?;
        let mut cur = Cursor::new(bytes);
        let _time = cur.read_f64::<LittleEndian>()?;
        let volume = cur.read_f64::<LittleEndian>()?;
        let label = latin1_field(&bytes[16..16 + ANNOTATION_LABEL_LEN]);
        out.push((round4(volume - baseline), label));
    }
    Ok(out)
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Decode a text block and normalise its line endings to `\r\n`.
///
/// The descriptor must pass [`RecordDescriptor::payload_range`].  The read
/// then spans `d_size` bytes from the payload start, clipped to the buffer,
/// and the text ends at the last `\n` within it; that newline is not part of
/// the result.  A block without any `\n` decodes as empty.
pub fn read_text(raw: &[u8], desc: &RecordDescriptor) -> Result<String, RecordError> {
    let range = desc.payload_range(raw.len())?;
    let end = (range.start as i64 + desc.d_size as i64).clamp(range.start as i64, raw.len() as i64);
    let block = &raw[range.start..end as usize];

    let cut = block.iter().rposition(|&b| b == b'\n').unwrap_or(0);
    if cut + 1 != block.len() {
        log::debug!("text block '{}': size {} re-measured to {cut}", desc.data_name, block.len());
    }
    let text = latin1(&block[..cut]);
    if text.contains('\r') {
        Ok(text)
    } else {
        Ok(text.replace('\n', "\r\n"))
    }
}

// ── Curve ─────────────────────────────────────────────────────────────────────

/// Sensor unit from the fixed field after the record's base address.
pub fn read_unit(raw: &[u8], desc: &RecordDescriptor) -> Result<String, RecordError> {
    let offset = desc.address as i64 + UNIT_OFFSET;
    if offset < 0 {
        return Err(RecordError::UnitOutOfBounds { offset });
    }
    let start = offset as usize;
    let bytes = raw
        .get(start..start + UNIT_LEN)
        .ok_or(RecordError::UnitOutOfBounds { offset })?;
    Ok(fix_unit(latin1_field(bytes)))
}

/// Decode `(volume - baseline, amplitude)` samples, keeping every `reduce`th.
pub fn read_samples(
    raw:      &[u8],
    desc:     &RecordDescriptor,
    baseline: f64,
    reduce:   usize,
) -> Result<Vec<(f64, f64)>, RecordError> {
    let range = desc.payload_range(raw.len())?;
    let divisor = sensor_divisor(&desc.data_name);
    let mut out = Vec::with_capacity(range.len() / SAMPLE_STRIDE);
    for offset in range.step_by(SAMPLE_STRIDE) {
        let bytes = raw
            .get(offset..offset + SAMPLE_STRIDE)
            .ok_or(RecordError::Truncated { offset })?;
        let mut cur = Cursor::new(bytes);
        let volume = cur.read_i32::<LittleEndian>()?;
        let amplitude = cur.read_i32::<LittleEndian>()?;
        out.push((
            round4(volume as f64 / 100.0 - baseline),
            amplitude as f64 / divisor,
        ));
    }
    Ok(subsample(out, reduce))
}

/// Keep every `n`th element starting with the first.  `n <= 1` is the identity.
pub fn subsample<T>(items: Vec<T>, n: usize) -> Vec<T> {
    if n <= 1 {
        return items;
    }
    items.into_iter().step_by(n).collect()
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// Decode one record.  `Ok(None)` for empty or unrecognised records.
pub fn decode_record(
    raw:      &[u8],
    desc:     &RecordDescriptor,
    baseline: f64,
    reduce:   usize,
) -> Result<Option<DataBlock>, RecordError> {
    if desc.d_size == 0 {
        return Ok(None);
    }
    let block = match desc.record_type().kind() {
        RecordKind::Annotation => DataBlock::Annotation {
            data: read_annotations(raw, desc, baseline)?,
        },
        RecordKind::Text => DataBlock::Text { data: read_text(raw, desc)? },
        RecordKind::Curve => DataBlock::Curve {
            unit: read_unit(raw, desc)?,
            data: read_samples(raw, desc, baseline, reduce)?,
        },
        RecordKind::Unrecognized => return Ok(None),
    };
    Ok(Some(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v3::magic::{CNOTES_ID, SENSDATA_ID};

    fn desc(magic_id: [u8; 8], name: &str, address: i32, off_data: i32, d_size: i32) -> RecordDescriptor {
        RecordDescriptor {
            magic_id,
            run_name: String::new(),
            data_name: name.into(),
            d_size,
            off_next: 0,
            address,
            off_data,
        }
    }

    #[test]
    fn divisor_table() {
        assert_eq!(sensor_divisor("UV 1_280"), 1000.0);
        assert_eq!(sensor_divisor("Cond"), 1000.0);
        assert_eq!(sensor_divisor("Flow"), 1000.0);
        assert_eq!(sensor_divisor("Pressure Main"), 100.0);
        assert_eq!(sensor_divisor("Temp"), 10.0);
        assert_eq!(sensor_divisor("Cond %"), 10.0);
    }

    #[test]
    fn unit_fix_only_touches_bare_c() {
        assert_eq!(fix_unit("C".into()), "°C");
        assert_eq!(fix_unit("mS/cm".into()), "mS/cm");
        assert_eq!(fix_unit("°C".into()), "°C");
    }

    #[test]
    fn latin1_field_trims_padding_only() {
        assert_eq!(latin1_field(b"ml\0\0\0"), "ml");
        assert_eq!(latin1_field(&[0xB0, b'C', 0]), "°C");
        assert_eq!(latin1_field(&[0, 0]), "");
    }

    #[test]
    fn text_block_remeasured_and_normalised() {
        let mut raw = vec![0u8; 10];
        raw.extend_from_slice(b"line one\nline two\nXYZ");
        let d = desc(CNOTES_ID, "Notes", 0, 10, 22);
        assert_eq!(read_text(&raw, &d).unwrap(), "line one\r\nline two");
    }

    #[test]
    fn text_block_with_cr_kept() {
        let raw = b"a\r\nb\r\n".to_vec();
        let d = desc(CNOTES_ID, "Notes", 0, 0, 6);
        assert_eq!(read_text(&raw, &d).unwrap(), "a\r\nb\r");
    }

    #[test]
    fn text_block_without_newline_is_empty() {
        let raw = b"no newline".to_vec();
        let d = desc(CNOTES_ID, "Notes", 0, 0, 10);
        assert_eq!(read_text(&raw, &d).unwrap(), "");
    }

    #[test]
    fn text_block_outside_buffer_is_rejected() {
        let raw = b"one\ntwo\n".to_vec();
        let past_end = desc(CNOTES_ID, "Notes", 2, 0, 1_000_000);
        assert!(matches!(read_text(&raw, &past_end), Err(RecordError::OutOfBounds { .. })));
        let inverted = desc(CNOTES_ID, "Notes", 0, 6, 4);
        assert!(matches!(read_text(&raw, &inverted), Err(RecordError::OutOfBounds { .. })));
        let negative = desc(CNOTES_ID, "Notes", -4, 0, 8);
        assert!(read_text(&raw, &negative).is_err());
    }

    #[test]
    fn curve_samples_scaled_and_shifted() {
        let mut raw = vec![0u8; 16];
        for (v, a) in [(150i32, 2500i32), (275, -1000)] {
            raw.extend_from_slice(&v.to_le_bytes());
            raw.extend_from_slice(&a.to_le_bytes());
        }
        let d = desc(SENSDATA_ID, "UV1_280nm", 0, 16, 32);
        let data = read_samples(&raw, &d, 0.5, 1).unwrap();
        assert_eq!(data, vec![(1.0, 2.5), (2.25, -1.0)]);
    }

    #[test]
    fn subsample_every_nth() {
        assert_eq!(subsample(vec![0, 1, 2, 3, 4, 5, 6], 3), vec![0, 3, 6]);
        assert_eq!(subsample(vec![1, 2], 1), vec![1, 2]);
        assert_eq!(subsample(vec![1, 2], 0), vec![1, 2]);
    }

    #[test]
    fn zero_size_records_are_skipped() {
        let d = desc(SENSDATA_ID, "UV", 0, 0, 0);
        assert!(decode_record(&[], &d, 0.0, 1).unwrap().is_none());
    }
}
