//! Synthetic result files for the integration tests.
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use unires::recovery::repair::PADDED_ZIP_MAGIC;
use unires::v3::decode::{ANNOTATION_LEN, UNIT_OFFSET, UNIT_LEN};
use unires::v3::header::{HEADER_START, HEADER_STRIDE, LABEL_LEN};
use unires::v3::magic::{RES_MAGIC, RES_VERSION};
use unires::v6::stream::{STREAM_FOOTER_LEN, STREAM_HEADER_LEN};

// ── v3 ────────────────────────────────────────────────────────────────────────

/// Curve payloads start after the unit field.
pub const CURVE_DATA_OFFSET: i32 = 224;
/// First free byte after the operator name, usable for data blocks.
pub const PREAMBLE_FREE: usize = 160;

pub fn annotation(time: f64, volume: f64, label: &str) -> Vec<u8> {
    let mut v = Vec::with_capacity(180);
    v.extend_from_slice(&time.to_le_bytes());
    v.extend_from_slice(&volume.to_le_bytes());
    v.extend_from_slice(label.as_bytes());
    v.resize(ANNOTATION_LEN, 0);
    v.resize(180, 0);
    v
}

pub fn annotations(items: &[(f64, &str)]) -> Vec<u8> {
    items.iter().flat_map(|(vol, label)| annotation(0.0, *vol, label)).collect()
}

/// Raw `(volume × 100, amplitude × divisor)` samples.
pub fn samples(items: &[(i32, i32)]) -> Vec<u8> {
    let mut v = Vec::with_capacity(items.len() * 8);
    for (vol, amp) in items {
        v.extend_from_slice(&vol.to_le_bytes());
        v.extend_from_slice(&amp.to_le_bytes());
    }
    v
}

struct Rec {
    magic:    [u8; 8],
    label:    String,
    off_data: i32,
    unit:     Option<String>,
    payload:  Vec<u8>,
}

/// Builds a v3 `.res` buffer: file header, header table, then one data
/// block per record in declaration order.
pub struct Res3Builder {
    user:     String,
    records:  Vec<Rec>,
    preamble: bool,
}

impl Res3Builder {
    pub fn new() -> Self {
        Self { user: String::new(), records: Vec::new(), preamble: false }
    }

    pub fn user(mut self, name: &str) -> Self {
        self.user = name.to_owned();
        self
    }

    pub fn annotation(mut self, magic: [u8; 8], label: &str, payload: Vec<u8>) -> Self {
        self.records.push(Rec { magic, label: label.into(), off_data: 16, unit: None, payload });
        self
    }

    pub fn text(mut self, magic: [u8; 8], label: &str, text: &str) -> Self {
        let payload = text.bytes().collect();
        self.records.push(Rec { magic, label: label.into(), off_data: 0, unit: None, payload });
        self
    }

    pub fn curve(mut self, magic: [u8; 8], label: &str, unit: &str, payload: Vec<u8>) -> Self {
        self.records.push(Rec {
            magic,
            label: label.into(),
            off_data: CURVE_DATA_OFFSET,
            unit: Some(unit.into()),
            payload,
        });
        self
    }

    /// Place data blocks in the free space before the header table, so the
    /// table is the last thing in the file.
    pub fn data_in_preamble(mut self) -> Self {
        self.preamble = true;
        self
    }

    /// Record with no data block (size 0).
    pub fn empty(mut self, magic: [u8; 8], label: &str) -> Self {
        self.records.push(Rec { magic, label: label.into(), off_data: 0, unit: None, payload: Vec::new() });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let table_end = HEADER_START + self.records.len() * HEADER_STRIDE;
        let mut raw = vec![0u8; table_end];
        raw[..16].copy_from_slice(&RES_MAGIC);
        raw[24..24 + RES_VERSION.len()].copy_from_slice(RES_VERSION);
        raw[118..118 + self.user.len()].copy_from_slice(self.user.as_bytes());

        let mut next = PREAMBLE_FREE;
        for (i, rec) in self.records.iter().enumerate() {
            let (address, d_size) = if rec.payload.is_empty() {
                (0, 0)
            } else {
                let mut block = vec![0u8; rec.off_data as usize];
                if let Some(unit) = &rec.unit {
                    let at = UNIT_OFFSET as usize;
                    block[at..at + unit.len().min(UNIT_LEN)].copy_from_slice(&unit.as_bytes()[..unit.len().min(UNIT_LEN)]);
                }
                block.extend_from_slice(&rec.payload);
                let size = block.len() as i32;
                let address = if self.preamble {
                    let at = next;
                    assert!(at + block.len() <= HEADER_START, "preamble data too large");
                    raw[at..at + block.len()].copy_from_slice(&block);
                    next += block.len();
                    at
                } else {
                    raw.extend_from_slice(&block);
                    raw.len() - block.len()
                };
                (address as i32, size)
            };

            let at = HEADER_START + i * HEADER_STRIDE;
            raw[at..at + 8].copy_from_slice(&rec.magic);
            let label = rec.label.as_bytes();
            raw[at + 8..at + 8 + label.len().min(LABEL_LEN)].copy_from_slice(&label[..label.len().min(LABEL_LEN)]);
            let mut fields = Vec::with_capacity(16);
            for v in [d_size, HEADER_STRIDE as i32, address, rec.off_data] {
                fields.extend_from_slice(&v.to_le_bytes());
            }
            raw[at + 304..at + 320].copy_from_slice(&fields);
        }

        let size = raw.len() as i32;
        raw[16..20].copy_from_slice(&size.to_le_bytes());
        raw
    }
}

// ── v6 ────────────────────────────────────────────────────────────────────────

pub fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A nested archive the way the instrument writes it: the padded-archive
/// local header prefix and null bytes after the end-of-central-directory.
pub fn padded_zip_of(files: &[(&str, &[u8])], padding: usize) -> Vec<u8> {
    let mut bytes = zip_of(files);
    bytes[..PADDED_ZIP_MAGIC.len()].copy_from_slice(&PADDED_ZIP_MAGIC);
    bytes.extend(std::iter::repeat(0u8).take(padding));
    bytes
}

/// Coordinate stream with its 47-byte header and 49-byte footer.
pub fn float_stream(values: &[f32]) -> Vec<u8> {
    let mut v = vec![0x01; STREAM_HEADER_LEN];
    for x in values {
        v.extend_from_slice(&x.to_le_bytes());
    }
    v.extend_from_slice(&[0x02; STREAM_FOOTER_LEN]);
    v
}

pub fn stream_archive(volumes: &[f32], amplitudes: &[f32], padding: usize) -> Vec<u8> {
    let vol = float_stream(volumes);
    let amp = float_stream(amplitudes);
    padded_zip_of(
        &[
            ("DataType", b"Float\r\n".as_slice()),
            ("CoordinateData.Volumes", vol.as_slice()),
            ("CoordinateData.Amplitudes", amp.as_slice()),
        ],
        padding,
    )
}

fn curve_xml(data_type: &str, name: &str, unit: &str, source: &str) -> String {
    format!(
        r#"<Curve CurveDataType="{data_type}"><Name>{name}</Name><AmplitudeUnit>{unit}</AmplitudeUnit><CurvePoints><CurvePoint><Id>1</Id><BinaryCurvePointsFileName>{source}</BinaryCurvePointsFileName></CurvePoint></CurvePoints></Curve>"#
    )
}

pub const UV_PREFIX: f64 = -0.0016426085494458675;

/// UV amplitudes: five copies of [`UV_PREFIX`] then changing values.
pub fn uv_amplitudes() -> Vec<f32> {
    let mut v = vec![UV_PREFIX as f32; 5];
    v.extend_from_slice(&[0.25, 1.5, 12.75, 12.5, 3.0]);
    v
}

/// A complete v6 container with one chromatogram.
///
/// * `Chrom.1_1_True`: UV coordinates, volumes all `0.0`
/// * `Chrom.1_2_True`: conductivity coordinates
/// * `Chrom.1_3_True`: injection mark at volume `4.0`
/// * `Chrom.1.Xml`: declares all three plus a fraction event curve and a
///   curve with no coordinate archive
pub fn uni6_container() -> Vec<u8> {
    let uv = stream_archive(&[0.0; 10], &uv_amplitudes(), 37);
    let cond = stream_archive(&[0.0, 1.0, 2.0], &[10.0, 11.0, 12.0], 0);
    let inject = stream_archive(&[0.0, 4.0], &[0.0, 1.0], 5);

    let chrom = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Chromatogram>
  <ChromatogramID>1</ChromatogramID>
  <EventCurves>
    <EventCurve EventCurveType="Fraction"><Name>Fraction</Name><IsOriginalData>true</IsOriginalData>
      <Events>
        <Event><EventVolume>1.25</EventVolume><EventText>1.A.1</EventText></Event>
        <Event><EventVolume>2.5</EventVolume><EventText>Waste</EventText></Event>
      </Events>
    </EventCurve>
    <EventCurve EventCurveType="Logbook"><Name>Run Log</Name><IsOriginalData>false</IsOriginalData><Events/></EventCurve>
  </EventCurves>
  <Curves>
    {}
    {}
    {}
    {}
  </Curves>
</Chromatogram>"#,
        curve_xml("UV", "UV 1_280", "mAU", "Chrom.1_1_True"),
        curve_xml("Conductivity", "Cond", "mS/cm", "Chrom.1_2_True"),
        curve_xml("Injection", "Injection", "", "Chrom.1_3_True"),
        curve_xml("UV", "UV 2_260 edited", "mAU", "Chrom.1_7_True"),
    );

    let manifest = br#"<?xml version="1.0" encoding="utf-8"?>
<Manifest>
  <ManifestItem><FileName>Chrom.1_1_True</FileName></ManifestItem>
  <ManifestItem><FileName>Chrom.1_2_True</FileName></ManifestItem>
  <ManifestItem><FileName>Chrom.1_3_True</FileName></ManifestItem>
  <ManifestItem><FileName>Chrom.1.Xml</FileName></ManifestItem>
  <ManifestItem><FileName>Result.xml</FileName></ManifestItem>
</Manifest>"#;

    let result = br#"<?xml version="1.0" encoding="utf-8"?>
<Result><Information><Created>2015-11-02T14:31:07.387</Created></Information></Result>"#;

    zip_of(&[
        ("Manifest.xml", manifest.as_slice()),
        ("Result.xml", result.as_slice()),
        ("Chrom.1.Xml", chrom.as_bytes()),
        ("Chrom.1_1_True", uv.as_slice()),
        ("Chrom.1_2_True", cond.as_slice()),
        ("Chrom.1_3_True", inject.as_slice()),
        ("EvaluationLog.txt", b"evaluated".as_slice()),
    ])
}
