//! Record type table for v3 result files.
//!
//! Every header record starts with an 8-byte magic id.  The id decides which
//! decoder reads the record's payload.  Two ids exist for most record types
//! (the instrument writes a second id for the continued stream); both map to
//! the same [`RecordType`].
//!
//! These values are fixed by the file format.

use std::fmt;

/// File magic at offset 0.
pub const RES_MAGIC: [u8; 16] = [
    0x11, 0x47, 0x11, 0x47, 0x18, 0x00, 0x00, 0x00,
    0xB0, 0x02, 0x00, 0x00, 0x20, 0x6C, 0x03, 0x00,
];
/// Version string expected at offset 24.
pub const RES_VERSION: &[u8] = b"UNICORN 3.10";

pub const CNOTES_ID:     [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03, 0x22];
pub const METHODS_ID:    [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0x02];
pub const LOGBOOK_ID:    [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x48, 0x04];
pub const LOGBOOK_ID2:   [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x49, 0x04];
pub const SENSDATA_ID:   [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x01, 0x14];
pub const SENSDATA_ID2:  [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x02, 0x14];
pub const FRACTIONS_ID:  [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x44, 0x04];
pub const FRACTIONS_ID2: [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x45, 0x04];
pub const INJECT_ID:     [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x46, 0x04];
pub const INJECT_ID2:    [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x04, 0x00, 0x47, 0x04];
/// Run-log record; the header table ends with it.
pub const LOGBOOK_HEADER_ID: [u8; 8] = [0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0x13];

/// Named record type, resolved from a magic id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Logbook,
    Fractions,
    Inject,
    Notes,
    Method,
    SensorData,
    /// Sentinel record terminating the header table.
    LogBookHeader,
    Unrecognized([u8; 8]),
}

/// Decoder family a record type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// 180-byte `(time, volume, label)` strides.
    Annotation,
    /// Free text.
    Text,
    /// 8-byte `(volume, amplitude)` strides.
    Curve,
    /// Not decoded.
    Unrecognized,
}

impl RecordType {
    pub fn from_magic(id: &[u8; 8]) -> Self {
        match *id {
            LOGBOOK_ID | LOGBOOK_ID2     => RecordType::Logbook,
            FRACTIONS_ID | FRACTIONS_ID2 => RecordType::Fractions,
            INJECT_ID | INJECT_ID2       => RecordType::Inject,
            CNOTES_ID                    => RecordType::Notes,
            METHODS_ID                   => RecordType::Method,
            SENSDATA_ID | SENSDATA_ID2   => RecordType::SensorData,
            LOGBOOK_HEADER_ID            => RecordType::LogBookHeader,
            other                        => RecordType::Unrecognized(other),
        }
    }

    pub fn kind(self) -> RecordKind {
        match self {
            RecordType::Logbook | RecordType::Fractions | RecordType::Inject => RecordKind::Annotation,
            RecordType::Notes | RecordType::Method => RecordKind::Text,
            RecordType::SensorData => RecordKind::Curve,
            RecordType::LogBookHeader | RecordType::Unrecognized(_) => RecordKind::Unrecognized,
        }
    }

    pub fn is_injection(self) -> bool {
        self == RecordType::Inject
    }

    /// Human-readable name (for diagnostics only).
    pub fn name(self) -> &'static str {
        match self {
            RecordType::Logbook         => "logbook",
            RecordType::Fractions       => "fractions",
            RecordType::Inject          => "inject",
            RecordType::Notes           => "notes",
            RecordType::Method          => "method",
            RecordType::SensorData      => "sensor",
            RecordType::LogBookHeader   => "logbook-header",
            RecordType::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Unrecognized(id) => write!(f, "unrecognized({})", hex::encode(id)),
            other => f.write_str(other.name()),
        }
    }
}
