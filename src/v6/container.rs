//! Outer container of v6 result files.
//!
//! A v6 file is a zip archive whose entries are themselves zip archives
//! (binary chromatogram streams plus small XML documents) or plain XML.
//! [`unpack`] reads the outer archive in central-directory order and opens
//! every entry that sniffs as an archive, so a nested entry becomes
//! [`ContainerEntry::Archive`] keyed by the outer entry name.
//!
//! Entries are later replaced in place as they are decoded, which is why one
//! enum carries both the raw and the decoded shapes.

use std::io::{self, Cursor, Read};

use serde::{Serialize, Serializer};
use thiserror::Error;
use zip::ZipArchive;

use super::xml::XmlElement;
use crate::block::ChromGroup;
use crate::index::EntryMap;
use crate::recovery::repair::{prepare, sniff};
use crate::recovery::{IssueKind, LoadReport};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn serialize_len<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(bytes.len() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerEntry {
    /// Undecoded bytes; serialized as their length.
    Raw(#[serde(serialize_with = "serialize_len")] Vec<u8>),
    /// A nested archive, one entry per file.
    Archive(EntryMap<ContainerEntry>),
    /// A binary coordinate stream widened to `f64`.
    Floats(Vec<f64>),
    Text(String),
    Xml(XmlElement),
    /// Placeholder too short to hold a document.
    Absent,
    /// Curves and event curves cross-referenced from a chromatogram document.
    Chromatogram(ChromGroup),
}

impl ContainerEntry {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ContainerEntry::Raw(_)          => "raw",
            ContainerEntry::Archive(_)      => "archive",
            ContainerEntry::Floats(_)       => "floats",
            ContainerEntry::Text(_)         => "text",
            ContainerEntry::Xml(_)          => "xml",
            ContainerEntry::Absent          => "absent",
            ContainerEntry::Chromatogram(_) => "chromatogram",
        }
    }

    pub fn as_archive(&self) -> Option<&EntryMap<ContainerEntry>> {
        match self {
            ContainerEntry::Archive(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            ContainerEntry::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContainerEntry::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&XmlElement> {
        match self {
            ContainerEntry::Xml(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_chromatogram(&self) -> Option<&ChromGroup> {
        match self {
            ContainerEntry::Chromatogram(g) => Some(g),
            _ => None,
        }
    }
}

/// Read every file of a zip archive, in central-directory order.
pub fn read_zip(bytes: &[u8]) -> Result<EntryMap<Vec<u8>>, ContainerError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut files = EntryMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_owned();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        files.insert(name, buf);
    }
    Ok(files)
}

/// Open `data` as a nested archive if it sniffs as one.
///
/// `Ok(None)` for opaque data, `Err(reason)` for something that looked like
/// an archive but could not be read.
fn open_nested(data: &[u8]) -> Result<Option<EntryMap<Vec<u8>>>, String> {
    let Some(signature) = sniff(data) else {
        return Ok(None);
    };
    let bytes = prepare(data, signature)
        .ok_or_else(|| "no end-of-central-directory record".to_owned())?;
    read_zip(bytes).map(Some).map_err(|e| e.to_string())
}

/// Read the outer archive and flatten its nested archives one level deep.
///
/// Only an unreadable outer archive is an error.  Entries that open are
/// listed in `report.supported`, the rest in `report.unsupported`.
pub fn unpack(bytes: &[u8], report: &mut LoadReport) -> Result<EntryMap<ContainerEntry>, ContainerError> {
    let outer = read_zip(bytes)?;
    let mut entries = EntryMap::new();
    for (name, data) in outer {
        let entry = match open_nested(&data) {
            Ok(Some(files)) => {
                log::debug!("{name}: nested archive with {} file(s)", files.len());
                report.supported.push(name.clone());
                ContainerEntry::Archive(
                    files.into_iter().map(|(k, v)| (k, ContainerEntry::Raw(v))).collect(),
                )
            }
            Ok(None) => {
                report.unsupported.push(name.clone());
                ContainerEntry::Raw(data)
            }
            Err(reason) => {
                report.unsupported.push(name.clone());
                report.push(name.as_str(), IssueKind::MalformedNestedArchive { reason });
                ContainerEntry::Raw(data)
            }
        };
        entries.insert(name, entry);
    }
    Ok(entries)
}
