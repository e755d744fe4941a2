//! Manifest pruning and run metadata.
//!
//! `Manifest.xml` lists the files the instrument software wrote into the
//! container.  Once the chromatogram documents have been cross-referenced
//! those files are redundant; removing them leaves the derived chromatogram
//! groups plus anything the manifest does not list.

use chrono::NaiveDate;

use super::container::ContainerEntry;
use super::xml::{self, XmlElement, XmlError};
use crate::index::EntryMap;

pub const MANIFEST_KEY: &str = "Manifest.xml";
pub const RESULT_KEY:   &str = "Result.xml";

/// Parsed document of a top-level entry, whether it is still raw or was
/// parsed during load.
pub(crate) fn entry_document(entry: &ContainerEntry) -> Result<XmlElement, XmlError> {
    match entry {
        ContainerEntry::Xml(doc) => Ok(doc.clone()),
        ContainerEntry::Raw(bytes) => xml::parse_embedded(bytes),
        _ => Err(XmlError::Empty),
    }
}

/// File names declared by the manifest: the text of the first child of every
/// child of the root.
pub fn declared_files(manifest: &XmlElement) -> Vec<String> {
    manifest
        .children
        .iter()
        .filter_map(|item| item.nth(0).and_then(XmlElement::text))
        .map(str::to_owned)
        .collect()
}

/// Remove every declared entry and the manifest itself.
///
/// Returns the declared names.  Declared names with no entry are ignored.  A
/// container without a manifest is left untouched.
pub fn prune(entries: &mut EntryMap<ContainerEntry>) -> Result<Vec<String>, XmlError> {
    let Some(entry) = entries.get(MANIFEST_KEY) else {
        log::warn!("no {MANIFEST_KEY} in container, nothing pruned");
        return Ok(Vec::new());
    };
    let declared = declared_files(&entry_document(entry)?);
    for name in &declared {
        if entries.remove(name).is_none() {
            log::debug!("manifest lists '{name}' but the container has no such entry");
        }
    }
    entries.remove(MANIFEST_KEY);
    Ok(declared)
}

/// Run creation date from the first `Created` element of `Result.xml`.
pub fn created(entries: &EntryMap<ContainerEntry>) -> Option<NaiveDate> {
    let doc = entry_document(entries.get(RESULT_KEY)?).ok()?;
    let stamp = doc.descendant("Created")?.text()?;
    NaiveDate::parse_from_str(stamp.get(..10)?, "%Y-%m-%d").ok()
}
