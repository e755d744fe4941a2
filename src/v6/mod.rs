//! Reader for zip-based result containers ("format v6").
//!
//! # Load stages
//!
//! | Stage | Function | Result |
//! |-------|----------|--------|
//! | unpack | [`container::unpack`] | nested archives opened |
//! | decode | [`stream::decode_archive`] | float streams, text, XML |
//! | cross-reference | [`chrom::cross_reference`] | one [`ChromGroup`] per `Chrom.N.Xml` |
//! | prune | [`manifest::prune`] | declared files removed |
//!
//! [`Uni6File::load`] runs the first two stages, [`Uni6File::load_all_xml`]
//! all four.  Both start again from the raw buffer, so calling either twice
//! gives the same entries.

pub mod chrom;
pub mod container;
pub mod manifest;
pub mod stream;
pub mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

pub use container::{ContainerEntry, ContainerError};
pub use stream::StreamError;
pub use xml::{XmlElement, XmlError};

use crate::block::ChromGroup;
use crate::index::EntryMap;
use crate::recovery::{IssueKind, LoadReport};

pub struct Uni6File {
    path:    PathBuf,
    raw:     Vec<u8>,
    entries: EntryMap<ContainerEntry>,
    created: Option<NaiveDate>,
    loaded:  bool,
    report:  LoadReport,
}

impl Uni6File {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_owned();
        let raw = fs::read(&path)?;
        Ok(Self::from_bytes(path, raw))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, raw: Vec<u8>) -> Self {
        Self {
            path:    path.into(),
            raw,
            entries: EntryMap::new(),
            created: None,
            loaded:  false,
            report:  LoadReport::default(),
        }
    }

    /// Unpack the container and decode every nested archive.
    ///
    /// Fails only if the outer archive cannot be read.
    pub fn load(&mut self) -> Result<(), ContainerError> {
        self.report.clear();
        let unpacked = container::unpack(&self.raw, &mut self.report)?;

        let mut entries = EntryMap::new();
        for (key, entry) in unpacked {
            let entry = match entry {
                ContainerEntry::Archive(files) => {
                    ContainerEntry::Archive(stream::decode_archive(&key, files, &mut self.report))
                }
                ContainerEntry::Raw(bytes) if key.contains("Xml") => match xml::parse_embedded(&bytes) {
                    Ok(doc) => ContainerEntry::Xml(doc),
                    Err(e) => {
                        self.report.push(key.as_str(), IssueKind::DecodeFailure { reason: e.to_string() });
                        ContainerEntry::Raw(bytes)
                    }
                },
                other => other,
            };
            entries.insert(key, entry);
        }

        self.created = manifest::created(&entries);
        self.entries = entries;
        self.loaded = true;
        log::info!("{}: {} entr(ies) unpacked, {}", self.path.display(), self.entries.len(), self.report.summary());
        Ok(())
    }

    /// Full load: decode, build chromatogram groups and prune the files the
    /// manifest declares.
    pub fn load_all_xml(&mut self) -> Result<(), ContainerError> {
        self.load()?;

        let doc_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| key.contains(".Xml") && entry.as_xml().is_some())
            .map(|(key, _)| key.to_owned())
            .collect();

        let mut groups = Vec::with_capacity(doc_keys.len());
        for key in &doc_keys {
            let Some(doc) = self.entries.get(key).and_then(ContainerEntry::as_xml) else {
                continue;
            };
            match chrom::cross_reference(key, doc, &self.entries, &mut self.report) {
                Ok(group) => groups.push(group),
                Err(e) => self.report.push(key.as_str(), IssueKind::DecodeFailure { reason: e.to_string() }),
            }
        }
        for group in groups {
            self.entries.insert(group.name.clone(), ContainerEntry::Chromatogram(group));
        }

        if let Err(e) = manifest::prune(&mut self.entries) {
            self.report.push(manifest::MANIFEST_KEY, IssueKind::DecodeFailure { reason: e.to_string() });
        }
        log::info!(
            "{}: {} chromatogram group(s), {} entr(ies) after pruning",
            self.path.display(),
            self.groups().count(),
            self.entries.len()
        );
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn entries(&self) -> &EntryMap<ContainerEntry> {
        &self.entries
    }

    pub fn groups(&self) -> impl Iterator<Item = &ChromGroup> {
        self.entries.values().filter_map(ContainerEntry::as_chromatogram)
    }

    pub fn group(&self, name: &str) -> Option<&ChromGroup> {
        self.entries.get(name)?.as_chromatogram()
    }

    /// Creation date recorded in `Result.xml`, available after any load.
    pub fn created(&self) -> Option<NaiveDate> {
        self.created
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}
