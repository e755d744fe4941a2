//! Reader for legacy monolithic `.res` files ("format v3").
//!
//! ```no_run
//! use unires::archive::LoadOptions;
//! use unires::v3::Res3File;
//!
//! let mut run = Res3File::open("sample.res")?;
//! println!("{}", run.check());
//! run.load(&LoadOptions::default())?;
//! for (name, record) in run.records().iter() {
//!     println!("{name}: {} ({} samples)", record.block.kind_name(), record.block.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Load order
//! 1. [`FormatCheck`] must pass.
//! 2. The header table is scanned once.
//! 3. Injection points are located and the baseline chosen.
//! 4. Every record is decoded; failures are isolated per record.

pub mod check;
pub mod decode;
pub mod header;
pub mod injection;
pub mod magic;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

pub use check::FormatCheck;
pub use header::{HeaderError, HeaderScan, RecordDescriptor};
pub use injection::{InjectionPoints, InjectionSelector};
pub use magic::{RecordKind, RecordType};

use crate::archive::{LoadError, LoadOptions};
use crate::block::DataBlock;
use crate::index::EntryMap;
use crate::recovery::{IssueKind, LoadReport};

/// Operator name field.
pub const USER_OFFSET: usize = 118;
pub const USER_LEN:    usize = 40;

/// One decoded record: where it came from and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(flatten)]
    pub descriptor: RecordDescriptor,
    #[serde(flatten)]
    pub block:      DataBlock,
}

pub struct Res3File {
    path:      PathBuf,
    raw:       Vec<u8>,
    file_size: u64,
    header:    Option<HeaderScan>,
    injection: Option<InjectionPoints>,
    baseline:  Option<f64>,
    run_name:  String,
    records:   EntryMap<Record>,
    report:    LoadReport,
}

impl Res3File {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_owned();
        let raw = fs::read(&path)?;
        let file_size = fs::metadata(&path)?.len();
        Ok(Self::with_size(path, raw, file_size))
    }

    /// Wrap an in-memory buffer; the on-disk size is taken to be its length.
    pub fn from_bytes(path: impl Into<PathBuf>, raw: Vec<u8>) -> Self {
        let size = raw.len() as u64;
        Self::with_size(path.into(), raw, size)
    }

    pub(crate) fn with_size(path: PathBuf, raw: Vec<u8>, file_size: u64) -> Self {
        Self {
            path,
            raw,
            file_size,
            header:    None,
            injection: None,
            baseline:  None,
            run_name:  String::new(),
            records:   EntryMap::new(),
            report:    LoadReport::default(),
        }
    }

    // ── Validation & header ──────────────────────────────────────────────────

    pub fn check(&self) -> FormatCheck {
        FormatCheck::run(&self.raw, self.file_size)
    }

    /// Scan the header table.  Only the first call does any work.
    pub fn read_header(&mut self) -> Result<&EntryMap<RecordDescriptor>, HeaderError> {
        if self.header.is_none() {
            self.header = Some(header::scan(&self.raw)?);
        }
        Ok(&self.header.get_or_insert_with(HeaderScan::default).records)
    }

    pub fn header(&self) -> Option<&EntryMap<RecordDescriptor>> {
        self.header.as_ref().map(|h| &h.records)
    }

    /// Header table dump.  `full` adds the magic ids.
    pub fn show_header(&mut self, full: bool) -> Result<String, HeaderError> {
        let title = format!(" ---- \n Header of {}: \n", self.path.display());
        let table = self.read_header()?;
        let mut out = title;
        if full {
            out.push_str("  MAGIC_ID, ENTRY_NAME, BLOCK_SIZE, OFFSET_TO_NEXT, ADDRESS, OFFSET_TO_DATA\n");
        } else {
            out.push_str("  ENTRY_NAME, BLOCK_SIZE, OFFSET_TO_NEXT, ADDRESS, OFFSET_TO_DATA\n");
        }
        for d in table.values() {
            if full {
                out.push_str(&format!("  {} ", hex::encode(d.magic_id)));
            } else {
                out.push_str("  ");
            }
            out.push_str(&format!(
                "{} {} {} {} {}\n",
                d.data_name, d.d_size, d.off_next, d.address, d.off_data
            ));
        }
        Ok(out)
    }

    /// Operator name stored in the file header.
    pub fn get_user(&self) -> String {
        self.raw
            .get(USER_OFFSET..USER_OFFSET + USER_LEN)
            .map(decode::latin1_field)
            .unwrap_or_default()
    }

    // ── Injection points ─────────────────────────────────────────────────────

    pub fn injection_points(&mut self) -> Result<&InjectionPoints, HeaderError> {
        if self.injection.is_none() {
            self.read_header()?;
            let scan = self.header.get_or_insert_with(HeaderScan::default);
            self.injection = Some(InjectionPoints::locate(&self.raw, &scan.records));
        }
        Ok(self.injection.get_or_insert_with(InjectionPoints::default))
    }

    pub fn show_injection_points(&mut self) -> Result<String, HeaderError> {
        Ok(self.injection_points()?.to_string())
    }

    // ── Load ─────────────────────────────────────────────────────────────────

    /// Decode every record.  Fails only if the format gate fails; a header
    /// table cut off by the end of the file and per-record failures land in
    /// [`Res3File::report`].
    pub fn load(&mut self, opts: &LoadOptions) -> Result<(), LoadError> {
        let check = self.check();
        if !check.is_supported() {
            return Err(LoadError::FormatMismatch(check));
        }
        self.report.clear();
        self.records.clear();

        self.run_name = self
            .read_header()?
            .get("Logbook")
            .map(|d| d.run_name.clone())
            .unwrap_or_default();
        if let Some(e) = self.header.as_ref().and_then(|h| h.truncation(self.raw.len())) {
            self.report.push("header", IssueKind::DecodeFailure { reason: e.to_string() });
        }

        let points = self.injection_points()?.clone();
        let baseline = match points.select(opts.injection) {
            Some(v) => v,
            None => {
                let (last, available) = (points.last(), points.len());
                if let InjectionSelector::Index(requested) = opts.injection {
                    self.report.push(
                        "injection",
                        IssueKind::InjectionIndexOutOfRange { requested, available },
                    );
                }
                last
            }
        };
        self.baseline = Some(baseline);

        let scan = self.header.get_or_insert_with(HeaderScan::default);
        for (name, desc) in scan.records.iter() {
            match decode::decode_record(&self.raw, desc, baseline, opts.reduce) {
                Ok(Some(block)) => {
                    self.records.insert(name, Record { descriptor: desc.clone(), block });
                }
                Ok(None) => log::debug!("skipping '{name}' ({}, {} bytes)", desc.record_type(), desc.d_size),
                Err(e) => self.report.push(name, IssueKind::DecodeFailure { reason: e.to_string() }),
            }
        }
        log::info!(
            "{}: {} record(s) decoded, baseline {baseline} ml, {}",
            self.path.display(),
            self.records.len(),
            self.report.summary()
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

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Volume baseline chosen by the last load.
    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn records(&self) -> &EntryMap<Record> {
        &self.records
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}
