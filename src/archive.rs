//! High-level [`RunFile`] API, the primary embedding surface.
//!
//! ```no_run
//! use unires::archive::{self, LoadOptions};
//!
//! // Check first
//! println!("{}", archive::validate("sample.res")?);
//!
//! // Decode either generation
//! let run = archive::load("sample.zip", &LoadOptions::default())?;
//! for name in run.names() {
//!     println!("{name}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The generation is detected from the first bytes: a zip local header means
//! a v6 container, anything else is treated as a v3 `.res` file and has to
//! pass its format check.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::recovery::LoadReport;
use crate::v3::{FormatCheck, HeaderError, InjectionSelector, Res3File};
use crate::v6::container::{self, ContainerError};
use crate::v6::Uni6File;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures that abort a whole load.  Per-entry problems go to the
/// [`LoadReport`] instead.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported result file:\n{0}")]
    FormatMismatch(FormatCheck),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),
}

// ── LoadOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`load`] and [`RunFile::load`].
#[derive(Debug, Clone, Serialize)]
pub struct LoadOptions {
    /// Keep every `reduce`th curve sample (v3 only).  `1` keeps all.
    pub reduce:    usize,
    /// Injection point used as the volume baseline (v3 only).
    pub injection: InjectionSelector,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            reduce:    1,
            injection: InjectionSelector::Last,
        }
    }
}

// ── Format ────────────────────────────────────────────────────────────────────

const ZIP_LOCAL_HEADER: &[u8; 4] = b"PK\x03\x04";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    V3,
    V6,
}

impl Format {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_LOCAL_HEADER) {
            Format::V6
        } else {
            Format::V3
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::V3 => write!(f, "v3 (.res)"),
            Format::V6 => write!(f, "v6 (zip container)"),
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum Validation {
    V3(FormatCheck),
    /// The outer archive opened and lists `entries` files.
    V6 { entries: usize },
}

impl Validation {
    pub fn is_supported(&self) -> bool {
        match self {
            Validation::V3(check) => check.is_supported(),
            Validation::V6 { .. } => true,
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::V3(check) => write!(f, "{check}"),
            Validation::V6 { entries } => {
                writeln!(f, " Input is a zip result container")?;
                write!(f, " {entries} top-level entr{}", if *entries == 1 { "y" } else { "ies" })
            }
        }
    }
}

// ── RunFile ───────────────────────────────────────────────────────────────────

/// One result file of either generation.
pub enum RunFile {
    Res3(Res3File),
    Uni6(Uni6File),
}

#[derive(Serialize)]
struct Dump<'a, T: Serialize> {
    path:     String,
    format:   Format,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created:  Option<String>,
    entries:  &'a T,
    report:   &'a LoadReport,
}

impl RunFile {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_owned();
        let raw = fs::read(&path)?;
        let size = fs::metadata(&path)?.len();
        Ok(Self::with_size(path, raw, size))
    }

    /// Wrap an in-memory buffer whose length is the file size.
    pub fn from_bytes(path: impl Into<PathBuf>, raw: Vec<u8>) -> Self {
        let size = raw.len() as u64;
        Self::with_size(path.into(), raw, size)
    }

    fn with_size(path: PathBuf, raw: Vec<u8>, size: u64) -> Self {
        match Format::detect(&raw) {
            Format::V6 => RunFile::Uni6(Uni6File::from_bytes(path, raw)),
            Format::V3 => RunFile::Res3(Res3File::with_size(path, raw, size)),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            RunFile::Res3(_) => Format::V3,
            RunFile::Uni6(_) => Format::V6,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            RunFile::Res3(r) => r.path(),
            RunFile::Uni6(u) => u.path(),
        }
    }

    /// Cheap structural check; nothing is decoded.
    pub fn validate(&self) -> Result<Validation, LoadError> {
        match self {
            RunFile::Res3(r) => Ok(Validation::V3(r.check())),
            RunFile::Uni6(u) => Ok(Validation::V6 { entries: container::read_zip(u.raw())?.len() }),
        }
    }

    /// Decode everything.  v6 containers get the full cross-referencing load.
    pub fn load(&mut self, opts: &LoadOptions) -> Result<(), LoadError> {
        match self {
            RunFile::Res3(r) => r.load(opts),
            RunFile::Uni6(u) => Ok(u.load_all_xml()?),
        }
    }

    pub fn report(&self) -> &LoadReport {
        match self {
            RunFile::Res3(r) => r.report(),
            RunFile::Uni6(u) => u.report(),
        }
    }

    /// Names of the decoded entries, in order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            RunFile::Res3(r) => r.records().keys().collect(),
            RunFile::Uni6(u) => u.entries().keys().collect(),
        }
    }

    pub fn as_res3(&self) -> Option<&Res3File> {
        match self {
            RunFile::Res3(r) => Some(r),
            RunFile::Uni6(_) => None,
        }
    }

    pub fn as_uni6(&self) -> Option<&Uni6File> {
        match self {
            RunFile::Uni6(u) => Some(u),
            RunFile::Res3(_) => None,
        }
    }

    /// JSON rendering of the decoded collection and its load report.
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        let path = self.path().display().to_string();
        match self {
            RunFile::Res3(r) => render(
                &Dump {
                    path,
                    format:   Format::V3,
                    run_name: Some(r.run_name()),
                    created:  None,
                    entries:  r.records(),
                    report:   r.report(),
                },
                pretty,
            ),
            RunFile::Uni6(u) => render(
                &Dump {
                    path,
                    format:   Format::V6,
                    run_name: None,
                    created:  u.created().map(|d| d.to_string()),
                    entries:  u.entries(),
                    report:   u.report(),
                },
                pretty,
            ),
        }
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

// ── Free functions ────────────────────────────────────────────────────────────

/// Open `path` and run its structural check.
pub fn validate<P: AsRef<Path>>(path: P) -> Result<Validation, LoadError> {
    RunFile::open(path)?.validate()
}

/// Open and fully decode `path`.
pub fn load<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<RunFile, LoadError> {
    let mut run = RunFile::open(path)?;
    run.load(opts)?;
    Ok(run)
}
