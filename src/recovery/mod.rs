//! Per-entry failure reporting.
//!
//! A corrupt stream never aborts a load.  Every record or container entry
//! that cannot be decoded is dropped from the result and described by an
//! [`EntryIssue`] in the run's [`LoadReport`], so callers decide how to
//! surface it.
//!
//! | Kind | Effect |
//! |------|--------|
//! | `InjectionIndexOutOfRange` | baseline falls back to the last injection |
//! | `MissingCoordinateReference` | curve skipped |
//! | `MismatchedCoordinates` | curve skipped |
//! | `MalformedNestedArchive` | entry kept as opaque bytes |
//! | `DecodeFailure` | entry omitted |

pub mod repair;

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    InjectionIndexOutOfRange { requested: usize, available: usize },
    MissingCoordinateReference { source: String },
    MismatchedCoordinates { volumes: usize, amplitudes: usize },
    MalformedNestedArchive { reason: String },
    DecodeFailure { reason: String },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::InjectionIndexOutOfRange { requested, available } => write!(
                f,
                "injection point {requested} does not exist ({available} available), using the last one"
            ),
            IssueKind::MissingCoordinateReference { source } => {
                write!(f, "coordinate source '{source}' not found")
            }
            IssueKind::MismatchedCoordinates { volumes, amplitudes } => {
                write!(f, "{volumes} volumes vs {amplitudes} amplitudes")
            }
            IssueKind::MalformedNestedArchive { reason } => {
                write!(f, "nested archive unreadable: {reason}")
            }
            IssueKind::DecodeFailure { reason } => write!(f, "decode failed: {reason}"),
        }
    }
}

/// One skipped or degraded entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryIssue {
    /// Record name (v3) or container path such as `Chrom.1_2_True/CoordinateData.Volumes`.
    pub entry: String,
    #[serde(flatten)]
    pub kind:  IssueKind,
}

impl fmt::Display for EntryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry, self.kind)
    }
}

/// Everything a load skipped, repaired or could not read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub issues:      Vec<EntryIssue>,
    /// Container entries that opened as nested archives (v6 only).
    pub supported:   Vec<String>,
    /// Container entries left as opaque bytes (v6 only).
    pub unsupported: Vec<String>,
}

impl LoadReport {
    pub fn push(&mut self, entry: impl Into<String>, kind: IssueKind) {
        let issue = EntryIssue { entry: entry.into(), kind };
        log::warn!("{issue}");
        self.issues.push(issue);
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of one kind, matched by predicate.
    pub fn issues_where<F>(&self, pred: F) -> impl Iterator<Item = &EntryIssue>
    where
        F: Fn(&IssueKind) -> bool,
    {
        self.issues.iter().filter(move |i| pred(&i.kind))
    }

    pub fn summary(&self) -> String {
        format!(
            "{} issue(s), {} nested archive(s) opened, {} entr{} left opaque",
            self.issues.len(),
            self.supported.len(),
            self.unsupported.len(),
            if self.unsupported.len() == 1 { "y" } else { "ies" },
        )
    }

    pub(crate) fn clear(&mut self) {
        self.issues.clear();
        self.supported.clear();
        self.unsupported.clear();
    }
}
