//! Injection points and volume baseline.
//!
//! Every reported volume is relative to one injection.  The injection-mark
//! records are decoded without a baseline, their non-zero volumes collected
//! after an implicit `0.0`, and one of them is chosen as the baseline.

use std::fmt;

use serde::Serialize;

use super::decode::read_annotations;
use super::header::RecordDescriptor;
use crate::index::EntryMap;

/// Which injection point becomes the volume baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum InjectionSelector {
    /// The last recorded injection.
    #[default]
    Last,
    /// Zero-based index; `0` is the implicit start-of-run point.
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionPoints {
    volumes: Vec<f64>,
}

impl Default for InjectionPoints {
    fn default() -> Self {
        Self { volumes: vec![0.0] }
    }
}

impl InjectionPoints {
    /// Collect injection volumes from every injection-mark record.
    pub fn locate(raw: &[u8], table: &EntryMap<RecordDescriptor>) -> Self {
        let mut points = Self::default();
        for desc in table.values().filter(|d| d.record_type().is_injection()) {
            if desc.d_size == 0 {
                continue;
            }
            match read_annotations(raw, desc, 0.0) {
                Ok(marks) => points
                    .volumes
                    .extend(marks.into_iter().map(|(v, _)| v).filter(|v| *v != 0.0)),
                // Reported again when the record itself is decoded.
                Err(e) => log::debug!("injection marks '{}' unreadable: {e}", desc.data_name),
            }
        }
        points
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn last(&self) -> f64 {
        self.volumes.last().copied().unwrap_or(0.0)
    }

    /// The selected baseline, or `None` if the index does not exist.
    pub fn select(&self, selector: InjectionSelector) -> Option<f64> {
        match selector {
            InjectionSelector::Last => Some(self.last()),
            InjectionSelector::Index(i) => self.volumes.get(i).copied(),
        }
    }
}

impl fmt::Display for InjectionPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " ---- ")?;
        writeln!(f, " Injection points: ")?;
        write!(f, " # \t ml")?;
        for (i, v) in self.volumes.iter().enumerate() {
            write!(f, "\n {i} \t {v}")?;
        }
        Ok(())
    }
}
