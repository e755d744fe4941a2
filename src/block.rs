//! Decoded data model shared by both result-file generations.
//!
//! A v3 run decodes into one [`DataBlock`] per header record.  A v6 run
//! decodes into [`ChromGroup`]s, one per chromatogram, each holding named
//! [`Curve`]s and [`EventCurve`]s.  Both shapes expose their samples as a
//! `data` sequence of `(x, y)` pairs, which is what downstream merging tools
//! key on.

use serde::Serialize;

use crate::index::EntryMap;

// ── v3 blocks ─────────────────────────────────────────────────────────────────

/// Payload of one v3 record.  Exactly one kind per record, chosen by magic id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum DataBlock {
    /// Logbook, fraction and injection marks: `(volume, label)`.
    Annotation { data: Vec<(f64, String)> },
    /// Notes and method text with `\r\n` line endings.
    Text { data: String },
    /// Sensor trace: `(volume, amplitude)` plus the sensor unit.
    Curve { unit: String, data: Vec<(f64, f64)> },
}

impl DataBlock {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataBlock::Annotation { .. } => "annotation",
            DataBlock::Text { .. }       => "text",
            DataBlock::Curve { .. }      => "curve",
        }
    }

    /// Number of samples (annotations, points, or text bytes).
    pub fn len(&self) -> usize {
        match self {
            DataBlock::Annotation { data } => data.len(),
            DataBlock::Text { data }       => data.len(),
            DataBlock::Curve { data, .. }  => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── v6 curves ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub name:       String,
    pub unit:       String,
    /// `CurveDataType` attribute of the declaring element.
    pub data_type:  String,
    pub chrom_id:   Option<String>,
    /// Container entry the curve was declared in, e.g. `Chrom.1.Xml`.
    pub run_name:   String,
    /// Column volume of the run, in ml.
    pub column_vol: Option<f64>,
    pub data:       Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCurve {
    pub name:       String,
    pub chrom_id:   Option<String>,
    pub run_name:   String,
    pub column_vol: Option<f64>,
    pub data:       Vec<(f64, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChromEntry {
    Curve(Curve),
    Events(EventCurve),
}

impl ChromEntry {
    pub fn name(&self) -> &str {
        match self {
            ChromEntry::Curve(c)  => &c.name,
            ChromEntry::Events(e) => &e.name,
        }
    }

    /// x-value of the last sample, if any.
    pub fn last_x(&self) -> Option<f64> {
        match self {
            ChromEntry::Curve(c)  => c.data.last().map(|(x, _)| *x),
            ChromEntry::Events(e) => e.data.last().map(|(x, _)| *x),
        }
    }
}

/// All curves and event curves of one chromatogram, in declaration order
/// (event curves first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromGroup {
    pub name:     String,
    pub chrom_id: Option<String>,
    #[serde(flatten)]
    pub entries:  EntryMap<ChromEntry>,
}

impl ChromGroup {
    pub fn new(name: impl Into<String>, chrom_id: Option<String>) -> Self {
        Self { name: name.into(), chrom_id, entries: EntryMap::new() }
    }

    pub fn curve(&self, name: &str) -> Option<&Curve> {
        match self.entries.get(name)? {
            ChromEntry::Curve(c) => Some(c),
            ChromEntry::Events(_) => None,
        }
    }

    pub fn events(&self, name: &str) -> Option<&EventCurve> {
        match self.entries.get(name)? {
            ChromEntry::Events(e) => Some(e),
            ChromEntry::Curve(_) => None,
        }
    }

    /// Secondary time origin: the x-value of the last `Injection` sample.
    pub fn injection_origin(&self) -> Option<f64> {
        self.entries.get("Injection").and_then(ChromEntry::last_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(name: &str, data: Vec<(f64, String)>) -> ChromEntry {
        ChromEntry::Events(EventCurve {
            name: name.into(),
            chrom_id: None,
            run_name: "Chrom.1.Xml".into(),
            column_vol: None,
            data,
        })
    }

    #[test]
    fn injection_origin_uses_last_event() {
        let mut g = ChromGroup::new("Chrom.1", Some("1".into()));
        assert_eq!(g.injection_origin(), None);
        g.entries.insert(
            "Injection",
            events("Injection", vec![(0.5, "Inject".into()), (12.25, "Inject".into())]),
        );
        assert_eq!(g.injection_origin(), Some(12.25));
        assert!(g.events("Injection").is_some());
        assert!(g.curve("Injection").is_none());
    }

    #[test]
    fn block_kind_names() {
        let b = DataBlock::Curve { unit: "mAU".into(), data: vec![(0.0, 1.0)] };
        assert_eq!(b.kind_name(), "curve");
        assert_eq!(b.len(), 1);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["data_type"], "curve");
        assert_eq!(json["unit"], "mAU");
    }
}
