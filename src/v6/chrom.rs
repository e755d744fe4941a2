//! Cross-referencing of chromatogram documents with coordinate streams.
//!
//! A `Chrom.N.Xml` document declares the curves of one chromatogram.  The
//! samples themselves live in nested archives elsewhere in the container;
//! each curve names its archive through `CurvePoints`:
//!
//! ```xml
//! <Curve CurveDataType="UV">
//!   <Name>UV 1_280</Name>
//!   <AmplitudeUnit>mAU</AmplitudeUnit>
//!   <CurvePoints>
//!     <CurvePoint>
//!       <Id>1</Id>
//!       <BinaryCurvePointsFileName>Chrom.1_2_True</BinaryCurvePointsFileName>
//!     </CurvePoint>
//!   </CurvePoints>
//! </Curve>
//! ```
//!
//! Event curves carry their samples inline.  A `ColumnVolume` element in the
//! event-curve block is copied onto every curve of the group.

use super::container::ContainerEntry;
use super::xml::{parse_f64, XmlElement, XmlError};
use crate::block::{ChromEntry, ChromGroup, Curve, EventCurve};
use crate::index::EntryMap;
use crate::recovery::{IssueKind, LoadReport};

pub const VOLUMES_KEY:    &str = "CoordinateData.Volumes";
pub const AMPLITUDES_KEY: &str = "CoordinateData.Amplitudes";
pub const COLUMN_VOLUME:  &str = "ColumnVolume";

/// Group key for a chromatogram document: `Chrom.1.Xml` → `Chrom.1`.
pub fn group_key(doc_key: &str) -> String {
    doc_key.replace(".Xml", "")
}

/// Names downstream tools expect.
fn canonical_event_name(name: &str) -> String {
    match name {
        "Fraction" => "Fractions".to_owned(),
        other => other.to_owned(),
    }
}

fn canonical_curve_name(name: &str) -> String {
    match name {
        "UV cell path length" => "xUV cell path length".to_owned(),
        other => other.to_owned(),
    }
}

fn read_events(el: &XmlElement) -> Result<Vec<(f64, String)>, XmlError> {
    let Some(events) = el.child("Events") else {
        return Ok(Vec::new());
    };
    events
        .children
        .iter()
        .map(|ev| -> Result<(f64, String), XmlError> {
            let volume = parse_f64(ev.require_text("EventVolume")?)?;
            let text = ev.child_text("EventText").unwrap_or_default().to_owned();
            Ok((volume, text))
        })
        .collect()
}

/// Binary file name a curve reads its coordinates from.
fn curve_source(el: &XmlElement) -> Result<&str, XmlError> {
    el.require("CurvePoints")?
        .nth(0)
        .and_then(|point| point.nth(1))
        .and_then(XmlElement::text)
        .ok_or_else(|| XmlError::MissingElement("CurvePoints/*/*[2]".to_owned()))
}

fn coordinates<'a>(entries: &'a EntryMap<ContainerEntry>, source: &str) -> Option<(&'a [f64], &'a [f64])> {
    let archive = entries.get(source)?.as_archive()?;
    let volumes = archive.get(VOLUMES_KEY)?.as_floats()?;
    let amplitudes = archive.get(AMPLITUDES_KEY)?.as_floats()?;
    Some((volumes, amplitudes))
}

/// Column volume declared anywhere in the event-curve block.
fn column_volume(doc: &XmlElement) -> Option<f64> {
    let text = doc.child("EventCurves")?.descendant(COLUMN_VOLUME)?.text()?;
    match parse_f64(text) {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("ignoring column volume: {e}");
            None
        }
    }
}

/// Report path of an element that failed to decode.
fn failed_entry(group: &str, el: &XmlElement, block: &str, index: usize) -> String {
    match el.child_text("Name") {
        Some(name) => format!("{group}/{name}"),
        None => format!("{group}/{block}[{index}]"),
    }
}

fn decode_failure(e: XmlError) -> IssueKind {
    IssueKind::DecodeFailure { reason: e.to_string() }
}

/// Fields a `Curve` element declares about itself.
struct CurveDecl<'a> {
    data_type: &'a str,
    name:      String,
    unit:      &'a str,
    source:    &'a str,
}

fn curve_decl(el: &XmlElement) -> Result<CurveDecl<'_>, XmlError> {
    Ok(CurveDecl {
        data_type: el
            .attr("CurveDataType")
            .ok_or_else(|| XmlError::MissingAttribute("CurveDataType".to_owned()))?,
        name:      canonical_curve_name(el.require_text("Name")?),
        unit:      el.child_text("AmplitudeUnit").unwrap_or_default(),
        source:    curve_source(el)?,
    })
}

/// `Ok(None)` for event curves that are not original data.
fn event_curve(
    el:         &XmlElement,
    doc_key:    &str,
    chrom_id:   Option<&str>,
    column_vol: Option<f64>,
) -> Result<Option<EventCurve>, XmlError> {
    let name = canonical_event_name(el.require_text("Name")?);
    if el.child_text("IsOriginalData") != Some("true") {
        log::debug!("{doc_key}: event curve '{name}' is not original data, skipped");
        return Ok(None);
    }
    Ok(Some(EventCurve {
        name,
        chrom_id: chrom_id.map(str::to_owned),
        run_name: doc_key.to_owned(),
        column_vol,
        data: read_events(el)?,
    }))
}

/// Build the [`ChromGroup`] declared by `doc`.
///
/// Only a document with neither `Curves` nor `EventCurves` is an error.
/// Every curve or event curve that fails to decode, lacks coordinates or has
/// coordinates of unequal length is skipped and reported under
/// `group/name`; its siblings are still built.
pub fn cross_reference(
    doc_key: &str,
    doc:     &XmlElement,
    entries: &EntryMap<ContainerEntry>,
    report:  &mut LoadReport,
) -> Result<ChromGroup, XmlError> {
    let event_curves = doc.child("EventCurves");
    let curves = doc.child("Curves");
    if event_curves.is_none() && curves.is_none() {
        return Err(XmlError::MissingElement("Curves".to_owned()));
    }
    let chrom_id = doc.child_text("ChromatogramID").map(str::to_owned);
    let column_vol = column_volume(doc);
    let mut group = ChromGroup::new(group_key(doc_key), chrom_id.clone());

    for (i, el) in event_curves.map(|e| e.children.as_slice()).unwrap_or_default().iter().enumerate() {
        match event_curve(el, doc_key, chrom_id.as_deref(), column_vol) {
            Ok(Some(curve)) => {
                group.entries.insert(curve.name.clone(), ChromEntry::Events(curve));
            }
            Ok(None) => {}
            Err(e) => report.push(failed_entry(&group.name, el, "EventCurves", i), decode_failure(e)),
        }
    }

    for (i, el) in curves.map(|e| e.children.as_slice()).unwrap_or_default().iter().enumerate() {
        let decl = match curve_decl(el) {
            Ok(decl) => decl,
            Err(e) => {
                report.push(failed_entry(&group.name, el, "Curves", i), decode_failure(e));
                continue;
            }
        };
        let entry_path = format!("{}/{}", group.name, decl.name);

        let Some((volumes, amplitudes)) = coordinates(entries, decl.source) else {
            report.push(entry_path, IssueKind::MissingCoordinateReference { source: decl.source.to_owned() });
            continue;
        };
        if volumes.len() != amplitudes.len() {
            report.push(
                entry_path,
                IssueKind::MismatchedCoordinates { volumes: volumes.len(), amplitudes: amplitudes.len() },
            );
            continue;
        }
        let curve = Curve {
            name:       decl.name.clone(),
            unit:       decl.unit.to_owned(),
            data_type:  decl.data_type.to_owned(),
            chrom_id:   chrom_id.clone(),
            run_name:   doc_key.to_owned(),
            column_vol,
            data:       volumes.iter().copied().zip(amplitudes.iter().copied()).collect(),
        };
        group.entries.insert(decl.name, ChromEntry::Curve(curve));
    }

    log::debug!("{}: {} curve(s) cross-referenced", group.name, group.entries.len());
    Ok(group)
}
