//! Minimal XML element tree built on quick-xml.
//!
//! The v6 container carries its metadata as small XML documents.  They are
//! read once into an [`XmlElement`] tree and then walked by element name,
//! which keeps the cross-referencing code free of event-loop state.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Document has no root element")]
    Empty,
    #[error("Element <{0}> is never closed")]
    Unclosed(String),
    #[error("Missing element <{0}>")]
    MissingElement(String),
    #[error("Missing attribute '{0}'")]
    MissingAttribute(String),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct XmlElement {
    pub name:       String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text:       Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children:   Vec<XmlElement>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(XmlElement::text)
    }

    /// Like [`child`](Self::child) but a missing element is an error.
    pub fn require(&self, name: &str) -> Result<&XmlElement, XmlError> {
        self.child(name)
            .ok_or_else(|| XmlError::MissingElement(name.to_owned()))
    }

    /// Text of a required child; an empty element reads as `""`.
    pub fn require_text(&self, name: &str) -> Result<&str, XmlError> {
        Ok(self.require(name)?.text().unwrap_or(""))
    }

    pub fn nth(&self, i: usize) -> Option<&XmlElement> {
        self.children.get(i)
    }

    /// First element called `name` anywhere below this one, depth first.
    pub fn descendant(&self, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.descendant(name) })
    }
}

pub fn parse_f64(s: &str) -> Result<f64, XmlError> {
    s.trim()
        .parse()
        .map_err(|_| XmlError::InvalidNumber(s.to_owned()))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from(e: &BytesStart) -> Result<XmlElement, XmlError> {
    let mut el = XmlElement { name: lossy(e.local_name().as_ref()), ..Default::default() };
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = lossy(attr.key.local_name().as_ref());
        el.attributes.push((key, lossy(&attr.value)));
    }
    Ok(el)
}

fn push_text(stack: &mut [XmlElement], text: Cow<'_, str>) {
    if let Some(top) = stack.last_mut() {
        match &mut top.text {
            Some(t) => t.push_str(&text),
            None => top.text = Some(text.into_owned()),
        }
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, el: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => log::debug!("ignoring extra top-level element <{}>", el.name),
    }
}

/// Parse a whole document into its root element.
pub fn parse(bytes: &[u8]) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => stack.push(element_from(e)?),
            Event::Empty(ref e) => {
                let el = element_from(e)?;
                attach(&mut stack, &mut root, el);
            }
            Event::Text(ref t) => push_text(&mut stack, t.unescape()?),
            Event::CData(c) => push_text(&mut stack, Cow::Owned(lossy(&c.into_inner()))),
            Event::End(_) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::Empty)
}

/// Parse the document embedded in `bytes`, ignoring anything before the first
/// `<` and after the last `>`.
pub fn parse_embedded(bytes: &[u8]) -> Result<XmlElement, XmlError> {
    let start = bytes.iter().position(|&b| b == b'<').ok_or(XmlError::Empty)?;
    let end = bytes.iter().rposition(|&b| b == b'>').ok_or(XmlError::Empty)?;
    if end < start {
        return Err(XmlError::Empty);
    }
    parse(&bytes[start..=end])
}
