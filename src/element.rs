//! A small owned XML element tree.
//!
//! Entities convert to and from [`Element`] (`to_element` /
//! `populate_from_element`). Names are stored in a canonical qualified
//! form so entity code can match on plain strings:
//!
//! - names in the DFXML or RegXML default namespace are bare (`fileobject`)
//! - delta, Dublin Core and DFXML extension names carry their conventional
//!   prefix (`delta:changed_property`, `dc:type`)
//! - anything else uses Clark notation (`{urn:example}thing`)

use crate::error::Result;
use crate::objects::{XMLNS_DC, XMLNS_DELTA, XMLNS_DFXML, XMLNS_DFXML_EXT, XMLNS_REGXML};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// An XML element with attributes, text and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Canonical qualified name
    pub name: String,
    /// Namespace URI for names outside the default namespace
    pub namespace: Option<String>,
    /// Attributes in document order, keyed by canonical qualified name
    pub attributes: Vec<(String, String)>,
    /// Text content, untrimmed (`None` for a self-closing element or one
    /// holding only child elements)
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

/// Maps a resolved (namespace, local name) pair to its canonical name.
///
/// Returns the canonical name and the namespace URI to keep alongside it
/// (`None` for the default namespaces).
pub fn canonical_name(namespace: Option<&str>, local: &str) -> (String, Option<String>) {
    match namespace {
        None => (local.to_string(), None),
        Some(ns) if ns == XMLNS_DFXML || ns == XMLNS_REGXML => (local.to_string(), None),
        Some(ns) if ns == XMLNS_DELTA => (format!("delta:{local}"), Some(ns.to_string())),
        Some(ns) if ns == XMLNS_DC => (format!("dc:{local}"), Some(ns.to_string())),
        Some(ns) if ns == XMLNS_DFXML_EXT => (format!("dfxmlext:{local}"), Some(ns.to_string())),
        Some(ns) => (format!("{{{ns}}}{local}"), Some(ns.to_string())),
    }
}

/// Strips a prefix or Clark-notation namespace from a canonical name.
pub fn local_part(name: &str) -> &str {
    if let Some(idx) = name.rfind('}') {
        return &name[idx + 1..];
    }
    match name.split_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates an element holding only text.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Builds a text element from an optional value.
    pub fn optional<T: std::fmt::Display>(name: &str, value: Option<T>) -> Option<Element> {
        value.map(|v| Element::with_text(name, v.to_string()))
    }

    /// Builds a `0`/`1` element from an optional flag.
    pub fn flag(name: &str, value: Option<bool>) -> Option<Element> {
        value.map(|v| Element::with_text(name, if v { "1" } else { "0" }))
    }

    /// Local part of the element name.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Returns an attribute value by canonical name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Text content as a string slice.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Appends a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// First child with the given canonical name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the last child with the given canonical name.
    pub fn last_child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().rev().find(|c| c.name == name)
    }

    /// True when the element has no attributes, text or children.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.text.is_none() && self.children.is_empty()
    }

    fn start_tag(&self) -> BytesStart<'_> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        start
    }

    /// Writes only the opening tag (with attributes).
    pub fn write_open<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(self.start_tag()))?;
        Ok(())
    }

    /// Writes the closing tag matching [`Element::write_open`].
    pub fn write_close<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }

    /// Writes the element and its whole subtree.
    pub fn write_to<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(self.start_tag()))?;
            return Ok(());
        }
        self.write_open(writer)?;
        if let Some(ref text) = self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        self.write_close(writer)
    }

    /// Serializes the subtree to a compact string.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

/// Builds element trees from a flat sequence of open/text/close steps.
#[derive(Debug, Default)]
pub struct ElementStack {
    open: Vec<Element>,
}

impl ElementStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new element as a child of the current one.
    pub fn open(&mut self, element: Element) {
        self.open.push(element);
    }

    /// Appends text to the innermost open element.
    pub fn text(&mut self, text: &str) {
        if let Some(top) = self.open.last_mut() {
            match top.text {
                Some(ref mut existing) => existing.push_str(text),
                None => top.text = Some(text.to_string()),
            }
        }
    }

    /// Closes the innermost element and returns it without attaching it.
    ///
    /// Whitespace-only text around child elements is layout and is dropped.
    pub fn close(&mut self) -> Option<Element> {
        let mut el = self.open.pop()?;
        if !el.children.is_empty() && el.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            el.text = None;
        }
        Some(el)
    }

    /// Attaches a finished element to the innermost open element.
    ///
    /// Returns the element back if nothing is open.
    pub fn attach(&mut self, element: Element) -> Option<Element> {
        match self.open.last_mut() {
            Some(parent) => {
                parent.push(element);
                None
            }
            None => Some(element),
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// The innermost open element.
    pub fn top(&self) -> Option<&Element> {
        self.open.last()
    }

    /// Mutable access to the open element at `depth` (0 is the root).
    pub fn at_mut(&mut self, depth: usize) -> Option<&mut Element> {
        self.open.get_mut(depth)
    }

    /// Name of the parent of the innermost element.
    pub fn parent_name(&self) -> Option<&str> {
        let len = self.open.len();
        if len < 2 {
            return None;
        }
        Some(self.open[len - 2].name.as_str())
    }
}
