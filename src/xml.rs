//! Minimal owned XML tree with resolved namespaces.
//!
//! The arXiv API answers with an Atom feed mixing the Atom namespace with
//! `arxiv:` and `opensearch:` extensions. Formatters only need
//! find-by-(namespace, name) lookups, so the feed is read once with
//! `quick-xml` into this tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use thiserror::Error;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const ARXIV_NS: &str = "http://arxiv.org/schemas/atom";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("Malformed XML document: {0}")]
    Malformed(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// First direct child with the given namespace and local name.
    pub fn child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is(namespace, name))
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Text content, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text of a direct child, empty when absent.
    pub fn child_text(&self, namespace: &str, name: &str) -> &str {
        self.child(namespace, name).map(XmlElement::text).unwrap_or("")
    }
}

fn open_element(namespace: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let namespace = match namespace {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.0).into_owned()),
        _ => None,
    };
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

/// Parse a complete document and return its root element.
pub fn parse(xml: &str) -> Result<XmlElement, XmlError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(start)) => {
                let element = open_element(ns, &start)?;
                stack.push(element);
            }
            (ns, Event::Empty(start)) => {
                let element = open_element(ns, &start)?;
                attach(&mut stack, &mut root, element);
            }
            (_, Event::End(_)) => {
                let element = stack.pop().ok_or(XmlError::Malformed("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element);
            }
            (_, Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
            }
            (_, Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Malformed("unclosed element at end of document"));
    }
    root.ok_or(XmlError::Malformed("document has no root element"))
}
