//! Owned element tree for schema-dependent tree-walking.
//!
//! Metadata dialects are namespace-heavy XML; extraction only ever matches
//! on local names, so element and attribute names are stored with their
//! namespace prefixes stripped.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::{IngestError, Result};

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parses a well-formed XML document into its root element.
    pub fn parse(input: &str) -> Result<Element> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    stack.push(element_from_start(start.name().as_ref(), start.attributes())?);
                }
                Event::Empty(start) => {
                    let element =
                        element_from_start(start.name().as_ref(), start.attributes())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let decoded = text.unescape().map_err(|e| {
                        IngestError::MalformedDocument(format!("bad text content: {e}"))
                    })?;
                    if let Some(top) = stack.last_mut() {
                        top.push_text(&decoded);
                    }
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    let decoded = String::from_utf8_lossy(&raw);
                    if let Some(top) = stack.last_mut() {
                        top.push_text(&decoded);
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        IngestError::MalformedDocument("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(IngestError::MalformedDocument(
                "unclosed element at end of document".to_string(),
            ));
        }
        root.ok_or_else(|| IngestError::MalformedDocument("document has no root element".to_string()))
    }

    fn push_text(&mut self, piece: &str) {
        let piece = piece.trim();
        if piece.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(piece);
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Walks a path of local names through direct children.
    pub fn find(&self, path: &[&str]) -> Option<&Element> {
        let mut current = self;
        for name in path {
            current = current.child(name)?;
        }
        Some(current)
    }

    /// All elements with the given local name, at any depth below this one.
    pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.descendants_named(name, out);
        }
    }

    /// Trimmed text of the first child with the given local name, if
    /// non-empty.
    pub fn text_of(&self, name: &str) -> Option<String> {
        let text = &self.child(name)?.text;
        if text.is_empty() {
            None
        } else {
            Some(text.clone())
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Own text plus all descendant text, space-joined in document order.
    pub fn all_text(&self) -> String {
        let mut pieces = Vec::new();
        self.collect_text(&mut pieces);
        pieces.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        if !self.text.is_empty() {
            out.push(&self.text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

fn local_name(qname: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(qname)
        .map_err(|e| IngestError::MalformedDocument(format!("non-UTF-8 name: {e}")))?;
    Ok(name.rsplit(':').next().unwrap_or(name).to_string())
}

fn element_from_start(
    qname: &[u8],
    attributes: quick_xml::events::attributes::Attributes<'_>,
) -> Result<Element> {
    let mut element = Element {
        name: local_name(qname)?,
        ..Element::default()
    };
    for attr in attributes {
        let attr =
            attr.map_err(|e| IngestError::MalformedDocument(format!("bad attribute: {e}")))?;
        // xmlns declarations are noise once names are localized
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = local_name(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| IngestError::MalformedDocument(format!("bad attribute value: {e}")))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(IngestError::MalformedDocument(
            "multiple root elements".to_string(),
        ))
    }
}
