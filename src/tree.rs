//! Generic element tree built from the tokenizer.
//!
//! This is the first of the two decoding passes: the whole root element is
//! materialised so that the row decoder can classify `FL` elements by
//! looking at their children instead of scanning ahead in the stream.

use crate::error::Result;
use crate::reader::{Attribute, XmlEvent, XmlReader};

/// A node inside an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A child element.
    Element(Element),
    /// Character data (text or CDATA).
    Text(String),
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Children in document order.
    pub children: Vec<Node>,
}

impl Element {
    fn open(name: &str, attributes: Vec<Attribute<'_>>) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes
                .into_iter()
                .map(|a| (a.name.to_string(), a.value.into_owned()))
                .collect(),
            children: Vec::new(),
        }
    }

    /// Returns the value of attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Returns the first child element called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Returns true when any child is an element.
    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(text) = child {
                out.push_str(text);
            }
        }
        out
    }

    /// Concatenated text of the whole subtree, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Finds the first element named `name` in document order, including
    /// `self`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|el| el.find(name))
    }

    /// Removes whitespace-only text between child elements. Text of leaf
    /// elements is left as it is.
    fn drop_layout_whitespace(&mut self) {
        if self.has_elements() {
            self.children.retain(|child| match child {
                Node::Text(text) => !text.trim().is_empty(),
                Node::Element(_) => true,
            });
        }
    }

    /// Sorted attribute names, used to compare sibling shapes.
    pub(crate) fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.attributes.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Parses the first root element of `input`.
///
/// Returns `Ok(None)` when the input holds no element at all. Reading stops
/// once the root element closes; anything after it is ignored.
pub fn parse(input: &[u8]) -> Result<Option<Element>> {
    let mut reader = XmlReader::new(input);
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.next_event()? {
            XmlEvent::StartElement { name, attributes } => {
                stack.push(Element::open(name, attributes));
            }
            XmlEvent::EmptyElement { name, attributes } => {
                let element = Element::open(name, attributes);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => return Ok(Some(element)),
                }
            }
            XmlEvent::EndElement { .. } => {
                // The reader has already checked that the names match.
                let Some(mut element) = stack.pop() else {
                    continue;
                };
                element.drop_layout_whitespace();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => return Ok(Some(element)),
                }
            }
            XmlEvent::Text(text) => push_text(&mut stack, &text),
            XmlEvent::CData(data) => push_text(&mut stack, data),
            XmlEvent::Eof => return Ok(None),
        }
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        log::trace!("ignoring text outside the root element");
        return;
    };
    match parent.children.last_mut() {
        Some(Node::Text(prev)) => prev.push_str(text),
        _ => parent.children.push(Node::Text(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_nested_tree() {
        let root = parse(br#"<Leads><row no="1"><FL val="Company">Acme</FL></row></Leads>"#)
            .unwrap()
            .unwrap();
        assert_eq!(root.name, "Leads");
        let row = root.child("row").unwrap();
        assert_eq!(row.attr("no"), Some("1"));
        let fl = row.child("FL").unwrap();
        assert_eq!(fl.attr("val"), Some("Company"));
        assert_eq!(fl.text(), "Acme");
        assert!(!fl.has_elements());
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse(b"").unwrap().is_none());
        assert!(parse(b"<?xml version=\"1.0\"?>\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_self_closing_root() {
        let root = parse(b"<response/>").unwrap().unwrap();
        assert_eq!(root.name, "response");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_text_and_cdata_merge() {
        let root = parse(b"<FL val=\"Notes\">a &amp; <![CDATA[<b>]]></FL>").unwrap().unwrap();
        assert_eq!(root.text(), "a &<b>");
    }

    #[test]
    fn test_stops_after_root() {
        let root = parse(b"<a/><<<not xml").unwrap().unwrap();
        assert_eq!(root.name, "a");
    }

    #[test]
    fn test_malformed_input_fails() {
        let err = parse(b"<row><FL val=\"x\">1</row>").unwrap_err();
        assert!(err.is_malformed_xml());
    }

    #[test]
    fn test_find_and_text_content() {
        let root = parse(b"<response><error><code>4001</code><message>bad</message></error></response>")
            .unwrap()
            .unwrap();
        let error = root.find("error").unwrap();
        assert_eq!(error.child("code").unwrap().text(), "4001");
        assert_eq!(root.text_content(), "4001bad");
    }

    #[test]
    fn test_leaf_text_is_verbatim() {
        let root = parse(b"<row no=\"1\">\n  <FL val=\"Note\">  indented note \n</FL>\n  <FL val=\"Initial\"> </FL>\n</row>")
            .unwrap()
            .unwrap();
        assert_eq!(root.children.len(), 2);
        let texts: Vec<_> = root.elements().map(Element::text).collect();
        assert_eq!(texts, vec!["  indented note \n", " "]);
    }

    #[test]
    fn test_attribute_names_sorted() {
        let root = parse(br#"<product no="1" id="9"/>"#).unwrap().unwrap();
        assert_eq!(root.attribute_names(), vec!["id", "no"]);
    }
}
