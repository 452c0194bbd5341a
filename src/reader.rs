//! Low-level XML pull tokenizer.
//!
//! Produces element, text and CDATA events over a byte buffer without
//! copying unless entities have to be expanded. Declarations, comments,
//! processing instructions and DOCTYPE blocks are consumed silently since
//! nothing in the row format depends on them.

use crate::error::{Error, Position, Result};
use crate::escape::unescape;
use memchr::{memchr, memchr2};
use std::borrow::Cow;

static IS_WHITESPACE: [bool; 256] = {
    let mut lut = [false; 256];
    lut[b' ' as usize] = true;
    lut[b'\t' as usize] = true;
    lut[b'\n' as usize] = true;
    lut[b'\r' as usize] = true;
    lut
};

static IS_NAME_START: [bool; 256] = {
    let mut lut = [false; 256];
    let mut i = b'A';
    while i <= b'Z' {
        lut[i as usize] = true;
        i += 1;
    }
    let mut i = b'a';
    while i <= b'z' {
        lut[i as usize] = true;
        i += 1;
    }
    lut[b'_' as usize] = true;
    lut[b':' as usize] = true;
    // Allow high bytes for UTF-8
    let mut i: usize = 0x80;
    while i < 256 {
        lut[i] = true;
        i += 1;
    }
    lut
};

static IS_NAME_CHAR: [bool; 256] = {
    let mut lut = IS_NAME_START;
    let mut i = b'0';
    while i <= b'9' {
        lut[i as usize] = true;
        i += 1;
    }
    lut[b'-' as usize] = true;
    lut[b'.' as usize] = true;
    lut
};

/// An XML event produced by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlEvent<'a> {
    /// Start of an element: `<name attr="value">`
    StartElement {
        /// Element name.
        name: &'a str,
        /// Element attributes in document order.
        attributes: Vec<Attribute<'a>>,
    },
    /// End of an element: `</name>`
    EndElement {
        /// Element name.
        name: &'a str,
    },
    /// Self-closing element: `<name attr="value"/>`
    EmptyElement {
        /// Element name.
        name: &'a str,
        /// Element attributes in document order.
        attributes: Vec<Attribute<'a>>,
    },
    /// Character data inside an element, unescaped, whitespace included.
    Text(Cow<'a, str>),
    /// Contents of a `<![CDATA[...]]>` section, verbatim.
    CData(&'a str),
    /// End of document.
    Eof,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    /// The attribute name.
    pub name: &'a str,
    /// The unescaped attribute value.
    pub value: Cow<'a, str>,
}

/// A zero-copy XML tokenizer that validates tag nesting.
pub struct XmlReader<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    open: Vec<&'a str>,
}

impl<'a> XmlReader<'a> {
    /// Creates a new XML reader from bytes.
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
            open: Vec::with_capacity(8),
        }
    }

    /// Returns the current position in the input.
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
            offset: self.pos,
        }
    }

    /// Reads the next event, skipping markup that carries no data.
    pub fn next_event(&mut self) -> Result<XmlEvent<'a>> {
        loop {
            // Inside an element all character data is kept, whitespace included.
            if self.open.is_empty() {
                self.skip_whitespace();
            }

            if self.pos >= self.input.len() {
                if let Some(tag) = self.open.pop() {
                    return Err(Error::unclosed_tag(tag).with_position(self.position()));
                }
                return Ok(XmlEvent::Eof);
            }

            let event = if self.input[self.pos] == b'<' {
                self.read_markup()?
            } else {
                self.read_text()?
            };

            if let Some(event) = event {
                return Ok(event);
            }
        }
    }

    #[inline(always)]
    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && IS_WHITESPACE[self.input[self.pos] as usize] {
            self.advance(1);
        }
    }

    /// Moves forward `n` bytes, keeping line and column in step.
    #[inline]
    fn advance(&mut self, n: usize) {
        let end = (self.pos + n).min(self.input.len());
        for &b in &self.input[self.pos..end] {
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos = end;
    }

    fn err(&self, msg: &str) -> Error {
        Error::syntax(msg).with_position(self.position())
    }

    fn eof(&self) -> Error {
        Error::unexpected_eof().with_position(self.position())
    }

    fn slice_str(&self, start: usize, end: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..end])
            .map_err(|_| Error::invalid_utf8().with_position(self.position()))
    }

    fn read_text(&mut self) -> Result<Option<XmlEvent<'a>>> {
        let start = self.pos;
        let len = memchr(b'<', &self.input[start..]).unwrap_or(self.input.len() - start);
        self.advance(len);

        let text = self.slice_str(start, self.pos)?;
        if self.open.is_empty() {
            log::trace!("ignoring text outside the root element");
            return Ok(None);
        }

        match unescape(text) {
            Ok(text) => Ok(Some(XmlEvent::Text(text))),
            Err(e) => Err(Error::invalid_escape(e.entity).with_position(self.position())),
        }
    }

    fn read_markup(&mut self) -> Result<Option<XmlEvent<'a>>> {
        let rest = &self.input[self.pos..];

        if rest.starts_with(b"</") {
            self.advance(2);
            return self.read_end_element().map(Some);
        }
        if rest.starts_with(b"<![CDATA[") {
            self.advance(9);
            let data = self.read_until(b"]]>", "unterminated CDATA section")?;
            return Ok(Some(XmlEvent::CData(data)));
        }
        if rest.starts_with(b"<!--") {
            self.advance(4);
            self.read_until(b"-->", "unterminated comment")?;
            return Ok(None);
        }
        if rest.starts_with(b"<?") {
            self.advance(2);
            self.read_until(b"?>", "unterminated processing instruction")?;
            return Ok(None);
        }
        if rest.starts_with(b"<!DOCTYPE") {
            self.skip_doctype()?;
            return Ok(None);
        }
        if rest.starts_with(b"<!") {
            return Err(self.err("unknown construct after '<!'"));
        }

        self.advance(1);
        self.read_start_element().map(Some)
    }

    /// Returns everything up to `terminator` and moves past it.
    fn read_until(&mut self, terminator: &[u8], what: &str) -> Result<&'a str> {
        let start = self.pos;
        let first = terminator[0];
        let mut search = start;

        while let Some(offset) = memchr(first, &self.input[search..]) {
            let at = search + offset;
            if self.input[at..].starts_with(terminator) {
                let data = self.slice_str(start, at)?;
                self.advance(at + terminator.len() - self.pos);
                return Ok(data);
            }
            search = at + 1;
        }

        self.advance(self.input.len() - self.pos);
        Err(self.err(what))
    }

    fn skip_doctype(&mut self) -> Result<()> {
        let mut depth = 0usize;
        while let Some(offset) = memchr2(b'<', b'>', &self.input[self.pos..]) {
            self.advance(offset);
            match self.input[self.pos] {
                b'<' => depth += 1,
                _ => depth -= 1,
            }
            self.advance(1);
            if depth == 0 {
                return Ok(());
            }
        }
        Err(self.err("unterminated DOCTYPE"))
    }

    fn read_start_element(&mut self) -> Result<XmlEvent<'a>> {
        let name = self.read_name()?;
        let attributes = self.read_attributes()?;
        self.skip_whitespace();

        match self.input.get(self.pos) {
            Some(b'/') => {
                self.advance(1);
                self.expect_char(b'>')?;
                Ok(XmlEvent::EmptyElement { name, attributes })
            }
            Some(b'>') => {
                self.advance(1);
                self.open.push(name);
                Ok(XmlEvent::StartElement { name, attributes })
            }
            Some(_) => Err(self.err("expected '>' or '/>'")),
            None => Err(self.eof()),
        }
    }

    fn read_end_element(&mut self) -> Result<XmlEvent<'a>> {
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect_char(b'>')?;

        match self.open.pop() {
            Some(expected) if expected == name => Ok(XmlEvent::EndElement { name }),
            Some(expected) => {
                Err(Error::mismatched_tag(expected, name).with_position(self.position()))
            }
            None => Err(self.err(&format!("unexpected closing tag: {}", name))),
        }
    }

    fn read_name(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let first = *self.input.get(self.pos).ok_or_else(|| self.eof())?;
        if !IS_NAME_START[first as usize] {
            return Err(Error::invalid_name(format!(
                "invalid name start character: {:?}",
                first as char
            ))
            .with_position(self.position()));
        }

        let mut end = start + 1;
        while end < self.input.len() && IS_NAME_CHAR[self.input[end] as usize] {
            end += 1;
        }
        self.advance(end - start);
        self.slice_str(start, end)
    }

    fn read_attributes(&mut self) -> Result<Vec<Attribute<'a>>> {
        let mut attributes = Vec::new();

        loop {
            self.skip_whitespace();
            match self.input.get(self.pos) {
                None | Some(b'>') | Some(b'/') => return Ok(attributes),
                Some(_) => {}
            }

            let name = self.read_name()?;
            self.skip_whitespace();
            self.expect_char(b'=')?;
            self.skip_whitespace();
            let value = self.read_attribute_value()?;
            attributes.push(Attribute { name, value });
        }
    }

    fn read_attribute_value(&mut self) -> Result<Cow<'a, str>> {
        let quote = *self.input.get(self.pos).ok_or_else(|| self.eof())?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.err("expected quote"));
        }
        self.advance(1);

        let start = self.pos;
        let len = memchr(quote, &self.input[start..])
            .ok_or_else(|| self.err("unterminated attribute value"))?;
        let raw = self.slice_str(start, start + len)?;
        self.advance(len + 1);

        unescape(raw).map_err(|e| Error::invalid_escape(e.entity).with_position(self.position()))
    }

    #[inline]
    fn expect_char(&mut self, expected: u8) -> Result<()> {
        match self.input.get(self.pos) {
            Some(&b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(&b) => Err(self.err(&format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))),
            None => Err(self.eof()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(xml: &str) -> Vec<XmlEvent<'_>> {
        let mut reader = XmlReader::new(xml.as_bytes());
        let mut out = Vec::new();
        loop {
            match reader.next_event().unwrap() {
                XmlEvent::Eof => return out,
                event => out.push(event),
            }
        }
    }

    #[test]
    fn test_row_with_field_label() {
        let evs = events(r#"<row no="1"><FL val="Job Description">Build a shed</FL></row>"#);
        assert_eq!(evs.len(), 5);
        match &evs[1] {
            XmlEvent::StartElement { name, attributes } => {
                assert_eq!(*name, "FL");
                assert_eq!(attributes[0].name, "val");
                assert_eq!(attributes[0].value, "Job Description");
            }
            other => panic!("expected FL start, got {:?}", other),
        }
        assert_eq!(evs[2], XmlEvent::Text(Cow::Borrowed("Build a shed")));
    }

    #[test]
    fn test_skips_declaration_comments_and_doctype() {
        let evs = events(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE response>\n<!-- generated --><response/>",
        );
        assert_eq!(evs.len(), 1);
        assert!(matches!(evs[0], XmlEvent::EmptyElement { name: "response", .. }));
    }

    #[test]
    fn test_cdata_is_verbatim() {
        let evs = events("<FL val=\"Notes\"><![CDATA[ <b>bold</b> & co ]]></FL>");
        assert_eq!(evs[1], XmlEvent::CData(" <b>bold</b> & co "));
    }

    #[test]
    fn test_escaped_attribute_and_text() {
        let evs = events(r#"<FL val="R&amp;D">&lt;none&gt;</FL>"#);
        match &evs[0] {
            XmlEvent::StartElement { attributes, .. } => assert_eq!(attributes[0].value, "R&D"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(evs[1], XmlEvent::Text(Cow::Owned("<none>".to_string())));
    }

    #[test]
    fn test_single_quoted_attribute() {
        let evs = events("<product no='2'/>");
        match &evs[0] {
            XmlEvent::EmptyElement { attributes, .. } => assert_eq!(attributes[0].value, "2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_tags() {
        let mut reader = XmlReader::new(b"<row></FL>");
        reader.next_event().unwrap();
        let err = reader.next_event().unwrap_err();
        assert!(err.is_malformed_xml());
    }

    #[test]
    fn test_unclosed_tag() {
        let mut reader = XmlReader::new(b"<row>");
        reader.next_event().unwrap();
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn test_unterminated_comment() {
        let mut reader = XmlReader::new(b"<!-- never ends");
        assert!(reader.next_event().is_err());
    }

    #[test]
    fn test_position_tracking() {
        let mut reader = XmlReader::new(b"<a>\n  <b>\n<c></c></b></a>");
        reader.next_event().unwrap();
        assert_eq!(reader.next_event().unwrap(), XmlEvent::Text(Cow::Borrowed("\n  ")));
        reader.next_event().unwrap();
        assert_eq!(reader.position().line, 2);
    }

    #[test]
    fn test_text_whitespace_is_kept() {
        let evs = events("<FL val=\"Note\">  indented note \n</FL>");
        assert_eq!(evs[1], XmlEvent::Text(Cow::Borrowed("  indented note \n")));

        let evs = events("<FL val=\"Initial\"> </FL>");
        assert_eq!(evs[1], XmlEvent::Text(Cow::Borrowed(" ")));
    }

    #[test]
    fn test_whitespace_outside_root_is_skipped() {
        let evs = events("\n  <a/>\n");
        assert_eq!(evs.len(), 1);
    }
}
