//! XML writer and the row-format renderer.

use crate::escape::escape;
use crate::model::{ApiError, FieldLabel, Row, XmlData};
use std::io::{self, Write};

/// An XML writer that produces well-formed XML output.
pub struct XmlWriter<W: Write> {
    writer: W,
    /// Stack of open element names.
    element_stack: Vec<String>,
    /// Whether the current start tag still lacks its closing `>`.
    in_tag: bool,
    indent: Option<IndentConfig>,
    /// Whether the last thing written was a start tag, so an end tag can
    /// stay on the same line.
    last_was_start: bool,
    /// Nothing has been written yet.
    at_start: bool,
}

/// Indentation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentConfig {
    /// Characters to use for each level of indentation.
    pub indent_str: String,
    /// Whether to start each element on a new line.
    pub newlines: bool,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            newlines: true,
        }
    }
}

impl<W: Write> XmlWriter<W> {
    /// Creates a compact writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            element_stack: Vec::new(),
            in_tag: false,
            indent: None,
            last_was_start: false,
            at_start: true,
        }
    }

    /// Creates a writer that indents nested elements.
    pub fn with_indent(writer: W, indent: IndentConfig) -> Self {
        Self {
            indent: Some(indent),
            ..Self::new(writer)
        }
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Returns the current nesting depth.
    pub fn depth(&self) -> usize {
        self.element_stack.len()
    }

    /// Writes the XML declaration.
    pub fn write_declaration(&mut self, version: &str, encoding: Option<&str>) -> io::Result<()> {
        self.close_tag_if_open()?;
        write!(self.writer, "<?xml version=\"{}\"", version)?;
        if let Some(enc) = encoding {
            write!(self.writer, " encoding=\"{}\"", enc)?;
        }
        self.at_start = false;
        self.writer.write_all(b"?>")
    }

    /// Starts an element.
    pub fn start_element(&mut self, name: &str) -> io::Result<()> {
        self.close_tag_if_open()?;
        self.write_indent(self.element_stack.len())?;
        write!(self.writer, "<{}", name)?;
        self.at_start = false;
        self.element_stack.push(name.to_string());
        self.in_tag = true;
        self.last_was_start = true;
        Ok(())
    }

    /// Writes an attribute for the element just started.
    pub fn write_attribute(&mut self, name: &str, value: &str) -> io::Result<()> {
        if !self.in_tag {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write attribute outside of element tag",
            ));
        }
        write!(self.writer, " {}=\"", name)?;
        self.write_escaped(value)?;
        self.writer.write_all(b"\"")
    }

    /// Ends the current element. Elements without content self-close.
    pub fn end_element(&mut self) -> io::Result<()> {
        let Some(name) = self.element_stack.pop() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "no element to close"));
        };

        if self.in_tag {
            self.writer.write_all(b"/>")?;
            self.in_tag = false;
        } else {
            if !self.last_was_start {
                self.write_indent(self.element_stack.len())?;
            }
            write!(self.writer, "</{}>", name)?;
        }
        self.last_was_start = false;
        Ok(())
    }

    /// Writes escaped text content.
    pub fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.close_tag_if_open()?;
        self.write_escaped(text)
    }

    /// Writes a complete element with text content.
    pub fn write_element(&mut self, name: &str, content: &str) -> io::Result<()> {
        self.start_element(name)?;
        self.write_text(content)?;
        self.end_element()
    }

    fn close_tag_if_open(&mut self) -> io::Result<()> {
        if self.in_tag {
            self.writer.write_all(b">")?;
            self.in_tag = false;
        }
        Ok(())
    }

    fn write_indent(&mut self, level: usize) -> io::Result<()> {
        if let Some(ref indent) = self.indent {
            if indent.newlines && !self.at_start {
                self.writer.write_all(b"\n")?;
            }
            for _ in 0..level {
                self.writer.write_all(indent.indent_str.as_bytes())?;
            }
        }
        Ok(())
    }

    fn write_escaped(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(escape(s).as_bytes())
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Writes `data` in the row format.
    ///
    /// Rows are wrapped in an element named after the module; an error
    /// payload is written in the `<response><error>` shape instead.
    pub fn write_xml_data(&mut self, data: &XmlData) -> io::Result<()> {
        if let Some(error) = &data.error {
            return self.write_api_error(error);
        }

        let wrap = !data.name.is_empty();
        if wrap {
            self.start_element(&data.name)?;
        }
        for row in &data.rows {
            self.write_row(row)?;
        }
        if wrap {
            self.end_element()?;
        }
        Ok(())
    }

    /// Writes one `row` element.
    pub fn write_row(&mut self, row: &Row) -> io::Result<()> {
        let mut number = itoa::Buffer::new();
        self.start_element("row")?;
        self.write_attribute("no", number.format(row.number))?;

        let attrs = &row.attributes;
        for (name, value) in [("ID", &attrs.id), ("PL", &attrs.pl), ("SL", &attrs.sl), ("GT", &attrs.gt)] {
            if let Some(value) = value {
                self.write_attribute(name, value)?;
            }
        }

        self.write_fields(&row.fields)?;
        self.end_element()
    }

    fn write_fields(&mut self, fields: &[FieldLabel]) -> io::Result<()> {
        let mut number = itoa::Buffer::new();
        for field in fields {
            self.start_element("FL")?;
            self.write_attribute("val", &field.label)?;
            if field.is_group() {
                for group in &field.groups {
                    self.start_element(&group.name)?;
                    self.write_attribute("no", number.format(group.number))?;
                    self.write_fields(&group.fields)?;
                    self.end_element()?;
                }
            } else {
                self.write_text(&field.value)?;
            }
            self.end_element()?;
        }
        Ok(())
    }

    fn write_api_error(&mut self, error: &ApiError) -> io::Result<()> {
        let mut code = itoa::Buffer::new();
        self.start_element("response")?;
        self.start_element("error")?;
        self.write_element("code", code.format(error.code))?;
        self.write_element("message", &error.message)?;
        self.end_element()?;
        self.end_element()
    }
}

impl XmlData {
    /// Renders the data as compact XML.
    pub fn to_xml(&self) -> String {
        self.render(XmlWriter::new(Vec::new()))
    }

    /// Renders the data as indented XML.
    pub fn to_xml_pretty(&self, indent: IndentConfig) -> String {
        self.render(XmlWriter::with_indent(Vec::new(), indent))
    }

    fn render(&self, mut writer: XmlWriter<Vec<u8>>) -> String {
        // Writing into a Vec cannot fail and the input is valid UTF-8.
        let _ = writer.write_xml_data(self);
        String::from_utf8(writer.into_inner()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InternalGroup;

    fn write_to_string<F>(f: F) -> String
    where
        F: FnOnce(&mut XmlWriter<Vec<u8>>) -> io::Result<()>,
    {
        let mut writer = XmlWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_element_with_attributes() {
        let result = write_to_string(|w| {
            w.start_element("FL")?;
            w.write_attribute("val", "Job \"Description\"")?;
            w.end_element()
        });
        assert_eq!(result, r#"<FL val="Job &quot;Description&quot;"/>"#);
    }

    #[test]
    fn test_escaped_content() {
        let result = write_to_string(|w| w.write_element("FL", "R&D <team>"));
        assert_eq!(result, "<FL>R&amp;D &lt;team&gt;</FL>");
    }

    #[test]
    fn test_attribute_outside_tag_fails() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(writer.write_attribute("no", "1").is_err());
        assert!(writer.end_element().is_err());
    }

    #[test]
    fn test_depth() {
        let mut writer = XmlWriter::new(Vec::new());
        writer.start_element("a").unwrap();
        writer.start_element("b").unwrap();
        assert_eq!(writer.depth(), 2);
        writer.end_element().unwrap();
        assert_eq!(writer.depth(), 1);
    }

    #[test]
    fn test_declaration() {
        let result = write_to_string(|w| {
            w.write_declaration("1.0", Some("UTF-8"))?;
            w.write_element("Leads", "")
        });
        assert_eq!(result, r#"<?xml version="1.0" encoding="UTF-8"?><Leads></Leads>"#);
    }

    #[test]
    fn test_xml_data_wire_shape() {
        let mut data = XmlData::new("Quotes");
        let row = data.push_row(vec![FieldLabel::scalar("Subject", "Order")]);
        row.push_group(
            "Product Details",
            InternalGroup::new("product", 1, vec![FieldLabel::scalar("Product Name", "A")]),
        );

        assert_eq!(
            data.to_xml(),
            concat!(
                r#"<Quotes><row no="1"><FL val="Subject">Order</FL>"#,
                r#"<FL val="Product Details"><product no="1"><FL val="Product Name">A</FL></product></FL>"#,
                r#"</row></Quotes>"#
            )
        );
    }

    #[test]
    fn test_row_attributes_written() {
        let mut data = XmlData::new("Leads");
        data.push_row(Vec::new()).attributes.id = Some("42".to_string());
        assert_eq!(data.to_xml(), r#"<Leads><row no="1" ID="42"/></Leads>"#);
    }

    #[test]
    fn test_empty_value_is_explicit() {
        let mut data = XmlData::new("Leads");
        data.push_row(vec![FieldLabel::scalar("Phone", "")]);
        assert_eq!(
            data.to_xml(),
            r#"<Leads><row no="1"><FL val="Phone"></FL></row></Leads>"#
        );
    }

    #[test]
    fn test_error_payload_shape() {
        let data = XmlData::from_error(ApiError {
            code: 4001,
            message: "bad".to_string(),
        });
        assert_eq!(
            data.to_xml(),
            "<response><error><code>4001</code><message>bad</message></error></response>"
        );
    }

    #[test]
    fn test_pretty_output_decodes_back() {
        let mut data = XmlData::new("Leads");
        data.push_row(vec![FieldLabel::scalar("Company", "Acme")]);
        let xml = data.to_xml_pretty(IndentConfig::default());
        assert!(xml.contains("\n  <row"));
        assert_eq!(crate::decode(xml.as_bytes()).unwrap(), data);
    }
}
