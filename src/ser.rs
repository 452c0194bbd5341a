//! Record encoder: tagged records to rows.
//!
//! Records are ordinary serde types. Each field's serde name is its tag
//! (see [`crate::tag`]); fields are visited in the order the `Serialize`
//! impl emits them, which for derived impls is declaration order.
//!
//! ```rust
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Product {
//!     #[serde(rename = "Product Name")]
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! #[serde(rename = "Quotes")]
//! struct Quote {
//!     #[serde(rename = "Subject")]
//!     subject: String,
//!     #[serde(rename = "Product Details>product")]
//!     products: Vec<Product>,
//! }
//!
//! let quote = Quote {
//!     subject: "Order".to_string(),
//!     products: vec![Product { name: "A".to_string() }],
//! };
//!
//! let xml = rowxml::to_string(&quote).unwrap();
//! assert_eq!(
//!     xml,
//!     r#"<Quotes><row no="1"><FL val="Subject">Order</FL><FL val="Product Details"><product no="1"><FL val="Product Name">A</FL></product></FL></row></Quotes>"#
//! );
//! ```
//!
//! Zero values (empty strings, `0`, `false`, `None`, empty sequences) are
//! left out of the row unless the tag supplies a default. Wrap a field in
//! `Option` to send an explicit `false` or `0`.

use crate::error::{Error, Result};
use crate::model::{push_group, FieldLabel, InternalGroup, Row, XmlData, EXTRA_FIELDS};
use crate::tag::TagDirective;
use serde::ser::{self, Serialize};
use std::io::Write;

/// Encodes one record as a row with the given number.
pub fn to_row<T>(value: &T, number: usize) -> Result<Row>
where
    T: Serialize + ?Sized,
{
    match value.serialize(ValueSerializer)? {
        Encoded::Record(record) => Ok(Row::new(number, record.into_fields()?)),
        other => Err(Error::unsupported(format!(
            "expected a record, found {}",
            other.describe()
        ))),
    }
}

/// Encodes a record, or a sequence of records, as [`XmlData`].
///
/// The module name is the record's serde container name. Rows are numbered
/// `1..=N` in sequence order.
pub fn to_xml_data<T>(value: &T) -> Result<XmlData>
where
    T: Serialize + ?Sized,
{
    xml_data_from(value.serialize(ValueSerializer)?, None)
}

/// Like [`to_xml_data`] with an explicit module name.
pub fn to_xml_data_with_root<T>(value: &T, root: &str) -> Result<XmlData>
where
    T: Serialize + ?Sized,
{
    xml_data_from(value.serialize(ValueSerializer)?, Some(root))
}

/// Encodes a record, or a sequence of records, as an XML string.
pub fn to_string<T>(value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    Ok(to_xml_data(value)?.to_xml())
}

/// Encodes with an explicit module name.
pub fn to_string_with_root<T>(value: &T, root: &str) -> Result<String>
where
    T: Serialize + ?Sized,
{
    Ok(to_xml_data_with_root(value, root)?.to_xml())
}

/// Encodes as XML bytes.
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    Ok(to_string(value)?.into_bytes())
}

/// Encodes into a writer.
pub fn to_writer<W, T>(mut writer: W, value: &T) -> Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    writer.write_all(to_string(value)?.as_bytes())?;
    Ok(())
}

pub(crate) fn xml_data_from(encoded: Encoded, root: Option<&str>) -> Result<XmlData> {
    let records = match encoded {
        Encoded::Record(record) => vec![record],
        Encoded::Seq(items) => items
            .into_iter()
            .map(|item| match item {
                Encoded::Record(record) => Ok(record),
                other => Err(Error::unsupported(format!(
                    "expected a sequence of records, found {}",
                    other.describe()
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(Error::unsupported(format!(
                "expected a record or a sequence of records, found {}",
                other.describe()
            )))
        }
    };

    let name = match (root, records.first()) {
        (Some(root), _) => root.to_string(),
        (None, Some(first)) => first.name.to_string(),
        (None, None) => {
            return Err(Error::unsupported(
                "cannot name the module of an empty sequence; pass a root",
            ))
        }
    };

    let mut data = XmlData::new(name);
    for record in records {
        data.push_row(record.into_fields()?);
    }
    Ok(data)
}

/// A serialized value before tag directives are applied.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Encoded {
    /// `None` or `()`.
    Absent,
    /// Scalar text. `zero` marks the type's zero value.
    Scalar { text: String, zero: bool },
    Record(Record),
    Seq(Vec<Encoded>),
    /// A map with scalar keys and values.
    Map(Vec<(String, String)>),
    /// An [`crate::ExtraFields`] value.
    Extra(Vec<(String, String)>),
}

/// A struct: its serde name and `(tag, value)` pairs in emit order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Record {
    pub(crate) name: &'static str,
    pub(crate) entries: Vec<(&'static str, Encoded)>,
}

impl Encoded {
    fn scalar(text: impl Into<String>, zero: bool) -> Self {
        Encoded::Scalar {
            text: text.into(),
            zero,
        }
    }

    /// Whether this is its type's zero value.
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            Encoded::Absent => true,
            Encoded::Scalar { zero, .. } => *zero,
            Encoded::Record(record) => record.entries.iter().all(|(_, v)| v.is_zero()),
            Encoded::Seq(items) => items.is_empty(),
            Encoded::Map(pairs) | Encoded::Extra(pairs) => pairs.is_empty(),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Encoded::Absent => "an empty value",
            Encoded::Scalar { .. } => "a scalar",
            Encoded::Record(_) => "a record",
            Encoded::Seq(_) => "a sequence",
            Encoded::Map(_) => "a map",
            Encoded::Extra(_) => "extra fields",
        }
    }
}

impl Record {
    /// Applies each field's directive and produces the row's fields.
    pub(crate) fn into_fields(self) -> Result<Vec<FieldLabel>> {
        let mut fields = Vec::with_capacity(self.entries.len());

        for (tag, value) in self.entries {
            if let Encoded::Extra(pairs) = value {
                fields.extend(pairs.into_iter().map(|(l, v)| FieldLabel::scalar(l, v)));
                continue;
            }

            let directive = TagDirective::parse(tag);
            let resolved = directive.resolve(value.is_zero())?;
            if let Some(default) = resolved.default {
                fields.push(FieldLabel::scalar(resolved.label, default));
                continue;
            }
            if value.is_zero() {
                continue;
            }

            match (directive.group, value) {
                (Some(group), Encoded::Seq(items)) => {
                    for item in items {
                        push_record_group(&mut fields, resolved.label, group, item)?;
                    }
                }
                (Some(group), record @ Encoded::Record(_)) => {
                    push_record_group(&mut fields, resolved.label, group, record)?;
                }
                (None, Encoded::Scalar { text, .. }) => {
                    fields.push(FieldLabel::scalar(resolved.label, text));
                }
                (None, Encoded::Record(_)) => {
                    return Err(Error::unsupported(format!(
                        "record field \"{}\" needs a `Label>group` tag",
                        tag
                    )))
                }
                (_, other) => {
                    return Err(Error::unsupported(format!(
                        "field \"{}\" holds {}, which the row format cannot carry",
                        tag,
                        other.describe()
                    )))
                }
            }
        }

        Ok(fields)
    }
}

fn push_record_group(
    fields: &mut Vec<FieldLabel>,
    label: &str,
    group: &str,
    item: Encoded,
) -> Result<()> {
    match item {
        Encoded::Record(record) => {
            let members = record.into_fields()?;
            push_group(fields, label.to_string(), InternalGroup::new(group, 0, members));
            Ok(())
        }
        other => Err(Error::unsupported(format!(
            "group \"{}\" expects records, found {}",
            label,
            other.describe()
        ))),
    }
}

/// Serializer producing [`Encoded`] values.
pub(crate) struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Encoded;
    type Error = Error;

    type SerializeSeq = SeqEncoder;
    type SerializeTuple = ser::Impossible<Encoded, Error>;
    type SerializeTupleStruct = ser::Impossible<Encoded, Error>;
    type SerializeTupleVariant = ser::Impossible<Encoded, Error>;
    type SerializeMap = MapEncoder;
    type SerializeStruct = RecordEncoder;
    type SerializeStructVariant = ser::Impossible<Encoded, Error>;

    fn serialize_bool(self, v: bool) -> Result<Encoded> {
        Ok(Encoded::scalar(if v { "true" } else { "false" }, !v))
    }

    fn serialize_i8(self, v: i8) -> Result<Encoded> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Encoded> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Encoded> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Encoded> {
        let mut buffer = itoa::Buffer::new();
        Ok(Encoded::scalar(buffer.format(v), v == 0))
    }

    fn serialize_i128(self, v: i128) -> Result<Encoded> {
        let mut buffer = itoa::Buffer::new();
        Ok(Encoded::scalar(buffer.format(v), v == 0))
    }

    fn serialize_u8(self, v: u8) -> Result<Encoded> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Encoded> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Encoded> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Encoded> {
        let mut buffer = itoa::Buffer::new();
        Ok(Encoded::scalar(buffer.format(v), v == 0))
    }

    fn serialize_u128(self, v: u128) -> Result<Encoded> {
        let mut buffer = itoa::Buffer::new();
        Ok(Encoded::scalar(buffer.format(v), v == 0))
    }

    fn serialize_f32(self, v: f32) -> Result<Encoded> {
        Ok(Encoded::scalar(format_float(v), v == 0.0))
    }

    // `Display` for floats never switches to exponent notation.
    fn serialize_f64(self, v: f64) -> Result<Encoded> {
        Ok(Encoded::scalar(format_float(v), v == 0.0))
    }

    fn serialize_char(self, v: char) -> Result<Encoded> {
        Ok(Encoded::scalar(v, v == '\0'))
    }

    fn serialize_str(self, v: &str) -> Result<Encoded> {
        Ok(Encoded::scalar(v, v.is_empty()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Encoded> {
        match std::str::from_utf8(v) {
            Ok(text) => self.serialize_str(text),
            Err(_) => Err(Error::unsupported("non UTF-8 bytes")),
        }
    }

    fn serialize_none(self) -> Result<Encoded> {
        Ok(Encoded::Absent)
    }

    /// A present optional is never zero, even when it wraps `0` or `false`.
    fn serialize_some<T>(self, value: &T) -> Result<Encoded>
    where
        T: Serialize + ?Sized,
    {
        Ok(match value.serialize(self)? {
            Encoded::Scalar { text, .. } => Encoded::Scalar { text, zero: false },
            other => other,
        })
    }

    fn serialize_unit(self) -> Result<Encoded> {
        Ok(Encoded::Absent)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Encoded> {
        Ok(Encoded::Absent)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Encoded> {
        Ok(Encoded::scalar(variant, false))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> Result<Encoded>
    where
        T: Serialize + ?Sized,
    {
        let inner = value.serialize(self)?;
        if name != EXTRA_FIELDS {
            return Ok(inner);
        }
        match inner {
            Encoded::Map(pairs) => Ok(Encoded::Extra(pairs)),
            other => Err(Error::unsupported(format!(
                "extra fields must be a map, found {}",
                other.describe()
            ))),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _value: &T,
    ) -> Result<Encoded>
    where
        T: Serialize + ?Sized,
    {
        Err(Error::unsupported(format!("enum variant {}::{}", name, variant)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqEncoder> {
        Ok(SeqEncoder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::unsupported("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(Error::unsupported(format!("tuple struct {}", name)))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(Error::unsupported(format!("enum variant {}::{}", name, variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapEncoder> {
        Ok(MapEncoder {
            pairs: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<RecordEncoder> {
        Ok(RecordEncoder {
            record: Record {
                name,
                entries: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(Error::unsupported(format!("enum variant {}::{}", name, variant)))
    }
}

fn format_float<F: std::fmt::Display>(v: F) -> String {
    v.to_string()
}

pub(crate) struct SeqEncoder {
    items: Vec<Encoded>,
}

impl ser::SerializeSeq for SeqEncoder {
    type Ok = Encoded;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Encoded> {
        Ok(Encoded::Seq(self.items))
    }
}

pub(crate) struct MapEncoder {
    pairs: Vec<(String, String)>,
    key: Option<String>,
}

fn scalar_text<T>(value: &T, what: &str) -> Result<String>
where
    T: Serialize + ?Sized,
{
    match value.serialize(ValueSerializer)? {
        Encoded::Scalar { text, .. } => Ok(text),
        Encoded::Absent => Ok(String::new()),
        other => Err(Error::unsupported(format!(
            "map {} must be a scalar, found {}",
            what,
            other.describe()
        ))),
    }
}

impl ser::SerializeMap for MapEncoder {
    type Ok = Encoded;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.key = Some(scalar_text(key, "key")?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::custom("map value without a key"))?;
        self.pairs.push((key, scalar_text(value, "value")?));
        Ok(())
    }

    fn end(self) -> Result<Encoded> {
        Ok(Encoded::Map(self.pairs))
    }
}

pub(crate) struct RecordEncoder {
    record: Record,
}

impl ser::SerializeStruct for RecordEncoder {
    type Ok = Encoded;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.record.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Encoded> {
        Ok(Encoded::Record(self.record))
    }
}
