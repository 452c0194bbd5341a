//! The generic, order-preserving record tree shared by the decoder and the
//! encoder.
//!
//! ```text
//! XmlData ─┬─ Row #1 ─┬─ FieldLabel "Subject" = "Quote"
//!          │          └─ FieldLabel "Product Details"
//!          │               ├─ InternalGroup product #1 ─ FieldLabel ...
//!          │               └─ InternalGroup product #2 ─ FieldLabel ...
//!          └─ Row #2 ...
//! ```

use crate::error::{Error, Result};
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;

/// Top-level container: a module name, its rows, and an optional vendor
/// error that supersedes the rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlData {
    /// Module (record type) name, e.g. `Leads`.
    pub name: String,
    /// Rows in wire order, numbered from 1.
    pub rows: Vec<Row>,
    /// Error reported by the server in place of data.
    pub error: Option<ApiError>,
}

/// Error payload carried by `<error>` or `<nodata>` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiError {
    /// Vendor error code.
    pub code: i64,
    /// Human readable message.
    pub message: String,
}

/// One record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// 1-based position within the batch.
    pub number: usize,
    /// Wire-only attributes passed through untouched.
    pub attributes: RowAttributes,
    /// Fields in wire order.
    pub fields: Vec<FieldLabel>,
}

/// Optional `row` attributes that are carried but never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowAttributes {
    /// `ID` attribute.
    pub id: Option<String>,
    /// `PL` attribute.
    pub pl: Option<String>,
    /// `SL` attribute.
    pub sl: Option<String>,
    /// `GT` attribute.
    pub gt: Option<String>,
}

/// One labelled field of a row or of an internal group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldLabel {
    /// External field name, from the `val` attribute.
    pub label: String,
    /// Scalar text; empty when the field is a group container.
    pub value: String,
    /// Repeating sub-records, in order.
    pub groups: Vec<InternalGroup>,
}

/// One instance of a repeating nested record, e.g. an invoice line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InternalGroup {
    /// Element name of the group, constant per field.
    pub name: String,
    /// 1-based position within the owning field.
    pub number: usize,
    /// Fields of this instance.
    pub fields: Vec<FieldLabel>,
}

impl XmlData {
    /// Creates an empty container for `name`.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a container holding only a vendor error.
    pub fn from_error(error: ApiError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Appends a row numbered after the existing ones and returns it.
    pub fn push_row(&mut self, fields: Vec<FieldLabel>) -> &mut Row {
        let number = self.rows.len() + 1;
        self.rows.push(Row {
            number,
            attributes: RowAttributes::default(),
            fields,
        });
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Returns true when the server answered with an error payload.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts a vendor error payload into an `Err`.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(api) => Err(Error::server(api)),
            None => Ok(self),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Row {
    /// Creates a row with the given number and fields.
    pub fn new(number: usize, fields: Vec<FieldLabel>) -> Self {
        Self {
            number,
            attributes: RowAttributes::default(),
            fields,
        }
    }

    /// Looks up a field by exact label.
    pub fn field(&self, label: &str) -> Option<&FieldLabel> {
        find_field(&self.fields, label)
    }

    /// Appends a scalar field.
    pub fn push_field<L: Into<String>, V: Into<String>>(&mut self, label: L, value: V) {
        self.fields.push(FieldLabel::scalar(label, value));
    }

    /// Adds one group instance under `label`, merging it into an existing
    /// field with the same label.
    pub fn push_group<L: Into<String>>(&mut self, label: L, group: InternalGroup) {
        push_group(&mut self.fields, label.into(), group);
    }
}

impl FieldLabel {
    /// Creates a scalar field.
    pub fn scalar<L: Into<String>, V: Into<String>>(label: L, value: V) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            groups: Vec::new(),
        }
    }

    /// Returns true when the field holds nested groups.
    pub fn is_group(&self) -> bool {
        !self.groups.is_empty()
    }
}

impl InternalGroup {
    /// Creates a group instance.
    pub fn new<S: Into<String>>(name: S, number: usize, fields: Vec<FieldLabel>) -> Self {
        Self {
            name: name.into(),
            number,
            fields,
        }
    }

    /// Looks up a field by exact label.
    pub fn field(&self, label: &str) -> Option<&FieldLabel> {
        find_field(&self.fields, label)
    }
}

pub(crate) fn find_field<'a>(fields: &'a [FieldLabel], label: &str) -> Option<&'a FieldLabel> {
    fields.iter().find(|f| f.label == label)
}

/// Appends a group instance to the field labelled `label`, creating the
/// field when it does not exist yet. The instance is renumbered to follow
/// the groups already present.
pub fn push_group(fields: &mut Vec<FieldLabel>, label: String, mut group: InternalGroup) {
    match fields.iter_mut().find(|f| f.label == label) {
        Some(existing) => {
            group.number = existing.groups.len() + 1;
            existing.groups.push(group);
        }
        None => {
            group.number = 1;
            fields.push(FieldLabel {
                label,
                value: String::new(),
                groups: vec![group],
            });
        }
    }
}

/// Name the codec uses to recognise [`ExtraFields`] values.
pub(crate) const EXTRA_FIELDS: &str = "$rowxml::ExtraFields";

/// Overflow label/value pairs.
///
/// On encode the pairs are flattened into the row after the fields that
/// precede this one. On decode it collects every field of the row that no
/// other field of the record claims.
///
/// Values are plain text, like every other field value. The writer escapes
/// them, so pass `R&D` rather than `R&amp;D`. Decoded values come back
/// unescaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraFields(pub Vec<(String, String)>);

impl ExtraFields {
    /// Appends a pair.
    pub fn insert<L: Into<String>, V: Into<String>>(&mut self, label: L, value: V) {
        self.0.push((label.into(), value.into()));
    }

    /// Returns the value stored for `label`.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true when there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct PairMap<'a>(&'a [(String, String)]);

impl Serialize for PairMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl Serialize for ExtraFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(EXTRA_FIELDS, &PairMap(&self.0))
    }
}

struct ExtraFieldsVisitor;

impl<'de> Visitor<'de> for ExtraFieldsVisitor {
    type Value = ExtraFields;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field labels to values")
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<ExtraFields, D::Error> {
        deserializer.deserialize_map(self)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<ExtraFields, A::Error> {
        let mut pairs = Vec::new();
        while let Some((label, value)) = map.next_entry::<String, String>()? {
            pairs.push((label, value));
        }
        Ok(ExtraFields(pairs))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<ExtraFields, E> {
        Ok(ExtraFields::default())
    }
}

impl<'de> Deserialize<'de> for ExtraFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_newtype_struct(EXTRA_FIELDS, ExtraFieldsVisitor)
    }
}
