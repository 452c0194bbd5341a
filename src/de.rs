//! Record decoder: rows to tagged records.
//!
//! The deserializer walks a decoded [`Row`] rather than the raw XML. Each
//! struct field is looked up by the label of its tag, falling back to the
//! rename label. Missing fields take their type's zero value, so records
//! need no `#[serde(default)]`.
//!
//! Scalar text that does not parse is not fatal: the field keeps its zero
//! value and a [`FieldParseFailure`] is reported next to the record. An
//! `Option` field whose text does not parse decodes as `None`. Enum text
//! that names no variant has no zero value to fall back to, so unless the
//! enum has a `#[serde(other)]` variant the row is left out of
//! [`Records`] and only its failures are reported.
//!
//! ```rust
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Lead {
//!     #[serde(rename = "Company")]
//!     company: String,
//!     #[serde(rename = "No of Employees")]
//!     employees: u32,
//! }
//!
//! let xml = r#"<Leads>
//!   <row no="1"><FL val="Company">Acme</FL><FL val="No of Employees">many</FL></row>
//! </Leads>"#;
//!
//! let records = rowxml::from_str::<Lead>(xml).unwrap();
//! assert_eq!(records.records[0].company, "Acme");
//! assert_eq!(records.records[0].employees, 0);
//! assert_eq!(records.failures[0].label, "No of Employees");
//! ```

use crate::decode::decode;
use crate::error::{Error, Result};
use crate::model::{find_field, ApiError, FieldLabel, InternalGroup, Row, XmlData, EXTRA_FIELDS};
use crate::tag::TagDirective;
use crate::time::Layout;
use log::{debug, trace};
use serde::de::value::{MapDeserializer, StrDeserializer};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::str::FromStr;

/// A field whose text could not be parsed into the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldParseFailure {
    /// Number of the row holding the field.
    pub row: usize,
    /// Field label.
    pub label: String,
    /// Text that failed to parse.
    pub value: String,
    /// Parser message.
    pub message: String,
}

impl fmt::Display for FieldParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: field '{}' ({:?}): {}",
            self.row, self.label, self.value, self.message
        )
    }
}

/// One decoded record and the fields that fell back to zero values.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    /// The record.
    pub value: T,
    /// Fields left at their zero value because their text did not parse.
    pub failures: Vec<FieldParseFailure>,
}

impl<T> Decoded<T> {
    /// Drops the failure report.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Decoded records of a whole response.
#[derive(Debug, Clone, PartialEq)]
pub struct Records<T> {
    /// One record per row, in row order.
    pub records: Vec<T>,
    /// Error reported by the server; `records` is empty when set.
    pub error: Option<ApiError>,
    /// Parse failures of every row.
    pub failures: Vec<FieldParseFailure>,
}

impl<T> Records<T> {
    /// Returns true when the server answered with an error payload.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the records, or the server error as an `Err`.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(api) => Err(Error::server(api)),
            None => Ok(self.records),
        }
    }
}

/// Maps one row onto `T`.
///
/// Fails when an enum field names no variant, see the module docs.
pub fn from_row<T>(row: &Row) -> Result<Decoded<T>>
where
    T: DeserializeOwned,
{
    let outcome = map_row(row);
    Ok(Decoded {
        value: outcome.value?,
        failures: outcome.failures,
    })
}

/// Maps every row of `data` onto `T`.
///
/// A server error is passed through in [`Records::error`].
pub fn from_xml_data<T>(data: &XmlData) -> Result<Records<T>>
where
    T: DeserializeOwned,
{
    if let Some(error) = &data.error {
        debug!("server reported error {}", error);
        return Ok(Records {
            records: Vec::new(),
            error: Some(error.clone()),
            failures: Vec::new(),
        });
    }

    let mut records = Vec::with_capacity(data.rows.len());
    let mut failures = Vec::new();
    for row in &data.rows {
        trace!("mapping row {} of {}", row.number, data.name);
        let outcome = map_row(row);
        failures.extend(outcome.failures);
        match outcome.value {
            Ok(value) => records.push(value),
            Err(e) if outcome.rejected => {
                debug!("leaving out row {} of {}: {}", row.number, data.name, e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Records {
        records,
        error: None,
        failures,
    })
}

/// Decodes XML bytes and maps the rows onto `T`.
pub fn from_slice<T>(bytes: &[u8]) -> Result<Records<T>>
where
    T: DeserializeOwned,
{
    from_xml_data(&decode(bytes)?)
}

/// Decodes an XML string and maps the rows onto `T`.
pub fn from_str<T>(s: &str) -> Result<Records<T>>
where
    T: DeserializeOwned,
{
    from_slice(s.as_bytes())
}

struct RowOutcome<T> {
    value: Result<T>,
    failures: Vec<FieldParseFailure>,
    /// A field had no value to fall back to.
    rejected: bool,
}

/// Decodes a row, again for as long as some `Option` field fails to parse,
/// with every such field forced to `None`. Each pass adds at least one new
/// forced field, so this ends.
fn map_row<T>(row: &Row) -> RowOutcome<T>
where
    T: DeserializeOwned,
{
    let mut unset = Vec::new();
    loop {
        let cx = Context::new(row.number, unset);
        let value = T::deserialize(FieldsDeserializer::new(&row.fields, &cx));
        let Context {
            failures,
            unset: mut forced,
            newly_unset,
            rejected,
            ..
        } = cx;

        let newly_unset = newly_unset.into_inner();
        if newly_unset.is_empty() {
            return RowOutcome {
                value,
                failures: failures.into_inner(),
                rejected: rejected.get(),
            };
        }
        trace!(
            "row {}: {} optional field(s) failed, decoding again",
            row.number,
            newly_unset.len()
        );
        forced.extend(newly_unset);
        unset = forced;
    }
}

/// An optional field forced to `None`, keyed by address, and its failure.
type UnsetField = (*const FieldLabel, FieldParseFailure);

/// Per-pass state shared by all deserializers of one row.
struct Context {
    row: usize,
    failures: RefCell<Vec<FieldParseFailure>>,
    /// Optional fields that failed on an earlier pass.
    unset: Vec<UnsetField>,
    /// Optional fields that failed on this pass.
    newly_unset: RefCell<Vec<UnsetField>>,
    rejected: Cell<bool>,
}

impl Context {
    fn new(row: usize, unset: Vec<UnsetField>) -> Self {
        Self {
            row,
            failures: RefCell::new(Vec::new()),
            unset,
            newly_unset: RefCell::new(Vec::new()),
            rejected: Cell::new(false),
        }
    }

    fn failure(&self, label: &str, value: &str, message: impl fmt::Display) -> FieldParseFailure {
        FieldParseFailure {
            row: self.row,
            label: label.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        }
    }

    fn record(&self, failure: FieldParseFailure) {
        debug!("{}", failure);
        self.failures.borrow_mut().push(failure);
    }

    /// Records the earlier failure of `field` if it is forced to `None`.
    fn replay_unset(&self, field: &FieldLabel) -> bool {
        match self.unset.iter().find(|(ptr, _)| std::ptr::eq(*ptr, field)) {
            Some((_, failure)) => {
                self.record(failure.clone());
                true
            }
            None => false,
        }
    }
}

/// Deserializes a record from the fields of a row or a group.
#[derive(Clone, Copy)]
struct FieldsDeserializer<'a> {
    fields: &'a [FieldLabel],
    cx: &'a Context,
}

impl<'a> FieldsDeserializer<'a> {
    fn new(fields: &'a [FieldLabel], cx: &'a Context) -> Self {
        Self { fields, cx }
    }

    fn pairs(self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.fields
            .iter()
            .filter(|f| !f.is_group())
            .map(|f| (f.label.as_str(), f.value.as_str()))
    }
}

impl<'de, 'a> de::Deserializer<'de> for FieldsDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let mut map = MapDeserializer::<_, Error>::new(self.pairs());
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(RecordAccess {
            fields: self.fields,
            tags: fields,
            next: 0,
            cx: self.cx,
        })
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option seq tuple tuple_struct enum identifier
    }
}

/// Feeds a struct's tags to its visitor, one per declared field.
struct RecordAccess<'a> {
    fields: &'a [FieldLabel],
    tags: &'static [&'static str],
    next: usize,
    cx: &'a Context,
}

impl<'de, 'a> MapAccess<'de> for RecordAccess<'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        let Some(&tag) = self.tags.get(self.next) else {
            return Ok(None);
        };
        let key: StrDeserializer<'_, Error> = tag.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let tag = self
            .tags
            .get(self.next)
            .copied()
            .ok_or_else(|| Error::custom("value requested before key"))?;
        self.next += 1;
        seed.deserialize(FieldDeserializer::new(tag, self.fields, self.tags, self.cx))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.tags.len() - self.next)
    }
}

/// Deserializes one struct field from the matching `FL`, if any.
struct FieldDeserializer<'a> {
    directive: TagDirective<'static>,
    field: Option<&'a FieldLabel>,
    siblings: &'a [FieldLabel],
    tags: &'static [&'static str],
    cx: &'a Context,
    /// Reached through `Option`, so a failure makes the field `None`.
    optional: bool,
}

impl<'a> FieldDeserializer<'a> {
    fn new(
        tag: &'static str,
        siblings: &'a [FieldLabel],
        tags: &'static [&'static str],
        cx: &'a Context,
    ) -> Self {
        let directive = TagDirective::parse(tag);
        let field = find_field(siblings, directive.label).or_else(|| {
            directive
                .rename_on_set
                .and_then(|alt| find_field(siblings, alt))
        });
        Self {
            directive,
            field,
            siblings,
            tags,
            cx,
            optional: false,
        }
    }

    fn text(&self) -> &'a str {
        self.field.map_or("", |f| f.value.as_str())
    }

    fn groups(&self) -> &'a [InternalGroup] {
        self.field.map_or(&[][..], |f| f.groups.as_slice())
    }

    fn label(&self) -> &str {
        self.field.map_or(self.directive.label, |f| f.label.as_str())
    }

    fn fail(&self, message: impl fmt::Display) {
        let failure = self.cx.failure(self.label(), self.text(), message);
        match self.field {
            Some(field) if self.optional => {
                self.cx.newly_unset.borrow_mut().push((field as *const FieldLabel, failure));
            }
            _ => self.cx.record(failure),
        }
    }

    /// Parses the text, or falls back to the zero value.
    fn parse<T>(&self) -> T
    where
        T: FromStr + Default,
        T::Err: fmt::Display,
    {
        let text = self.text();
        if text.is_empty() {
            return T::default();
        }
        match text.parse() {
            Ok(value) => value,
            Err(e) => {
                self.fail(e);
                T::default()
            }
        }
    }

    /// Fields of the enclosing record that no declared field claims.
    fn unclaimed(&self) -> Vec<(&'a str, &'a str)> {
        let claimed: Vec<&str> = self
            .tags
            .iter()
            .flat_map(|tag| {
                let d = TagDirective::parse(tag);
                std::iter::once(d.label).chain(d.rename_on_set)
            })
            .collect();

        self.siblings
            .iter()
            .filter(|f| !f.is_group() && !claimed.contains(&f.label.as_str()))
            .map(|f| (f.label.as_str(), f.value.as_str()))
            .collect()
    }

    /// Text in a field typed as groups cannot be kept; the groups are empty.
    fn check_groups(&self) {
        if self.groups().is_empty() && !self.text().is_empty() {
            self.fail("expected nested groups, found text");
        }
    }

    fn first_group(&self) -> FieldsDeserializer<'a> {
        self.check_groups();
        let fields = self.groups().first().map_or(&[][..], |g| g.fields.as_slice());
        FieldsDeserializer::new(fields, self.cx)
    }
}

macro_rules! deserialize_parsed {
    ($($method:ident => $visit:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value>
            where
                V: Visitor<'de>,
            {
                visitor.$visit(self.parse())
            }
        )*
    };
}

impl<'de, 'a> de::Deserializer<'de> for FieldDeserializer<'a> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.groups().is_empty() {
            visitor.visit_str(self.text())
        } else {
            self.deserialize_seq(visitor)
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let value = match self.text() {
            "" => false,
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                self.fail(format!("expected boolean, got '{}'", other));
                false
            }
        };
        visitor.visit_bool(value)
    }

    deserialize_parsed! {
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_i128 => visit_i128,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64,
        deserialize_u128 => visit_u128,
        deserialize_f32 => visit_f32,
        deserialize_f64 => visit_f64,
    }

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let mut chars = self.text().chars();
        let value = match (chars.next(), chars.next()) {
            (None, _) => '\0',
            (Some(c), None) => c,
            _ => {
                self.fail("expected single character");
                '\0'
            }
        };
        visitor.visit_char(value)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_str(self.text())
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_bytes(self.text().as_bytes())
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.text().is_empty() && self.groups().is_empty() {
            return visitor.visit_none();
        }
        if self.field.is_some_and(|field| self.cx.replay_unset(field)) {
            return visitor.visit_none();
        }
        visitor.visit_some(FieldDeserializer {
            optional: true,
            ..self
        })
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        if name == EXTRA_FIELDS {
            let pairs = self.unclaimed();
            return visitor.visit_newtype_struct(MapDeserializer::<_, Error>::new(pairs.into_iter()));
        }

        if let Some(layout) = Layout::from_marker(name) {
            let text = self.text();
            if text.is_empty() {
                return visitor.visit_none();
            }
            if let Err(e) = layout.validate(text) {
                self.fail(e);
                return visitor.visit_none();
            }
        }

        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.check_groups();

        let mut groups: Vec<&InternalGroup> = self.groups().iter().collect();
        groups.sort_by_key(|g| g.number);
        visitor.visit_seq(GroupAccess {
            groups: groups.into_iter(),
            cx: self.cx,
        })
    }

    fn deserialize_tuple<V>(self, _len: usize, _visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported("tuple"))
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        Err(Error::unsupported(format!("tuple struct {}", name)))
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.first_group().deserialize_map(visitor)
    }

    /// A record-typed field reads the first group instance.
    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.first_group().deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        let text = self.text();
        if !variants.contains(&text) {
            self.fail(format!("{} has no variant '{}', expected one of {:?}", name, text, variants));
            self.cx.rejected.set(true);
        }
        let variant: StrDeserializer<'_, Error> = text.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }
}

/// Yields the group instances of one field.
struct GroupAccess<'a> {
    groups: std::vec::IntoIter<&'a InternalGroup>,
    cx: &'a Context,
}

impl<'de, 'a> SeqAccess<'de> for GroupAccess<'a> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        self.groups
            .next()
            .map(|group| seed.deserialize(FieldsDeserializer::new(&group.fields, self.cx)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.groups.len())
    }
}
