//! Date and timestamp layouts used by the wire format.
//!
//! Each submodule is meant for `#[serde(with = "...")]` on an `Option` of the
//! matching chrono type. An unset value is left off the row; text that does
//! not match the layout is reported as a field parse failure and decodes as
//! `None`.
//!
//! ```rust
//! use chrono::NaiveDate;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! #[serde(rename = "Tasks")]
//! struct Task {
//!     #[serde(rename = "Due Date", with = "rowxml::time::date")]
//!     due: Option<NaiveDate>,
//! }
//!
//! let task = Task { due: NaiveDate::from_ymd_opt(2024, 3, 9) };
//! let xml = rowxml::to_string(&task).unwrap();
//! assert!(xml.contains(r#"<FL val="Due Date">2024-03-09</FL>"#));
//!
//! let back = rowxml::from_str::<Task>(&xml).unwrap();
//! assert_eq!(back.records[0].due, task.due);
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, ParseResult};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use std::fmt;
use std::marker::PhantomData;

/// A wire layout for dates and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Date,
    DateTime,
    OffsetDateTime,
}

impl Layout {
    const ALL: [Layout; 3] = [Layout::Date, Layout::DateTime, Layout::OffsetDateTime];

    /// Newtype name that lets the row deserializer recognise the layout.
    pub(crate) const fn marker(self) -> &'static str {
        match self {
            Layout::Date => "$rowxml::Date",
            Layout::DateTime => "$rowxml::DateTime",
            Layout::OffsetDateTime => "$rowxml::OffsetDateTime",
        }
    }

    pub(crate) const fn format(self) -> &'static str {
        match self {
            Layout::Date => "%Y-%m-%d",
            Layout::DateTime => "%Y-%m-%d %H:%M:%S",
            Layout::OffsetDateTime => "%Y-%m-%dT%H:%M:%S%:z",
        }
    }

    pub(crate) fn from_marker(name: &str) -> Option<Layout> {
        Self::ALL.into_iter().find(|layout| layout.marker() == name)
    }

    /// Checks that `text` matches the layout.
    pub(crate) fn validate(self, text: &str) -> ParseResult<()> {
        match self {
            Layout::Date => <NaiveDate as Timestamp>::parse(text, self).map(drop),
            Layout::DateTime => <NaiveDateTime as Timestamp>::parse(text, self).map(drop),
            Layout::OffsetDateTime => {
                <DateTime<FixedOffset> as Timestamp>::parse(text, self).map(drop)
            }
        }
    }
}

trait Timestamp: Sized {
    fn parse(text: &str, layout: Layout) -> ParseResult<Self>;
    fn render(&self, layout: Layout) -> String;
}

impl Timestamp for NaiveDate {
    fn parse(text: &str, layout: Layout) -> ParseResult<Self> {
        NaiveDate::parse_from_str(text, layout.format())
    }

    fn render(&self, layout: Layout) -> String {
        self.format(layout.format()).to_string()
    }
}

impl Timestamp for NaiveDateTime {
    fn parse(text: &str, layout: Layout) -> ParseResult<Self> {
        NaiveDateTime::parse_from_str(text, layout.format())
    }

    fn render(&self, layout: Layout) -> String {
        self.format(layout.format()).to_string()
    }
}

impl Timestamp for DateTime<FixedOffset> {
    fn parse(text: &str, layout: Layout) -> ParseResult<Self> {
        DateTime::parse_from_str(text, layout.format())
    }

    fn render(&self, layout: Layout) -> String {
        self.format(layout.format()).to_string()
    }
}

fn serialize_with<T, S>(value: &Option<T>, layout: Layout, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Timestamp,
    S: Serializer,
{
    match value {
        Some(value) => serializer.serialize_some(&value.render(layout)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_with<'de, T, D>(deserializer: D, layout: Layout) -> Result<Option<T>, D::Error>
where
    T: Timestamp,
    D: Deserializer<'de>,
{
    deserializer.deserialize_newtype_struct(
        layout.marker(),
        LayoutVisitor {
            layout,
            marker: PhantomData,
        },
    )
}

struct LayoutVisitor<T> {
    layout: Layout,
    marker: PhantomData<T>,
}

impl<'de, T: Timestamp> Visitor<'de> for LayoutVisitor<T> {
    type Value = Option<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "a timestamp in the layout {}", self.layout.format())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(self)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_option(self)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v.is_empty() {
            return Ok(None);
        }
        T::parse(v, self.layout).map(Some).map_err(E::custom)
    }
}

macro_rules! layout_module {
    ($(#[$doc:meta])* $module:ident, $ty:ty, $layout:expr) => {
        $(#[$doc])*
        pub mod $module {
            use super::*;

            /// Writes the value in this module's layout.
            pub fn serialize<S: Serializer>(
                value: &Option<$ty>,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serialize_with(value, $layout, serializer)
            }

            /// Reads a value in this module's layout.
            pub fn deserialize<'de, D: Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Option<$ty>, D::Error> {
                deserialize_with(deserializer, $layout)
            }
        }
    };
}

layout_module!(
    /// `Option<NaiveDate>` as `2024-03-09`.
    date,
    NaiveDate,
    Layout::Date
);

layout_module!(
    /// `Option<NaiveDateTime>` as `2024-03-09 14:05:00`.
    date_time,
    NaiveDateTime,
    Layout::DateTime
);

layout_module!(
    /// `Option<DateTime<FixedOffset>>` as `2024-03-09T14:05:00+05:30`.
    offset_date_time,
    DateTime<FixedOffset>,
    Layout::OffsetDateTime
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldLabel;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename = "Events")]
    struct Event {
        #[serde(rename = "Start DateTime", with = "date_time")]
        start: Option<NaiveDateTime>,
        #[serde(rename = "Modified Time", with = "offset_date_time")]
        modified: Option<DateTime<FixedOffset>>,
    }

    #[test]
    fn test_layout_formats() {
        assert_eq!(Layout::Date.format(), "%Y-%m-%d");
        assert_eq!(Layout::DateTime.format(), "%Y-%m-%d %H:%M:%S");
        assert_eq!(Layout::OffsetDateTime.format(), "%Y-%m-%dT%H:%M:%S%:z");
    }

    #[test]
    fn test_marker_lookup() {
        for layout in Layout::ALL {
            assert_eq!(Layout::from_marker(layout.marker()), Some(layout));
        }
        assert_eq!(Layout::from_marker("Start DateTime"), None);
    }

    #[test]
    fn test_validate() {
        assert!(Layout::Date.validate("2024-03-09").is_ok());
        assert!(Layout::Date.validate("09/03/2024").is_err());
        assert!(Layout::OffsetDateTime.validate("2024-03-09T14:05:00+05:30").is_ok());
        assert!(Layout::OffsetDateTime.validate("2024-03-09 14:05:00").is_err());
    }

    #[test]
    fn test_encode_layouts() {
        let event = Event {
            start: NaiveDate::from_ymd_opt(2024, 3, 9).and_then(|d| d.and_hms_opt(14, 5, 0)),
            modified: DateTime::parse_from_rfc3339("2024-03-09T14:05:00+05:30").ok(),
        };
        let row = crate::to_row(&event, 1).unwrap();
        assert_eq!(
            row.fields,
            vec![
                FieldLabel::scalar("Start DateTime", "2024-03-09 14:05:00"),
                FieldLabel::scalar("Modified Time", "2024-03-09T14:05:00+05:30"),
            ]
        );
    }

    #[test]
    fn test_unset_is_omitted() {
        let row = crate::to_row(&Event { start: None, modified: None }, 1).unwrap();
        assert!(row.fields.is_empty());
    }

    #[test]
    fn test_bad_text_is_a_field_failure() {
        let mut row = crate::model::Row::new(1, Vec::new());
        row.push_field("Start DateTime", "yesterday");
        row.push_field("Modified Time", "2024-03-09T14:05:00+00:00");

        let decoded = crate::from_row::<Event>(&row).unwrap();
        assert_eq!(decoded.value.start, None);
        assert!(decoded.value.modified.is_some());
        assert_eq!(decoded.failures.len(), 1);
        assert_eq!(decoded.failures[0].label, "Start DateTime");
        assert_eq!(decoded.failures[0].value, "yesterday");
    }
}
