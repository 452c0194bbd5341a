//! Query-string encoder for request options.
//!
//! An options record is encoded field by field in declaration order, with
//! the same tag directives as the XML encoder:
//!
//! * `required` fails the whole call while the value is zero;
//! * `default>X` sends `X` for a zero value;
//! * a bare segment renames the parameter when the value is set;
//! * `noencode` parameters skip form encoding and follow the others, with
//!   `=` written as `%3D` and spaces left as they are.
//!
//! Records and sequences of records are sent as one parameter holding their
//! XML rendering. The protocol constants come last.
//!
//! ```rust
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct GetRecords {
//!     #[serde(rename = "fromIndex,default>1")]
//!     from_index: u32,
//!     #[serde(rename = "toIndex,default>20")]
//!     to_index: u32,
//!     #[serde(rename = "criteria,noencode")]
//!     criteria: String,
//! }
//!
//! let options = GetRecords {
//!     from_index: 0,
//!     to_index: 0,
//!     criteria: "(Last Name:Doe)".to_string(),
//! };
//! assert_eq!(
//!     rowxml::to_query_string(&options).unwrap(),
//!     "fromIndex=1&toIndex=20&criteria=(Last Name:Doe)&version=2&newFormat=1"
//! );
//! ```

use crate::error::{Error, Result};
use crate::ser::{xml_data_from, Encoded, ValueSerializer};
use crate::tag::TagDirective;
use serde::Serialize;
use ::url::form_urlencoded;

/// Whether the server should send fields that hold no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullValues {
    /// Leave empty fields out of responses (`newFormat=1`).
    #[default]
    Exclude,
    /// Include empty fields in responses (`newFormat=2`).
    Include,
}

impl NullValues {
    fn flag(self) -> &'static str {
        match self {
            NullValues::Exclude => "1",
            NullValues::Include => "2",
        }
    }
}

/// Protocol constants appended to every query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlConfig {
    /// API version, sent as `version`.
    pub version: String,
    /// Sent as `newFormat`.
    pub null_values: NullValues,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            version: "2".to_string(),
            null_values: NullValues::default(),
        }
    }
}

/// Encodes an options record with the default [`UrlConfig`].
pub fn to_query_string<T>(options: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    to_query_string_with_config(options, &UrlConfig::default())
}

/// Encodes an options record.
///
/// Nothing is returned when a `required` field is unset.
pub fn to_query_string_with_config<T>(options: &T, config: &UrlConfig) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let record = match options.serialize(ValueSerializer)? {
        Encoded::Record(record) => record,
        other => {
            return Err(Error::unsupported(format!(
                "query options must be a record, found {}",
                other.describe()
            )))
        }
    };

    let mut params = form_urlencoded::Serializer::new(String::new());
    let mut raw = Vec::new();

    for (tag, value) in record.entries {
        if let Encoded::Extra(pairs) = value {
            for (name, text) in &pairs {
                params.append_pair(name, text);
            }
            continue;
        }

        let directive = TagDirective::parse(tag);
        let zero = value.is_zero();
        let resolved = directive.resolve(zero)?;
        let text = match resolved.default {
            Some(default) => default.to_string(),
            None if zero => continue,
            None => param_text(tag, value)?,
        };

        if directive.no_encode {
            raw.push((resolved.label, text));
        } else {
            params.append_pair(resolved.label, &text);
        }
    }

    let mut query = params.finish();
    for (name, text) in raw {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(name);
        query.push('=');
        query.push_str(&text.replace('=', "%3D"));
    }

    Ok(form_urlencoded::Serializer::for_suffix(query, 0)
        .append_pair("version", &config.version)
        .append_pair("newFormat", config.null_values.flag())
        .finish())
}

fn param_text(tag: &str, value: Encoded) -> Result<String> {
    match value {
        Encoded::Scalar { text, .. } => Ok(text),
        payload @ (Encoded::Record(_) | Encoded::Seq(_)) => {
            Ok(xml_data_from(payload, None)?.to_xml())
        }
        other => Err(Error::unsupported(format!(
            "parameter \"{}\" holds {}",
            tag,
            other.describe()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::ExtraFields;
    use serde::Serialize;

    #[derive(Serialize, Default)]
    struct SearchOptions {
        #[serde(rename = "selectColumns,required")]
        select_columns: String,
        #[serde(rename = "criteria,noencode")]
        criteria: String,
        #[serde(rename = "fromIndex,default>1")]
        from_index: u32,
        #[serde(rename = "toIndex,default>20")]
        to_index: u32,
        #[serde(rename = "sortColumnString")]
        sort_column: String,
    }

    #[derive(Serialize)]
    #[serde(rename = "Leads")]
    struct Lead {
        #[serde(rename = "Company")]
        company: String,
        #[serde(rename = "Last Name")]
        last_name: String,
    }

    #[derive(Serialize)]
    struct InsertOptions {
        #[serde(rename = "xmlData,required")]
        xml_data: Vec<Lead>,
        #[serde(rename = "id,wfTrigger")]
        trigger: String,
        #[serde(rename = "duplicateCheck")]
        duplicate_check: Option<u8>,
    }

    #[test]
    fn test_full_query_ordering() {
        let options = SearchOptions {
            select_columns: "Leads(First Name,Company)".to_string(),
            criteria: "(Email=a@b.c)".to_string(),
            ..SearchOptions::default()
        };
        assert_eq!(
            to_query_string(&options).unwrap(),
            concat!(
                "selectColumns=Leads%28First+Name%2CCompany%29",
                "&fromIndex=1&toIndex=20",
                "&criteria=(Email%3Da@b.c)",
                "&version=2&newFormat=1"
            )
        );
    }

    #[test]
    fn test_required_zero_fails_fast() {
        let err = to_query_string(&SearchOptions::default()).unwrap_err();
        match err.kind() {
            ErrorKind::MissingRequiredField { label, tag } => {
                assert_eq!(label, "selectColumns");
                assert_eq!(tag, "selectColumns,required");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_default_only_replaces_zero() {
        let options = SearchOptions {
            select_columns: "All".to_string(),
            from_index: 21,
            to_index: 40,
            ..SearchOptions::default()
        };
        assert_eq!(
            to_query_string(&options).unwrap(),
            "selectColumns=All&fromIndex=21&toIndex=40&version=2&newFormat=1"
        );
    }

    #[test]
    fn test_record_payload_and_rename() {
        let leads = vec![Lead {
            company: "Acme & Co".to_string(),
            last_name: "Doe".to_string(),
        }];
        let expected_xml = crate::to_string(&leads).unwrap();
        let options = InsertOptions {
            xml_data: leads,
            trigger: "true".to_string(),
            duplicate_check: Some(2),
        };

        let query = to_query_string(&options).unwrap();
        let params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            params,
            vec![
                ("xmlData".to_string(), expected_xml),
                ("wfTrigger".to_string(), "true".to_string()),
                ("duplicateCheck".to_string(), "2".to_string()),
                ("version".to_string(), "2".to_string()),
                ("newFormat".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_payload_is_required() {
        let options = InsertOptions {
            xml_data: Vec::new(),
            trigger: String::new(),
            duplicate_check: None,
        };
        let err = to_query_string(&options).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingRequiredField { .. }));
    }

    #[test]
    fn test_include_null_values() {
        #[derive(Serialize)]
        struct Empty {}

        let config = UrlConfig {
            version: "4".to_string(),
            null_values: NullValues::Include,
        };
        assert_eq!(
            to_query_string_with_config(&Empty {}, &config).unwrap(),
            "version=4&newFormat=2"
        );
    }

    #[test]
    fn test_extra_fields_are_parameters() {
        #[derive(Serialize)]
        struct Options {
            #[serde(rename = "id")]
            id: String,
            extra: ExtraFields,
        }

        let mut extra = ExtraFields::default();
        extra.insert("scope", "crmapi");
        let query = to_query_string(&Options { id: "7".to_string(), extra }).unwrap();
        assert_eq!(query, "id=7&scope=crmapi&version=2&newFormat=1");
    }

    #[test]
    fn test_non_record_is_unsupported() {
        assert!(matches!(
            to_query_string(&42).unwrap_err().kind(),
            ErrorKind::Unsupported(_)
        ));
    }
}
