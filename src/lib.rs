//! # rowxml
//!
//! A codec for the row/field-label XML used by CRM-style web APIs, and for
//! the tag-driven query strings that go with it.
//!
//! Records travel as numbered `row` elements holding labelled `FL` fields.
//! A field may hold text, or a list of nested groups that are themselves
//! rows of fields:
//!
//! ```xml
//! <response><result>
//!   <Quotes>
//!     <row no="1">
//!       <FL val="Subject">Spring order</FL>
//!       <FL val="Product Details"><product no="1"><FL val="Product Name">A</FL></product></FL>
//!     </row>
//!   </Quotes>
//! </result></response>
//! ```
//!
//! ## Layers
//!
//! - [`decode()`] turns XML into the generic [`XmlData`] tree, and
//!   [`XmlData::to_xml`] turns it back.
//! - [`to_xml_data`] / [`from_xml_data`] map serde records onto that tree.
//!   A field's serde name is its tag, see [`tag`].
//! - [`to_query_string`] builds request parameters from an options record.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Product {
//!     #[serde(rename = "Product Name")]
//!     name: String,
//! }
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! #[serde(rename = "Quotes")]
//! struct Quote {
//!     #[serde(rename = "Subject")]
//!     subject: String,
//!     #[serde(rename = "Product Details>product")]
//!     products: Vec<Product>,
//! }
//!
//! let quote = Quote {
//!     subject: "Spring order".to_string(),
//!     products: vec![Product { name: "A".to_string() }],
//! };
//!
//! let xml = rowxml::to_string(&quote).unwrap();
//! let decoded = rowxml::from_str::<Quote>(&xml).unwrap();
//! assert_eq!(decoded.records, vec![quote]);
//! ```
//!
//! ## Server errors
//!
//! ```rust
//! let data = rowxml::decode(
//!     b"<response><error><code>4001</code><message>bad</message></error></response>",
//! )
//! .unwrap();
//! assert_eq!(data.error.as_ref().map(|e| e.code), Some(4001));
//! assert!(data.into_result().is_err());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod de;
pub mod decode;
pub mod error;
mod escape;
pub mod model;
mod reader;
pub mod ser;
pub mod tag;
pub mod time;
mod tree;
pub mod url;
pub mod writer;

// Re-export main types and functions
pub use de::{from_row, from_slice, from_str, from_xml_data, Decoded, FieldParseFailure, Records};
pub use decode::{decode, decode_str};
pub use error::{Error, ErrorKind, Position, Result};
pub use model::{ApiError, ExtraFields, FieldLabel, InternalGroup, Row, RowAttributes, XmlData};
pub use self::url::{to_query_string, to_query_string_with_config, NullValues, UrlConfig};
pub use ser::{
    to_row, to_string, to_string_with_root, to_vec, to_writer, to_xml_data, to_xml_data_with_root,
};
pub use tag::TagDirective;
pub use writer::{IndentConfig, XmlWriter};
