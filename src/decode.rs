//! Response decoder: XML bytes to [`XmlData`].
//!
//! Decoding runs in two passes. `tree::parse` materialises the document,
//! then this module walks the tree:
//!
//! * `response` and `result` are wrappers and are looked through;
//! * the first `error` or `nodata` element wins over any rows;
//! * the first other element is the module, and its `row` children are
//!   the records;
//! * an `FL` element whose children are elements of one name and one
//!   attribute shape holds a nested group, otherwise it is a scalar.

use crate::error::{Error, Result};
use crate::model::{push_group, ApiError, FieldLabel, InternalGroup, Row, RowAttributes, XmlData};
use crate::tree::{self, Element};

const FIELD: &str = "FL";
const ROW: &str = "row";
const LABEL_ATTR: &str = "val";
const WRAPPERS: [&str; 2] = ["response", "result"];
const ERROR_ELEMENTS: [&str; 2] = ["error", "nodata"];

/// Decodes a response body.
///
/// # Example
///
/// ```
/// let data = rowxml::decode(br#"
///     <response><result><Leads>
///         <row no="1"><FL val="Company">Acme</FL></row>
///     </Leads></result></response>
/// "#).unwrap();
///
/// assert_eq!(data.name, "Leads");
/// assert_eq!(data.rows[0].field("Company").unwrap().value, "Acme");
/// ```
pub fn decode(bytes: &[u8]) -> Result<XmlData> {
    let Some(root) = tree::parse(bytes)? else {
        return Ok(XmlData::default());
    };

    if let Some(error) = find_error(&root) {
        let api = api_error(error);
        log::debug!("server reported error {} in <{}>", api, error.name);
        return Ok(XmlData::from_error(api));
    }

    let mut data = XmlData::default();
    let Some(module) = find_module(&root) else {
        return Ok(data);
    };

    if module.name == ROW {
        decode_row(module, &mut data);
        return Ok(data);
    }

    data.name = module.name.clone();
    for row in module.elements() {
        if row.name == ROW {
            decode_row(row, &mut data);
        } else {
            log::debug!("skipping <{}> inside module <{}>", row.name, module.name);
        }
    }

    Ok(data)
}

/// Decodes a response body held in a string.
pub fn decode_str(s: &str) -> Result<XmlData> {
    decode(s.as_bytes())
}

fn find_error(root: &Element) -> Option<&Element> {
    ERROR_ELEMENTS
        .iter()
        .filter_map(|name| root.find(name).map(|el| (el, position_of(root, el))))
        .min_by_key(|(_, pos)| *pos)
        .map(|(el, _)| el)
}

/// Document-order index of `target` within `root`, for choosing between
/// an `error` and a `nodata` element when both occur.
fn position_of(root: &Element, target: &Element) -> usize {
    fn walk(el: &Element, target: &Element, counter: &mut usize) -> bool {
        if std::ptr::eq(el, target) {
            return true;
        }
        *counter += 1;
        el.elements().any(|child| walk(child, target, counter))
    }

    let mut counter = 0;
    walk(root, target, &mut counter);
    counter
}

fn api_error(el: &Element) -> ApiError {
    let code_text = el.child("code").map(Element::text).unwrap_or_default();
    let code = match code_text.trim().parse() {
        Ok(code) => code,
        Err(_) => {
            log::warn!("unparsable vendor error code {:?}", code_text);
            0
        }
    };

    ApiError {
        code,
        message: el
            .child("message")
            .map(|m| m.text().trim().to_string())
            .unwrap_or_default(),
    }
}

fn find_module(root: &Element) -> Option<&Element> {
    let mut current = root;
    while WRAPPERS.contains(&current.name.as_str()) {
        current = current.elements().next()?;
    }
    Some(current)
}

fn decode_row(el: &Element, data: &mut XmlData) {
    let mut fields = Vec::new();
    decode_fields(el, &mut fields);

    let row = data.push_row(fields);
    row.attributes = RowAttributes {
        id: el.attr("ID").map(str::to_string),
        pl: el.attr("PL").map(str::to_string),
        sl: el.attr("SL").map(str::to_string),
        gt: el.attr("GT").map(str::to_string),
    };
    log::trace!("decoded row {} with {} fields", row.number, row.fields.len());
}

/// Decodes the `FL` children of a row or group instance into `fields`.
fn decode_fields(parent: &Element, fields: &mut Vec<FieldLabel>) {
    for fl in parent.elements() {
        if fl.name != FIELD {
            log::debug!("skipping <{}> inside <{}>", fl.name, parent.name);
            continue;
        }

        let label = fl.attr(LABEL_ATTR).unwrap_or_default().to_string();
        match classify(fl) {
            Content::Scalar => fields.push(FieldLabel::scalar(label, fl.text())),
            Content::Group => {
                for instance in fl.elements() {
                    let mut members = Vec::new();
                    decode_fields(instance, &mut members);
                    let group = InternalGroup::new(instance.name.as_str(), 0, members);
                    push_group(fields, label.clone(), group);
                }
            }
            Content::Unresolved => {
                log::warn!(
                    "could not resolve nested group in field {:?}; decoding it as text",
                    label
                );
                fields.push(FieldLabel::scalar(label, fl.text_content()));
            }
        }
    }
}

enum Content {
    Scalar,
    Group,
    Unresolved,
}

/// A field holds a group when every child element repeats the name and
/// attribute names of the first one.
fn classify(fl: &Element) -> Content {
    let mut children = fl.elements();
    let Some(first) = children.next() else {
        return Content::Scalar;
    };

    let shape = first.attribute_names();
    if children.all(|el| el.name == first.name && el.attribute_names() == shape) {
        Content::Group
    } else {
        Content::Unresolved
    }
}

impl XmlData {
    /// Decodes a response body, see [`decode`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

impl std::str::FromStr for XmlData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_str(s)
    }
}
