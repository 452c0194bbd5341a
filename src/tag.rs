//! Field tag directives.
//!
//! A record field's serde name doubles as its tag: a comma separated list
//! whose first segment is the external label and whose remaining segments
//! are modifiers.
//!
//! | tag | meaning |
//! |---|---|
//! | `Job Description` | plain label |
//! | `Product Details>product` | nested group field, groups named `product` |
//! | `xmlData,required` | encoding fails while the value is zero |
//! | `fromIndex,default>1` | zero values are replaced by `1` |
//! | `criteria,noencode` | URL value is not form-encoded |
//! | `id,wfTrigger` | encoded as `wfTrigger` when the value is set |

use crate::error::{Error, Result};

/// One modifier segment of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier<'a> {
    /// `required`
    Required,
    /// `default>VALUE`
    Default(&'a str),
    /// `noencode`
    NoEncode,
    /// Any other bare segment: the label used when the value is non-zero.
    Rename(&'a str),
}

impl<'a> Modifier<'a> {
    /// Classifies a single tag segment.
    pub fn parse(segment: &'a str) -> Self {
        match segment {
            "required" => Modifier::Required,
            "noencode" => Modifier::NoEncode,
            _ => match segment.strip_prefix("default>") {
                Some(value) => Modifier::Default(value),
                None => Modifier::Rename(segment),
            },
        }
    }
}

/// The parsed form of a field tag.
///
/// Borrows from the tag string, so parsing never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagDirective<'a> {
    /// The complete tag string.
    pub tag: &'a str,
    /// External label.
    pub label: &'a str,
    /// Element name of the nested group for `Label>group` tags.
    pub group: Option<&'a str>,
    /// Zero values are rejected.
    pub required: bool,
    /// Text substituted for zero values.
    pub default: Option<&'a str>,
    /// Skip form-encoding for this URL parameter.
    pub no_encode: bool,
    /// Label used instead of `label` when the value is non-zero.
    pub rename_on_set: Option<&'a str>,
}

impl<'a> TagDirective<'a> {
    /// Parses a tag string. Never fails; unknown segments become renames.
    pub fn parse(tag: &'a str) -> Self {
        let mut segments = tag.split(',');
        let head = segments.next().unwrap_or_default();
        let (label, group) = match head.split_once('>') {
            Some((label, group)) => (label, Some(group)),
            None => (head, None),
        };

        let mut directive = TagDirective {
            tag,
            label,
            group,
            ..TagDirective::default()
        };

        for segment in segments.filter(|s| !s.is_empty()) {
            match Modifier::parse(segment) {
                Modifier::Required => directive.required = true,
                Modifier::Default(value) => directive.default = Some(value),
                Modifier::NoEncode => directive.no_encode = true,
                Modifier::Rename(alt) => directive.rename_on_set = Some(alt),
            }
        }

        directive
    }

    /// Picks the external label for a value with the given zero-ness.
    #[inline]
    pub fn label_for(&self, is_zero: bool) -> &'a str {
        match self.rename_on_set {
            Some(alt) if !is_zero => alt,
            _ => self.label,
        }
    }

    /// Applies the directive to a value about to be encoded.
    ///
    /// Returns the label to write and the default text to substitute, if
    /// any. A `required` field holding its zero value is an error.
    pub fn resolve(&self, is_zero: bool) -> Result<Resolved<'a>> {
        if is_zero && self.required {
            return Err(Error::missing_required(self.label, self.tag));
        }

        Ok(Resolved {
            label: self.label_for(is_zero),
            default: if is_zero { self.default } else { None },
        })
    }
}

/// Outcome of [`TagDirective::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    /// Label to encode under.
    pub label: &'a str,
    /// Replacement text for a zero value.
    pub default: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_plain_label_keeps_spaces() {
        let d = TagDirective::parse("Job Description");
        assert_eq!(d.label, "Job Description");
        assert_eq!(d.group, None);
        assert!(!d.required && !d.no_encode);
        assert_eq!(d.default, None);
        assert_eq!(d.rename_on_set, None);
    }

    #[test]
    fn test_group_path() {
        let d = TagDirective::parse("Product Details>product");
        assert_eq!(d.label, "Product Details");
        assert_eq!(d.group, Some("product"));
    }

    #[test]
    fn test_modifiers_combine() {
        let d = TagDirective::parse("selectColumns,required,noencode");
        assert_eq!(d.label, "selectColumns");
        assert!(d.required);
        assert!(d.no_encode);
    }

    #[test]
    fn test_default_keeps_everything_after_marker() {
        let d = TagDirective::parse("sortColumnString,default>Created Time>desc");
        assert_eq!(d.default, Some("Created Time>desc"));
    }

    #[test]
    fn test_bare_segment_is_rename() {
        let d = TagDirective::parse("id,wfTrigger");
        assert_eq!(d.rename_on_set, Some("wfTrigger"));
        assert_eq!(d.label_for(true), "id");
        assert_eq!(d.label_for(false), "wfTrigger");
    }

    #[test]
    fn test_empty_segments_ignored() {
        let d = TagDirective::parse("Amount,,required");
        assert!(d.required);
        assert_eq!(d.rename_on_set, None);
    }

    #[test]
    fn test_modifier_classification() {
        assert_eq!(Modifier::parse("required"), Modifier::Required);
        assert_eq!(Modifier::parse("noencode"), Modifier::NoEncode);
        assert_eq!(Modifier::parse("default>20"), Modifier::Default("20"));
        assert_eq!(Modifier::parse("newName"), Modifier::Rename("newName"));
    }

    #[test]
    fn test_resolve_required_zero_fails() {
        let d = TagDirective::parse("xmlData,required");
        let err = d.resolve(true).unwrap_err();
        match err.kind() {
            ErrorKind::MissingRequiredField { label, tag } => {
                assert_eq!(label, "xmlData");
                assert_eq!(tag, "xmlData,required");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(d.resolve(false).is_ok());
    }

    #[test]
    fn test_resolve_default_only_for_zero() {
        let d = TagDirective::parse("toIndex,default>20");
        assert_eq!(d.resolve(true).unwrap().default, Some("20"));
        assert_eq!(d.resolve(false).unwrap().default, None);
    }
}
