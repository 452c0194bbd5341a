//! XML escape and unescape helpers for field values and attribute text.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// Escapes XML special characters in a string.
///
/// Returns the input unchanged when nothing needs escaping.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !needs_escape(s.as_bytes()) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + s.len() / 8);
    escape_to(s, &mut result);
    Cow::Owned(result)
}

#[inline]
fn needs_escape(bytes: &[u8]) -> bool {
    memchr3(b'<', b'>', b'&', bytes).is_some() || memchr::memchr2(b'"', b'\'', bytes).is_some()
}

/// Escapes XML special characters and appends to `out`.
fn escape_to(s: &str, out: &mut String) {
    let mut start = 0;

    for (i, byte) in s.bytes().enumerate() {
        let entity = match byte {
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'&' => "&amp;",
            b'"' => "&quot;",
            b'\'' => "&apos;",
            _ => continue,
        };
        // Only ASCII bytes are replaced, so `i` is always a char boundary.
        out.push_str(&s[start..i]);
        out.push_str(entity);
        start = i + 1;
    }

    out.push_str(&s[start..]);
}

/// Error type for unescape operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnescapeError {
    /// The invalid entity that caused the error.
    pub entity: String,
    /// Byte position in the input where the entity starts.
    pub position: usize,
}

impl std::fmt::Display for UnescapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid XML entity '{}' at position {}", self.entity, self.position)
    }
}

impl std::error::Error for UnescapeError {}

/// Unescapes XML entities in a string.
///
/// Returns the input unchanged when it holds no `&`.
pub fn unescape(s: &str) -> Result<Cow<'_, str>, UnescapeError> {
    if memchr(b'&', s.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(s));
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut consumed = 0;

    while let Some(amp) = memchr(b'&', rest.as_bytes()) {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let position = consumed + amp;

        let len = match memchr(b';', after.as_bytes()) {
            Some(len) if len > 0 => len,
            _ => {
                return Err(UnescapeError {
                    entity: "&".to_string(),
                    position,
                })
            }
        };

        let entity = &after[..len];
        match decode_entity(entity).or_else(|| decode_numeric_entity(entity)) {
            Some(c) => out.push(c),
            None => {
                return Err(UnescapeError {
                    entity: format!("&{};", entity),
                    position,
                })
            }
        }

        let skip = amp + 1 + len + 1;
        consumed += skip;
        rest = &rest[skip..];
    }

    out.push_str(rest);
    Ok(Cow::Owned(out))
}

#[inline]
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decodes `#NNN` and `#xHHH` character references.
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_passthrough_borrows() {
        let escaped = escape("Build a shed");
        assert!(matches!(escaped, Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_mixed() {
        assert_eq!(
            escape("<b class=\"x\">Tom & Jerry's</b>"),
            "&lt;b class=&quot;x&quot;&gt;Tom &amp; Jerry&apos;s&lt;/b&gt;"
        );
    }

    #[test]
    fn test_escape_keeps_multibyte_text() {
        assert_eq!(escape("Zürich & Köln"), "Zürich &amp; Köln");
    }

    #[test]
    fn test_unescape_named_and_numeric() {
        assert_eq!(unescape("&lt;a&gt; &amp; &#65;&#x20AC;").unwrap(), "<a> & A€");
    }

    #[test]
    fn test_unescape_reports_position() {
        let err = unescape("ok &bogus; tail").unwrap_err();
        assert_eq!(err.entity, "&bogus;");
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_unescape_unterminated_entity() {
        assert!(unescape("fish &chips").is_err());
        assert!(unescape("&lt").is_err());
    }

    #[test]
    fn test_escape_to_appends() {
        let mut out = String::from("v=");
        escape_to("a<b", &mut out);
        assert_eq!(out, "v=a&lt;b");
    }
}
