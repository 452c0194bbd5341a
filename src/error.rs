//! Error types for the row codec.

use crate::model::ApiError;
use std::fmt::{self, Display};
use std::io;

/// Result type alias for rowxml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for decoding responses and encoding records or parameters.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    position: Option<Position>,
}

/// Position information for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
    /// Byte offset from start.
    pub offset: usize,
}

/// The kind of error that occurred.
#[derive(Debug)]
pub enum ErrorKind {
    /// An I/O error occurred while writing output.
    Io(io::Error),
    /// Unexpected end of input.
    UnexpectedEof,
    /// Invalid XML syntax.
    Syntax(String),
    /// Invalid XML name.
    InvalidName(String),
    /// Element opened but never closed.
    UnclosedTag(String),
    /// Mismatched closing tag.
    MismatchedTag {
        /// The expected tag name.
        expected: String,
        /// The actual tag name found.
        found: String,
    },
    /// Invalid escape sequence.
    InvalidEscape(String),
    /// Invalid UTF-8.
    InvalidUtf8,
    /// A `required` field held its zero value at encode time.
    MissingRequiredField {
        /// The external label of the field.
        label: String,
        /// The complete tag string of the field.
        tag: String,
    },
    /// The payload carried an `error` or `nodata` element.
    ServerReported(ApiError),
    /// The value has a shape the wire format cannot carry.
    Unsupported(String),
    /// Custom error message.
    Custom(String),
}

impl Error {
    /// Creates a new error with the given kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, position: None }
    }

    /// Creates a new error with position information.
    #[inline]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the position where the error occurred.
    #[inline]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Returns true when the input could not be parsed as XML.
    pub fn is_malformed_xml(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UnexpectedEof
                | ErrorKind::Syntax(_)
                | ErrorKind::InvalidName(_)
                | ErrorKind::UnclosedTag(_)
                | ErrorKind::MismatchedTag { .. }
                | ErrorKind::InvalidEscape(_)
                | ErrorKind::InvalidUtf8
        )
    }

    /// Returns the vendor error if this error wraps one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.kind {
            ErrorKind::ServerReported(api) => Some(api),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn unexpected_eof() -> Self {
        Self::new(ErrorKind::UnexpectedEof)
    }

    #[inline]
    pub(crate) fn syntax<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Syntax(msg.into()))
    }

    #[inline]
    pub(crate) fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::new(ErrorKind::InvalidName(name.into()))
    }

    #[inline]
    pub(crate) fn unclosed_tag<S: Into<String>>(tag: S) -> Self {
        Self::new(ErrorKind::UnclosedTag(tag.into()))
    }

    #[inline]
    pub(crate) fn mismatched_tag<S: Into<String>>(expected: S, found: S) -> Self {
        Self::new(ErrorKind::MismatchedTag {
            expected: expected.into(),
            found: found.into(),
        })
    }

    #[inline]
    pub(crate) fn invalid_escape<S: Into<String>>(seq: S) -> Self {
        Self::new(ErrorKind::InvalidEscape(seq.into()))
    }

    #[inline]
    pub(crate) fn invalid_utf8() -> Self {
        Self::new(ErrorKind::InvalidUtf8)
    }

    /// Creates a missing required field error.
    pub fn missing_required<S: Into<String>>(label: S, tag: S) -> Self {
        Self::new(ErrorKind::MissingRequiredField {
            label: label.into(),
            tag: tag.into(),
        })
    }

    /// Creates an error carrying a vendor error payload.
    pub fn server(api: ApiError) -> Self {
        Self::new(ErrorKind::ServerReported(api))
    }

    /// Creates an unsupported shape error.
    #[inline]
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Unsupported(msg.into()))
    }

    /// Creates a custom error.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::Custom(msg.into()))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(e) => write!(f, "I/O error: {}", e),
            ErrorKind::UnexpectedEof => write!(f, "malformed XML: unexpected end of input"),
            ErrorKind::Syntax(msg) => write!(f, "malformed XML: {}", msg),
            ErrorKind::InvalidName(name) => write!(f, "malformed XML: invalid name: {}", name),
            ErrorKind::UnclosedTag(tag) => write!(f, "malformed XML: unclosed tag <{}>", tag),
            ErrorKind::MismatchedTag { expected, found } => write!(
                f,
                "malformed XML: mismatched closing tag: expected </{}>, found </{}>",
                expected, found
            ),
            ErrorKind::InvalidEscape(seq) => {
                write!(f, "malformed XML: invalid escape sequence: {}", seq)
            }
            ErrorKind::InvalidUtf8 => write!(f, "malformed XML: invalid UTF-8"),
            ErrorKind::MissingRequiredField { label, tag } => {
                write!(f, "missing required field '{}' (tag \"{}\")", label, tag)
            }
            ErrorKind::ServerReported(api) => write!(f, "server reported error {}", api),
            ErrorKind::Unsupported(msg) => write!(f, "unsupported: {}", msg),
            ErrorKind::Custom(msg) => write!(f, "{}", msg),
        }?;

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {} (offset {})", pos.line, pos.column, pos.offset)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(ErrorKind::Io(e))
    }
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::custom(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Self::custom(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_with_position() {
        let err = Error::syntax("expected '>'")
            .with_position(Position { line: 5, column: 10, offset: 42 });
        assert_eq!(
            err.to_string(),
            "malformed XML: expected '>' at line 5, column 10 (offset 42)"
        );
        assert!(err.is_malformed_xml());
    }

    #[test]
    fn test_missing_required_names_field() {
        let err = Error::missing_required("xmlData", "xmlData,required");
        assert_eq!(
            err.to_string(),
            "missing required field 'xmlData' (tag \"xmlData,required\")"
        );
        assert!(!err.is_malformed_xml());
    }

    #[test]
    fn test_server_error_exposes_payload() {
        let err = Error::server(ApiError {
            code: 4600,
            message: "Unable to process your request".to_string(),
        });
        assert_eq!(err.api_error().map(|api| api.code), Some(4600));
        assert_eq!(
            err.to_string(),
            "server reported error 4600: Unable to process your request"
        );
    }

    #[test]
    fn test_mismatched_tag_is_malformed() {
        let err = Error::mismatched_tag("row", "FL");
        assert!(err.is_malformed_xml());
        assert!(err.to_string().contains("expected </row>, found </FL>"));
    }

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        let err = Error::from(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
