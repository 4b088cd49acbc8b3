//! Error types for the protorune-core library.
//!
//! This module provides error handling using the `thiserror` crate. Every
//! variant belongs to one [`ErrorKind`], which is what harnesses use to decide
//! how a failure is reported (parse error vs. serialize error, and so on).

use thiserror::Error;

/// Result type alias for protorune operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed binary input
    Parse,
    /// A value outside the range of its scalar kind, or of the wrong kind
    Validation,
    /// Malformed or unexpected JSON input
    Json,
    /// A message that has no valid JSON representation
    JsonSerialize,
    /// Inconsistent schema tables
    Schema,
    /// Failure of the underlying reader or writer
    Io,
}

/// Error type for all protorune operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid protobuf wire format
    #[error("invalid protobuf wire format at offset {offset}: {details}")]
    InvalidWireFormat {
        /// Byte offset where the error occurred
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to decode varint
    #[error("failed to decode varint at offset {offset}: buffer too small or invalid encoding")]
    VarintDecode {
        /// Byte offset where the error occurred
        offset: usize,
    },

    /// A known field arrived with a wire kind its declared type cannot use
    #[error("field '{field}' expects wire kind {expected}, found {actual}")]
    WireKindMismatch {
        /// Field name
        field: String,
        /// Wire kind implied by the declared type
        expected: u8,
        /// Wire kind found in the input
        actual: u8,
    },

    /// A string field contained bytes that are not UTF-8
    #[error("field '{field}' contains invalid UTF-8")]
    InvalidUtf8 {
        /// Field name
        field: String,
    },

    /// Nested messages exceeded the configured depth
    #[error("message nesting exceeds recursion limit of {limit}")]
    RecursionLimit {
        /// The configured limit
        limit: usize,
    },

    /// Invalid field number in a schema or on the wire
    #[error("invalid field number {number}: must be between 1 and {max}")]
    InvalidFieldNumber {
        /// The invalid field number
        number: u32,
        /// Maximum valid field number
        max: u32,
    },

    /// A value is out of range or does not fit the field it is assigned to
    #[error("invalid value for '{field}': {details}")]
    Validation {
        /// Field name or path
        field: String,
        /// What was wrong
        details: String,
    },

    /// The named field does not exist on the message type
    #[error("message '{message}' has no field or oneof named '{field}'")]
    NoSuchField {
        /// Full name of the message type
        message: String,
        /// Requested field name
        field: String,
    },

    /// Unparseable or unexpected JSON input
    #[error("invalid JSON at '{path}': {details}")]
    Json {
        /// Path to the offending value, e.g. `child.values[2]`
        path: String,
        /// What was wrong
        details: String,
    },

    /// A message cannot be represented as JSON
    #[error("cannot serialize '{path}' to JSON: {details}")]
    JsonSerialize {
        /// Path to the offending value
        path: String,
        /// What was wrong
        details: String,
    },

    /// Inconsistent schema definition
    #[error("invalid schema for '{type_name}': {details}")]
    InvalidSchema {
        /// Type the problem was found in
        type_name: String,
        /// What was wrong
        details: String,
    },

    /// Failed to parse FileDescriptorSet
    #[error("failed to parse FileDescriptorSet: {0}")]
    DescriptorParse(#[from] prost::DecodeError),

    /// Failed to build file descriptor with prost-reflect
    #[error("failed to build file descriptor: {0}")]
    DescriptorBuild(String),

    /// I/O failure while framing requests
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new wire format error
    pub fn invalid_wire_format(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidWireFormat {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new varint decode error
    pub fn varint_decode(offset: usize) -> Self {
        Self::VarintDecode { offset }
    }

    /// Creates a new validation error
    pub fn validation(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            details: details.into(),
        }
    }

    /// Creates a new missing-field error
    pub fn no_such_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NoSuchField {
            message: message.into(),
            field: field.into(),
        }
    }

    /// Creates a new JSON format error
    pub fn json(path: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Json {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Creates a new JSON serialization error
    pub fn json_serialize(path: impl Into<String>, details: impl Into<String>) -> Self {
        Self::JsonSerialize {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Creates a new schema error
    pub fn invalid_schema(type_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            details: details.into(),
        }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWireFormat { .. }
            | Self::VarintDecode { .. }
            | Self::WireKindMismatch { .. }
            | Self::InvalidUtf8 { .. }
            | Self::RecursionLimit { .. }
            | Self::InvalidFieldNumber { .. } => ErrorKind::Parse,
            Self::Validation { .. } | Self::NoSuchField { .. } => ErrorKind::Validation,
            Self::Json { .. } => ErrorKind::Json,
            Self::JsonSerialize { .. } => ErrorKind::JsonSerialize,
            Self::InvalidSchema { .. } | Self::DescriptorParse(_) | Self::DescriptorBuild(_) => {
                ErrorKind::Schema
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns true if this error came from malformed binary input
    pub fn is_parse_error(&self) -> bool {
        self.kind() == ErrorKind::Parse
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::json("child.values[2]", "expected a number");
        assert!(err.to_string().contains("child.values[2]"));
        assert!(err.to_string().contains("expected a number"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::varint_decode(3).kind(), ErrorKind::Parse);
        assert!(Error::invalid_wire_format(0, "truncated").is_parse_error());
        assert_eq!(Error::validation("x", "overflow").kind(), ErrorKind::Validation);
        assert_eq!(Error::json_serialize("d", "out of range").kind(), ErrorKind::JsonSerialize);
        assert_eq!(Error::descriptor_build("bad").kind(), ErrorKind::Schema);
        assert!(!Error::json("a", "b").is_parse_error());
    }
}
