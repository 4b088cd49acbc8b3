//! Binary wire codec.
//!
//! [`varint`] holds the schema-less primitives (varints, zigzag, tags, field
//! skipping). The encoder and decoder walk a [`MessageType`] to move values
//! between a [`DynamicMessage`] and its wire form.
//!
//! ## Encoding
//!
//! Fields are written in declaration order, followed by preserved unknown
//! fields. Output is deterministic: map entries are written in key order.
//!
//! ## Decoding
//!
//! Singular fields keep the last occurrence, embedded messages merge, and
//! repeated fields append whether the input is packed or not. Unrecognized
//! field numbers are kept verbatim for re-serialization.
//!
//! [`MessageType`]: crate::schema::MessageType
//! [`DynamicMessage`]: crate::message::DynamicMessage

mod decode;
mod encode;
pub mod varint;

pub(crate) use decode::merge_message;
pub(crate) use encode::encode_message;

use crate::error::{Error, Result};
use std::fmt;

/// Default nesting depth accepted by the decoder
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Protobuf wire kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireKind {
    /// Variable-length integer
    Varint = 0,
    /// Little-endian 8 bytes
    Fixed64 = 1,
    /// Length prefix followed by payload
    LengthDelimited = 2,
    /// Start of a group
    StartGroup = 3,
    /// End of a group
    EndGroup = 4,
    /// Little-endian 4 bytes
    Fixed32 = 5,
}

impl TryFrom<u8> for WireKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireKind::Varint),
            1 => Ok(WireKind::Fixed64),
            2 => Ok(WireKind::LengthDelimited),
            3 => Ok(WireKind::StartGroup),
            4 => Ok(WireKind::EndGroup),
            5 => Ok(WireKind::Fixed32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireKind::Varint => "VARINT",
            WireKind::Fixed64 => "FIXED64",
            WireKind::LengthDelimited => "LENGTH_DELIMITED",
            WireKind::StartGroup => "START_GROUP",
            WireKind::EndGroup => "END_GROUP",
            WireKind::Fixed32 => "FIXED32",
        };
        f.write_str(name)
    }
}

/// Options for binary decoding
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Maximum depth of nested messages
    pub recursion_limit: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl DecodeOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum nesting depth
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_kind_from_u8() {
        assert_eq!(WireKind::try_from(2).unwrap(), WireKind::LengthDelimited);
        assert!(WireKind::try_from(6).is_err());
        assert!(WireKind::try_from(7).is_err());
    }

    #[test]
    fn test_decode_options_builder() {
        assert_eq!(DecodeOptions::default().recursion_limit, 100);
        assert_eq!(DecodeOptions::new().recursion_limit(5).recursion_limit, 5);
    }
}
