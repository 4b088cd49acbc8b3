//! Low-level protobuf wire format primitives.
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire kind
//! - The field data (format depends on wire kind)
//!
//! Wire kinds:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: FIXED64 (fixed64, sfixed64, double)
//! - 2: LENGTH_DELIMITED (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: START_GROUP / END_GROUP (deprecated, only skipped)
//! - 5: FIXED32 (fixed32, sfixed32, float)

use super::WireKind;
use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;
use bytes::BufMut;
use std::ops::Range;

/// Maximum number of bytes in a varint encoding a 64-bit value
pub const MAX_VARINT_LEN: usize = 10;

/// Nesting limit for unknown groups skipped without a schema
const MAX_GROUP_DEPTH: usize = 64;

/// Encode a varint, 7 bits per byte, least significant group first.
pub fn encode_varint(mut value: u64, buf: &mut impl BufMut) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`.
pub fn encoded_len_varint(value: u64) -> usize {
    // 1 byte per started group of 7 significant bits, minimum 1
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::varint_decode(i));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// Map a signed 32-bit value onto an unsigned one so small magnitudes stay short.
pub fn encode_zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Inverse of [`encode_zigzag32`].
pub fn decode_zigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Map a signed 64-bit value onto an unsigned one so small magnitudes stay short.
pub fn encode_zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`encode_zigzag64`].
pub fn decode_zigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Build a field tag from a field number and wire kind.
pub fn make_tag(number: u32, wire_kind: WireKind) -> u64 {
    ((number as u64) << 3) | wire_kind as u64
}

/// Write a field tag.
pub fn encode_tag(number: u32, wire_kind: WireKind, buf: &mut impl BufMut) {
    encode_varint(make_tag(number, wire_kind), buf);
}

/// Decode a field tag, returning the field number, wire kind and tag length.
pub fn decode_tag(data: &[u8]) -> Result<(u32, WireKind, usize)> {
    let (tag, tag_len) = decode_varint(data)?;
    let wire_kind = WireKind::try_from((tag & 0x07) as u8)?;
    let number = tag >> 3;

    if number == 0 || number > MAX_FIELD_NUMBER as u64 {
        return Err(Error::InvalidFieldNumber {
            number: number.min(u32::MAX as u64) as u32,
            max: MAX_FIELD_NUMBER,
        });
    }

    Ok((number as u32, wire_kind, tag_len))
}

/// A single field located in a buffer without interpreting its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Field number from the tag
    pub number: u32,
    /// Wire kind from the tag
    pub wire_kind: WireKind,
    /// Value bytes: the varint or fixed bytes, the payload of a length-delimited
    /// field (without its length prefix), or the body of a group (without its end tag)
    pub value: Range<usize>,
    /// Total bytes consumed, including tag, length prefix and group end tag
    pub len: usize,
}

/// Consume a single protobuf field from the data.
///
/// Works without a schema, so it is the generic skip path for unknown fields.
pub fn consume_field(data: &[u8]) -> Result<RawField> {
    consume_field_at_depth(data, 0)
}

fn consume_field_at_depth(data: &[u8], depth: usize) -> Result<RawField> {
    if data.is_empty() {
        return Err(Error::invalid_wire_format(0, "empty data"));
    }

    let (number, wire_kind, tag_len) = decode_tag(data)?;
    let remaining = &data[tag_len..];

    let (value, len) = match wire_kind {
        WireKind::Varint => {
            let (_, varint_len) = decode_varint(remaining).map_err(|_| {
                Error::invalid_wire_format(tag_len, "failed to decode varint value")
            })?;
            (tag_len..tag_len + varint_len, tag_len + varint_len)
        }
        WireKind::Fixed64 => {
            if remaining.len() < 8 {
                return Err(Error::invalid_wire_format(
                    tag_len,
                    "not enough bytes for FIXED64",
                ));
            }
            (tag_len..tag_len + 8, tag_len + 8)
        }
        WireKind::Fixed32 => {
            if remaining.len() < 4 {
                return Err(Error::invalid_wire_format(
                    tag_len,
                    "not enough bytes for FIXED32",
                ));
            }
            (tag_len..tag_len + 4, tag_len + 4)
        }
        WireKind::LengthDelimited => {
            let (length, length_varint_len) = decode_varint(remaining).map_err(|_| {
                Error::invalid_wire_format(tag_len, "failed to decode length prefix")
            })?;

            let start = tag_len + length_varint_len;
            let available = (data.len() - start) as u64;
            if length > available {
                return Err(Error::invalid_wire_format(
                    tag_len,
                    format!(
                        "not enough bytes for LENGTH_DELIMITED field (need {}, have {})",
                        length, available
                    ),
                ));
            }
            let end = start + length as usize;
            (start..end, end)
        }
        WireKind::StartGroup => {
            if depth >= MAX_GROUP_DEPTH {
                return Err(Error::invalid_wire_format(tag_len, "groups nested too deeply"));
            }
            let mut position = tag_len;
            loop {
                if position >= data.len() {
                    return Err(Error::invalid_wire_format(position, "unterminated group"));
                }
                let (inner_number, inner_kind, inner_tag_len) = decode_tag(&data[position..])?;
                if inner_kind == WireKind::EndGroup {
                    if inner_number != number {
                        return Err(Error::invalid_wire_format(
                            position,
                            format!("group {} closed by end tag {}", number, inner_number),
                        ));
                    }
                    break (tag_len..position, position + inner_tag_len);
                }
                let inner = consume_field_at_depth(&data[position..], depth + 1)
                    .map_err(|e| shift_offset(e, position))?;
                position += inner.len;
            }
        }
        WireKind::EndGroup => {
            return Err(Error::invalid_wire_format(0, "unexpected END_GROUP tag"));
        }
    };

    Ok(RawField {
        number,
        wire_kind,
        value,
        len,
    })
}

/// Walk all fields of a message body without a schema.
pub fn consume_fields(data: &[u8]) -> Result<Vec<RawField>> {
    let mut fields = Vec::new();
    let mut position = 0;

    while position < data.len() {
        let mut field =
            consume_field(&data[position..]).map_err(|e| shift_offset(e, position))?;
        field.value = field.value.start + position..field.value.end + position;
        position += field.len;
        fields.push(field);
    }

    Ok(fields)
}

/// Rebase the offset of a wire error onto an enclosing buffer.
pub(crate) fn shift_offset(err: Error, base: usize) -> Error {
    match err {
        Error::InvalidWireFormat { offset, details } => Error::InvalidWireFormat {
            offset: offset + base,
            details,
        },
        Error::VarintDecode { offset } => Error::VarintDecode {
            offset: offset + base,
        },
        other => other,
    }
}
