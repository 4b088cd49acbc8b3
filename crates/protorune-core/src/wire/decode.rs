//! Message decoder.

use super::varint::{
    consume_field, decode_tag, decode_varint, decode_zigzag32, decode_zigzag64, shift_offset,
};
use super::{DecodeOptions, WireKind};
use crate::error::{Error, Result};
use crate::message::{DynamicMessage, UnknownField};
use crate::schema::{Cardinality, FieldSpec, Kind, ScalarKind};
use crate::value::{MapKey, Value};
use bytes::Bytes;
use tracing::trace;

/// Reads fields from `data` into `message`, merging with what it holds.
///
/// `depth` is the nesting level of `message` itself.
pub(crate) fn merge_message(
    message: &mut DynamicMessage,
    data: Bytes,
    depth: usize,
    options: &DecodeOptions,
) -> Result<()> {
    if depth > options.recursion_limit {
        return Err(Error::RecursionLimit {
            limit: options.recursion_limit,
        });
    }

    let ty = message.message_type().clone();
    let mut position = 0;

    while position < data.len() {
        let (number, wire_kind, tag_len) =
            decode_tag(&data[position..]).map_err(|e| shift_offset(e, position))?;

        let Some(field) = ty.get_field_by_number(number) else {
            let raw = consume_field(&data[position..]).map_err(|e| shift_offset(e, position))?;
            trace!(
                "Preserving unknown field {} ({}) in {}",
                number,
                wire_kind,
                ty.full_name()
            );
            let value = data.slice(position + raw.value.start..position + raw.value.end);
            message
                .unknown_fields_mut()
                .push(UnknownField::new(number, wire_kind, value));
            position += raw.len;
            continue;
        };

        position += tag_len;
        position += merge_field(message, &field, wire_kind, &data, position, depth, options)?;
    }

    Ok(())
}

/// Decodes one occurrence of a known field whose tag has been read.
///
/// Returns the number of bytes consumed after the tag.
fn merge_field(
    message: &mut DynamicMessage,
    field: &FieldSpec<'_>,
    wire_kind: WireKind,
    data: &Bytes,
    position: usize,
    depth: usize,
    options: &DecodeOptions,
) -> Result<usize> {
    let kind = field.kind();
    let index = field.index();

    match field.cardinality() {
        Cardinality::Repeated
            if kind.is_packable() && wire_kind == WireKind::LengthDelimited =>
        {
            trace!("Reading packed field '{}'", field.name());
            let (payload, consumed) = read_length_delimited(data, position)?;
            let mut items = Vec::new();
            let mut offset = 0;
            while offset < payload.len() {
                let (value, len) =
                    read_value(field, &kind, kind.wire_kind(), &payload, offset, depth, options)
                        .map_err(|e| shift_offset(e, position))?;
                items.push(value);
                offset += len;
            }
            if let Value::List(list) = message.slot_mut(index) {
                list.extend(items);
            }
            Ok(consumed)
        }
        Cardinality::Repeated => {
            check_wire_kind(field, &kind, wire_kind)?;
            let (value, consumed) =
                read_value(field, &kind, wire_kind, data, position, depth, options)?;
            if let Value::List(list) = message.slot_mut(index) {
                list.push(value);
            }
            Ok(consumed)
        }
        Cardinality::Map => {
            if wire_kind != WireKind::LengthDelimited {
                return Err(mismatch(field, WireKind::LengthDelimited, wire_kind));
            }
            let (entry, consumed) = read_length_delimited(data, position)?;
            let (key, value) = read_map_entry(field, &kind, &entry, depth, options)
                .map_err(|e| shift_offset(e, position))?;
            if let Value::Map(map) = message.slot_mut(index) {
                map.insert(key, value);
            }
            Ok(consumed)
        }
        Cardinality::Singular | Cardinality::Optional => {
            check_wire_kind(field, &kind, wire_kind)?;
            if let Kind::Message(_) = kind {
                let (payload, consumed) = read_length_delimited(data, position)?;
                if let Value::Message(inner) = message.slot_mut(index) {
                    merge_message(inner, payload, depth + 1, options)
                        .map_err(|e| shift_offset(e, position))?;
                }
                return Ok(consumed);
            }
            let (value, consumed) =
                read_value(field, &kind, wire_kind, data, position, depth, options)?;
            message.store(index, value);
            Ok(consumed)
        }
    }
}

fn mismatch(field: &FieldSpec<'_>, expected: WireKind, actual: WireKind) -> Error {
    Error::WireKindMismatch {
        field: field.name().to_string(),
        expected: expected as u8,
        actual: actual as u8,
    }
}

fn check_wire_kind(field: &FieldSpec<'_>, kind: &Kind, actual: WireKind) -> Result<()> {
    let expected = kind.wire_kind();
    if expected == actual {
        Ok(())
    } else {
        Err(mismatch(field, expected, actual))
    }
}

fn read_length_delimited(data: &Bytes, position: usize) -> Result<(Bytes, usize)> {
    let (length, prefix_len) =
        decode_varint(&data[position..]).map_err(|e| shift_offset(e, position))?;
    let start = position + prefix_len;
    let available = (data.len() - start) as u64;
    if length > available {
        return Err(Error::invalid_wire_format(
            position,
            format!(
                "length prefix {} exceeds remaining {} bytes",
                length, available
            ),
        ));
    }
    let end = start + length as usize;
    Ok((data.slice(start..end), end - position))
}

fn read_fixed<const N: usize>(data: &[u8], position: usize) -> Result<[u8; N]> {
    data.get(position..position + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            Error::invalid_wire_format(position, format!("not enough bytes for {}-byte value", N))
        })
}

/// Reads a single element of `kind` encoded with `wire_kind`.
fn read_value(
    field: &FieldSpec<'_>,
    kind: &Kind,
    wire_kind: WireKind,
    data: &Bytes,
    position: usize,
    depth: usize,
    options: &DecodeOptions,
) -> Result<(Value, usize)> {
    match kind {
        Kind::Enum(_) => {
            let (raw, len) =
                decode_varint(&data[position..]).map_err(|e| shift_offset(e, position))?;
            Ok((Value::EnumNumber(raw as i32), len))
        }
        Kind::Message(ty) => {
            let (payload, consumed) = read_length_delimited(data, position)?;
            let mut inner = ty.new_message();
            merge_message(&mut inner, payload, depth + 1, options)
                .map_err(|e| shift_offset(e, position))?;
            Ok((Value::Message(Box::new(inner)), consumed))
        }
        Kind::Scalar(scalar) => read_scalar(field, *scalar, wire_kind, data, position),
    }
}

fn read_scalar(
    field: &FieldSpec<'_>,
    kind: ScalarKind,
    wire_kind: WireKind,
    data: &Bytes,
    position: usize,
) -> Result<(Value, usize)> {
    match wire_kind {
        WireKind::Varint => {
            let (raw, len) =
                decode_varint(&data[position..]).map_err(|e| shift_offset(e, position))?;
            let value = match kind {
                ScalarKind::Int32 => Value::I32(raw as i32),
                ScalarKind::Int64 => Value::I64(raw as i64),
                ScalarKind::Uint32 => Value::U32(raw as u32),
                ScalarKind::Uint64 => Value::U64(raw),
                ScalarKind::Sint32 => Value::I32(decode_zigzag32(raw as u32)),
                ScalarKind::Sint64 => Value::I64(decode_zigzag64(raw)),
                ScalarKind::Bool => Value::Bool(raw != 0),
                other => return Err(mismatch(field, other.wire_kind(), wire_kind)),
            };
            Ok((value, len))
        }
        WireKind::Fixed32 => {
            let bytes = read_fixed::<4>(data, position)?;
            let value = match kind {
                ScalarKind::Fixed32 => Value::U32(u32::from_le_bytes(bytes)),
                ScalarKind::Sfixed32 => Value::I32(i32::from_le_bytes(bytes)),
                ScalarKind::Float => Value::F32(f32::from_le_bytes(bytes)),
                other => return Err(mismatch(field, other.wire_kind(), wire_kind)),
            };
            Ok((value, 4))
        }
        WireKind::Fixed64 => {
            let bytes = read_fixed::<8>(data, position)?;
            let value = match kind {
                ScalarKind::Fixed64 => Value::U64(u64::from_le_bytes(bytes)),
                ScalarKind::Sfixed64 => Value::I64(i64::from_le_bytes(bytes)),
                ScalarKind::Double => Value::F64(f64::from_le_bytes(bytes)),
                other => return Err(mismatch(field, other.wire_kind(), wire_kind)),
            };
            Ok((value, 8))
        }
        WireKind::LengthDelimited => {
            let (payload, consumed) = read_length_delimited(data, position)?;
            let value = match kind {
                ScalarKind::String => match String::from_utf8(payload.to_vec()) {
                    Ok(text) => Value::String(text),
                    Err(_) => {
                        return Err(Error::InvalidUtf8 {
                            field: field.name().to_string(),
                        })
                    }
                },
                ScalarKind::Bytes => Value::Bytes(payload),
                other => return Err(mismatch(field, other.wire_kind(), wire_kind)),
            };
            Ok((value, consumed))
        }
        WireKind::StartGroup | WireKind::EndGroup => {
            Err(mismatch(field, kind.wire_kind(), wire_kind))
        }
    }
}

/// Reads a map entry; a missing key or value takes its default.
fn read_map_entry(
    field: &FieldSpec<'_>,
    kind: &Kind,
    entry: &Bytes,
    depth: usize,
    options: &DecodeOptions,
) -> Result<(MapKey, Value)> {
    let key_kind = field.map_key().ok_or_else(|| {
        Error::invalid_schema(field.containing_type().full_name(), "map without key type")
    })?;
    let mut key = None;
    let mut value = None;
    let mut position = 0;

    while position < entry.len() {
        let (number, wire_kind, tag_len) =
            decode_tag(&entry[position..]).map_err(|e| shift_offset(e, position))?;
        match number {
            1 => {
                check_wire_kind(field, &Kind::Scalar(key_kind), wire_kind)?;
                let (raw, len) =
                    read_scalar(field, key_kind, wire_kind, entry, position + tag_len)?;
                key = Some(MapKey::from_value(raw)?);
                position += tag_len + len;
            }
            2 => {
                check_wire_kind(field, kind, wire_kind)?;
                let start = position + tag_len;
                // A repeated value field in one entry merges like any message field
                if let (Kind::Message(_), Some(Value::Message(existing))) =
                    (kind, value.as_mut())
                {
                    let (payload, consumed) = read_length_delimited(entry, start)?;
                    merge_message(existing, payload, depth + 1, options)
                        .map_err(|e| shift_offset(e, start))?;
                    position = start + consumed;
                    continue;
                }
                let (decoded, consumed) =
                    read_value(field, kind, wire_kind, entry, start, depth, options)?;
                value = Some(decoded);
                position = start + consumed;
            }
            _ => {
                let raw = consume_field(&entry[position..]).map_err(|e| shift_offset(e, position))?;
                position += raw.len;
            }
        }
    }

    let key = match key {
        Some(key) => key,
        None => MapKey::default_for(key_kind)?,
    };
    Ok((key, value.unwrap_or_else(|| kind.default_value())))
}
