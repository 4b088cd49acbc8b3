//! Message encoder.

use super::varint::{encode_tag, encode_varint, encode_zigzag32, encode_zigzag64};
use super::WireKind;
use crate::message::DynamicMessage;
use crate::schema::{Cardinality, FieldSpec, Kind, ScalarKind};
use crate::value::Value;
use bytes::BufMut;

/// Writes every field in declaration order, then the unknown fields.
pub(crate) fn encode_message(message: &DynamicMessage, buf: &mut impl BufMut) {
    let ty = message.message_type();
    for field in ty.fields() {
        encode_field(message, &field, buf);
    }
    message.unknown_fields().encode(buf);
}

fn encode_field(message: &DynamicMessage, field: &FieldSpec<'_>, buf: &mut impl BufMut) {
    let kind = field.kind();
    let number = field.number();

    match field.cardinality() {
        Cardinality::Repeated => {
            let Some(Value::List(items)) = message.slot(field.index()) else {
                return;
            };
            if items.is_empty() {
                return;
            }
            if field.is_packed() {
                let mut payload = Vec::new();
                for item in items {
                    encode_raw(&kind, item, &mut payload);
                }
                encode_tag(number, WireKind::LengthDelimited, buf);
                encode_varint(payload.len() as u64, buf);
                buf.put_slice(&payload);
            } else {
                for item in items {
                    encode_tag(number, kind.wire_kind(), buf);
                    encode_raw(&kind, item, buf);
                }
            }
        }
        Cardinality::Map => {
            let (Some(Value::Map(entries)), Some(key_kind)) =
                (message.slot(field.index()), field.map_key())
            else {
                return;
            };
            let key_kind = Kind::Scalar(key_kind);
            for (key, value) in entries {
                let mut entry = Vec::new();
                encode_tag(1, key_kind.wire_kind(), &mut entry);
                encode_raw(&key_kind, &key.to_value(), &mut entry);
                encode_tag(2, kind.wire_kind(), &mut entry);
                encode_raw(&kind, value, &mut entry);

                encode_tag(number, WireKind::LengthDelimited, buf);
                encode_varint(entry.len() as u64, buf);
                buf.put_slice(&entry);
            }
        }
        Cardinality::Singular | Cardinality::Optional => {
            let active_group_member = field.oneof_index().is_some();
            let value = if active_group_member {
                // Written even at the default value while active
                if !message.has_index(field.index()) {
                    return;
                }
                message.get_by_index(field.index())
            } else {
                match message.slot(field.index()) {
                    Some(value) if field.is_message() || !value.is_default() => {
                        std::borrow::Cow::Borrowed(value)
                    }
                    _ => return,
                }
            };
            encode_tag(number, kind.wire_kind(), buf);
            encode_raw(&kind, &value, buf);
        }
    }
}

/// Writes a single value without its tag; length-delimited kinds carry
/// their length prefix.
fn encode_raw(kind: &Kind, value: &Value, buf: &mut impl BufMut) {
    match (kind, value) {
        (Kind::Scalar(scalar), value) => encode_scalar(*scalar, value, buf),
        (Kind::Enum(_), Value::EnumNumber(number)) => encode_varint(*number as i64 as u64, buf),
        (Kind::Message(_), Value::Message(inner)) => {
            let payload = inner.encode_to_vec();
            encode_varint(payload.len() as u64, buf);
            buf.put_slice(&payload);
        }
        // Values are type-checked when assigned
        _ => {}
    }
}

fn encode_scalar(kind: ScalarKind, value: &Value, buf: &mut impl BufMut) {
    match (kind, value) {
        (ScalarKind::Int32, Value::I32(v)) => encode_varint(*v as i64 as u64, buf),
        (ScalarKind::Int64, Value::I64(v)) => encode_varint(*v as u64, buf),
        (ScalarKind::Uint32, Value::U32(v)) => encode_varint(*v as u64, buf),
        (ScalarKind::Uint64, Value::U64(v)) => encode_varint(*v, buf),
        (ScalarKind::Sint32, Value::I32(v)) => encode_varint(encode_zigzag32(*v) as u64, buf),
        (ScalarKind::Sint64, Value::I64(v)) => encode_varint(encode_zigzag64(*v), buf),
        (ScalarKind::Bool, Value::Bool(v)) => encode_varint(*v as u64, buf),
        (ScalarKind::Fixed32, Value::U32(v)) => buf.put_u32_le(*v),
        (ScalarKind::Sfixed32, Value::I32(v)) => buf.put_i32_le(*v),
        (ScalarKind::Float, Value::F32(v)) => buf.put_f32_le(*v),
        (ScalarKind::Fixed64, Value::U64(v)) => buf.put_u64_le(*v),
        (ScalarKind::Sfixed64, Value::I64(v)) => buf.put_i64_le(*v),
        (ScalarKind::Double, Value::F64(v)) => buf.put_f64_le(*v),
        (ScalarKind::String, Value::String(s)) => {
            encode_varint(s.len() as u64, buf);
            buf.put_slice(s.as_bytes());
        }
        (ScalarKind::Bytes, Value::Bytes(b)) => {
            encode_varint(b.len() as u64, buf);
            buf.put_slice(b);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{FieldDef, MessageDef, ScalarKind, SchemaPool, TypeRef};
    use crate::value::{MapKey, Value};
    use crate::DynamicMessage;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn pool() -> SchemaPool {
        SchemaPool::builder()
            .message(
                MessageDef::new("test.Foo")
                    .field(FieldDef::scalar("bar", 1, ScalarKind::Int32).oneof("group1"))
                    .field(FieldDef::scalar("baz", 2, ScalarKind::String).oneof("group1"))
                    .field(FieldDef::message("sub", 3, "test.Foo").oneof("group1"))
                    .field(FieldDef::scalar("plain", 4, ScalarKind::Int32))
                    .field(FieldDef::scalar("flag", 5, ScalarKind::Bool).optional()),
            )
            .message(
                MessageDef::new("test.Scalars")
                    .field(FieldDef::scalar("i32", 1, ScalarKind::Int32))
                    .field(FieldDef::scalar("s32", 2, ScalarKind::Sint32))
                    .field(FieldDef::scalar("s64", 3, ScalarKind::Sint64))
                    .field(FieldDef::scalar("f32", 4, ScalarKind::Fixed32))
                    .field(FieldDef::scalar("dbl", 5, ScalarKind::Double))
                    .field(FieldDef::scalar("text", 6, ScalarKind::String)),
            )
            .message(
                MessageDef::new("test.Repeats")
                    .field(FieldDef::scalar("packed", 1, ScalarKind::Int32).repeated())
                    .field(
                        FieldDef::scalar("unpacked", 2, ScalarKind::Int32)
                            .repeated()
                            .packed(false),
                    )
                    .field(FieldDef::scalar("names", 3, ScalarKind::String).repeated())
                    .field(FieldDef::map(
                        "counts",
                        4,
                        ScalarKind::String,
                        TypeRef::Scalar(ScalarKind::Int32),
                    )),
            )
            .build()
            .unwrap()
    }

    fn new(name: &str) -> DynamicMessage {
        pool().get_message(name).unwrap().new_message()
    }

    #[test]
    fn test_unset_message_is_empty() {
        assert!(new("test.Foo").encode_to_vec().is_empty());
    }

    #[test]
    fn test_oneof_default_members_are_written() {
        let mut msg = new("test.Foo");
        msg.set("bar", 0).unwrap();
        assert_eq!(msg.encode_to_vec(), vec![0x08, 0x00]);

        msg.set("baz", "").unwrap();
        assert_eq!(msg.encode_to_vec(), vec![0x12, 0x00]);

        msg.get_message_mut("sub").unwrap();
        assert_eq!(msg.encode_to_vec(), vec![0x1a, 0x00]);
    }

    #[test]
    fn test_plain_default_is_omitted() {
        let mut msg = new("test.Foo");
        msg.set("plain", 0).unwrap();
        assert!(msg.encode_to_vec().is_empty());
    }

    #[test]
    fn test_optional_bool() {
        let mut msg = new("test.Foo");
        msg.set("flag", false).unwrap();
        assert_eq!(msg.encode_to_vec(), vec![0x28, 0x00]);
    }

    #[test]
    fn test_scalar_encodings() {
        let mut msg = new("test.Scalars");
        msg.set("i32", -1).unwrap();
        msg.set("s32", -1).unwrap();
        msg.set("s64", -2i64).unwrap();
        msg.set("f32", 1u32).unwrap();
        msg.set("dbl", -0.0f64).unwrap();
        msg.set("text", "hi").unwrap();
        let mut expected = vec![0x08];
        expected.extend([0xFF; 9]);
        expected.push(0x01);
        expected.extend([0x10, 0x01]);
        expected.extend([0x18, 0x03]);
        expected.extend([0x25, 0x01, 0x00, 0x00, 0x00]);
        expected.push(0x29);
        expected.extend((-0.0f64).to_le_bytes());
        expected.extend([0x32, 0x02, b'h', b'i']);
        assert_eq!(msg.encode_to_vec(), expected);
    }

    #[test]
    fn test_nan_survives_round_trip() {
        let mut msg = new("test.Scalars");
        msg.set("dbl", f64::NAN).unwrap();
        let bytes = msg.encode_to_vec();
        let decoded = DynamicMessage::decode(msg.message_type().clone(), &bytes).unwrap();
        assert_eq!(decoded.encode_to_vec(), bytes);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_packed_and_unpacked() {
        let mut msg = new("test.Repeats");
        msg.set("packed", vec![Value::I32(1), Value::I32(150)]).unwrap();
        msg.set("unpacked", vec![Value::I32(1), Value::I32(2)]).unwrap();
        msg.set("names", vec![Value::from("a")]).unwrap();
        assert_eq!(
            msg.encode_to_vec(),
            vec![
                0x0A, 0x03, 0x01, 0x96, 0x01, // packed
                0x10, 0x01, 0x10, 0x02, // unpacked
                0x1A, 0x01, b'a', // names
            ]
        );
    }

    #[test]
    fn test_map_entries_sorted_with_key_and_value() {
        let mut msg = new("test.Repeats");
        let mut counts = BTreeMap::new();
        counts.insert(MapKey::from("b"), Value::I32(0));
        counts.insert(MapKey::from("a"), Value::I32(2));
        msg.set("counts", Value::Map(counts)).unwrap();
        assert_eq!(
            msg.encode_to_vec(),
            vec![
                0x22, 0x05, 0x0A, 0x01, b'a', 0x10, 0x02, // a => 2
                0x22, 0x05, 0x0A, 0x01, b'b', 0x10, 0x00, // b => 0
            ]
        );
    }
}
