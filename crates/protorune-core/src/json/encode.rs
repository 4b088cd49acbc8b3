//! Message to JSON.

use super::{join_path, json_number, well_known, JsonPrintOptions};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{Cardinality, EnumMember, FieldSpec, Kind};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value as JsonValue};

pub(super) fn message_to_json(
    message: &DynamicMessage,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<JsonValue> {
    let ty = message.message_type();
    if let Some(wkt) = ty.well_known() {
        if let Some(value) = well_known::to_json(wkt, message, options, path)? {
            return Ok(value);
        }
    }

    let mut object = Map::new();
    for field in ty.fields() {
        let index = field.index();
        let field_path = join_path(path, field.name());
        let value = match field.oneof() {
            Some(_) if message.has_index(index) => {
                Some(field_to_json(message, &field, options, &field_path)?)
            }
            // Real oneofs never print inactive members
            Some(oneof) if oneof.is_synthetic() && options.include_default_values => {
                Some(JsonValue::Null)
            }
            Some(_) => None,
            None if message.has_index(index) => {
                Some(field_to_json(message, &field, options, &field_path)?)
            }
            None if options.include_default_values => {
                Some(default_to_json(&field, options, &field_path)?)
            }
            None => None,
        };
        if let Some(value) = value {
            object.insert(options.casing.apply(field.name(), field.json_name()), value);
        }
    }
    Ok(JsonValue::Object(object))
}

fn field_to_json(
    message: &DynamicMessage,
    field: &FieldSpec<'_>,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<JsonValue> {
    let kind = field.kind();
    let value = message.get_by_index(field.index());
    match (field.cardinality(), &*value) {
        (Cardinality::Repeated, Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| element_to_json(&kind, item, options, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        (Cardinality::Map, Value::Map(entries)) => {
            let mut object = Map::new();
            for (key, item) in entries {
                let entry_path = format!("{}[{}]", path, key);
                object.insert(key.to_string(), element_to_json(&kind, item, options, &entry_path)?);
            }
            Ok(JsonValue::Object(object))
        }
        (Cardinality::Singular | Cardinality::Optional, value) => {
            element_to_json(&kind, value, options, path)
        }
        _ => Err(Error::json_serialize(path, "value does not match field cardinality")),
    }
}

fn default_to_json(
    field: &FieldSpec<'_>,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<JsonValue> {
    match field.cardinality() {
        Cardinality::Repeated => Ok(JsonValue::Array(Vec::new())),
        Cardinality::Map => Ok(JsonValue::Object(Map::new())),
        Cardinality::Singular | Cardinality::Optional => match field.kind() {
            Kind::Message(_) => Ok(JsonValue::Null),
            kind => element_to_json(&kind, &kind.default_value(), options, path),
        },
    }
}

/// Converts one value of a field (one element for repeated and map fields)
pub(super) fn element_to_json(
    kind: &Kind,
    value: &Value,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<JsonValue> {
    match (kind, value) {
        (Kind::Message(_), Value::Message(inner)) => message_to_json(inner, options, path),
        (Kind::Enum(ty), Value::EnumNumber(number)) => {
            if ty.is_null_value() {
                return Ok(JsonValue::Null);
            }
            Ok(match ty.member(*number) {
                EnumMember::Known { name, .. } => JsonValue::String(name.to_string()),
                EnumMember::Unknown { number } => JsonValue::from(number),
            })
        }
        (Kind::Scalar(_), value) => scalar_to_json(value, path),
        _ => Err(Error::json_serialize(path, "value does not match field type")),
    }
}

fn scalar_to_json(value: &Value, path: &str) -> Result<JsonValue> {
    Ok(match value {
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::I32(v) => JsonValue::from(*v),
        Value::U32(v) => JsonValue::from(*v),
        Value::I64(v) => JsonValue::String(v.to_string()),
        Value::U64(v) => JsonValue::String(v.to_string()),
        Value::F32(v) => {
            // Shortest decimal that reads back as the same float
            let widened = if v.is_finite() {
                v.to_string().parse::<f64>().unwrap_or(f64::from(*v))
            } else {
                f64::from(*v)
            };
            float_to_json(widened, path)?
        }
        Value::F64(v) => float_to_json(*v, path)?,
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
        other => {
            return Err(Error::json_serialize(
                path,
                format!("{} is not a scalar", other.variant_name()),
            ))
        }
    })
}

fn float_to_json(value: f64, path: &str) -> Result<JsonValue> {
    if value.is_nan() {
        return Ok(JsonValue::String("NaN".into()));
    }
    if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        return Ok(JsonValue::String(text.into()));
    }
    json_number(value)
        .map(JsonValue::Number)
        .ok_or_else(|| Error::json_serialize(path, format!("{} has no JSON form", value)))
}

#[cfg(test)]
mod tests {
    use crate::casing::Casing;
    use crate::json::JsonPrintOptions;
    use crate::schema::{EnumDef, FieldDef, MessageDef, ScalarKind, SchemaPool, TypeRef};
    use crate::value::{MapKey, Value};
    use crate::DynamicMessage;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn pool() -> SchemaPool {
        SchemaPool::builder()
            .enumeration(EnumDef::new("test.Color").value("RED", 0).value("BLUE", 2))
            .message(
                MessageDef::new("test.All")
                    .field(FieldDef::scalar("int32_value", 1, ScalarKind::Int32))
                    .field(FieldDef::scalar("int64_value", 2, ScalarKind::Int64))
                    .field(FieldDef::scalar("uint64_value", 3, ScalarKind::Fixed64))
                    .field(FieldDef::scalar("float_value", 4, ScalarKind::Float))
                    .field(FieldDef::scalar("double_value", 5, ScalarKind::Double))
                    .field(FieldDef::scalar("bytes_value", 6, ScalarKind::Bytes))
                    .field(FieldDef::enumeration("color", 7, "test.Color"))
                    .field(FieldDef::message("child", 8, "test.All"))
                    .field(FieldDef::scalar("names", 9, ScalarKind::String).repeated())
                    .field(FieldDef::map(
                        "scores",
                        10,
                        ScalarKind::Int32,
                        TypeRef::Scalar(ScalarKind::Bool),
                    ))
                    .field(FieldDef::scalar("pick_a", 11, ScalarKind::Int32).oneof("pick"))
                    .field(FieldDef::scalar("pick_b", 12, ScalarKind::String).oneof("pick"))
                    .field(FieldDef::scalar("maybe", 13, ScalarKind::Bool).optional())
                    .field(FieldDef::scalar("renamed", 14, ScalarKind::Int32).json_name("other")),
            )
            .build()
            .unwrap()
    }

    fn all() -> DynamicMessage {
        pool().get_message("test.All").unwrap().new_message()
    }

    fn print(message: &DynamicMessage, options: &JsonPrintOptions) -> serde_json::Value {
        message.to_json_value(options).unwrap()
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(all().to_json(&JsonPrintOptions::default()).unwrap(), "{}");
    }

    #[test]
    fn test_scalars() {
        let mut msg = all();
        msg.set("int32_value", -5).unwrap();
        msg.set("int64_value", -9_007_199_254_740_993i64).unwrap();
        msg.set("uint64_value", u64::MAX).unwrap();
        msg.set("float_value", 1.1f32).unwrap();
        msg.set("double_value", f64::NEG_INFINITY).unwrap();
        msg.set("bytes_value", Bytes::from_static(b"\x00\xff")).unwrap();
        msg.set("color", Value::EnumNumber(2)).unwrap();
        assert_eq!(
            print(&msg, &JsonPrintOptions::default()),
            json!({
                "int32Value": -5,
                "int64Value": "-9007199254740993",
                "uint64Value": "18446744073709551615",
                "floatValue": 1.1,
                "doubleValue": "-Infinity",
                "bytesValue": "AP8=",
                "color": "BLUE",
            })
        );
    }

    #[test]
    fn test_unknown_enum_prints_number() {
        let mut msg = all();
        msg.set("color", Value::EnumNumber(7)).unwrap();
        assert_eq!(print(&msg, &JsonPrintOptions::default()), json!({"color": 7}));
    }

    #[test]
    fn test_collections_and_nesting() {
        let mut msg = all();
        msg.set("names", vec![Value::from("a"), Value::from("b")]).unwrap();
        let mut scores = BTreeMap::new();
        scores.insert(MapKey::I32(-1), Value::Bool(true));
        msg.set("scores", Value::Map(scores)).unwrap();
        msg.get_message_mut("child").unwrap().set("int32_value", 1).unwrap();
        assert_eq!(
            print(&msg, &JsonPrintOptions::default()),
            json!({
                "child": {"int32Value": 1},
                "names": ["a", "b"],
                "scores": {"-1": true},
            })
        );
    }

    #[test]
    fn test_oneof_and_optional_at_default() {
        let mut msg = all();
        msg.set("pick_a", 0).unwrap();
        msg.set("maybe", false).unwrap();
        assert_eq!(
            print(&msg, &JsonPrintOptions::default()),
            json!({"pickA": 0, "maybe": false})
        );
    }

    #[test]
    fn test_include_default_values() {
        let options = JsonPrintOptions::new().include_default_values(true);
        assert_eq!(
            print(&all(), &options),
            json!({
                "int32Value": 0,
                "int64Value": "0",
                "uint64Value": "0",
                "floatValue": 0,
                "doubleValue": 0,
                "bytesValue": "",
                "color": "RED",
                "child": null,
                "names": [],
                "scores": {},
                "maybe": null,
                "other": 0,
            })
        );
    }

    #[test]
    fn test_casing() {
        let mut msg = all();
        msg.set("int32_value", 1).unwrap();
        msg.set("renamed", 2).unwrap();
        let snake = JsonPrintOptions::new().casing(Casing::Snake);
        assert_eq!(print(&msg, &snake), json!({"int32_value": 1, "renamed": 2}));
        let pascal = JsonPrintOptions::new().casing(Casing::Pascal);
        assert_eq!(print(&msg, &pascal), json!({"Int32Value": 1, "Renamed": 2}));
        assert_eq!(
            print(&msg, &JsonPrintOptions::default()),
            json!({"int32Value": 1, "other": 2})
        );
    }

    #[test]
    fn test_pretty() {
        let mut msg = all();
        msg.set("int32_value", 1).unwrap();
        let text = msg.to_json(&JsonPrintOptions::new().pretty(true)).unwrap();
        assert_eq!(text, "{\n  \"int32Value\": 1\n}");
    }
}
