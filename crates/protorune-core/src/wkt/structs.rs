//! `google.protobuf.Struct`, `Value` and `ListValue`.
//!
//! These mirror arbitrary JSON. A `Value` is built from a JSON value by
//! dispatching in the fixed order null, bool, number, string, list, object.

use super::{expect_type, WellKnownAdapter, WellKnownType};
use crate::error::{Error, Result};
use crate::json::json_number;
use crate::message::DynamicMessage;
use crate::schema::SchemaPool;
use crate::value::{MapKey, Value};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Adapter between `google.protobuf.Struct` and a JSON object
#[derive(Debug, Clone, Copy)]
pub struct StructType;

/// Adapter between `google.protobuf.Value` and any JSON value
#[derive(Debug, Clone, Copy)]
pub struct ValueType;

/// Adapter between `google.protobuf.ListValue` and a JSON array
#[derive(Debug, Clone, Copy)]
pub struct ListValueType;

impl WellKnownAdapter for StructType {
    type Native = Map<String, JsonValue>;
    const TYPE: WellKnownType = WellKnownType::Struct;

    fn from_native(pool: &SchemaPool, native: &Map<String, JsonValue>) -> Result<DynamicMessage> {
        let mut fields = BTreeMap::new();
        for (key, value) in native {
            fields.insert(
                MapKey::from(key.as_str()),
                Value::from(ValueType::from_native(pool, value)?),
            );
        }
        let mut message = Self::message_type(pool)?.new_message();
        message.set("fields", Value::Map(fields))?;
        Ok(message)
    }

    fn to_native(message: &DynamicMessage) -> Result<Map<String, JsonValue>> {
        expect_type(message, Self::TYPE)?;
        let fields = message.get("fields")?;
        let mut object = Map::new();
        if let Some(entries) = fields.as_map() {
            for (key, value) in entries {
                let nested = value
                    .as_message()
                    .ok_or_else(|| Error::validation("google.protobuf.Struct", "non-message entry"))?;
                object.insert(key.to_string(), ValueType::to_native(nested)?);
            }
        }
        Ok(object)
    }
}

impl WellKnownAdapter for ValueType {
    type Native = JsonValue;
    const TYPE: WellKnownType = WellKnownType::Value;

    fn from_native(pool: &SchemaPool, native: &JsonValue) -> Result<DynamicMessage> {
        let mut message = Self::message_type(pool)?.new_message();
        match native {
            JsonValue::Null => message.set("null_value", Value::EnumNumber(0))?,
            JsonValue::Bool(b) => message.set("bool_value", *b)?,
            JsonValue::Number(n) => {
                let number = n.as_f64().ok_or_else(|| {
                    Error::validation("google.protobuf.Value", format!("{} is not a double", n))
                })?;
                message.set("number_value", number)?
            }
            JsonValue::String(s) => message.set("string_value", s.as_str())?,
            JsonValue::Array(items) => {
                message.set("list_value", ListValueType::from_native(pool, items)?)?
            }
            JsonValue::Object(object) => {
                message.set("struct_value", StructType::from_native(pool, object)?)?
            }
        }
        Ok(message)
    }

    /// A `Value` with no kind set reads as `null`
    fn to_native(message: &DynamicMessage) -> Result<JsonValue> {
        expect_type(message, Self::TYPE)?;
        let Some((name, value)) = message.which_set("kind")? else {
            return Ok(JsonValue::Null);
        };
        let invalid = || Error::validation("google.protobuf.Value", format!("bad {}", name));
        Ok(match name {
            "null_value" => JsonValue::Null,
            "number_value" => {
                let number = value.as_f64().ok_or_else(invalid)?;
                JsonValue::Number(json_number(number).ok_or_else(|| {
                    Error::validation(
                        "google.protobuf.Value",
                        format!("{} has no JSON representation", number),
                    )
                })?)
            }
            "string_value" => JsonValue::String(value.as_str().ok_or_else(invalid)?.to_string()),
            "bool_value" => JsonValue::Bool(value.as_bool().ok_or_else(invalid)?),
            "struct_value" => {
                JsonValue::Object(StructType::to_native(value.as_message().ok_or_else(invalid)?)?)
            }
            "list_value" => {
                JsonValue::Array(ListValueType::to_native(value.as_message().ok_or_else(invalid)?)?)
            }
            _ => return Err(invalid()),
        })
    }
}

impl WellKnownAdapter for ListValueType {
    type Native = Vec<JsonValue>;
    const TYPE: WellKnownType = WellKnownType::ListValue;

    fn from_native(pool: &SchemaPool, native: &Vec<JsonValue>) -> Result<DynamicMessage> {
        let values = native
            .iter()
            .map(|item| ValueType::from_native(pool, item).map(Value::from))
            .collect::<Result<Vec<_>>>()?;
        let mut message = Self::message_type(pool)?.new_message();
        message.set("values", Value::List(values))?;
        Ok(message)
    }

    fn to_native(message: &DynamicMessage) -> Result<Vec<JsonValue>> {
        expect_type(message, Self::TYPE)?;
        let values = message.get("values")?;
        values
            .as_list()
            .unwrap_or_default()
            .iter()
            .map(|item| {
                item.as_message()
                    .ok_or_else(|| Error::validation("google.protobuf.ListValue", "non-message element"))
                    .and_then(ValueType::to_native)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_struct_round_trip() {
        let pool = SchemaPool::well_known().unwrap();
        let native = json!({
            "null": null,
            "number": 1.5,
            "count": 3,
            "text": "hello",
            "nested": {"flag": true},
            "mixed": [1, "two", null, {"x": []}],
        });
        let JsonValue::Object(object) = native.clone() else {
            panic!("expected object");
        };
        let message = StructType::from_native(&pool, &object).unwrap();
        let back = StructType::to_native(&message).unwrap();
        assert_eq!(JsonValue::Object(back), native);
    }

    #[test]
    fn test_value_dispatch() {
        let pool = SchemaPool::well_known().unwrap();
        let message = ValueType::from_native(&pool, &json!(false)).unwrap();
        assert_eq!(message.which_set("kind").unwrap().unwrap().0, "bool_value");
        let message = ValueType::from_native(&pool, &json!(0)).unwrap();
        assert_eq!(message.which_set("kind").unwrap().unwrap().0, "number_value");
        let message = ValueType::from_native(&pool, &json!(null)).unwrap();
        assert_eq!(message.which_set("kind").unwrap().unwrap().0, "null_value");
        assert_eq!(message.encode_to_vec(), vec![0x08, 0x00]);
    }

    #[test]
    fn test_empty_value_is_null() {
        let pool = SchemaPool::well_known().unwrap();
        let empty = ValueType::message_type(&pool).unwrap().new_message();
        assert_eq!(ValueType::to_native(&empty).unwrap(), JsonValue::Null);
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let pool = SchemaPool::well_known().unwrap();
        let mut message = ValueType::message_type(&pool).unwrap().new_message();
        message.set("number_value", f64::NAN).unwrap();
        assert!(ValueType::to_native(&message).is_err());
    }

    #[test]
    fn test_wrong_type_rejected() {
        let pool = SchemaPool::well_known().unwrap();
        let list = ListValueType::from_native(&pool, &vec![json!(1)]).unwrap();
        assert!(StructType::to_native(&list).is_err());
    }
}
