//! JSON forms of the well-known types.
//!
//! `Empty` has no special form and falls through to the generic object
//! printer; every other well-known type is handled here.

use super::decode::{merge_object, message_from_json, parse_scalar};
use super::encode::{element_to_json, message_to_json};
use super::{expected, join_path, relocate, JsonParseOptions, JsonPrintOptions};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{Kind, MessageType};
use crate::wkt::{
    format_rfc3339, parse_rfc3339, paths_from_json, paths_to_json, to_datetime, AnyType,
    AnyValue, DurationType, DurationValue, FieldMaskType, ListValueType, StructType,
    TimestampType, ValueType, WellKnownAdapter, WellKnownType,
};
use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use tracing::trace;

/// Turns an adapter's range failure into a serialization error at `path`
fn unprintable(path: &str) -> impl Fn(Error) -> Error + '_ {
    move |err| match err {
        Error::Validation { details, .. } => Error::json_serialize(path, details),
        other => other,
    }
}

/// Embedded types whose Any form nests the JSON under `"value"`
fn has_value_form(ty: &MessageType) -> bool {
    matches!(ty.well_known(), Some(wkt) if wkt != WellKnownType::Empty)
}

pub(super) fn to_json(
    wkt: WellKnownType,
    message: &DynamicMessage,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<Option<JsonValue>> {
    let json = match wkt {
        WellKnownType::Duration => {
            let duration = DurationType::to_native(message)?;
            duration.validate().map_err(unprintable(path))?;
            JsonValue::String(duration.to_string())
        }
        WellKnownType::Timestamp => {
            let seconds = message.get("seconds")?.as_i64().unwrap_or_default();
            let nanos = message.get("nanos")?.as_i32().unwrap_or_default();
            JsonValue::String(format_rfc3339(seconds, nanos).map_err(unprintable(path))?)
        }
        WellKnownType::Struct => {
            JsonValue::Object(StructType::to_native(message).map_err(unprintable(path))?)
        }
        WellKnownType::Value => ValueType::to_native(message).map_err(unprintable(path))?,
        WellKnownType::ListValue => {
            JsonValue::Array(ListValueType::to_native(message).map_err(unprintable(path))?)
        }
        WellKnownType::FieldMask => {
            let paths = FieldMaskType::to_native(message)?;
            JsonValue::String(paths_to_json(&paths).map_err(unprintable(path))?)
        }
        WellKnownType::Any => any_to_json(message, options, path)?,
        WellKnownType::Empty => return Ok(None),
        wrapper => match wrapper.wrapped_kind() {
            Some(kind) => {
                let value = message.get("value")?;
                element_to_json(&Kind::Scalar(kind), &value, options, path)?
            }
            None => return Ok(None),
        },
    };
    Ok(Some(json))
}

fn any_to_json(
    message: &DynamicMessage,
    options: &JsonPrintOptions,
    path: &str,
) -> Result<JsonValue> {
    let any = AnyType::to_native(message)?;
    if any.type_url.is_empty() && any.value.is_empty() {
        return Ok(JsonValue::Object(Map::new()));
    }
    let ty = message
        .message_type()
        .pool()
        .get_message_by_type_url(&any.type_url)
        .ok_or_else(|| {
            Error::json_serialize(path, format!("type '{}' is not in the schema pool", any.type_url))
        })?;
    let embedded = any.unpack(&ty)?;

    let mut object = Map::new();
    object.insert("@type".to_string(), JsonValue::String(any.type_url.clone()));
    let value_path = join_path(path, "value");
    match message_to_json(&embedded, options, &value_path)? {
        JsonValue::Object(fields) if !has_value_form(&ty) => object.extend(fields),
        other => {
            object.insert("value".to_string(), other);
        }
    }
    Ok(JsonValue::Object(object))
}

pub(super) fn from_json(
    ty: &MessageType,
    wkt: WellKnownType,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<Option<DynamicMessage>> {
    let pool = ty.pool();
    let message = match wkt {
        WellKnownType::Duration => {
            let duration: DurationValue = expect_string(json, path)?
                .parse()
                .map_err(relocate(path))?;
            DurationType::from_native(pool, &duration)?
        }
        WellKnownType::Timestamp => {
            let (seconds, nanos) = parse_rfc3339(expect_string(json, path)?).map_err(relocate(path))?;
            TimestampType::from_native(pool, &to_datetime(seconds, nanos).map_err(relocate(path))?)?
        }
        WellKnownType::Struct => match json {
            JsonValue::Object(object) => {
                StructType::from_native(pool, object).map_err(relocate(path))?
            }
            other => return Err(expected(path, "an object", other)),
        },
        WellKnownType::Value => ValueType::from_native(pool, json).map_err(relocate(path))?,
        WellKnownType::ListValue => match json {
            JsonValue::Array(items) => {
                ListValueType::from_native(pool, items).map_err(relocate(path))?
            }
            other => return Err(expected(path, "an array", other)),
        },
        WellKnownType::FieldMask => {
            FieldMaskType::from_native(pool, &paths_from_json(expect_string(json, path)?))?
        }
        WellKnownType::Any => any_from_json(ty, json, options, path)?,
        WellKnownType::Empty => return Ok(None),
        wrapper => match wrapper.wrapped_kind() {
            Some(kind) => {
                let mut message = ty.new_message();
                message.set("value", parse_scalar(kind, json, path)?)?;
                message
            }
            None => return Ok(None),
        },
    };
    Ok(Some(message))
}

fn expect_string<'a>(json: &'a JsonValue, path: &str) -> Result<&'a str> {
    match json {
        JsonValue::String(text) => Ok(text),
        other => Err(expected(path, "a string", other)),
    }
}

fn any_from_json(
    ty: &MessageType,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<DynamicMessage> {
    let JsonValue::Object(object) = json else {
        return Err(expected(path, "an object", json));
    };
    if object.is_empty() {
        return Ok(ty.new_message());
    }
    let type_url = match object.get("@type") {
        Some(JsonValue::String(url)) => url,
        Some(other) => return Err(expected(&join_path(path, "@type"), "a string", other)),
        None => return Err(Error::json(path, "Any is missing '@type'")),
    };
    let embedded_ty = ty.pool().get_message_by_type_url(type_url).ok_or_else(|| {
        Error::json(path, format!("type '{}' is not in the schema pool", type_url))
    })?;

    let embedded = if has_value_form(&embedded_ty) {
        for key in object.keys().filter(|k| *k != "@type" && *k != "value") {
            if !options.ignore_unknown_fields {
                return Err(Error::json(
                    join_path(path, key),
                    format!("unexpected key next to the value of {}", embedded_ty.full_name()),
                ));
            }
            trace!("Skipping unknown key '{}' in Any", key);
        }
        let value = object.get("value").ok_or_else(|| {
            Error::json(path, format!("Any holding {} is missing 'value'", embedded_ty.full_name()))
        })?;
        message_from_json(&embedded_ty, value, options, &join_path(path, "value"))?
    } else {
        let mut embedded = embedded_ty.new_message();
        merge_object(&mut embedded, object, options, path, &["@type"])?;
        embedded
    };

    let any = AnyValue {
        type_url: type_url.clone(),
        value: Bytes::from(embedded.encode_to_vec()),
    };
    AnyType::from_native(ty.pool(), &any)
}

#[cfg(test)]
mod tests {
    use crate::json::{JsonParseOptions, JsonPrintOptions};
    use crate::schema::{FieldDef, MessageDef, ScalarKind, SchemaPool};
    use crate::value::Value;
    use crate::{DynamicMessage, ErrorKind};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value as JsonValue};

    fn pool() -> SchemaPool {
        SchemaPool::builder()
            .message(
                MessageDef::new("test.Holder")
                    .field(FieldDef::message("duration", 1, "google.protobuf.Duration"))
                    .field(FieldDef::message("timestamp", 2, "google.protobuf.Timestamp"))
                    .field(FieldDef::message("data", 3, "google.protobuf.Struct"))
                    .field(FieldDef::message("value", 4, "google.protobuf.Value"))
                    .field(FieldDef::message("list", 5, "google.protobuf.ListValue"))
                    .field(FieldDef::message("mask", 6, "google.protobuf.FieldMask"))
                    .field(FieldDef::message("any", 7, "google.protobuf.Any"))
                    .field(FieldDef::message("empty", 8, "google.protobuf.Empty"))
                    .field(FieldDef::message("count", 9, "google.protobuf.Int64Value"))
                    .field(FieldDef::message("ratio", 10, "google.protobuf.FloatValue"))
                    .field(FieldDef::message("values", 11, "google.protobuf.Value").repeated())
                    .field(FieldDef::scalar("id", 12, ScalarKind::Int32)),
            )
            .build()
            .unwrap()
    }

    fn parse(json: &JsonValue) -> crate::Result<DynamicMessage> {
        let ty = pool().get_message("test.Holder").unwrap();
        DynamicMessage::from_json_value(ty, json, &JsonParseOptions::default())
    }

    fn round_trip(json: JsonValue) {
        let message = parse(&json).unwrap();
        let printed = message.to_json_value(&JsonPrintOptions::default()).unwrap();
        assert_eq!(printed, json);
    }

    #[test]
    fn test_round_trips() {
        round_trip(json!({
            "duration": "-1.500s",
            "timestamp": "1972-01-01T10:00:20.021Z",
            "data": {"a": [1, "b", null, true, {"c": {}}]},
            "value": 2.5,
            "list": ["x", []],
            "mask": "fooBar,baz.quxQuux",
            "empty": {},
            "count": "-7",
            "ratio": "Infinity",
            "values": [null, "s"],
        }));
    }

    #[test]
    fn test_value_null_is_set() {
        let message = parse(&json!({"value": null})).unwrap();
        assert!(message.is_set("value").unwrap());
        assert_eq!(
            message.to_json_value(&JsonPrintOptions::default()).unwrap(),
            json!({"value": null})
        );
        assert_eq!(message.encode_to_vec(), vec![0x22, 0x02, 0x08, 0x00]);
    }

    #[test]
    fn test_wrapper_null_is_unset() {
        let message = parse(&json!({"count": null})).unwrap();
        assert!(!message.is_set("count").unwrap());
    }

    #[test]
    fn test_timestamp_offset() {
        let message = parse(&json!({"timestamp": "1970-01-01T01:00:00+01:00"})).unwrap();
        assert_eq!(
            message.to_json_value(&JsonPrintOptions::default()).unwrap(),
            json!({"timestamp": "1970-01-01T00:00:00Z"})
        );
        assert!(parse(&json!({"timestamp": "1970-01-01t00:00:00z"})).is_err());
        assert!(parse(&json!({"timestamp": "10000-01-01T00:00:00Z"})).is_err());
    }

    #[test]
    fn test_duration_errors() {
        assert!(parse(&json!({"duration": "1"})).is_err());
        assert!(parse(&json!({"duration": 1})).is_err());
        assert!(parse(&json!({"duration": "315576000001s"})).is_err());

        let mut message = pool().get_message("test.Holder").unwrap().new_message();
        let duration = message.get_message_mut("duration").unwrap();
        duration.set("seconds", 1i64).unwrap();
        duration.set("nanos", -1).unwrap();
        let err = message.to_json(&JsonPrintOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonSerialize);
    }

    #[test]
    fn test_any_with_message() {
        let json = json!({"any": {"@type": "type.googleapis.com/test.Holder", "id": 5}});
        round_trip(json.clone());
        let message = parse(&json).unwrap();
        let any = message.get("any").unwrap();
        let any = any.as_message().unwrap();
        assert_eq!(*any.get("value").unwrap(), Value::from(vec![0x60u8, 0x05]));
    }

    #[test]
    fn test_any_with_well_known() {
        round_trip(json!({
            "any": {"@type": "type.googleapis.com/google.protobuf.Duration", "value": "3s"}
        }));
        round_trip(json!({
            "any": {"@type": "type.googleapis.com/google.protobuf.Empty"}
        }));
        round_trip(json!({"any": {}}));
    }

    #[test]
    fn test_any_errors() {
        assert!(parse(&json!({"any": {"id": 5}})).is_err());
        assert!(parse(&json!({"any": {"@type": "type.googleapis.com/test.Nope"}})).is_err());
        assert!(parse(&json!({
            "any": {"@type": "type.googleapis.com/google.protobuf.Duration"}
        }))
        .is_err());
    }

    #[test]
    fn test_field_mask_rejects_uppercase() {
        let mut message = pool().get_message("test.Holder").unwrap().new_message();
        let mask = message.get_message_mut("mask").unwrap();
        mask.set("paths", vec![Value::from("fooBar")]).unwrap();
        let err = message.to_json(&JsonPrintOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonSerialize);
    }

    #[test]
    fn test_struct_requires_object() {
        assert!(parse(&json!({"data": [1]})).is_err());
        assert!(parse(&json!({"list": {}})).is_err());
    }
}
