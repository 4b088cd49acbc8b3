//! JSON to message.

use super::{expected, join_path, relocate, well_known, JsonParseOptions};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{Cardinality, EnumType, FieldSpec, Kind, MessageType, ScalarKind};
use crate::validate;
use crate::value::{MapKey, Value};
use crate::wkt::WellKnownType;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

/// Standard alphabet, padding optional; URL-safe input is mapped onto it first
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

pub(super) fn message_from_json(
    ty: &MessageType,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<DynamicMessage> {
    if let Some(wkt) = ty.well_known() {
        if let Some(message) = well_known::from_json(ty, wkt, json, options, path)? {
            return Ok(message);
        }
    }
    let JsonValue::Object(object) = json else {
        return Err(expected(path, &format!("an object for {}", ty.full_name()), json));
    };
    let mut message = ty.new_message();
    merge_object(&mut message, object, options, path, &[])?;
    Ok(message)
}

/// Sets the fields named by the keys of `object`, except those in `skip`
pub(super) fn merge_object(
    message: &mut DynamicMessage,
    object: &Map<String, JsonValue>,
    options: &JsonParseOptions,
    path: &str,
    skip: &[&str],
) -> Result<()> {
    let ty = message.message_type().clone();
    let mut seen = HashSet::new();
    let mut groups = HashSet::new();

    for (key, json) in object {
        if skip.contains(&key.as_str()) {
            continue;
        }
        let Some(field) = ty.get_field_by_json_name(key) else {
            if options.ignore_unknown_fields {
                trace!("Skipping unknown JSON key '{}' in {}", key, ty.full_name());
                continue;
            }
            return Err(Error::json(
                join_path(path, key),
                format!("{} has no field named '{}'", ty.full_name(), key),
            ));
        };
        let field_path = join_path(path, field.name());
        if !seen.insert(field.index()) {
            return Err(Error::json(field_path, "field appears more than once"));
        }
        if json.is_null() && !accepts_null(&field) {
            continue;
        }
        if let Some(oneof) = field.oneof() {
            if !oneof.is_synthetic() && !groups.insert(oneof.index()) {
                return Err(Error::json(
                    field_path,
                    format!("more than one member of oneof '{}' is set", oneof.name()),
                ));
            }
        }
        if let Some(value) = parse_field(&field, json, options, &field_path)? {
            message.store(field.index(), value);
        }
    }
    Ok(())
}

/// `null` means "unset" except where it is the value itself
fn accepts_null(field: &FieldSpec<'_>) -> bool {
    !field.is_list() && !field.is_map() && null_is_value(&field.kind())
}

fn null_is_value(kind: &Kind) -> bool {
    match kind {
        Kind::Message(ty) => ty.well_known() == Some(WellKnownType::Value),
        Kind::Enum(ty) => ty.is_null_value(),
        Kind::Scalar(_) => false,
    }
}

fn parse_field(
    field: &FieldSpec<'_>,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<Option<Value>> {
    let kind = field.kind();
    match field.cardinality() {
        Cardinality::Repeated => {
            let JsonValue::Array(items) = json else {
                return Err(expected(path, "an array", json));
            };
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                if item.is_null() && !null_is_value(&kind) {
                    return Err(Error::json(item_path, "null is not a valid element"));
                }
                if let Some(value) = parse_element(&kind, item, options, &item_path)? {
                    values.push(value);
                }
            }
            Ok(Some(Value::List(values)))
        }
        Cardinality::Map => {
            let JsonValue::Object(entries) = json else {
                return Err(expected(path, "an object", json));
            };
            let key_kind = field.map_key().ok_or_else(|| {
                Error::invalid_schema(
                    field.containing_type().full_name(),
                    format!("map field '{}' has no key type", field.name()),
                )
            })?;
            let mut map = BTreeMap::new();
            for (key, item) in entries {
                let entry_path = format!("{}[{}]", path, key);
                let key = parse_map_key(key_kind, key, &entry_path)?;
                if item.is_null() && !null_is_value(&kind) {
                    return Err(Error::json(entry_path, "null is not a valid map value"));
                }
                if let Some(value) = parse_element(&kind, item, options, &entry_path)? {
                    map.insert(key, value);
                }
            }
            Ok(Some(Value::Map(map)))
        }
        Cardinality::Singular | Cardinality::Optional => {
            parse_element(&kind, json, options, path)
        }
    }
}

/// Parses one value of a field; `None` when an unknown enum name is dropped
fn parse_element(
    kind: &Kind,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<Option<Value>> {
    match kind {
        Kind::Message(ty) => message_from_json(ty, json, options, path).map(|m| Some(Value::from(m))),
        Kind::Enum(ty) => parse_enum(ty, json, options, path),
        Kind::Scalar(scalar) => parse_scalar(*scalar, json, path).map(Some),
    }
}

fn parse_enum(
    ty: &EnumType,
    json: &JsonValue,
    options: &JsonParseOptions,
    path: &str,
) -> Result<Option<Value>> {
    match json {
        JsonValue::Null if ty.is_null_value() => Ok(Some(Value::EnumNumber(0))),
        JsonValue::String(name) => match ty.get_by_name(name) {
            Some(number) => Ok(Some(Value::EnumNumber(number))),
            None if options.ignore_unknown_fields => {
                trace!("Skipping unknown enum name '{}' for {}", name, ty.full_name());
                Ok(None)
            }
            None => Err(Error::json(
                path,
                format!("'{}' is not a value of {}", name, ty.full_name()),
            )),
        },
        JsonValue::Number(_) => {
            let number = parse_integer(json, path)?;
            validate::int_value(path, &Kind::Enum(ty.clone()), number)
                .map(Some)
                .map_err(relocate(path))
        }
        other => Err(expected(path, "an enum name or number", other)),
    }
}

pub(super) fn parse_scalar(kind: ScalarKind, json: &JsonValue, path: &str) -> Result<Value> {
    match kind {
        ScalarKind::Bool => match json {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            other => Err(expected(path, "a boolean", other)),
        },
        ScalarKind::String => match json {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            other => Err(expected(path, "a string", other)),
        },
        ScalarKind::Bytes => match json {
            JsonValue::String(s) => decode_base64(s, path).map(Value::Bytes),
            other => Err(expected(path, "a base64 string", other)),
        },
        ScalarKind::Float | ScalarKind::Double => {
            let value = parse_float(json, path)?;
            validate::float_value(path, kind, value).map_err(relocate(path))
        }
        _ => {
            let value = parse_integer(json, path)?;
            validate::int_value(path, &Kind::Scalar(kind), value).map_err(relocate(path))
        }
    }
}

fn parse_integer(json: &JsonValue, path: &str) -> Result<i128> {
    match json {
        JsonValue::Number(n) => integer_from_number(n)
            .ok_or_else(|| Error::json(path, format!("{} is not an integer", n))),
        JsonValue::String(s) => integer_from_str(s)
            .ok_or_else(|| Error::json(path, format!("'{}' is not an integer", s))),
        other => Err(expected(path, "an integer", other)),
    }
}

fn integer_from_number(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(i128::from(u));
    }
    n.as_f64().and_then(integral)
}

/// Decimal integer, or a number in exponent form with no fractional part
fn integer_from_str(text: &str) -> Option<i128> {
    text.parse::<i128>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(integral))
}

fn integral(value: f64) -> Option<i128> {
    // Saturating cast; range checks happen afterwards
    (value.is_finite() && value.fract() == 0.0).then_some(value as i128)
}

fn parse_float(json: &JsonValue, path: &str) -> Result<f64> {
    match json {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::json(path, format!("{} is not a number", n))),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            text => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| Error::json(path, format!("'{}' is not a number", text))),
        },
        other => Err(expected(path, "a number", other)),
    }
}

fn parse_map_key(kind: ScalarKind, key: &str, path: &str) -> Result<MapKey> {
    let value = match kind {
        ScalarKind::String => return Ok(MapKey::String(key.to_string())),
        ScalarKind::Bool => match key {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(Error::json(path, "bool map keys must be 'true' or 'false'")),
        },
        _ => {
            let number = key
                .parse::<i128>()
                .map_err(|_| Error::json(path, format!("map key '{}' is not an integer", key)))?;
            validate::int_value(path, &Kind::Scalar(kind), number).map_err(relocate(path))?
        }
    };
    MapKey::from_value(value).map_err(relocate(path))
}

/// Accepts the standard and URL-safe alphabets, with or without padding
fn decode_base64(text: &str, path: &str) -> Result<Bytes> {
    let normalized: String = text
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    LENIENT_BASE64
        .decode(normalized)
        .map(Bytes::from)
        .map_err(|e| Error::json(path, format!("invalid base64: {}", e)))
}
