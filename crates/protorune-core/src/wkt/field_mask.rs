//! `google.protobuf.FieldMask`.

use super::{expect_type, WellKnownAdapter, WellKnownType};
use crate::casing::{to_lower_camel_case, to_snake_case};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::SchemaPool;
use crate::value::Value;

/// Adapter between `google.protobuf.FieldMask` and its list of paths
#[derive(Debug, Clone, Copy)]
pub struct FieldMaskType;

impl WellKnownAdapter for FieldMaskType {
    type Native = Vec<String>;
    const TYPE: WellKnownType = WellKnownType::FieldMask;

    fn from_native(pool: &SchemaPool, native: &Vec<String>) -> Result<DynamicMessage> {
        let mut message = Self::message_type(pool)?.new_message();
        let paths = native.iter().map(|p| Value::from(p.as_str())).collect();
        message.set("paths", Value::List(paths))?;
        Ok(message)
    }

    fn to_native(message: &DynamicMessage) -> Result<Vec<String>> {
        expect_type(message, Self::TYPE)?;
        let paths = message.get("paths")?;
        Ok(paths
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect())
    }
}

/// Joins paths into the JSON form: comma-separated, lowerCamelCase segments
pub(crate) fn paths_to_json(paths: &[String]) -> Result<String> {
    let converted = paths
        .iter()
        .map(|path| {
            if path.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(Error::validation(
                    "google.protobuf.FieldMask",
                    format!("path '{}' has no lowerCamelCase form", path),
                ));
            }
            Ok(path
                .split('.')
                .map(to_lower_camel_case)
                .collect::<Vec<_>>()
                .join("."))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(converted.join(","))
}

/// Splits the JSON form back into snake_case paths
pub(crate) fn paths_from_json(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',')
        .map(|path| {
            path.split('.')
                .map(to_snake_case)
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect()
}
