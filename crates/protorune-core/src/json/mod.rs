//! Proto3 JSON codec.
//!
//! ## Printing
//!
//! Keys are lowerCamelCase unless another [`Casing`] is chosen. Fields at
//! their default are left out unless
//! [`include_default_values`](JsonPrintOptions::include_default_values) is
//! set; an active oneof member or a set `optional` field is always printed.
//! 64-bit integers print as strings, non-finite floats as `"NaN"`,
//! `"Infinity"` and `"-Infinity"`, bytes as base64 and enums by name.
//!
//! ## Parsing
//!
//! Keys are accepted as declared, in lowerCamelCase, UpperCamelCase or
//! kebab-case. Integers may be numbers or decimal strings and are
//! range-checked. Unknown keys are an error unless
//! [`ignore_unknown_fields`](JsonParseOptions::ignore_unknown_fields) is
//! set, in which case they are dropped.

mod decode;
mod encode;
mod well_known;

use crate::casing::Casing;
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::MessageType;
use serde_json::{Number, Value as JsonValue};

/// Largest magnitude below which every integer is exactly representable as a double
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Options for printing JSON
#[derive(Debug, Clone, Default)]
pub struct JsonPrintOptions {
    /// Spelling of field keys
    pub casing: Casing,
    /// Print fields at their default value too
    pub include_default_values: bool,
    /// Indent the output
    pub pretty: bool,
}

impl JsonPrintOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key spelling
    pub fn casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }

    /// Print default-valued fields
    pub fn include_default_values(mut self, include: bool) -> Self {
        self.include_default_values = include;
        self
    }

    /// Indent the output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Options for parsing JSON
#[derive(Debug, Clone, Default)]
pub struct JsonParseOptions {
    /// Drop keys and enum names the schema does not know
    pub ignore_unknown_fields: bool,
}

impl JsonParseOptions {
    /// Create options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop unknown keys instead of failing
    pub fn ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }
}

/// Converts a message to a JSON tree
pub fn to_value(message: &DynamicMessage, options: &JsonPrintOptions) -> Result<JsonValue> {
    encode::message_to_json(message, options, "")
}

/// Prints a message as JSON text
pub fn to_string(message: &DynamicMessage, options: &JsonPrintOptions) -> Result<String> {
    let value = to_value(message, options)?;
    let text = if options.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    text.map_err(|e| Error::json_serialize(message.message_type().full_name(), e.to_string()))
}

/// Builds a message of type `ty` from a JSON tree
pub fn from_value(
    ty: MessageType,
    value: &JsonValue,
    options: &JsonParseOptions,
) -> Result<DynamicMessage> {
    decode::message_from_json(&ty, value, options, "")
}

/// Parses JSON text into a message of type `ty`
pub fn from_str(ty: MessageType, text: &str, options: &JsonParseOptions) -> Result<DynamicMessage> {
    let value: JsonValue =
        serde_json::from_str(text).map_err(|e| Error::json(ty.full_name(), e.to_string()))?;
    from_value(ty, &value, options)
}

/// JSON number for a finite double; integral values within the exactly
/// representable range print without a fraction
pub(crate) fn json_number(value: f64) -> Option<Number> {
    if !value.is_finite() {
        return None;
    }
    let negative_zero = value == 0.0 && value.is_sign_negative();
    if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER && !negative_zero {
        return Some(Number::from(value as i64));
    }
    Number::from_f64(value)
}

/// Moves a range or type failure onto a JSON path
fn relocate(path: &str) -> impl Fn(Error) -> Error + '_ {
    move |err| match err {
        Error::Validation { details, .. } => Error::json(path, details),
        other => other,
    }
}

fn expected(path: &str, what: &str, found: &JsonValue) -> Error {
    let found = match found {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    };
    Error::json(path, format!("expected {}, found {}", what, found))
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_number() {
        assert_eq!(json_number(1.0).unwrap().to_string(), "1");
        assert_eq!(json_number(-3.0).unwrap().to_string(), "-3");
        assert_eq!(json_number(1.5).unwrap().to_string(), "1.5");
        let negative_zero = json_number(-0.0).unwrap();
        assert!(negative_zero.is_f64());
        assert!(negative_zero.as_f64().unwrap().is_sign_negative());
        let large = json_number(1e21).unwrap();
        assert!(large.is_f64());
        assert_eq!(large.as_f64(), Some(1e21));
        assert!(json_number(f64::NAN).is_none());
        assert!(json_number(f64::INFINITY).is_none());
    }

    #[test]
    fn test_relocate() {
        let err = relocate("a.b")(Error::validation("b", "too big"));
        assert!(matches!(err, Error::Json { ref path, .. } if path == "a.b"));
        let err = expected("x", "a string", &JsonValue::Bool(true));
        assert_eq!(err.to_string(), "invalid JSON at 'x': expected a string, found a boolean");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a", "b"), "a.b");
    }

    #[test]
    fn test_options_builders() {
        let print = JsonPrintOptions::new()
            .casing(Casing::Snake)
            .include_default_values(true)
            .pretty(true);
        assert_eq!(print.casing, Casing::Snake);
        assert!(print.include_default_values && print.pretty);
        assert!(JsonParseOptions::new().ignore_unknown_fields(true).ignore_unknown_fields);
    }
}
