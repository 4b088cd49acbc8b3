//! Field values held by a [`DynamicMessage`](crate::DynamicMessage).

use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{Kind, ScalarKind};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// A single field value
///
/// Repeated fields hold a [`Value::List`], map fields a [`Value::Map`]. The
/// variant of a scalar follows its storage width, not its wire encoding:
/// `sint32`, `sfixed32` and `int32` are all [`Value::I32`].
///
/// Floats compare by bit pattern, so `NaN` equals itself and `-0.0` differs
/// from `0.0`, the same distinction the wire encoding makes.
#[derive(Debug, Clone)]
pub enum Value {
    /// `bool`
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32`
    I32(i32),
    /// `int64`, `sint64`, `sfixed64`
    I64(i64),
    /// `uint32`, `fixed32`
    U32(u32),
    /// `uint64`, `fixed64`
    U64(u64),
    /// `float`
    F32(f32),
    /// `double`
    F64(f64),
    /// `string`
    String(String),
    /// `bytes`; the buffer is shared between snapshots
    Bytes(Bytes),
    /// An enum number, declared or not
    EnumNumber(i32),
    /// An embedded message
    Message(Box<DynamicMessage>),
    /// Elements of a repeated field
    List(Vec<Value>),
    /// Entries of a map field, ordered by key
    Map(BTreeMap<MapKey, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::EnumNumber(a), Value::EnumNumber(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Key of a map field
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// `bool` key
    Bool(bool),
    /// `int32`, `sint32`, `sfixed32` key
    I32(i32),
    /// `int64`, `sint64`, `sfixed64` key
    I64(i64),
    /// `uint32`, `fixed32` key
    U32(u32),
    /// `uint64`, `fixed64` key
    U64(u64),
    /// `string` key
    String(String),
}

impl Value {
    /// Returns the boolean, if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value of any signed 32-bit variant or an enum number
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) | Value::EnumNumber(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value, if this is an `I64`
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value, if this is a `U32`
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value, if this is a `U64`
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value, if this is an `F32`
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value, if this is an `F64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the buffer, if this is `Bytes`
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the enum number, if this is an `EnumNumber`
    pub fn as_enum_number(&self) -> Option<i32> {
        match self {
            Value::EnumNumber(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the embedded message, if this is a `Message`
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable access to the embedded message
    pub fn as_message_mut(&mut self) -> Option<&mut DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the elements, if this is a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the entries, if this is a `Map`
    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this is the type-default of its variant
    ///
    /// Floats compare by bit pattern, so `-0.0` is not a default.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !*b,
            Value::I32(v) | Value::EnumNumber(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => v.to_bits() == 0,
            Value::F64(v) => v.to_bits() == 0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Message(m) => m.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
        }
    }

    /// Whether this value can be stored in a single element of `kind`
    pub fn is_valid_for(&self, kind: &Kind) -> bool {
        match (self, kind) {
            (Value::EnumNumber(_), Kind::Enum(_)) => true,
            (Value::Message(m), Kind::Message(ty)) => m.message_type() == ty,
            (value, Kind::Scalar(scalar)) => value.matches_scalar(*scalar),
            _ => false,
        }
    }

    fn matches_scalar(&self, kind: ScalarKind) -> bool {
        matches!(
            (self, kind),
            (Value::Bool(_), ScalarKind::Bool)
                | (
                    Value::I32(_),
                    ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32
                )
                | (
                    Value::I64(_),
                    ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64
                )
                | (Value::U32(_), ScalarKind::Uint32 | ScalarKind::Fixed32)
                | (Value::U64(_), ScalarKind::Uint64 | ScalarKind::Fixed64)
                | (Value::F32(_), ScalarKind::Float)
                | (Value::F64(_), ScalarKind::Double)
                | (Value::String(_), ScalarKind::String)
                | (Value::Bytes(_), ScalarKind::Bytes)
        )
    }

    /// Copy with every byte buffer reallocated, so nothing is shared with `self`
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Bytes(b) => Value::Bytes(Bytes::copy_from_slice(b)),
            Value::Message(m) => Value::Message(Box::new(m.deep_clone())),
            Value::List(l) => Value::List(l.iter().map(Value::deep_clone).collect()),
            Value::Map(m) => Value::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl MapKey {
    /// The default key for a key kind
    pub fn default_for(kind: ScalarKind) -> Result<MapKey> {
        Ok(match kind {
            ScalarKind::Bool => MapKey::Bool(false),
            ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => MapKey::I32(0),
            ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => MapKey::I64(0),
            ScalarKind::Uint32 | ScalarKind::Fixed32 => MapKey::U32(0),
            ScalarKind::Uint64 | ScalarKind::Fixed64 => MapKey::U64(0),
            ScalarKind::String => MapKey::String(String::new()),
            other => {
                return Err(Error::validation(
                    "map key",
                    format!("{} cannot be a map key", other),
                ))
            }
        })
    }

    /// Converts a scalar value into a key
    pub fn from_value(value: Value) -> Result<MapKey> {
        Ok(match value {
            Value::Bool(b) => MapKey::Bool(b),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(s) => MapKey::String(s),
            other => {
                return Err(Error::validation(
                    "map key",
                    format!("{} cannot be a map key", other.variant_name()),
                ))
            }
        })
    }

    /// Converts the key back into a scalar value
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }

    /// Whether this key can be stored in a map keyed by `kind`
    pub fn is_valid_for(&self, kind: ScalarKind) -> bool {
        self.to_value().matches_scalar(kind)
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::I32(v) => write!(f, "{}", v),
            MapKey::I64(v) => write!(f, "{}", v),
            MapKey::U32(v) => write!(f, "{}", v),
            MapKey::U64(v) => write!(f, "{}", v),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

impl From<DynamicMessage> for Value {
    fn from(v: DynamicMessage) -> Self {
        Value::Message(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<&str> for MapKey {
    fn from(v: &str) -> Self {
        MapKey::String(v.to_string())
    }
}

impl From<String> for MapKey {
    fn from(v: String) -> Self {
        MapKey::String(v)
    }
}
