//! Well-known-type adapters.
//!
//! Each adapter maps a `google.protobuf` message onto the native value it
//! stands for, in both directions:
//!
//! | Message | Native value |
//! |---|---|
//! | `Duration` | [`DurationValue`] |
//! | `Timestamp` | [`chrono::DateTime<Utc>`](chrono::DateTime) |
//! | `Struct` | [`serde_json::Map`] |
//! | `Value` | [`serde_json::Value`] |
//! | `ListValue` | `Vec<serde_json::Value>` |
//! | `Any` | [`AnyValue`] |
//! | `FieldMask` | `Vec<String>` of paths |
//!
//! Adapters are stateless. The JSON codec selects them by message type.

mod any;
mod duration;
mod field_mask;
mod structs;
mod timestamp;

pub use any::{AnyType, AnyValue};
pub use duration::{DurationType, DurationValue, MAX_DURATION_SECONDS};
pub use field_mask::FieldMaskType;
pub(crate) use field_mask::{paths_from_json, paths_to_json};
pub use structs::{ListValueType, StructType, ValueType};
pub use timestamp::{
    format_rfc3339, from_datetime, parse_rfc3339, to_datetime, TimestampType,
    MAX_TIMESTAMP_SECONDS, MIN_TIMESTAMP_SECONDS,
};

use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{MessageType, ScalarKind, SchemaPool};

/// The `google.protobuf` types with dedicated handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownType {
    /// `google.protobuf.Any`
    Any,
    /// `google.protobuf.Duration`
    Duration,
    /// `google.protobuf.Timestamp`
    Timestamp,
    /// `google.protobuf.Struct`
    Struct,
    /// `google.protobuf.Value`
    Value,
    /// `google.protobuf.ListValue`
    ListValue,
    /// `google.protobuf.FieldMask`
    FieldMask,
    /// `google.protobuf.Empty`
    Empty,
    /// `google.protobuf.DoubleValue`
    DoubleValue,
    /// `google.protobuf.FloatValue`
    FloatValue,
    /// `google.protobuf.Int64Value`
    Int64Value,
    /// `google.protobuf.UInt64Value`
    UInt64Value,
    /// `google.protobuf.Int32Value`
    Int32Value,
    /// `google.protobuf.UInt32Value`
    UInt32Value,
    /// `google.protobuf.BoolValue`
    BoolValue,
    /// `google.protobuf.StringValue`
    StringValue,
    /// `google.protobuf.BytesValue`
    BytesValue,
}

const ALL: [WellKnownType; 17] = [
    WellKnownType::Any,
    WellKnownType::Duration,
    WellKnownType::Timestamp,
    WellKnownType::Struct,
    WellKnownType::Value,
    WellKnownType::ListValue,
    WellKnownType::FieldMask,
    WellKnownType::Empty,
    WellKnownType::DoubleValue,
    WellKnownType::FloatValue,
    WellKnownType::Int64Value,
    WellKnownType::UInt64Value,
    WellKnownType::Int32Value,
    WellKnownType::UInt32Value,
    WellKnownType::BoolValue,
    WellKnownType::StringValue,
    WellKnownType::BytesValue,
];

impl WellKnownType {
    /// Fully-qualified message name
    pub fn full_name(&self) -> &'static str {
        match self {
            WellKnownType::Any => "google.protobuf.Any",
            WellKnownType::Duration => "google.protobuf.Duration",
            WellKnownType::Timestamp => "google.protobuf.Timestamp",
            WellKnownType::Struct => "google.protobuf.Struct",
            WellKnownType::Value => "google.protobuf.Value",
            WellKnownType::ListValue => "google.protobuf.ListValue",
            WellKnownType::FieldMask => "google.protobuf.FieldMask",
            WellKnownType::Empty => "google.protobuf.Empty",
            WellKnownType::DoubleValue => "google.protobuf.DoubleValue",
            WellKnownType::FloatValue => "google.protobuf.FloatValue",
            WellKnownType::Int64Value => "google.protobuf.Int64Value",
            WellKnownType::UInt64Value => "google.protobuf.UInt64Value",
            WellKnownType::Int32Value => "google.protobuf.Int32Value",
            WellKnownType::UInt32Value => "google.protobuf.UInt32Value",
            WellKnownType::BoolValue => "google.protobuf.BoolValue",
            WellKnownType::StringValue => "google.protobuf.StringValue",
            WellKnownType::BytesValue => "google.protobuf.BytesValue",
        }
    }

    /// Looks up a well-known type by fully-qualified name
    pub fn from_full_name(name: &str) -> Option<Self> {
        ALL.iter().copied().find(|wkt| wkt.full_name() == name)
    }

    /// Scalar held by a wrapper type's `value` field
    pub fn wrapped_kind(&self) -> Option<ScalarKind> {
        match self {
            WellKnownType::DoubleValue => Some(ScalarKind::Double),
            WellKnownType::FloatValue => Some(ScalarKind::Float),
            WellKnownType::Int64Value => Some(ScalarKind::Int64),
            WellKnownType::UInt64Value => Some(ScalarKind::Uint64),
            WellKnownType::Int32Value => Some(ScalarKind::Int32),
            WellKnownType::UInt32Value => Some(ScalarKind::Uint32),
            WellKnownType::BoolValue => Some(ScalarKind::Bool),
            WellKnownType::StringValue => Some(ScalarKind::String),
            WellKnownType::BytesValue => Some(ScalarKind::Bytes),
            _ => None,
        }
    }
}

/// Bidirectional mapping between a well-known message and a native value
pub trait WellKnownAdapter {
    /// The native value
    type Native;

    /// Which well-known type this adapter handles
    const TYPE: WellKnownType;

    /// Builds the message from a native value
    fn from_native(pool: &SchemaPool, native: &Self::Native) -> Result<DynamicMessage>;

    /// Reads the native value out of a message
    fn to_native(message: &DynamicMessage) -> Result<Self::Native>;

    /// The adapted message type in `pool`
    fn message_type(pool: &SchemaPool) -> Result<MessageType> {
        let name = Self::TYPE.full_name();
        pool.get_message(name)
            .ok_or_else(|| Error::invalid_schema(name, "not registered in the schema pool"))
    }
}

/// Rejects a message that is not of the adapter's type
pub(crate) fn expect_type(message: &DynamicMessage, wkt: WellKnownType) -> Result<()> {
    if message.message_type().well_known() == Some(wkt) {
        Ok(())
    } else {
        Err(Error::validation(
            message.message_type().full_name(),
            format!("expected {}", wkt.full_name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_full_name() {
        for wkt in ALL {
            assert_eq!(WellKnownType::from_full_name(wkt.full_name()), Some(wkt));
        }
        assert_eq!(WellKnownType::from_full_name("google.protobuf.Nope"), None);
        assert_eq!(WellKnownType::BoolValue.wrapped_kind(), Some(ScalarKind::Bool));
        assert_eq!(WellKnownType::Any.wrapped_kind(), None);
    }

    #[test]
    fn test_every_type_in_pool() {
        let pool = SchemaPool::well_known().unwrap();
        for wkt in ALL {
            let ty = pool.get_message(wkt.full_name()).unwrap();
            assert_eq!(ty.well_known(), Some(wkt));
        }
    }
}
