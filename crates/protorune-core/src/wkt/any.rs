//! `google.protobuf.Any`.

use super::{expect_type, WellKnownAdapter, WellKnownType};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::{MessageType, SchemaPool};
use bytes::Bytes;

/// An embedded message as (type URL, encoded bytes)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnyValue {
    /// `type.googleapis.com/` followed by the full type name
    pub type_url: String,
    /// The embedded message, encoded
    pub value: Bytes,
}

impl AnyValue {
    /// Encodes `message` and records its type URL
    pub fn pack(message: &DynamicMessage) -> Self {
        Self {
            type_url: message.message_type().type_url(),
            value: Bytes::from(message.encode_to_vec()),
        }
    }

    /// Full type name: everything after the last `/` of the URL
    pub fn type_name(&self) -> &str {
        self.type_url.rsplit('/').next().unwrap_or(&self.type_url)
    }

    /// Whether the embedded message is of type `ty`
    pub fn is(&self, ty: &MessageType) -> bool {
        self.type_name() == ty.full_name()
    }

    /// Decodes the embedded message as `ty`
    pub fn unpack(&self, ty: &MessageType) -> Result<DynamicMessage> {
        if !self.is(ty) {
            return Err(Error::validation(
                "google.protobuf.Any",
                format!("holds '{}', not '{}'", self.type_name(), ty.full_name()),
            ));
        }
        DynamicMessage::decode(ty.clone(), &self.value)
    }
}

/// Adapter between `google.protobuf.Any` and [`AnyValue`]
#[derive(Debug, Clone, Copy)]
pub struct AnyType;

impl WellKnownAdapter for AnyType {
    type Native = AnyValue;
    const TYPE: WellKnownType = WellKnownType::Any;

    fn from_native(pool: &SchemaPool, native: &AnyValue) -> Result<DynamicMessage> {
        let mut message = Self::message_type(pool)?.new_message();
        message.set("type_url", native.type_url.as_str())?;
        message.set("value", native.value.clone())?;
        Ok(message)
    }

    fn to_native(message: &DynamicMessage) -> Result<AnyValue> {
        expect_type(message, Self::TYPE)?;
        Ok(AnyValue {
            type_url: message.get("type_url")?.as_str().unwrap_or_default().to_string(),
            value: message.get("value")?.as_bytes().cloned().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, MessageDef, ScalarKind};
    use crate::value::Value;

    #[test]
    fn test_pack_unpack() {
        let pool = SchemaPool::builder()
            .message(
                MessageDef::new("test.Ping").field(FieldDef::scalar("seq", 1, ScalarKind::Uint32)),
            )
            .build()
            .unwrap();
        let ping = pool.get_message("test.Ping").unwrap();
        let mut message = ping.new_message();
        message.set("seq", 9u32).unwrap();

        let any = AnyValue::pack(&message);
        assert_eq!(any.type_url, "type.googleapis.com/test.Ping");
        assert_eq!(any.type_name(), "test.Ping");
        assert_eq!(any.unpack(&ping).unwrap(), message);

        let wrapped = AnyType::from_native(&pool, &any).unwrap();
        assert_eq!(*wrapped.get("value").unwrap(), Value::from(vec![0x08u8, 0x09]));
        assert_eq!(AnyType::to_native(&wrapped).unwrap(), any);

        let other = pool.get_message("google.protobuf.Empty").unwrap();
        assert!(any.unpack(&other).is_err());
    }
}
