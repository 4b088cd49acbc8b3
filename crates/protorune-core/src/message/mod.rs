//! Dynamic messages.
//!
//! A [`DynamicMessage`] holds one slot per declared field of its
//! [`MessageType`], a presence side table for oneof groups and `optional`
//! fields, and the unknown fields met while decoding.
//!
//! ## Ownership
//!
//! Embedded messages are owned by the field that holds them. [`Clone`] is a
//! shallow snapshot: byte buffers are shared with the original.
//! [`DynamicMessage::deep_clone`] copies them.

mod presence;
mod unknown;

pub(crate) use presence::Presence;
pub use unknown::{UnknownField, UnknownFields};

use crate::error::{Error, Result};
use crate::json::{self, JsonParseOptions, JsonPrintOptions};
use crate::schema::{Cardinality, Kind, MessageType};
use crate::validate;
use crate::value::Value;
use crate::wire::{self, DecodeOptions};
use bytes::{BufMut, Bytes};
use std::borrow::Cow;
use std::fmt;

/// A message whose layout is described at runtime by a [`MessageType`]
#[derive(Clone)]
pub struct DynamicMessage {
    ty: MessageType,
    fields: Vec<Option<Value>>,
    presence: Presence,
    unknown: UnknownFields,
}

impl DynamicMessage {
    /// Creates a message with every field at its default
    pub fn new(ty: MessageType) -> Self {
        Self {
            fields: vec![None; ty.field_count()],
            presence: Presence::new(ty.oneof_count()),
            unknown: UnknownFields::default(),
            ty,
        }
    }

    /// Returns the type of this message
    pub fn message_type(&self) -> &MessageType {
        &self.ty
    }

    fn field_index(&self, name: &str) -> Result<usize> {
        self.ty
            .get_field_by_name(name)
            .map(|field| field.index())
            .ok_or_else(|| Error::no_such_field(self.ty.full_name(), name))
    }

    /// Reads a field; unset fields and inactive oneof members read as default
    pub fn get(&self, name: &str) -> Result<Cow<'_, Value>> {
        let index = self.field_index(name)?;
        Ok(self.get_by_index(index))
    }

    pub(crate) fn get_by_index(&self, index: usize) -> Cow<'_, Value> {
        match &self.fields[index] {
            Some(value) if self.is_slot_active(index) => Cow::Borrowed(value),
            _ => Cow::Owned(self.ty.field(index).default_value()),
        }
    }

    /// Stored value of a field, without falling back to the default
    pub(crate) fn slot(&self, index: usize) -> Option<&Value> {
        if self.is_slot_active(index) {
            self.fields[index].as_ref()
        } else {
            None
        }
    }

    fn is_slot_active(&self, index: usize) -> bool {
        match self.ty.field(index).oneof_index() {
            Some(group) => self.presence.active(group) == Some(index),
            None => true,
        }
    }

    /// Marks a field as the active member of its group, dropping the
    /// stored value of the previously active sibling
    fn activate(&mut self, index: usize) {
        if let Some(group) = self.ty.field(index).oneof_index() {
            if let Some(previous) = self.presence.mark(group, index) {
                self.fields[previous] = None;
            }
        }
    }

    /// Stores an already type-checked value and marks it set
    pub(crate) fn store(&mut self, index: usize, value: Value) {
        self.activate(index);
        self.fields[index] = Some(value);
    }

    /// Mutable slot of a field, initialized to its default and marked set
    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Value {
        self.activate(index);
        let ty = &self.ty;
        self.fields[index].get_or_insert_with(|| ty.field(index).default_value())
    }

    /// Mutable access to a singular message field, creating it if unset
    pub fn get_message_mut(&mut self, name: &str) -> Result<&mut DynamicMessage> {
        let index = self.field_index(name)?;
        let field = self.ty.field(index);
        if !field.is_message() || field.is_list() || field.is_map() {
            return Err(Error::validation(name, "not a singular message field"));
        }
        self.slot_mut(index)
            .as_message_mut()
            .ok_or_else(|| Error::validation(name, "slot does not hold a message"))
    }

    /// Assigns a wide integer to an integer or enum field, checking its range
    pub fn set_int(&mut self, name: &str, value: i128) -> Result<()> {
        let index = self.field_index(name)?;
        let field = self.ty.field(index);
        if field.is_list() || field.is_map() {
            return Err(Error::validation(name, "not a singular field"));
        }
        let value = validate::int_value(name, &field.kind(), value)?;
        self.store(index, value);
        Ok(())
    }

    fn check_value(&self, index: usize, value: Value) -> Result<Value> {
        let field = self.ty.field(index);
        let kind = field.kind();
        match field.cardinality() {
            Cardinality::Repeated => match value {
                Value::List(items) => items
                    .into_iter()
                    .map(|item| coerce_element(field.name(), &kind, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(Error::validation(
                    field.name(),
                    format!("expected list, got {}", other.variant_name()),
                )),
            },
            Cardinality::Map => {
                let Value::Map(entries) = value else {
                    return Err(Error::validation(field.name(), "expected map"));
                };
                let key_kind = field
                    .map_key()
                    .ok_or_else(|| Error::validation(field.name(), "map without key type"))?;
                entries
                    .into_iter()
                    .map(|(key, item)| {
                        if !key.is_valid_for(key_kind) {
                            return Err(Error::validation(
                                field.name(),
                                format!("map key '{}' is not a {}", key, key_kind),
                            ));
                        }
                        Ok((key, coerce_element(field.name(), &kind, item)?))
                    })
                    .collect::<Result<_>>()
                    .map(Value::Map)
            }
            Cardinality::Singular | Cardinality::Optional => {
                coerce_element(field.name(), &kind, value)
            }
        }
    }

    /// Whether a field counts as set: explicitly set for fields with
    /// presence, non-default otherwise
    pub fn is_set(&self, name: &str) -> Result<bool> {
        let index = self.field_index(name)?;
        Ok(self.has_index(index))
    }

    pub(crate) fn has_index(&self, index: usize) -> bool {
        let field = self.ty.field(index);
        if let Some(group) = field.oneof_index() {
            return self.presence.active(group) == Some(index);
        }
        match (&self.fields[index], field.cardinality()) {
            (None, _) => false,
            (Some(_), Cardinality::Singular) if field.is_message() => true,
            (Some(value), _) => !value.is_default(),
        }
    }

    /// Index of the active member of a oneof group
    pub(crate) fn active_member(&self, group: usize) -> Option<usize> {
        self.presence.active(group)
    }

    /// Whether no field is set; unknown fields are not considered
    pub fn is_empty(&self) -> bool {
        (0..self.fields.len()).all(|index| !self.has_index(index))
    }

    /// Removes a field's value and hands it to the caller
    pub fn detach(&mut self, name: &str) -> Result<Option<Value>> {
        let index = self.field_index(name)?;
        let value = if self.is_slot_active(index) {
            self.fields[index].take()
        } else {
            None
        };
        if let Some(group) = self.ty.field(index).oneof_index() {
            self.presence.unmark(group, index);
        }
        Ok(value)
    }

    /// Fields found on the wire that the type does not declare
    pub fn unknown_fields(&self) -> &UnknownFields {
        &self.unknown
    }

    /// Mutable access to the unknown fields
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFields {
        &mut self.unknown
    }

    /// Copy that shares no byte buffers with `self`
    pub fn deep_clone(&self) -> DynamicMessage {
        DynamicMessage {
            ty: self.ty.clone(),
            fields: self
                .fields
                .iter()
                .map(|slot| slot.as_ref().map(Value::deep_clone))
                .collect(),
            presence: self.presence.clone(),
            unknown: self.unknown.deep_clone(),
        }
    }

    /// Encodes the message into a new buffer
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Encodes the message into `buf`
    pub fn encode(&self, buf: &mut impl BufMut) {
        wire::encode_message(self, buf);
    }

    /// Decodes a message of type `ty`
    pub fn decode(ty: MessageType, data: &[u8]) -> Result<Self> {
        Self::decode_with_options(ty, data, &DecodeOptions::default())
    }

    /// Decodes a message of type `ty` with explicit options
    pub fn decode_with_options(
        ty: MessageType,
        data: &[u8],
        options: &DecodeOptions,
    ) -> Result<Self> {
        let mut message = Self::new(ty);
        message.merge_with_options(data, options)?;
        Ok(message)
    }

    /// Merges encoded fields into this message
    ///
    /// Scalars are overwritten, embedded messages merged and repeated
    /// fields appended.
    pub fn merge(&mut self, data: &[u8]) -> Result<()> {
        self.merge_with_options(data, &DecodeOptions::default())
    }

    /// Merges encoded fields into this message with explicit options
    pub fn merge_with_options(&mut self, data: &[u8], options: &DecodeOptions) -> Result<()> {
        wire::merge_message(self, Bytes::copy_from_slice(data), 0, options)
    }

    /// Prints the message as proto3 JSON
    pub fn to_json(&self, options: &JsonPrintOptions) -> Result<String> {
        json::to_string(self, options)
    }

    /// Converts the message to a JSON tree
    pub fn to_json_value(&self, options: &JsonPrintOptions) -> Result<serde_json::Value> {
        json::to_value(self, options)
    }

    /// Parses proto3 JSON text into a message of type `ty`
    pub fn from_json(ty: MessageType, text: &str, options: &JsonParseOptions) -> Result<Self> {
        json::from_str(ty, text, options)
    }

    /// Builds a message of type `ty` from a JSON tree
    pub fn from_json_value(
        ty: MessageType,
        value: &serde_json::Value,
        options: &JsonParseOptions,
    ) -> Result<Self> {
        json::from_value(ty, value, options)
    }
}

fn describe(kind: &Kind) -> &str {
    match kind {
        Kind::Scalar(scalar) => scalar.as_str(),
        Kind::Enum(ty) => ty.full_name(),
        Kind::Message(ty) => ty.full_name(),
    }
}

fn coerce_element(field: &str, kind: &Kind, value: Value) -> Result<Value> {
    match (kind, value) {
        (Kind::Enum(_), Value::I32(number)) => Ok(Value::EnumNumber(number)),
        (kind, value) if value.is_valid_for(kind) => Ok(value),
        (kind, value) => Err(Error::validation(
            field,
            format!("expected {}, got {}", describe(kind), value.variant_name()),
        )),
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        (0..self.fields.len()).all(|index| {
            let field = self.ty.field(index);
            if field.has_presence() {
                let set = self.has_index(index);
                if set != other.has_index(index) {
                    return false;
                }
                // Unset message fields never build a default to compare
                if !set {
                    return true;
                }
                if field.is_message() {
                    return self.slot(index) == other.slot(index);
                }
            }
            self.get_by_index(index) == other.get_by_index(index)
        })
    }
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.full_name());
        for field in self.ty.fields() {
            if self.has_index(field.index()) {
                s.field(field.name(), &self.get_by_index(field.index()));
            }
        }
        if !self.unknown.is_empty() {
            s.field("unknown_fields", &self.unknown);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, MessageDef, ScalarKind, SchemaPool, TypeRef};
    use crate::value::MapKey;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn pool() -> SchemaPool {
        SchemaPool::builder()
            .message(
                MessageDef::new("test.Item")
                    .field(FieldDef::scalar("id", 1, ScalarKind::Int32))
                    .field(FieldDef::scalar("label", 2, ScalarKind::String))
                    .field(FieldDef::message("child", 3, "test.Item"))
                    .field(FieldDef::scalar("tags", 4, ScalarKind::String).repeated())
                    .field(FieldDef::map(
                        "counts",
                        5,
                        ScalarKind::String,
                        TypeRef::Scalar(ScalarKind::Int64),
                    ))
                    .field(FieldDef::scalar("blob", 6, ScalarKind::Bytes))
                    .field(FieldDef::scalar("small", 7, ScalarKind::Uint32)),
            )
            .build()
            .unwrap()
    }

    fn item() -> DynamicMessage {
        pool().get_message("test.Item").unwrap().new_message()
    }

    #[test]
    fn test_get_defaults() {
        let msg = item();
        assert_eq!(*msg.get("id").unwrap(), Value::I32(0));
        assert_eq!(*msg.get("tags").unwrap(), Value::List(vec![]));
        assert!(msg.get("missing").is_err());
        assert!(msg.is_empty());
    }

    #[test]
    fn test_set_type_checked() {
        let mut msg = item();
        msg.set("id", 5).unwrap();
        msg.set("label", "x").unwrap();
        assert!(msg.set("id", "nope").is_err());
        assert!(msg.set("tags", Value::List(vec![Value::I32(1)])).is_err());
        msg.set("tags", Value::List(vec!["a".into(), "b".into()])).unwrap();

        let mut counts = BTreeMap::new();
        counts.insert(MapKey::from("k"), Value::I64(3));
        msg.set("counts", Value::Map(counts)).unwrap();

        let mut bad = BTreeMap::new();
        bad.insert(MapKey::I32(1), Value::I64(3));
        assert!(msg.set("counts", Value::Map(bad)).is_err());
        assert!(!msg.is_empty());
    }

    #[test]
    fn test_set_int_range() {
        let mut msg = item();
        msg.set_int("small", 4_294_967_295).unwrap();
        assert_eq!(*msg.get("small").unwrap(), Value::U32(u32::MAX));
        assert!(msg.set_int("small", -1).is_err());
        assert!(msg.set_int("id", 2_147_483_648).is_err());
    }

    #[test]
    fn test_nested_message_mut() {
        let mut msg = item();
        assert!(!msg.is_set("child").unwrap());
        msg.get_message_mut("child").unwrap().set("id", 7).unwrap();
        assert!(msg.is_set("child").unwrap());
        let child = msg.get("child").unwrap();
        assert_eq!(*child.as_message().unwrap().get("id").unwrap(), Value::I32(7));
        assert!(msg.get_message_mut("id").is_err());
    }

    #[test]
    fn test_empty_child_is_still_set() {
        let mut msg = item();
        msg.get_message_mut("child").unwrap();
        assert!(msg.is_set("child").unwrap());
        assert!(!msg.is_empty());
        assert_ne!(msg, item());
    }

    #[test]
    fn test_recursive_equality() {
        assert_eq!(item(), item());

        let mut a = item();
        a.get_message_mut("child").unwrap().set("id", 2).unwrap();
        let mut b = item();
        b.get_message_mut("child").unwrap().set("id", 2).unwrap();
        assert_eq!(a, b);

        b.get_message_mut("child")
            .unwrap()
            .get_message_mut("child")
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_detach() {
        let mut msg = item();
        msg.get_message_mut("child").unwrap().set("id", 1).unwrap();
        let detached = msg.detach("child").unwrap().unwrap();
        assert_eq!(*detached.as_message().unwrap().get("id").unwrap(), Value::I32(1));
        assert!(!msg.is_set("child").unwrap());
        assert_eq!(msg.detach("child").unwrap(), None);
    }

    #[test]
    fn test_equality_ignores_unknown_fields() {
        let mut a = item();
        a.set("id", 3).unwrap();
        let mut b = a.clone();
        b.unknown_fields_mut().push(UnknownField::new(
            99,
            crate::wire::WireKind::Varint,
            Bytes::from_static(&[1]),
        ));
        assert_eq!(a, b);
        b.set("id", 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_snapshot_and_deep_clone() {
        let mut msg = item();
        msg.set("blob", Bytes::from_static(b"payload")).unwrap();
        let snapshot = msg.clone();
        let copy = msg.deep_clone();
        assert_eq!(snapshot, copy);

        let ptr = |m: &DynamicMessage| m.slot(5).and_then(Value::as_bytes).unwrap().as_ptr();
        assert_eq!(ptr(&msg), ptr(&snapshot));
        assert_ne!(ptr(&msg), ptr(&copy));

        msg.set("blob", Bytes::from_static(b"other")).unwrap();
        assert_eq!(*snapshot.get("blob").unwrap(), Value::from(b"payload".to_vec()));
    }
}
