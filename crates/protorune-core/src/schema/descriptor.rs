//! Building a [`SchemaPool`] from compiled `.proto` descriptors.
//!
//! A `FileDescriptorSet` (as written by `protoc --descriptor_set_out`) is
//! resolved with prost-reflect and then translated into field specs. Map
//! entry messages are folded into their map fields, and types the pool
//! already knows (the well-known types) are taken from the built-in
//! definitions.

use super::{EnumDef, FieldDef, MessageDef, ScalarKind, SchemaPool, SchemaPoolBuilder, TypeRef};
use crate::error::{Error, Result};
use prost::Message;
use prost_reflect::{DescriptorPool, FieldDescriptor, Kind as ReflectKind, MessageDescriptor};
use prost_types::FileDescriptorSet;
use tracing::{debug, warn};

impl SchemaPool {
    /// Decodes a serialized `FileDescriptorSet` and builds a pool from it
    pub fn from_file_descriptor_set(bytes: &[u8]) -> Result<SchemaPool> {
        let set = FileDescriptorSet::decode(bytes)?;
        let descriptors = DescriptorPool::from_file_descriptor_set(set)
            .map_err(|e| Error::descriptor_build(e.to_string()))?;
        Self::from_descriptor_pool(&descriptors)
    }

    /// Builds a pool from every message and enum of a resolved descriptor pool
    pub fn from_descriptor_pool(descriptors: &DescriptorPool) -> Result<SchemaPool> {
        let mut builder = SchemaPoolBuilder::new();

        for descriptor in descriptors.all_enums() {
            if builder.contains(descriptor.full_name()) {
                continue;
            }
            let def = descriptor
                .values()
                .fold(EnumDef::new(descriptor.full_name()), |def, value| {
                    def.value(value.name(), value.number())
                });
            builder = builder.enumeration(def);
        }

        let mut count = 0usize;
        for descriptor in descriptors.all_messages() {
            if descriptor.is_map_entry() || builder.contains(descriptor.full_name()) {
                continue;
            }
            builder = builder.message(message_def(&descriptor)?);
            count += 1;
        }
        debug!("Translated {} messages from the descriptor set", count);

        builder.build()
    }
}

fn message_def(descriptor: &MessageDescriptor) -> Result<MessageDef> {
    let mut def = MessageDef::new(descriptor.full_name());
    for field in descriptor.fields() {
        if field.is_group() {
            // Group-encoded fields are kept as unknown fields on the wire
            warn!(
                "Skipping group field '{}' in {}",
                field.name(),
                descriptor.full_name()
            );
            continue;
        }
        def = def.field(field_def(&field)?);
    }
    Ok(def)
}

fn field_def(field: &FieldDescriptor) -> Result<FieldDef> {
    let name = field.name();
    let number = field.number();

    let def = if field.is_map() {
        let ReflectKind::Message(entry) = field.kind() else {
            return Err(Error::descriptor_build(format!(
                "map field '{}' is not backed by an entry message",
                field.full_name()
            )));
        };
        let key = match type_ref(&entry.map_entry_key_field().kind()) {
            TypeRef::Scalar(kind) => kind,
            _ => {
                return Err(Error::descriptor_build(format!(
                    "map field '{}' has a non-scalar key",
                    field.full_name()
                )))
            }
        };
        FieldDef::map(name, number, key, type_ref(&entry.map_entry_value_field().kind()))
    } else {
        let def = FieldDef::new(name, number, type_ref(&field.kind()));
        if field.is_list() {
            def.repeated().packed(field.is_packed())
        } else {
            match field.containing_oneof() {
                Some(oneof) if is_synthetic(field) => {
                    debug!("Field '{}' is optional via oneof '{}'", name, oneof.name());
                    def.optional()
                }
                Some(oneof) => def.oneof(oneof.name()),
                None if field.supports_presence() && field.kind().as_message().is_none() => {
                    def.optional()
                }
                None => def,
            }
        }
    };
    Ok(def.json_name(field.json_name()))
}

fn is_synthetic(field: &FieldDescriptor) -> bool {
    field.field_descriptor_proto().proto3_optional()
}

fn type_ref(kind: &ReflectKind) -> TypeRef {
    let scalar = match kind {
        ReflectKind::Message(message) => return TypeRef::Message(message.full_name().to_string()),
        ReflectKind::Enum(enumeration) => return TypeRef::Enum(enumeration.full_name().to_string()),
        ReflectKind::Double => ScalarKind::Double,
        ReflectKind::Float => ScalarKind::Float,
        ReflectKind::Int32 => ScalarKind::Int32,
        ReflectKind::Int64 => ScalarKind::Int64,
        ReflectKind::Uint32 => ScalarKind::Uint32,
        ReflectKind::Uint64 => ScalarKind::Uint64,
        ReflectKind::Sint32 => ScalarKind::Sint32,
        ReflectKind::Sint64 => ScalarKind::Sint64,
        ReflectKind::Fixed32 => ScalarKind::Fixed32,
        ReflectKind::Fixed64 => ScalarKind::Fixed64,
        ReflectKind::Sfixed32 => ScalarKind::Sfixed32,
        ReflectKind::Sfixed64 => ScalarKind::Sfixed64,
        ReflectKind::Bool => ScalarKind::Bool,
        ReflectKind::String => ScalarKind::String,
        ReflectKind::Bytes => ScalarKind::Bytes,
    };
    TypeRef::Scalar(scalar)
}
