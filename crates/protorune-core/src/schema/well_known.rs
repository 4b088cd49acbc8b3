//! Schemas of the `google.protobuf` well-known types.

use super::{EnumDef, FieldDef, MessageDef, ScalarKind, TypeRef};

const WRAPPERS: [(&str, ScalarKind); 9] = [
    ("google.protobuf.DoubleValue", ScalarKind::Double),
    ("google.protobuf.FloatValue", ScalarKind::Float),
    ("google.protobuf.Int64Value", ScalarKind::Int64),
    ("google.protobuf.UInt64Value", ScalarKind::Uint64),
    ("google.protobuf.Int32Value", ScalarKind::Int32),
    ("google.protobuf.UInt32Value", ScalarKind::Uint32),
    ("google.protobuf.BoolValue", ScalarKind::Bool),
    ("google.protobuf.StringValue", ScalarKind::String),
    ("google.protobuf.BytesValue", ScalarKind::Bytes),
];

pub(super) fn definitions() -> (Vec<MessageDef>, Vec<EnumDef>) {
    let mut messages = vec![
        MessageDef::new("google.protobuf.Duration")
            .field(FieldDef::scalar("seconds", 1, ScalarKind::Int64))
            .field(FieldDef::scalar("nanos", 2, ScalarKind::Int32)),
        MessageDef::new("google.protobuf.Timestamp")
            .field(FieldDef::scalar("seconds", 1, ScalarKind::Int64))
            .field(FieldDef::scalar("nanos", 2, ScalarKind::Int32)),
        MessageDef::new("google.protobuf.Struct").field(FieldDef::map(
            "fields",
            1,
            ScalarKind::String,
            TypeRef::Message("google.protobuf.Value".into()),
        )),
        MessageDef::new("google.protobuf.Value")
            .field(
                FieldDef::enumeration("null_value", 1, "google.protobuf.NullValue").oneof("kind"),
            )
            .field(FieldDef::scalar("number_value", 2, ScalarKind::Double).oneof("kind"))
            .field(FieldDef::scalar("string_value", 3, ScalarKind::String).oneof("kind"))
            .field(FieldDef::scalar("bool_value", 4, ScalarKind::Bool).oneof("kind"))
            .field(FieldDef::message("struct_value", 5, "google.protobuf.Struct").oneof("kind"))
            .field(
                FieldDef::message("list_value", 6, "google.protobuf.ListValue").oneof("kind"),
            ),
        MessageDef::new("google.protobuf.ListValue")
            .field(FieldDef::message("values", 1, "google.protobuf.Value").repeated()),
        MessageDef::new("google.protobuf.Any")
            .field(FieldDef::scalar("type_url", 1, ScalarKind::String))
            .field(FieldDef::scalar("value", 2, ScalarKind::Bytes)),
        MessageDef::new("google.protobuf.Empty"),
        MessageDef::new("google.protobuf.FieldMask")
            .field(FieldDef::scalar("paths", 1, ScalarKind::String).repeated()),
    ];

    messages.extend(
        WRAPPERS
            .iter()
            .map(|(name, kind)| MessageDef::new(*name).field(FieldDef::scalar("value", 1, *kind))),
    );

    let enums = vec![EnumDef::new("google.protobuf.NullValue").value("NULL_VALUE", 0)];

    (messages, enums)
}

