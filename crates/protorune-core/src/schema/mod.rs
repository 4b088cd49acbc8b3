//! Field-spec model.
//!
//! Message and enum layouts are described with plain definitions
//! ([`MessageDef`], [`FieldDef`], [`EnumDef`]) that reference other types by
//! fully-qualified name. A [`SchemaPoolBuilder`] resolves those names once and
//! produces an immutable [`SchemaPool`].
//!
//! ## Handles
//!
//! [`MessageType`] and [`EnumType`] are cheap handles (pool + index). Field
//! kinds are stored as indices inside the pool, so a message type may contain
//! a field of its own type, or two types may refer to each other, without
//! creating reference cycles.
//!
//! Every pool contains the `google.protobuf` well-known types.

pub mod descriptor;
mod well_known;

use crate::casing::{to_kebab_case, to_lower_camel_case, to_upper_camel_case};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::value::{MapKey, Value};
use crate::wire::WireKind;
use crate::wkt::WellKnownType;
use crate::MAX_FIELD_NUMBER;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Prefix used when building `Any` type URLs
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Scalar field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 64-bit IEEE float
    Double,
    /// 32-bit IEEE float
    Float,
    /// Signed 64-bit, two's complement varint
    Int64,
    /// Unsigned 64-bit varint
    Uint64,
    /// Signed 32-bit, two's complement varint
    Int32,
    /// Unsigned 64-bit, little-endian fixed width
    Fixed64,
    /// Unsigned 32-bit, little-endian fixed width
    Fixed32,
    /// Boolean varint
    Bool,
    /// UTF-8 text
    String,
    /// Arbitrary bytes
    Bytes,
    /// Unsigned 32-bit varint
    Uint32,
    /// Signed 32-bit, little-endian fixed width
    Sfixed32,
    /// Signed 64-bit, little-endian fixed width
    Sfixed64,
    /// Signed 32-bit, zigzag varint
    Sint32,
    /// Signed 64-bit, zigzag varint
    Sint64,
}

impl ScalarKind {
    /// Wire kind used for a single value of this type
    pub fn wire_kind(&self) -> WireKind {
        match self {
            ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::Uint32
            | ScalarKind::Uint64
            | ScalarKind::Sint32
            | ScalarKind::Sint64
            | ScalarKind::Bool => WireKind::Varint,
            ScalarKind::Fixed64 | ScalarKind::Sfixed64 | ScalarKind::Double => WireKind::Fixed64,
            ScalarKind::Fixed32 | ScalarKind::Sfixed32 | ScalarKind::Float => WireKind::Fixed32,
            ScalarKind::String | ScalarKind::Bytes => WireKind::LengthDelimited,
        }
    }

    /// Whether repeated values of this type may be packed
    pub fn is_packable(&self) -> bool {
        self.wire_kind() != WireKind::LengthDelimited
    }

    /// Whether this type may be used as a map key
    pub fn is_valid_map_key(&self) -> bool {
        !matches!(
            self,
            ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes
        )
    }

    /// Whether values of this type are printed as JSON strings
    pub fn is_64_bit_integer(&self) -> bool {
        matches!(
            self,
            ScalarKind::Int64
                | ScalarKind::Uint64
                | ScalarKind::Sint64
                | ScalarKind::Fixed64
                | ScalarKind::Sfixed64
        )
    }

    /// The `.proto` spelling of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Double => "double",
            ScalarKind::Float => "float",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Int32 => "int32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
        }
    }

    /// The type-default value
    pub fn default_value(&self) -> Value {
        match self {
            ScalarKind::Double => Value::F64(0.0),
            ScalarKind::Float => Value::F32(0.0),
            ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => Value::I64(0),
            ScalarKind::Uint64 | ScalarKind::Fixed64 => Value::U64(0),
            ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => Value::I32(0),
            ScalarKind::Uint32 | ScalarKind::Fixed32 => Value::U32(0),
            ScalarKind::Bool => Value::Bool(false),
            ScalarKind::String => Value::String(String::new()),
            ScalarKind::Bytes => Value::Bytes(Bytes::new()),
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many values a field holds and how presence is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// One value; scalars at their default are not serialized
    Singular,
    /// One value with an explicit "was set" flag
    Optional,
    /// A sequence of values
    Repeated,
    /// A key/value dictionary
    Map,
}

/// Reference to a field's type inside a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// A scalar type
    Scalar(ScalarKind),
    /// An enum, by fully-qualified name
    Enum(String),
    /// A message, by fully-qualified name
    Message(String),
}

/// Definition of a single field, as produced by a schema compiler
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    number: u32,
    ty: TypeRef,
    cardinality: Cardinality,
    map_key: Option<ScalarKind>,
    packed: Option<bool>,
    oneof: Option<String>,
    json_name: Option<String>,
}

impl FieldDef {
    /// Creates a singular field of the given type
    pub fn new(name: impl Into<String>, number: u32, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            number,
            ty,
            cardinality: Cardinality::Singular,
            map_key: None,
            packed: None,
            oneof: None,
            json_name: None,
        }
    }

    /// Creates a singular scalar field
    pub fn scalar(name: impl Into<String>, number: u32, kind: ScalarKind) -> Self {
        Self::new(name, number, TypeRef::Scalar(kind))
    }

    /// Creates a singular message field
    pub fn message(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, TypeRef::Message(type_name.into()))
    }

    /// Creates a singular enum field
    pub fn enumeration(
        name: impl Into<String>,
        number: u32,
        type_name: impl Into<String>,
    ) -> Self {
        Self::new(name, number, TypeRef::Enum(type_name.into()))
    }

    /// Creates a map field
    pub fn map(name: impl Into<String>, number: u32, key: ScalarKind, value: TypeRef) -> Self {
        let mut def = Self::new(name, number, value);
        def.cardinality = Cardinality::Map;
        def.map_key = Some(key);
        def
    }

    /// Marks the field as repeated
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Marks the field as having explicit presence (`optional`)
    pub fn optional(mut self) -> Self {
        self.cardinality = Cardinality::Optional;
        self
    }

    /// Places the field in a oneof group
    pub fn oneof(mut self, group: impl Into<String>) -> Self {
        self.oneof = Some(group.into());
        self
    }

    /// Overrides packing of a repeated scalar field
    pub fn packed(mut self, packed: bool) -> Self {
        self.packed = Some(packed);
        self
    }

    /// Overrides the JSON name (default: lowerCamelCase of the field name)
    pub fn json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }

    /// Returns the field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field number
    pub fn number(&self) -> u32 {
        self.number
    }
}

/// Definition of a message type
#[derive(Debug, Clone)]
pub struct MessageDef {
    full_name: String,
    fields: Vec<FieldDef>,
    oneofs: Vec<String>,
}

impl MessageDef {
    /// Creates an empty message definition
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: normalize_name(full_name.into()),
            fields: Vec::new(),
            oneofs: Vec::new(),
        }
    }

    /// Appends a field; declaration order is serialization order
    pub fn field(mut self, field: FieldDef) -> Self {
        if let Some(group) = &field.oneof {
            if !self.oneofs.contains(group) {
                self.oneofs.push(group.clone());
            }
        }
        self.fields.push(field);
        self
    }

    /// Returns the fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

/// Definition of an enum type
#[derive(Debug, Clone)]
pub struct EnumDef {
    full_name: String,
    values: Vec<(String, i32)>,
}

impl EnumDef {
    /// Creates an enum definition without values
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: normalize_name(full_name.into()),
            values: Vec::new(),
        }
    }

    /// Appends a named value
    pub fn value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push((name.into(), number));
        self
    }

    /// Returns the fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

fn normalize_name(name: String) -> String {
    match name.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindIndex {
    Scalar(ScalarKind),
    Enum(usize),
    Message(usize),
}

#[derive(Debug)]
struct FieldInner {
    name: String,
    json_name: String,
    number: u32,
    kind: KindIndex,
    cardinality: Cardinality,
    map_key: Option<ScalarKind>,
    packed: bool,
    oneof: Option<usize>,
}

#[derive(Debug)]
struct OneofInner {
    name: String,
    fields: Vec<usize>,
    synthetic: bool,
}

#[derive(Debug)]
struct MessageInner {
    full_name: String,
    fields: Vec<FieldInner>,
    oneofs: Vec<OneofInner>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    by_json_name: HashMap<String, usize>,
    well_known: Option<WellKnownType>,
}

#[derive(Debug)]
struct EnumInner {
    full_name: String,
    values: Vec<(String, i32)>,
    by_number: HashMap<i32, usize>,
    by_name: HashMap<String, usize>,
}

#[derive(Debug)]
struct PoolInner {
    messages: Vec<MessageInner>,
    enums: Vec<EnumInner>,
    message_names: HashMap<String, usize>,
    enum_names: HashMap<String, usize>,
}

/// Collects definitions and resolves them into a [`SchemaPool`]
#[derive(Debug, Clone)]
pub struct SchemaPoolBuilder {
    messages: Vec<MessageDef>,
    enums: Vec<EnumDef>,
}

impl Default for SchemaPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaPoolBuilder {
    /// Creates a builder pre-loaded with the well-known types
    pub fn new() -> Self {
        let (messages, enums) = well_known::definitions();
        Self { messages, enums }
    }

    /// Adds a message definition
    pub fn message(mut self, def: MessageDef) -> Self {
        self.messages.push(def);
        self
    }

    /// Adds an enum definition
    pub fn enumeration(mut self, def: EnumDef) -> Self {
        self.enums.push(def);
        self
    }

    /// Returns true if a message or enum with this name was already added
    pub fn contains(&self, full_name: &str) -> bool {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.messages.iter().any(|m| m.full_name == full_name)
            || self.enums.iter().any(|e| e.full_name == full_name)
    }

    /// Resolves every type reference and validates the definitions
    pub fn build(self) -> Result<SchemaPool> {
        let mut enum_names = HashMap::new();
        let mut enums = Vec::with_capacity(self.enums.len());
        for (index, def) in self.enums.into_iter().enumerate() {
            if enum_names.insert(def.full_name.clone(), index).is_some() {
                return Err(Error::invalid_schema(&def.full_name, "duplicate enum name"));
            }
            enums.push(build_enum(def)?);
        }

        let mut message_names = HashMap::new();
        for (index, def) in self.messages.iter().enumerate() {
            if message_names.insert(def.full_name.clone(), index).is_some()
                || enum_names.contains_key(&def.full_name)
            {
                return Err(Error::invalid_schema(&def.full_name, "duplicate type name"));
            }
        }

        let mut messages = Vec::with_capacity(self.messages.len());
        for def in self.messages {
            messages.push(build_message(def, &message_names, &enum_names)?);
        }

        debug!(
            "Built schema pool with {} messages and {} enums",
            messages.len(),
            enums.len()
        );

        Ok(SchemaPool {
            inner: Arc::new(PoolInner {
                messages,
                enums,
                message_names,
                enum_names,
            }),
        })
    }
}

fn build_enum(def: EnumDef) -> Result<EnumInner> {
    let mut by_number = HashMap::new();
    let mut by_name = HashMap::new();
    for (index, (name, number)) in def.values.iter().enumerate() {
        if by_name.insert(name.clone(), index).is_some() {
            return Err(Error::invalid_schema(
                &def.full_name,
                format!("duplicate enum value name '{}'", name),
            ));
        }
        // Aliases keep the first name for a number
        by_number.entry(*number).or_insert(index);
    }
    Ok(EnumInner {
        full_name: def.full_name,
        values: def.values,
        by_number,
        by_name,
    })
}

fn resolve_type(
    ty: &TypeRef,
    owner: &str,
    messages: &HashMap<String, usize>,
    enums: &HashMap<String, usize>,
) -> Result<KindIndex> {
    match ty {
        TypeRef::Scalar(kind) => Ok(KindIndex::Scalar(*kind)),
        TypeRef::Enum(name) => {
            let name = name.strip_prefix('.').unwrap_or(name);
            enums
                .get(name)
                .map(|&i| KindIndex::Enum(i))
                .ok_or_else(|| Error::invalid_schema(owner, format!("unknown enum type '{}'", name)))
        }
        TypeRef::Message(name) => {
            let name = name.strip_prefix('.').unwrap_or(name);
            messages.get(name).map(|&i| KindIndex::Message(i)).ok_or_else(|| {
                Error::invalid_schema(owner, format!("unknown message type '{}'", name))
            })
        }
    }
}

fn build_message(
    def: MessageDef,
    messages: &HashMap<String, usize>,
    enums: &HashMap<String, usize>,
) -> Result<MessageInner> {
    let owner = def.full_name.as_str();

    let mut oneofs: Vec<OneofInner> = def
        .oneofs
        .iter()
        .map(|name| OneofInner {
            name: name.clone(),
            fields: Vec::new(),
            synthetic: false,
        })
        .collect();

    let mut fields = Vec::with_capacity(def.fields.len());
    let mut by_number = HashMap::new();
    let mut by_name = HashMap::new();

    for (index, field) in def.fields.iter().enumerate() {
        if field.number == 0 || field.number > MAX_FIELD_NUMBER {
            return Err(Error::InvalidFieldNumber {
                number: field.number,
                max: MAX_FIELD_NUMBER,
            });
        }
        if by_number.insert(field.number, index).is_some() {
            return Err(Error::invalid_schema(
                owner,
                format!("duplicate field number {}", field.number),
            ));
        }
        if by_name.insert(field.name.clone(), index).is_some() {
            return Err(Error::invalid_schema(
                owner,
                format!("duplicate field name '{}'", field.name),
            ));
        }

        let kind = resolve_type(&field.ty, owner, messages, enums)?;

        if field.cardinality == Cardinality::Map {
            match field.map_key {
                Some(key) if key.is_valid_map_key() => {}
                _ => {
                    return Err(Error::invalid_schema(
                        owner,
                        format!("field '{}' has an invalid map key type", field.name),
                    ))
                }
            }
        }

        let oneof = match (&field.oneof, field.cardinality) {
            (Some(group), Cardinality::Singular) => {
                let group_index = oneofs
                    .iter()
                    .position(|o| &o.name == group)
                    .ok_or_else(|| {
                        Error::invalid_schema(owner, format!("unknown oneof '{}'", group))
                    })?;
                oneofs[group_index].fields.push(index);
                Some(group_index)
            }
            (Some(_), _) => {
                return Err(Error::invalid_schema(
                    owner,
                    format!("oneof member '{}' must be a singular field", field.name),
                ))
            }
            (None, Cardinality::Optional) => {
                oneofs.push(OneofInner {
                    name: format!("_{}", field.name),
                    fields: vec![index],
                    synthetic: true,
                });
                Some(oneofs.len() - 1)
            }
            (None, _) => None,
        };

        let packable = match kind {
            KindIndex::Scalar(s) => s.is_packable(),
            KindIndex::Enum(_) => true,
            KindIndex::Message(_) => false,
        };
        let packed = field.cardinality == Cardinality::Repeated
            && packable
            && field.packed.unwrap_or(true);

        fields.push(FieldInner {
            name: field.name.clone(),
            json_name: field
                .json_name
                .clone()
                .unwrap_or_else(|| to_lower_camel_case(&field.name)),
            number: field.number,
            kind,
            cardinality: field.cardinality,
            map_key: field.map_key,
            packed,
            oneof,
        });
    }

    if let Some(empty) = oneofs.iter().find(|o| o.fields.is_empty()) {
        return Err(Error::invalid_schema(
            owner,
            format!("oneof '{}' has no fields", empty.name),
        ));
    }

    // Exact spellings win over derived ones when two fields collide
    let mut by_json_name = HashMap::new();
    for (index, field) in fields.iter().enumerate() {
        by_json_name.insert(field.name.clone(), index);
        by_json_name.entry(field.json_name.clone()).or_insert(index);
    }
    for (index, field) in fields.iter().enumerate() {
        by_json_name.entry(to_lower_camel_case(&field.name)).or_insert(index);
        by_json_name.entry(to_upper_camel_case(&field.name)).or_insert(index);
        by_json_name.entry(to_kebab_case(&field.name)).or_insert(index);
    }

    Ok(MessageInner {
        well_known: WellKnownType::from_full_name(owner),
        full_name: def.full_name.clone(),
        fields,
        oneofs,
        by_number,
        by_name,
        by_json_name,
    })
}

/// An immutable, resolved set of message and enum schemas
#[derive(Clone)]
pub struct SchemaPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for SchemaPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaPool")
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .finish()
    }
}

impl SchemaPool {
    /// Creates a builder pre-loaded with the well-known types
    pub fn builder() -> SchemaPoolBuilder {
        SchemaPoolBuilder::new()
    }

    /// A pool holding only the well-known types
    pub fn well_known() -> Result<Self> {
        SchemaPoolBuilder::new().build()
    }

    /// Looks up a message type by fully-qualified name
    pub fn get_message(&self, full_name: &str) -> Option<MessageType> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.inner
            .message_names
            .get(full_name)
            .map(|&index| MessageType {
                pool: self.clone(),
                index,
            })
    }

    /// Looks up an enum type by fully-qualified name
    pub fn get_enum(&self, full_name: &str) -> Option<EnumType> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.inner.enum_names.get(full_name).map(|&index| EnumType {
            pool: self.clone(),
            index,
        })
    }

    /// Looks up the message type named by an `Any` type URL
    pub fn get_message_by_type_url(&self, type_url: &str) -> Option<MessageType> {
        let name = type_url.rsplit('/').next().unwrap_or(type_url);
        self.get_message(name)
    }

    /// Iterates over all message types
    pub fn messages(&self) -> impl Iterator<Item = MessageType> + '_ {
        (0..self.inner.messages.len()).map(move |index| MessageType {
            pool: self.clone(),
            index,
        })
    }

    fn ptr_eq(&self, other: &SchemaPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Handle to a message type inside a [`SchemaPool`]
#[derive(Clone)]
pub struct MessageType {
    pool: SchemaPool,
    index: usize,
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        if self.pool.ptr_eq(&other.pool) {
            self.index == other.index
        } else {
            self.full_name() == other.full_name()
        }
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.full_name()).finish()
    }
}

impl MessageType {
    fn inner(&self) -> &MessageInner {
        &self.pool.inner.messages[self.index]
    }

    /// Returns the pool this type belongs to
    pub fn pool(&self) -> &SchemaPool {
        &self.pool
    }

    /// Returns the fully-qualified name, e.g. `google.protobuf.Duration`
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Returns the unqualified name
    pub fn name(&self) -> &str {
        let full_name = self.full_name();
        full_name.rsplit('.').next().unwrap_or(full_name)
    }

    /// Returns the `Any` type URL for this type
    pub fn type_url(&self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.full_name())
    }

    /// Returns the well-known type this is, if any
    pub fn well_known(&self) -> Option<WellKnownType> {
        self.inner().well_known
    }

    /// Number of declared fields
    pub fn field_count(&self) -> usize {
        self.inner().fields.len()
    }

    /// Returns the field at a declaration index
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`field_count`](Self::field_count).
    pub fn field(&self, index: usize) -> FieldSpec<'_> {
        assert!(index < self.field_count(), "field index out of range");
        FieldSpec { ty: self, index }
    }

    /// Iterates over fields in declaration order
    pub fn fields(&self) -> impl Iterator<Item = FieldSpec<'_>> + '_ {
        (0..self.field_count()).map(move |index| FieldSpec { ty: self, index })
    }

    /// Looks up a field by its declared name
    pub fn get_field_by_name(&self, name: &str) -> Option<FieldSpec<'_>> {
        self.inner()
            .by_name
            .get(name)
            .map(|&index| FieldSpec { ty: self, index })
    }

    /// Looks up a field by number
    pub fn get_field_by_number(&self, number: u32) -> Option<FieldSpec<'_>> {
        self.inner()
            .by_number
            .get(&number)
            .map(|&index| FieldSpec { ty: self, index })
    }

    /// Looks up a field by any accepted JSON spelling: declared name,
    /// JSON name, lowerCamelCase, UpperCamelCase or kebab-case
    pub fn get_field_by_json_name(&self, key: &str) -> Option<FieldSpec<'_>> {
        self.inner()
            .by_json_name
            .get(key)
            .map(|&index| FieldSpec { ty: self, index })
    }

    /// Number of oneof groups, including synthetic ones for `optional` fields
    pub fn oneof_count(&self) -> usize {
        self.inner().oneofs.len()
    }

    /// Iterates over oneof groups
    pub fn oneofs(&self) -> impl Iterator<Item = OneofSpec<'_>> + '_ {
        (0..self.oneof_count()).map(move |index| OneofSpec { ty: self, index })
    }

    /// Looks up a oneof group by name
    pub fn get_oneof(&self, name: &str) -> Option<OneofSpec<'_>> {
        self.inner()
            .oneofs
            .iter()
            .position(|o| o.name == name)
            .map(|index| OneofSpec { ty: self, index })
    }

    /// Creates an empty message of this type
    pub fn new_message(&self) -> DynamicMessage {
        DynamicMessage::new(self.clone())
    }
}

/// Resolved type of a field's values
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// A scalar type
    Scalar(ScalarKind),
    /// An open enum
    Enum(EnumType),
    /// An embedded message
    Message(MessageType),
}

impl Kind {
    /// Wire kind of a single value of this type
    pub fn wire_kind(&self) -> WireKind {
        match self {
            Kind::Scalar(scalar) => scalar.wire_kind(),
            Kind::Enum(_) => WireKind::Varint,
            Kind::Message(_) => WireKind::LengthDelimited,
        }
    }

    /// Whether repeated values of this type may be packed
    pub fn is_packable(&self) -> bool {
        self.wire_kind() != WireKind::LengthDelimited
    }

    /// The type-default value for a single element
    pub fn default_value(&self) -> Value {
        match self {
            Kind::Scalar(scalar) => scalar.default_value(),
            Kind::Enum(_) => Value::EnumNumber(0),
            Kind::Message(ty) => Value::Message(Box::new(DynamicMessage::new(ty.clone()))),
        }
    }

    /// Returns the message type, if this is a message kind
    pub fn as_message(&self) -> Option<&MessageType> {
        match self {
            Kind::Message(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the enum type, if this is an enum kind
    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            Kind::Enum(ty) => Some(ty),
            _ => None,
        }
    }
}

/// A field of a [`MessageType`]
#[derive(Clone, Copy)]
pub struct FieldSpec<'a> {
    ty: &'a MessageType,
    index: usize,
}

impl fmt::Debug for FieldSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name())
            .field("number", &self.number())
            .field("cardinality", &self.cardinality())
            .finish()
    }
}

impl<'a> FieldSpec<'a> {
    fn inner(&self) -> &'a FieldInner {
        &self.ty.inner().fields[self.index]
    }

    /// Declaration index within the containing message
    pub fn index(&self) -> usize {
        self.index
    }

    /// The message type declaring this field
    pub fn containing_type(&self) -> &'a MessageType {
        self.ty
    }

    /// Declared name
    pub fn name(&self) -> &'a str {
        &self.inner().name
    }

    /// JSON name (lowerCamelCase unless overridden)
    pub fn json_name(&self) -> &'a str {
        &self.inner().json_name
    }

    /// Field number
    pub fn number(&self) -> u32 {
        self.inner().number
    }

    /// Cardinality
    pub fn cardinality(&self) -> Cardinality {
        self.inner().cardinality
    }

    /// Whether the field is repeated (not a map)
    pub fn is_list(&self) -> bool {
        self.cardinality() == Cardinality::Repeated
    }

    /// Whether the field is a map
    pub fn is_map(&self) -> bool {
        self.cardinality() == Cardinality::Map
    }

    /// Whether repeated values are written packed
    pub fn is_packed(&self) -> bool {
        self.inner().packed
    }

    /// Key type of a map field
    pub fn map_key(&self) -> Option<ScalarKind> {
        self.inner().map_key
    }

    /// Value type; for maps, the type of the map values
    pub fn kind(&self) -> Kind {
        let pool = &self.ty.pool;
        match self.inner().kind {
            KindIndex::Scalar(scalar) => Kind::Scalar(scalar),
            KindIndex::Enum(index) => Kind::Enum(EnumType {
                pool: pool.clone(),
                index,
            }),
            KindIndex::Message(index) => Kind::Message(MessageType {
                pool: pool.clone(),
                index,
            }),
        }
    }

    /// Whether the value type is a message
    pub fn is_message(&self) -> bool {
        matches!(self.inner().kind, KindIndex::Message(_))
    }

    /// Oneof group (including synthetic `optional` groups)
    pub fn oneof(&self) -> Option<OneofSpec<'a>> {
        self.inner().oneof.map(|index| OneofSpec { ty: self.ty, index })
    }

    /// Index of the oneof group, if any
    pub(crate) fn oneof_index(&self) -> Option<usize> {
        self.inner().oneof
    }

    /// Whether the field tracks "was set" independently of its value
    pub fn has_presence(&self) -> bool {
        match self.cardinality() {
            Cardinality::Optional => true,
            Cardinality::Singular => self.inner().oneof.is_some() || self.is_message(),
            Cardinality::Repeated | Cardinality::Map => false,
        }
    }

    /// The value an unset field reads as
    pub fn default_value(&self) -> Value {
        match self.cardinality() {
            Cardinality::Repeated => Value::List(Vec::new()),
            Cardinality::Map => Value::Map(BTreeMap::<MapKey, Value>::new()),
            Cardinality::Singular | Cardinality::Optional => self.kind().default_value(),
        }
    }
}

/// A oneof group of a [`MessageType`]
#[derive(Clone, Copy)]
pub struct OneofSpec<'a> {
    ty: &'a MessageType,
    index: usize,
}

impl fmt::Debug for OneofSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneofSpec").field("name", &self.name()).finish()
    }
}

impl<'a> OneofSpec<'a> {
    fn inner(&self) -> &'a OneofInner {
        &self.ty.inner().oneofs[self.index]
    }

    /// Index of the group within its message
    pub fn index(&self) -> usize {
        self.index
    }

    /// Group name (`_field` for synthetic `optional` groups)
    pub fn name(&self) -> &'a str {
        &self.inner().name
    }

    /// True for the one-member group backing an `optional` field
    pub fn is_synthetic(&self) -> bool {
        self.inner().synthetic
    }

    /// Member fields
    pub fn fields(&self) -> impl Iterator<Item = FieldSpec<'a>> + 'a {
        let ty = self.ty;
        self.inner()
            .fields
            .iter()
            .map(move |&index| FieldSpec { ty, index })
    }
}

/// Handle to an enum type inside a [`SchemaPool`]
#[derive(Clone)]
pub struct EnumType {
    pool: SchemaPool,
    index: usize,
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        if self.pool.ptr_eq(&other.pool) {
            self.index == other.index
        } else {
            self.full_name() == other.full_name()
        }
    }
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumType").field(&self.full_name()).finish()
    }
}

/// An enum number, resolved against its type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMember<'a> {
    /// The number has a declared name
    Known {
        /// Declared name
        name: &'a str,
        /// Numeric value
        number: i32,
    },
    /// The number is not declared; it is kept as-is
    Unknown {
        /// Numeric value
        number: i32,
    },
}

impl EnumMember<'_> {
    /// Numeric value
    pub fn number(&self) -> i32 {
        match self {
            EnumMember::Known { number, .. } | EnumMember::Unknown { number } => *number,
        }
    }

    /// Declared name, if known
    pub fn name(&self) -> Option<&str> {
        match self {
            EnumMember::Known { name, .. } => Some(name),
            EnumMember::Unknown { .. } => None,
        }
    }
}

impl EnumType {
    fn inner(&self) -> &EnumInner {
        &self.pool.inner.enums[self.index]
    }

    /// Returns the fully-qualified name
    pub fn full_name(&self) -> &str {
        &self.inner().full_name
    }

    /// Resolves a number to a member; undeclared numbers are `Unknown`
    pub fn member(&self, number: i32) -> EnumMember<'_> {
        let inner = self.inner();
        match inner.by_number.get(&number) {
            Some(&index) => EnumMember::Known {
                name: &inner.values[index].0,
                number,
            },
            None => EnumMember::Unknown { number },
        }
    }

    /// Looks up a value by name
    pub fn get_by_name(&self, name: &str) -> Option<i32> {
        let inner = self.inner();
        inner.by_name.get(name).map(|&index| inner.values[index].1)
    }

    /// Iterates over declared (name, number) pairs
    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.inner()
            .values
            .iter()
            .map(|(name, number)| (name.as_str(), *number))
    }

    /// Whether this is `google.protobuf.NullValue`
    pub fn is_null_value(&self) -> bool {
        self.full_name() == "google.protobuf.NullValue"
    }
}
