//! # protorune-core
//!
//! A schema-driven protobuf message runtime.
//!
//! This crate provides the core functionality for:
//! - Describing message layouts at runtime ([`SchemaPool`], [`MessageType`])
//! - Encoding and decoding the binary wire format, bit-exact and with unknown
//!   fields preserved
//! - Tracking which member of a oneof group is set
//! - Printing and parsing the canonical proto3 JSON mapping
//! - Adapting the `google.protobuf` well-known types to native values
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`schema`]: Field specs, the schema pool and descriptor-set loading
//! - [`message`]: [`DynamicMessage`], presence tracking and unknown fields
//! - [`wire`]: Binary wire codec
//! - [`json`]: Proto3 JSON codec
//! - [`wkt`]: Well-known-type adapters
//! - [`conformance`]: Conformance request/response codec and framing
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use protorune_core::schema::{FieldDef, MessageDef, ScalarKind};
//! use protorune_core::{DynamicMessage, JsonPrintOptions, SchemaPool};
//!
//! let pool = SchemaPool::builder()
//!     .message(
//!         MessageDef::new("demo.Point")
//!             .field(FieldDef::scalar("x", 1, ScalarKind::Int32))
//!             .field(FieldDef::scalar("label", 2, ScalarKind::String).optional()),
//!     )
//!     .build()?;
//! let point = pool.get_message("demo.Point").expect("registered above");
//!
//! let mut message = point.new_message();
//! message.set("x", 150)?;
//! message.set("label", "")?;
//! assert_eq!(message.encode_to_vec(), [0x08, 0x96, 0x01, 0x12, 0x00]);
//! assert_eq!(
//!     message.to_json(&JsonPrintOptions::default())?,
//!     r#"{"x":150,"label":""}"#
//! );
//!
//! let decoded = DynamicMessage::decode(point, &message.encode_to_vec())?;
//! assert_eq!(decoded, message);
//! # Ok::<(), protorune_core::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod casing;
pub mod conformance;
pub mod error;
pub mod json;
pub mod message;
pub mod schema;
pub mod validate;
pub mod value;
pub mod wire;
pub mod wkt;

// Re-export primary types for convenience
pub use casing::Casing;
pub use error::{Error, ErrorKind, Result};
pub use json::{JsonParseOptions, JsonPrintOptions};
pub use message::{DynamicMessage, UnknownField, UnknownFields};
pub use schema::{
    Cardinality, EnumMember, EnumType, FieldSpec, Kind, MessageType, OneofSpec, ScalarKind,
    SchemaPool, SchemaPoolBuilder,
};
pub use value::{MapKey, Value};
pub use wire::{DecodeOptions, WireKind};
pub use wkt::{WellKnownAdapter, WellKnownType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;
