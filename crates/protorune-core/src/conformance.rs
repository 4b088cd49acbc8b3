//! Conformance test request/response codec.
//!
//! The conformance runner talks to a test program over stdin/stdout. Each
//! frame is a 4-byte little-endian length followed by an encoded
//! `conformance.ConformanceRequest` (runner to program) or
//! `conformance.ConformanceResponse` (program to runner). The request names a
//! message type, carries a payload in one format and asks for the message back
//! in another.
//!
//! ## Example
//!
//! ```no_run
//! use protorune_core::conformance::ConformanceHarness;
//! use protorune_core::SchemaPool;
//!
//! let descriptors = std::fs::read("test_messages.pb")?;
//! let harness = ConformanceHarness::new(SchemaPool::from_file_descriptor_set(&descriptors)?)?;
//! let count = harness.serve(&mut std::io::stdin().lock(), &mut std::io::stdout().lock())?;
//! eprintln!("ran {} tests", count);
//! # Ok::<(), protorune_core::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::json::{JsonParseOptions, JsonPrintOptions};
use crate::message::DynamicMessage;
use crate::schema::{EnumDef, FieldDef, MessageDef, MessageType, ScalarKind, SchemaPool};
use crate::value::Value;
use bytes::Bytes;
use std::io::{self, Read, Write};
use tracing::{debug, trace};

/// Full name of the request message
pub const REQUEST_TYPE: &str = "conformance.ConformanceRequest";

/// Full name of the response message
pub const RESPONSE_TYPE: &str = "conformance.ConformanceResponse";

/// Output format requested by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// No format given
    Unspecified,
    /// Binary protobuf
    Protobuf,
    /// Proto3 JSON
    Json,
    /// JSPB, the JavaScript array format
    Jspb,
    /// Protobuf text format
    TextFormat,
}

impl WireFormat {
    /// Maps the enum number used on the wire
    pub fn from_number(number: i32) -> Option<Self> {
        Some(match number {
            0 => WireFormat::Unspecified,
            1 => WireFormat::Protobuf,
            2 => WireFormat::Json,
            3 => WireFormat::Jspb,
            4 => WireFormat::TextFormat,
            _ => return None,
        })
    }

    /// Enum number used on the wire
    pub fn number(&self) -> i32 {
        match self {
            WireFormat::Unspecified => 0,
            WireFormat::Protobuf => 1,
            WireFormat::Json => 2,
            WireFormat::Jspb => 3,
            WireFormat::TextFormat => 4,
        }
    }
}

/// Kind of test; only the JSON ignore-unknown category changes behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestCategory {
    /// No category given
    Unspecified,
    /// Binary round trip
    Binary,
    /// JSON round trip
    Json,
    /// JSON parsing that drops unknown keys
    JsonIgnoreUnknownParsing,
    /// JSPB round trip
    Jspb,
    /// Text format round trip
    TextFormat,
}

impl TestCategory {
    /// Maps the enum number used on the wire; unknown numbers read as unspecified
    pub fn from_number(number: i32) -> Self {
        match number {
            1 => TestCategory::Binary,
            2 => TestCategory::Json,
            3 => TestCategory::JsonIgnoreUnknownParsing,
            4 => TestCategory::Jspb,
            5 => TestCategory::TextFormat,
            _ => TestCategory::Unspecified,
        }
    }

    /// Enum number used on the wire
    pub fn number(&self) -> i32 {
        match self {
            TestCategory::Unspecified => 0,
            TestCategory::Binary => 1,
            TestCategory::Json => 2,
            TestCategory::JsonIgnoreUnknownParsing => 3,
            TestCategory::Jspb => 4,
            TestCategory::TextFormat => 5,
        }
    }
}

/// Input carried by a request
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Binary protobuf
    Protobuf(Bytes),
    /// Proto3 JSON text
    Json(String),
    /// JSPB text
    Jspb(String),
    /// Protobuf text format
    Text(String),
}

/// A decoded `conformance.ConformanceRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceRequest {
    /// The input message, if any
    pub payload: Option<Payload>,
    /// Raw number of the requested output format
    pub requested_output_format: i32,
    /// Full name of the message type under test
    pub message_type: String,
    /// Raw number of the test category
    pub test_category: i32,
}

impl ConformanceRequest {
    /// Reads a request out of a `conformance.ConformanceRequest` message
    pub fn from_message(message: &DynamicMessage) -> Result<Self> {
        let payload = match message.which_set("payload")? {
            Some(("protobuf_payload", value)) => {
                Some(Payload::Protobuf(value.as_bytes().cloned().unwrap_or_default()))
            }
            Some(("json_payload", value)) => Some(Payload::Json(string_of(&value))),
            Some(("jspb_payload", value)) => Some(Payload::Jspb(string_of(&value))),
            Some(("text_payload", value)) => Some(Payload::Text(string_of(&value))),
            _ => None,
        };
        Ok(Self {
            payload,
            requested_output_format: message
                .get("requested_output_format")?
                .as_enum_number()
                .unwrap_or_default(),
            message_type: string_of(&*message.get("message_type")?),
            test_category: message.get("test_category")?.as_enum_number().unwrap_or_default(),
        })
    }

    /// Builds the `conformance.ConformanceRequest` message for this request
    pub fn to_message(&self, protocol: &SchemaPool) -> Result<DynamicMessage> {
        let mut message = protocol_type(protocol, REQUEST_TYPE)?.new_message();
        match &self.payload {
            Some(Payload::Protobuf(bytes)) => message.set("protobuf_payload", bytes.clone())?,
            Some(Payload::Json(text)) => message.set("json_payload", text.as_str())?,
            Some(Payload::Jspb(text)) => message.set("jspb_payload", text.as_str())?,
            Some(Payload::Text(text)) => message.set("text_payload", text.as_str())?,
            None => {}
        }
        message.set(
            "requested_output_format",
            Value::EnumNumber(self.requested_output_format),
        )?;
        message.set("message_type", self.message_type.as_str())?;
        message.set("test_category", Value::EnumNumber(self.test_category))?;
        Ok(message)
    }
}

/// Outcome of one test, i.e. the `result` oneof of the response
#[derive(Debug, Clone, PartialEq)]
pub enum ConformanceResponse {
    /// The input could not be parsed
    ParseError(String),
    /// The parsed message could not be written in the requested format
    SerializeError(String),
    /// The request itself was unusable
    RuntimeError(String),
    /// Binary output
    ProtobufPayload(Vec<u8>),
    /// JSON output
    JsonPayload(String),
    /// The test needs a feature this program does not have
    Skipped(String),
}

impl ConformanceResponse {
    fn field_name(&self) -> &'static str {
        match self {
            ConformanceResponse::ParseError(_) => "parse_error",
            ConformanceResponse::SerializeError(_) => "serialize_error",
            ConformanceResponse::RuntimeError(_) => "runtime_error",
            ConformanceResponse::ProtobufPayload(_) => "protobuf_payload",
            ConformanceResponse::JsonPayload(_) => "json_payload",
            ConformanceResponse::Skipped(_) => "skipped",
        }
    }

    /// Builds the `conformance.ConformanceResponse` message for this outcome
    pub fn to_message(&self, protocol: &SchemaPool) -> Result<DynamicMessage> {
        let mut message = protocol_type(protocol, RESPONSE_TYPE)?.new_message();
        let value = match self {
            ConformanceResponse::ProtobufPayload(bytes) => Value::from(bytes.clone()),
            ConformanceResponse::ParseError(text)
            | ConformanceResponse::SerializeError(text)
            | ConformanceResponse::RuntimeError(text)
            | ConformanceResponse::JsonPayload(text)
            | ConformanceResponse::Skipped(text) => Value::from(text.as_str()),
        };
        message.set(self.field_name(), value)?;
        Ok(message)
    }

    /// Reads the outcome out of a `conformance.ConformanceResponse` message
    pub fn from_message(message: &DynamicMessage) -> Result<Self> {
        let Some((name, value)) = message.which_set("result")? else {
            return Err(Error::validation(RESPONSE_TYPE, "no result is set"));
        };
        Ok(match name {
            "protobuf_payload" => ConformanceResponse::ProtobufPayload(
                value.as_bytes().map(|b| b.to_vec()).unwrap_or_default(),
            ),
            "parse_error" => ConformanceResponse::ParseError(string_of(&value)),
            "serialize_error" => ConformanceResponse::SerializeError(string_of(&value)),
            "runtime_error" => ConformanceResponse::RuntimeError(string_of(&value)),
            "json_payload" => ConformanceResponse::JsonPayload(string_of(&value)),
            "skipped" => ConformanceResponse::Skipped(string_of(&value)),
            other => {
                return Err(Error::validation(
                    RESPONSE_TYPE,
                    format!("result '{}' is not supported", other),
                ))
            }
        })
    }
}

fn string_of(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn protocol_type(protocol: &SchemaPool, name: &str) -> Result<MessageType> {
    protocol
        .get_message(name)
        .ok_or_else(|| Error::invalid_schema(name, "not registered in the protocol pool"))
}

/// Schemas of the conformance request and response messages
pub fn protocol_pool() -> Result<SchemaPool> {
    SchemaPool::builder()
        .enumeration(
            EnumDef::new("conformance.WireFormat")
                .value("UNSPECIFIED", 0)
                .value("PROTOBUF", 1)
                .value("JSON", 2)
                .value("JSPB", 3)
                .value("TEXT_FORMAT", 4),
        )
        .enumeration(
            EnumDef::new("conformance.TestCategory")
                .value("UNSPECIFIED_TEST", 0)
                .value("BINARY_TEST", 1)
                .value("JSON_TEST", 2)
                .value("JSON_IGNORE_UNKNOWN_PARSING_TEST", 3)
                .value("JSPB_TEST", 4)
                .value("TEXT_FORMAT_TEST", 5),
        )
        .message(
            MessageDef::new(REQUEST_TYPE)
                .field(FieldDef::scalar("protobuf_payload", 1, ScalarKind::Bytes).oneof("payload"))
                .field(FieldDef::scalar("json_payload", 2, ScalarKind::String).oneof("payload"))
                .field(FieldDef::enumeration(
                    "requested_output_format",
                    3,
                    "conformance.WireFormat",
                ))
                .field(FieldDef::scalar("message_type", 4, ScalarKind::String))
                .field(FieldDef::enumeration("test_category", 5, "conformance.TestCategory"))
                .field(FieldDef::scalar("jspb_payload", 7, ScalarKind::String).oneof("payload"))
                .field(FieldDef::scalar("text_payload", 8, ScalarKind::String).oneof("payload"))
                .field(FieldDef::scalar("print_unknown_fields", 9, ScalarKind::Bool)),
        )
        .message(
            MessageDef::new(RESPONSE_TYPE)
                .field(FieldDef::scalar("parse_error", 1, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("runtime_error", 2, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("protobuf_payload", 3, ScalarKind::Bytes).oneof("result"))
                .field(FieldDef::scalar("json_payload", 4, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("skipped", 5, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("serialize_error", 6, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("jspb_payload", 7, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("text_payload", 8, ScalarKind::String).oneof("result"))
                .field(FieldDef::scalar("timeout_error", 9, ScalarKind::String).oneof("result")),
        )
        .build()
}

/// Reads one length-prefixed frame; `None` on a clean end of input
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input ended inside a length prefix",
                )
                .into())
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    let len = u32::from_le_bytes(prefix) as usize;
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame)?;
    Ok(Some(frame))
}

/// Writes one length-prefixed frame and flushes
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<()> {
    let len = u32::try_from(frame.len())
        .map_err(|_| Error::validation("frame", format!("{} bytes is too long", frame.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(frame)?;
    writer.flush()?;
    Ok(())
}

/// Answers conformance requests against the message types of a schema pool
#[derive(Debug, Clone)]
pub struct ConformanceHarness {
    protocol: SchemaPool,
    tests: SchemaPool,
}

impl ConformanceHarness {
    /// Creates a harness for the message types in `tests`
    pub fn new(tests: SchemaPool) -> Result<Self> {
        Ok(Self {
            protocol: protocol_pool()?,
            tests,
        })
    }

    /// Pool holding the request and response schemas
    pub fn protocol(&self) -> &SchemaPool {
        &self.protocol
    }

    /// Answers frames from `input` until it ends; returns the number handled
    pub fn serve<R: Read, W: Write>(&self, input: &mut R, output: &mut W) -> Result<usize> {
        let mut count = 0;
        while let Some(frame) = read_frame(input)? {
            let response = self.handle(&frame)?;
            write_frame(output, &response)?;
            count += 1;
        }
        debug!("Conformance input ended after {} requests", count);
        Ok(count)
    }

    /// Decodes one request, runs it and encodes the response
    pub fn handle(&self, request: &[u8]) -> Result<Vec<u8>> {
        let message = DynamicMessage::decode(protocol_type(&self.protocol, REQUEST_TYPE)?, request)?;
        let request = ConformanceRequest::from_message(&message)?;
        let response = self.run_test(&request);
        Ok(response.to_message(&self.protocol)?.encode_to_vec())
    }

    /// Runs one test
    pub fn run_test(&self, request: &ConformanceRequest) -> ConformanceResponse {
        let category = TestCategory::from_number(request.test_category);
        debug!(
            "Running conformance test for {} ({:?})",
            request.message_type, category
        );

        let Some(ty) = self.tests.get_message(&request.message_type) else {
            return ConformanceResponse::Skipped(format!(
                "message type '{}' is not available",
                request.message_type
            ));
        };

        let parsed = match &request.payload {
            Some(Payload::Protobuf(bytes)) => DynamicMessage::decode(ty, bytes),
            Some(Payload::Json(text)) => {
                let options = JsonParseOptions::new().ignore_unknown_fields(
                    category == TestCategory::JsonIgnoreUnknownParsing,
                );
                DynamicMessage::from_json(ty, text, &options)
            }
            Some(Payload::Jspb(_)) => {
                return ConformanceResponse::Skipped("JSPB input is not supported".into())
            }
            Some(Payload::Text(_)) => {
                return ConformanceResponse::Skipped("text input is not supported".into())
            }
            None => return ConformanceResponse::RuntimeError("request has no payload".into()),
        };
        let message = match parsed {
            Ok(message) => message,
            Err(e) => {
                trace!("Input rejected: {}", e);
                return ConformanceResponse::ParseError(e.to_string());
            }
        };

        match WireFormat::from_number(request.requested_output_format) {
            Some(WireFormat::Protobuf) => ConformanceResponse::ProtobufPayload(message.encode_to_vec()),
            Some(WireFormat::Json) => match message.to_json(&JsonPrintOptions::default()) {
                Ok(text) => ConformanceResponse::JsonPayload(text),
                Err(e) => ConformanceResponse::SerializeError(e.to_string()),
            },
            Some(WireFormat::Jspb) => ConformanceResponse::Skipped("JSPB output is not supported".into()),
            Some(WireFormat::TextFormat) => {
                ConformanceResponse::Skipped("text output is not supported".into())
            }
            Some(WireFormat::Unspecified) => {
                ConformanceResponse::RuntimeError("unspecified output format".into())
            }
            None => ConformanceResponse::RuntimeError(format!(
                "unknown output format {}",
                request.requested_output_format
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeRef;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn tests_pool() -> SchemaPool {
        SchemaPool::builder()
            .message(
                MessageDef::new("test.Sample")
                    .field(FieldDef::scalar("id", 1, ScalarKind::Int32))
                    .field(FieldDef::scalar("big", 2, ScalarKind::Int64))
                    .field(FieldDef::map(
                        "labels",
                        3,
                        ScalarKind::String,
                        TypeRef::Scalar(ScalarKind::String),
                    ))
                    .field(FieldDef::message("value", 4, "google.protobuf.Value")),
            )
            .build()
            .unwrap()
    }

    fn harness() -> ConformanceHarness {
        ConformanceHarness::new(tests_pool()).unwrap()
    }

    fn request(payload: Payload, output: WireFormat) -> ConformanceRequest {
        ConformanceRequest {
            payload: Some(payload),
            requested_output_format: output.number(),
            message_type: "test.Sample".to_string(),
            test_category: TestCategory::Binary.number(),
        }
    }

    #[test]
    fn test_binary_to_json() {
        let response = harness().run_test(&request(
            Payload::Protobuf(Bytes::from_static(&[0x08, 0x96, 0x01, 0x10, 0x01])),
            WireFormat::Json,
        ));
        assert_eq!(
            response,
            ConformanceResponse::JsonPayload(r#"{"id":150,"big":"1"}"#.to_string())
        );
    }

    #[test]
    fn test_json_to_binary() {
        let response = harness().run_test(&request(
            Payload::Json(r#"{"id": 150, "value": null}"#.to_string()),
            WireFormat::Protobuf,
        ));
        assert_eq!(
            response,
            ConformanceResponse::ProtobufPayload(vec![0x08, 0x96, 0x01, 0x22, 0x02, 0x08, 0x00])
        );
    }

    #[test]
    fn test_parse_errors() {
        let h = harness();
        let bad_binary = h.run_test(&request(
            Payload::Protobuf(Bytes::from_static(&[0x08])),
            WireFormat::Protobuf,
        ));
        assert!(matches!(bad_binary, ConformanceResponse::ParseError(_)));
        let bad_json = h.run_test(&request(
            Payload::Json(r#"{"unknown": 1}"#.to_string()),
            WireFormat::Json,
        ));
        assert!(matches!(bad_json, ConformanceResponse::ParseError(_)));
    }

    #[test]
    fn test_ignore_unknown_category() {
        let mut req = request(Payload::Json(r#"{"unknown": 1}"#.to_string()), WireFormat::Json);
        req.test_category = TestCategory::JsonIgnoreUnknownParsing.number();
        assert_eq!(
            harness().run_test(&req),
            ConformanceResponse::JsonPayload("{}".to_string())
        );
    }

    #[test]
    fn test_skips_and_runtime_errors() {
        let h = harness();
        let mut req = request(Payload::Json("{}".to_string()), WireFormat::Json);
        req.message_type = "test.Missing".to_string();
        assert!(matches!(h.run_test(&req), ConformanceResponse::Skipped(_)));

        let req = request(Payload::Text("id: 1".to_string()), WireFormat::Json);
        assert!(matches!(h.run_test(&req), ConformanceResponse::Skipped(_)));

        let req = request(Payload::Json("{}".to_string()), WireFormat::TextFormat);
        assert!(matches!(h.run_test(&req), ConformanceResponse::Skipped(_)));

        let req = request(Payload::Json("{}".to_string()), WireFormat::Unspecified);
        assert!(matches!(h.run_test(&req), ConformanceResponse::RuntimeError(_)));

        let mut req = request(Payload::Json("{}".to_string()), WireFormat::Json);
        req.payload = None;
        assert!(matches!(h.run_test(&req), ConformanceResponse::RuntimeError(_)));
    }

    #[test]
    fn test_serve_round_trip() {
        let h = harness();
        let req = request(Payload::Json(r#"{"labels": {"b": "2", "a": "1"}}"#.to_string()), WireFormat::Json)
            .to_message(h.protocol())
            .unwrap()
            .encode_to_vec();

        let mut input = Vec::new();
        write_frame(&mut input, &req).unwrap();
        write_frame(&mut input, &req).unwrap();
        let mut output = Vec::new();
        let count = h.serve(&mut Cursor::new(input), &mut output).unwrap();
        assert_eq!(count, 2);

        let mut reader = Cursor::new(output);
        let ty = h.protocol().get_message(RESPONSE_TYPE).unwrap();
        for _ in 0..2 {
            let frame = read_frame(&mut reader).unwrap().unwrap();
            let message = DynamicMessage::decode(ty.clone(), &frame).unwrap();
            assert_eq!(
                ConformanceResponse::from_message(&message).unwrap(),
                ConformanceResponse::JsonPayload(r#"{"labels":{"a":"1","b":"2"}}"#.to_string())
            );
        }
        assert_eq!(read_frame(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_request_message_round_trip() {
        let h = harness();
        let req = request(Payload::Protobuf(Bytes::from_static(&[0x08, 0x01])), WireFormat::Json);
        let message = req.to_message(h.protocol()).unwrap();
        let decoded = ConformanceRequest::from_message(&message).unwrap();
        assert_eq!(decoded.message_type, "test.Sample");
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_truncated_frames() {
        let err = read_frame(&mut Cursor::new(vec![0x05, 0x00])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        let err = read_frame(&mut Cursor::new(vec![0x05, 0x00, 0x00, 0x00, 0x01])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert_eq!(read_frame(&mut Cursor::new(Vec::new())).unwrap(), None);
    }
}
