//! protorune - Convert protobuf messages and run the conformance harness
//!
//! Message types come from a compiled `FileDescriptorSet`
//! (`protoc --include_imports --descriptor_set_out=...`). Logs go to stderr so
//! stdout stays free for message output and conformance frames.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use protorune_core::conformance::ConformanceHarness;
use protorune_core::wire::varint::{consume_fields, decode_varint, decode_zigzag64};
use protorune_core::{
    Casing, DynamicMessage, JsonParseOptions, JsonPrintOptions, SchemaPool, WireKind,
};
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;

/// Convert protobuf messages between binary and JSON
#[derive(Parser, Debug)]
#[command(name = "protorune")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer conformance test requests framed on stdin and stdout
    Conformance(ConformanceArgs),
    /// Convert one message between binary and JSON
    Convert(ConvertArgs),
    /// Dump the fields of an encoded message without a schema
    DecodeRaw(DecodeRawArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Serialized FileDescriptorSet holding the message types
    #[arg(short, long, env = "PROTORUNE_DESCRIPTOR_SET")]
    descriptor_set: PathBuf,
}

#[derive(Args, Debug)]
struct ConformanceArgs {
    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Fully-qualified message type, e.g. `my.pkg.Order`
    #[arg(short = 't', long)]
    message_type: String,

    /// Input format
    #[arg(long, value_enum, default_value = "binary")]
    from: Format,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    to: Format,

    /// Input file (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print fields that hold their default value
    #[arg(long)]
    include_defaults: bool,

    /// Drop unknown JSON keys and enum names instead of failing
    #[arg(long)]
    ignore_unknown: bool,

    /// Spelling of JSON keys
    #[arg(long, value_enum, default_value = "camel")]
    casing: CasingArg,

    /// Indent JSON output
    #[arg(long)]
    pretty: bool,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,
}

#[derive(Args, Debug)]
struct DecodeRawArgs {
    /// Input file (default: stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// How deep to look for nested messages inside length-delimited fields
    #[arg(long, default_value = "8")]
    max_depth: usize,
}

/// Message encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Protobuf wire format
    Binary,
    /// Proto3 JSON
    Json,
}

/// JSON key spelling
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CasingArg {
    /// lowerCamelCase (the canonical mapping)
    Camel,
    /// Declared field names
    Snake,
    /// UpperCamelCase
    Pascal,
}

impl From<CasingArg> for Casing {
    fn from(arg: CasingArg) -> Self {
        match arg {
            CasingArg::Camel => Casing::Camel,
            CasingArg::Snake => Casing::Snake,
            CasingArg::Pascal => Casing::Pascal,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Command::Conformance(args) => run_conformance(&args),
        Command::Convert(args) => {
            let output = run_convert(&args)?;
            write_output(args.output.as_deref(), &output, args.force)
        }
        Command::DecodeRaw(args) => {
            let data = read_input(args.input.as_deref())?;
            let dump = decode_raw(&data, args.max_depth)?;
            write_output(None, dump.as_bytes(), false)
        }
    }
}

/// Load the schema pool from a descriptor set file
fn load_pool(schema: &SchemaArgs) -> Result<SchemaPool> {
    let path = &schema.descriptor_set;
    if !path.is_file() {
        bail!("Descriptor set does not exist: {}", path.display());
    }
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read descriptor set: {}", path.display()))?;
    let pool = SchemaPool::from_file_descriptor_set(&bytes)
        .with_context(|| format!("Failed to load descriptor set: {}", path.display()))?;
    debug!("Loaded {} message types from {}", pool.messages().count(), path.display());
    Ok(pool)
}

/// Serve conformance requests until stdin closes
fn run_conformance(args: &ConformanceArgs) -> Result<()> {
    let harness = ConformanceHarness::new(load_pool(&args.schema)?)?;
    let count = harness
        .serve(&mut io::stdin().lock(), &mut io::stdout().lock())
        .context("Conformance I/O failed")?;
    info!("Received EOF from test runner after {} tests", count);
    Ok(())
}

/// Convert one message and return the encoded output
fn run_convert(args: &ConvertArgs) -> Result<Vec<u8>> {
    let pool = load_pool(&args.schema)?;
    let Some(ty) = pool.get_message(&args.message_type) else {
        bail!("Unknown message type: {}", args.message_type);
    };
    let data = read_input(args.input.as_deref())?;
    trace!("Read {} input bytes", data.len());

    let message = match args.from {
        Format::Binary => DynamicMessage::decode(ty, &data)
            .with_context(|| format!("Failed to decode {}", args.message_type))?,
        Format::Json => {
            let text = std::str::from_utf8(&data).context("JSON input is not UTF-8")?;
            let options = JsonParseOptions::new().ignore_unknown_fields(args.ignore_unknown);
            DynamicMessage::from_json(ty, text, &options)
                .with_context(|| format!("Failed to parse {} from JSON", args.message_type))?
        }
    };
    if !message.unknown_fields().is_empty() {
        debug!("{} unknown field(s) preserved", message.unknown_fields().len());
    }

    Ok(match args.to {
        Format::Binary => message.encode_to_vec(),
        Format::Json => {
            let options = JsonPrintOptions::new()
                .casing(args.casing.into())
                .include_default_values(args.include_defaults)
                .pretty(args.pretty);
            let mut text = message
                .to_json(&options)
                .with_context(|| format!("Failed to print {} as JSON", args.message_type))?;
            text.push('\n');
            text.into_bytes()
        }
    })
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
        }
        None => {
            let mut data = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            Ok(data)
        }
    }
}

/// Write to a file, refusing to clobber one unless forced, or to stdout
fn write_output(path: Option<&Path>, content: &[u8], force: bool) -> Result<()> {
    let Some(path) = path else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(content).context("Failed to write stdout")?;
        return stdout.flush().context("Failed to write stdout");
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    if path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Render every field of `data`, one per line, without a schema
fn decode_raw(data: &[u8], max_depth: usize) -> Result<String> {
    let mut out = String::new();
    dump_fields(data, 0, max_depth, &mut out)?;
    Ok(out)
}

fn dump_fields(data: &[u8], depth: usize, max_depth: usize, out: &mut String) -> Result<()> {
    let fields = consume_fields(data).context("Input is not a protobuf message")?;
    let indent = "  ".repeat(depth);

    for field in fields {
        let value = &data[field.value.clone()];
        match field.wire_kind {
            WireKind::Varint => {
                let (raw, _) = decode_varint(value)?;
                let _ = writeln!(
                    out,
                    "{}{}: {} (zigzag {})",
                    indent,
                    field.number,
                    raw,
                    decode_zigzag64(raw)
                );
            }
            WireKind::Fixed64 => {
                let bits = u64::from_le_bytes(value.try_into()?);
                let _ = writeln!(
                    out,
                    "{}{}: 0x{:016x} (double {})",
                    indent,
                    field.number,
                    bits,
                    f64::from_bits(bits)
                );
            }
            WireKind::Fixed32 => {
                let bits = u32::from_le_bytes(value.try_into()?);
                let _ = writeln!(
                    out,
                    "{}{}: 0x{:08x} (float {})",
                    indent,
                    field.number,
                    bits,
                    f32::from_bits(bits)
                );
            }
            WireKind::StartGroup => {
                let _ = writeln!(out, "{}{} {{", indent, field.number);
                dump_fields(value, depth + 1, max_depth, out)?;
                let _ = writeln!(out, "{}}}", indent);
            }
            WireKind::LengthDelimited => {
                if let Some(text) = printable_text(value) {
                    let _ = writeln!(out, "{}{}: {:?}", indent, field.number, text);
                } else if depth < max_depth && looks_like_message(value) {
                    let _ = writeln!(out, "{}{} {{", indent, field.number);
                    dump_fields(value, depth + 1, max_depth, out)?;
                    let _ = writeln!(out, "{}}}", indent);
                } else {
                    let _ = writeln!(out, "{}{}: 0x{}", indent, field.number, hex(value));
                }
            }
            WireKind::EndGroup => bail!("Unexpected end-group tag for field {}", field.number),
        }
    }
    Ok(())
}

/// UTF-8 without control characters other than whitespace
fn printable_text(data: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(data).ok()?;
    text.chars()
        .all(|c| !c.is_control() || c.is_whitespace())
        .then_some(text)
}

/// Heuristic: non-empty and parses completely as fields
fn looks_like_message(data: &[u8]) -> bool {
    !data.is_empty()
        && consume_fields(data).is_ok_and(|fields| {
            fields.iter().all(|f| f.number > 0 && f.wire_kind != WireKind::EndGroup)
        })
}

fn hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet};
    use tempfile::TempDir;

    fn write_descriptor_set(dir: &Path) -> PathBuf {
        let field = |name: &str, number: i32, ty: Type| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        };
        let set = FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("demo.proto".to_string()),
                package: Some("demo".to_string()),
                syntax: Some("proto3".to_string()),
                message_type: vec![DescriptorProto {
                    name: Some("Item".to_string()),
                    field: vec![field("item_id", 1, Type::Int64), field("title", 2, Type::String)],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let path = dir.join("demo.pb");
        fs::write(&path, set.encode_to_vec()).unwrap();
        path
    }

    fn convert_args(dir: &Path, extra: &[&str]) -> ConvertArgs {
        let descriptors = write_descriptor_set(dir);
        let mut argv = vec![
            "protorune".to_string(),
            "convert".to_string(),
            "--descriptor-set".to_string(),
            descriptors.display().to_string(),
            "--message-type".to_string(),
            "demo.Item".to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Convert(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_convert_binary_to_json() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("item.bin");
        fs::write(&input, [0x08, 0x07, 0x12, 0x02, b'h', b'i']).unwrap();

        let args = convert_args(temp_dir.path(), &["--input", input.to_str().unwrap()]);
        let output = run_convert(&args).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"itemId\":\"7\",\"title\":\"hi\"}\n");
    }

    #[test]
    fn test_convert_json_to_binary() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("item.json");
        fs::write(&input, r#"{"item_id": 7, "title": "hi", "extra": true}"#).unwrap();

        let args = convert_args(
            temp_dir.path(),
            &["--input", input.to_str().unwrap(), "--from", "json", "--to", "binary"],
        );
        assert!(run_convert(&args).is_err());

        let args = convert_args(
            temp_dir.path(),
            &[
                "--input",
                input.to_str().unwrap(),
                "--from",
                "json",
                "--to",
                "binary",
                "--ignore-unknown",
            ],
        );
        assert_eq!(run_convert(&args).unwrap(), vec![0x08, 0x07, 0x12, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_convert_casing_and_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("empty.bin");
        fs::write(&input, b"").unwrap();

        let args = convert_args(
            temp_dir.path(),
            &[
                "--input",
                input.to_str().unwrap(),
                "--casing",
                "snake",
                "--include-defaults",
            ],
        );
        let output = run_convert(&args).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"item_id\":\"0\",\"title\":\"\"}\n");
    }

    #[test]
    fn test_convert_unknown_type() {
        let temp_dir = TempDir::new().unwrap();
        let mut args = convert_args(temp_dir.path(), &[]);
        args.message_type = "demo.Missing".to_string();
        let err = run_convert(&args).unwrap_err();
        assert!(err.to_string().contains("demo.Missing"));
    }

    #[test]
    fn test_write_output_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("item.json");
        write_output(Some(&path), b"{}", false).unwrap();
        assert!(write_output(Some(&path), b"{}", false).is_err());
        write_output(Some(&path), b"[]", true).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"[]");
    }

    #[test]
    fn test_decode_raw() {
        // 1: 150, 2: "hi", 3: {1: 1}, 4: fixed32 1.0
        let data = [
            0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i', 0x1a, 0x02, 0x08, 0x01, 0x25, 0x00, 0x00,
            0x80, 0x3f,
        ];
        let dump = decode_raw(&data, 8).unwrap();
        assert_eq!(
            dump,
            "1: 150 (zigzag 75)\n2: \"hi\"\n3 {\n  1: 1 (zigzag -1)\n}\n4: 0x3f800000 (float 1)\n"
        );
        assert!(decode_raw(&[0x08], 8).is_err());
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x00, 0xab, 0xff]), "00abff");
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
