//! Purpose: `framekit` CLI entry point.
//! Role: Binary crate root; splits streams into JSON-line frames and joins them back.
//! Invariants: Frame data goes to stdout; logs and errors go to stderr.
//! Invariants: Errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::borrow::Cow;
use std::error::Error as StdError;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use clap::{Args, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use framekit::api::{
    Context, Error, ErrorKind, FrameFactory, FrameRead, FrameWrite, FrameWriter, FramingType,
    MetadataOption, ReaderOptions, WriterOptions, from_file, to_exit_code, to_file,
};

#[derive(Parser)]
#[command(
    name = "framekit",
    version,
    about = "Split byte streams into frames and join frames back into streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a stream into frames and print one JSON line per frame.
    Split(SplitArgs),
    /// Read JSON-line frames from stdin and write them as one framed stream.
    Join(JoinArgs),
}

#[derive(Args)]
struct FramingArgs {
    /// Framing type: yaml, json, single, or another name served as one opaque frame.
    /// Defaults to the file extension, then yaml.
    #[arg(long)]
    framing: Option<String>,
    /// Largest frame in bytes (K/M/G suffixes allowed); 0 selects the 10M default.
    #[arg(long, value_name = "SIZE")]
    max_frame_size: Option<String>,
    /// Most frames accepted; 0 means unbounded.
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_frames: u64,
}

#[derive(Args)]
struct SplitArgs {
    #[command(flatten)]
    framing: FramingArgs,
    /// Input path, or `-` for stdin.
    #[arg(value_name = "PATH", default_value = "-")]
    input: PathBuf,
}

#[derive(Args)]
struct JoinArgs {
    #[command(flatten)]
    framing: FramingArgs,
    /// Output path, or `-` for stdout.
    #[arg(long, short, value_name = "PATH", default_value = "-")]
    output: PathBuf,
}

struct Limits {
    max_frame_size: i64,
    max_frames: i64,
}

impl FramingArgs {
    fn resolve(&self, path: &Path) -> Result<(FramingType, Limits), Error> {
        let framing_type = match &self.framing {
            Some(name) => FramingType::from(name.as_str()),
            None => framing_from_extension(path),
        };
        let max_frame_size = match &self.max_frame_size {
            Some(size) => i64::try_from(parse_size(size)?).unwrap_or(i64::MAX),
            None => 0,
        };
        let max_frames = i64::try_from(self.max_frames).unwrap_or(i64::MAX);
        Ok((
            framing_type,
            Limits {
                max_frame_size,
                max_frames,
            },
        ))
    }
}

#[derive(Serialize)]
struct FrameLine<'a> {
    index: usize,
    length: usize,
    frame: Cow<'a, str>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JoinLine {
    Bare(String),
    Wrapped { frame: String },
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(exit_code) => exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    let cx = Context::new();
    match cli.command {
        Command::Split(args) => split(&cx, args)?,
        Command::Join(args) => join(&cx, args)?,
    }
    Ok(0)
}

fn split(cx: &Context, args: SplitArgs) -> Result<(), Error> {
    let (framing_type, limits) = args.framing.resolve(&args.input)?;
    let options = ReaderOptions::new()
        .with_max_frame_size(limits.max_frame_size)
        .with_max_frames(limits.max_frames);
    let content = from_file(&args.input, [MetadataOption::framing_type(&framing_type)])?;
    let mut reader = FrameFactory::new().new_reader(framing_type, content, options);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = emit_frames(cx, &mut reader, &mut out);
    let closed = reader.close(cx);
    let count = result?;
    closed?;
    debug!(frames = count, "split complete");
    Ok(())
}

fn emit_frames(
    cx: &Context,
    reader: &mut impl FrameRead,
    out: &mut impl Write,
) -> Result<usize, Error> {
    let mut count = 0;
    while let Some(frame) = reader.read_frame(cx)? {
        let line = FrameLine {
            index: count,
            length: frame.len(),
            frame: frame.to_str_lossy(),
        };
        serde_json::to_writer(&mut *out, &line).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to encode frame")
                .with_source(err)
        })?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;
    Ok(count)
}

fn join(cx: &Context, args: JoinArgs) -> Result<(), Error> {
    let (framing_type, limits) = args.framing.resolve(&args.output)?;
    let options = WriterOptions::new()
        .with_max_frame_size(limits.max_frame_size)
        .with_max_frames(limits.max_frames);
    let content = to_file(&args.output, [MetadataOption::framing_type(&framing_type)])?;
    let sink = content.clone();
    let writer = FrameFactory::new().new_writer(framing_type, content, options);

    let result = write_frames(cx, &writer, io::stdin().lock());
    let flushed = sink.flush(cx);
    let closed = writer.close(cx);
    let count = result?;
    flushed?;
    closed?;
    debug!(frames = count, "join complete");
    Ok(())
}

/// Writes one frame per input line; returns how many frames reached the output.
fn write_frames(cx: &Context, writer: &FrameWriter, input: impl BufRead) -> Result<u64, Error> {
    let before = writer.frame_count();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = parse_join_line(&line).map_err(|err| {
            err.with_message(format!(
                "line {}: expected a JSON string or {{\"frame\": string}}",
                idx + 1
            ))
        })?;
        writer.write_frame(cx, frame.as_bytes())?;
    }
    Ok(writer.frame_count() - before)
}

fn parse_join_line(line: &str) -> Result<String, Error> {
    let parsed: JoinLine = serde_json::from_str(line).map_err(|err| {
        Error::new(ErrorKind::Malformed)
            .with_message("invalid frame line")
            .with_source(err)
    })?;
    Ok(match parsed {
        JoinLine::Bare(frame) | JoinLine::Wrapped { frame } => frame,
    })
}

fn framing_from_extension(path: &Path) -> FramingType {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => FramingType::Json,
        _ => FramingType::Yaml,
    }
}

fn parse_size(input: &str) -> Result<u64, Error> {
    let trimmed = input.trim();
    let split = trimmed
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    let digits = trimmed[..split].trim();
    let suffix = trimmed[split..].trim();

    let value: u64 = digits.parse().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid size; use bytes or K/M/G (e.g. 64K)")
            .with_source(err)
    })?;

    let multiplier = match suffix {
        "" => 1,
        "K" | "k" => 1024,
        "M" | "m" => 1024 * 1024,
        "G" | "g" => 1024 * 1024 * 1024,
        _ => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("invalid size suffix; use K/M/G (e.g. 64K)"));
        }
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("size overflow"))
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn emit_error(err: &Error) {
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::FrameSizeOverflow => "frame size exceeds limit".to_string(),
        ErrorKind::FrameCountOverflow => "frame count exceeds limit".to_string(),
        ErrorKind::UnsupportedFramingType => "unsupported framing type".to_string(),
        ErrorKind::ShortWrite => "short write".to_string(),
        ErrorKind::ClosedWrite => "write on closed frame writer".to_string(),
        ErrorKind::Closed => "stream already closed".to_string(),
        ErrorKind::Cancelled => "cancelled".to_string(),
        ErrorKind::Malformed => "malformed input".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Internal => "internal error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(limit) = err.limit() {
        inner.insert("limit".to_string(), json!(limit));
    }
    if let Some(framing_type) = err.framing_type() {
        inner.insert("framing_type".to_string(), json!(framing_type));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::{
        Error, ErrorKind, emit_frames, error_json, framing_from_extension, parse_join_line,
        parse_size, write_frames,
    };
    use framekit::api::{
        Context, ContentWriter, FramingType, Metadata, ReaderOptions, WriterOptions, from_string,
        new_json_writer, new_yaml_reader,
    };
    use serde_json::json;
    use std::io::{self, Cursor, Write};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("sink").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn parse_size_accepts_bytes_and_kmg() {
        assert_eq!(parse_size("42").expect("bytes"), 42);
        assert_eq!(parse_size("1K").expect("k"), 1024);
        assert_eq!(parse_size("3m").expect("m"), 3 * 1024 * 1024);
        assert_eq!(parse_size("1MiB").expect_err("iec").kind(), ErrorKind::Usage);
        assert_eq!(parse_size("x").expect_err("digits").kind(), ErrorKind::Usage);
    }

    #[test]
    fn join_lines_accept_strings_and_objects() {
        assert_eq!(parse_join_line(r#""a: 1""#).expect("bare"), "a: 1");
        assert_eq!(parse_join_line(r#"{"frame":"{}","index":0}"#).expect("wrapped"), "{}");
        let err = parse_join_line("[1]").expect_err("not a frame");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn framing_defaults_follow_extension() {
        assert_eq!(framing_from_extension(Path::new("in.json")), FramingType::Json);
        assert_eq!(framing_from_extension(Path::new("in.yaml")), FramingType::Yaml);
        assert_eq!(framing_from_extension(Path::new("-")), FramingType::Yaml);
    }

    #[test]
    fn split_emits_json_lines() {
        let cx = Context::new();
        let mut reader = new_yaml_reader(from_string("a: 1\n---\nb: 2\n", []), ReaderOptions::new());
        let mut out = Vec::new();
        let count = emit_frames(&cx, &mut reader, &mut out).expect("emit");
        assert_eq!(count, 2);
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines[0], json!({"index": 0, "length": 5, "frame": "a: 1\n"}));
        assert_eq!(lines[1]["index"], json!(1));
    }

    #[test]
    fn join_writes_frames_and_reports_line_numbers() {
        let cx = Context::new();
        let sink = Sink::default();
        let writer = new_json_writer(
            ContentWriter::from_writer(sink.clone(), Metadata::new()),
            WriterOptions::new(),
        );
        let input = Cursor::new("\"{}\"\n\n\" \"\n{\"frame\":\"[1]\"}\n");
        assert_eq!(write_frames(&cx, &writer, input).expect("join"), 2);
        assert_eq!(sink.0.lock().expect("sink").as_slice(), b"{}[1]");

        let err = write_frames(&cx, &writer, Cursor::new("\"{}\"\n42\n")).expect_err("bad line");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert!(err.message().expect("message").starts_with("line 2:"));
    }

    #[test]
    fn error_json_includes_limit_and_framing_type() {
        let err = Error::frame_size_overflow(16).with_framing_type("json");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], json!("FrameSizeOverflow"));
        assert_eq!(value["error"]["limit"], json!(16));
        assert_eq!(value["error"]["framing_type"], json!("json"));
    }
}
