//! Purpose: Object-concatenated framing (`{...}{...}` or `[...]` back to back).
//! Exports: `ObjectReader`, `object_writer`.
//! Role: Low-level strategy for `FramingType::Json`; frames are whole top-level values.
//! Invariants: Every delivered frame is one syntactically valid JSON object or array,
//! byte-for-byte as it appeared in the stream.
//! Invariants: Never pulls more than `max_frame_size + 1` bytes of one object off the stream.
//! Invariants: Size and syntax failures are latched; later calls replay them.
use std::io::{self, BufRead, BufReader, Read};

use serde::Deserialize;
use serde_json::Deserializer;
use serde_json::value::RawValue;

use crate::core::context::Context;
use crate::core::error::{Error, ErrorKind};
use crate::core::framing::FramingType;
use crate::core::layer::Wrapped;
use crate::core::metadata::Metadata;
use crate::core::reader::{ContentReader, UnderlyingReader};
use crate::core::segment::{RawSegmentRead, SegmentReader};
use crate::core::writer::ContentWriter;
use crate::frame::delegate::DelegatingWriter;
use crate::frame::{Frame, FrameRead, ReaderOptions, WriterOptions};

pub struct ObjectReader {
    segments: SegmentReader,
    max_frame_size: u64,
    latched: Option<Error>,
}

impl ObjectReader {
    pub fn new(reader: ContentReader, opts: &ReaderOptions) -> Self {
        let max_frame_size = opts.max_frame_size;
        let segments = reader.wrap_segment(|underlying| {
            Wrapped::segment(ObjectSplitter::new(underlying, max_frame_size))
        });
        Self {
            segments,
            max_frame_size,
            latched: None,
        }
    }

    fn latch(&mut self, err: Error) -> Error {
        self.latched = Some(err.clone());
        err
    }
}

impl FrameRead for ObjectReader {
    fn read_frame(&mut self, cx: &Context) -> Result<Option<Frame>, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        match self.segments.read(cx) {
            Ok(object) => Ok(object.map(Frame::from)),
            Err(err) if err.kind() == ErrorKind::FrameSizeOverflow => {
                Err(self.latch(Error::frame_size_overflow(self.max_frame_size)))
            }
            Err(err) if err.kind() == ErrorKind::Malformed => Err(self.latch(err)),
            Err(err) => Err(err),
        }
    }

    fn close(&mut self, cx: &Context) -> Result<(), Error> {
        self.segments.close(cx)
    }

    fn framing_type(&self) -> FramingType {
        FramingType::Json
    }

    fn metadata(&self) -> &Metadata {
        self.segments.metadata()
    }
}

pub fn object_writer(writer: ContentWriter, _opts: &WriterOptions) -> DelegatingWriter {
    DelegatingWriter::new(FramingType::Json, writer)
}

fn malformed(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Malformed).with_message(message)
}

fn too_large(max_frame_size: u64) -> Error {
    Error::new(ErrorKind::FrameSizeOverflow)
        .with_message("object too large")
        .with_limit(max_frame_size)
}

/// Decodes one JSON value at a time off a buffered stream, keeping its exact bytes.
struct ObjectSplitter {
    input: BufReader<UnderlyingReader>,
    max_frame_size: u64,
}

impl ObjectSplitter {
    fn new(underlying: UnderlyingReader, max_frame_size: u64) -> Self {
        Self {
            input: BufReader::new(underlying),
            max_frame_size,
        }
    }

    /// Skips whitespace between objects and returns the next byte without
    /// consuming it; `None` at end of stream.
    fn peek_start(&mut self) -> Result<Option<u8>, Error> {
        loop {
            let buf = self.input.fill_buf()?;
            let Some(skip) = buf.iter().position(|b| !b.is_ascii_whitespace()) else {
                if buf.is_empty() {
                    return Ok(None);
                }
                let len = buf.len();
                self.input.consume(len);
                continue;
            };
            let first = buf[skip];
            self.input.consume(skip);
            return Ok(Some(first));
        }
    }
}

impl RawSegmentRead for ObjectSplitter {
    fn read_segment(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let Some(first) = self.peek_start()? else {
            return Ok(None);
        };
        if first != b'{' && first != b'[' {
            return Err(malformed(format!(
                "expected '{{' or '[' at start of object, found {:?}",
                first as char
            )));
        }
        let max_frame_size = self.max_frame_size;
        // One byte past the budget tells "too large" apart from "ends exactly at the limit".
        let mut budget = (&mut self.input).take(max_frame_size.saturating_add(1));
        // Objects and arrays close themselves, so the decoder never reads past the value.
        let decoded = Box::<RawValue>::deserialize(&mut Deserializer::from_reader(&mut budget));
        let exhausted = budget.limit() == 0;
        match decoded {
            Ok(raw) if raw.get().len() as u64 > max_frame_size => Err(too_large(max_frame_size)),
            Ok(raw) => Ok(Some(raw.get().as_bytes().to_vec())),
            Err(err) if err.is_io() => Err(Error::from(io::Error::from(err))),
            Err(err) if err.is_eof() && exhausted => Err(too_large(max_frame_size)),
            Err(err) if err.is_eof() => {
                Err(malformed("unexpected end of stream inside object").with_source(err))
            }
            Err(err) => Err(malformed("invalid object").with_source(err)),
        }
    }
}
