//! Purpose: Document-separated framing (`---` lines between documents).
//! Exports: `DocumentReader`, `document_writer`.
//! Role: Low-level strategy for `FramingType::Yaml`; no locking or count policy here.
//! Invariants: Delivered documents are non-empty, carry no separator text, and end in exactly one `\n`.
//! Invariants: The byte budget is reset only after a document is extracted.
use std::io::{self, BufRead, BufReader, Write};

use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::framing::FramingType;
use crate::core::layer::Wrapped;
use crate::core::limited::{LimitReset, wrap_limited};
use crate::core::metadata::Metadata;
use crate::core::reader::{ContentReader, UnderlyingReader};
use crate::core::segment::{RawSegmentRead, SegmentReader};
use crate::core::writer::{ContentWriter, UnderlyingWriter};
use crate::frame::delegate::DelegatingWriter;
use crate::frame::{Frame, FrameRead, ReaderOptions, WriterOptions};

pub const SEPARATOR: &[u8] = b"---";

// Leading and trailing separator lines, each with room for "\r\n".
const SEPARATOR_OVERHEAD: u64 = 2 * (SEPARATOR.len() as u64 + 2);

pub struct DocumentReader {
    segments: SegmentReader,
    reset: LimitReset,
    max_frame_size: u64,
    latched: Option<Error>,
}

impl DocumentReader {
    pub fn new(reader: ContentReader, opts: &ReaderOptions) -> Self {
        let max_frame_size = opts.max_frame_size;
        let (limited, reset) =
            wrap_limited(&reader, max_frame_size.saturating_add(SEPARATOR_OVERHEAD));
        let segments =
            limited.wrap_segment(|underlying| Wrapped::segment(DocumentSplitter::new(underlying)));
        Self {
            segments,
            reset,
            max_frame_size,
            latched: None,
        }
    }

    fn latch(&mut self, err: Error) -> Error {
        self.latched = Some(err.clone());
        err
    }
}

impl FrameRead for DocumentReader {
    fn read_frame(&mut self, cx: &Context) -> Result<Option<Frame>, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let document = match self.segments.read(cx) {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(None),
            Err(err) if err.is_overflow() => {
                return Err(self.latch(Error::frame_size_overflow(self.max_frame_size)));
            }
            Err(err) => return Err(err),
        };
        self.reset.reset();
        if document.len() as u64 > self.max_frame_size {
            return Err(self.latch(Error::frame_size_overflow(self.max_frame_size)));
        }
        Ok(Some(Frame::from(document)))
    }

    fn close(&mut self, cx: &Context) -> Result<(), Error> {
        self.segments.close(cx)
    }

    fn framing_type(&self) -> FramingType {
        FramingType::Yaml
    }

    fn metadata(&self) -> &Metadata {
        self.segments.metadata()
    }
}

/// Splits buffered lines into documents at separator lines.
struct DocumentSplitter {
    lines: BufReader<UnderlyingReader>,
    line: Vec<u8>,
}

impl DocumentSplitter {
    fn new(underlying: UnderlyingReader) -> Self {
        Self {
            lines: BufReader::new(underlying),
            line: Vec::new(),
        }
    }
}

impl RawSegmentRead for DocumentSplitter {
    fn read_segment(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let mut document = Vec::new();
        loop {
            self.line.clear();
            if self.lines.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(finish_document(document));
            }
            if is_separator(&self.line) {
                if let Some(done) = finish_document(std::mem::take(&mut document)) {
                    return Ok(Some(done));
                }
                continue;
            }
            document.extend_from_slice(&self.line);
        }
    }
}

/// `---` followed by nothing but whitespace or a comment.
fn is_separator(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(SEPARATOR) else {
        return false;
    };
    let rest = rest.trim_ascii_start();
    rest.is_empty() || rest.starts_with(b"#")
}

fn finish_document(mut document: Vec<u8>) -> Option<Vec<u8>> {
    let mut start = 0;
    for line in document.split_inclusive(|b| *b == b'\n') {
        if !line.trim_ascii().is_empty() {
            break;
        }
        start += line.len();
    }
    let end = document.trim_ascii_end().len();
    if start >= end {
        return None;
    }
    document.truncate(end);
    document.drain(..start);
    document.push(b'\n');
    Some(document)
}

/// Writes `---\n` ahead of every frame and terminates frames lacking a newline.
struct DocumentFramer {
    inner: UnderlyingWriter,
}

impl Write for DocumentFramer {
    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.inner.write_all(SEPARATOR)?;
        self.inner.write_all(b"\n")?;
        self.inner.write_all(frame)?;
        if !frame.ends_with(b"\n") {
            self.inner.write_all(b"\n")?;
        }
        Ok(frame.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub fn document_writer(writer: ContentWriter, _opts: &WriterOptions) -> DelegatingWriter {
    let framed = writer.wrap(|inner| Wrapped::writer(DocumentFramer { inner }));
    DelegatingWriter::new(FramingType::Yaml, framed)
}
