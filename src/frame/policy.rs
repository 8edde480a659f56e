//! Purpose: Policy wrappers around low-level framing strategies.
//! Exports: `FrameReader`, `FrameWriter`.
//! Role: The types the factory hands out; they add spans, limits, sanitizing, and locking.
//! Invariants: `FrameWriter` holds its counter lock for the whole write, so writes are totally ordered.
//! Invariants: The frame counter only moves on a successful write of a frame that reads back.
//! Invariants: Close never waits on the write lock.
use std::sync::Mutex;

use tracing::{debug, debug_span, field, trace};

use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::framing::FramingType;
use crate::core::layer::lock;
use crate::core::metadata::Metadata;
use crate::frame::util::Frames;
use crate::frame::{Frame, FrameRead, FrameWrite, ReaderOptions, WriterOptions};

pub struct FrameReader {
    reader: Box<dyn FrameRead>,
    options: ReaderOptions,
    frame_count: u64,
    latched: Option<Error>,
}

impl FrameReader {
    pub fn new(reader: Box<dyn FrameRead>, options: ReaderOptions) -> Self {
        Self {
            reader,
            options,
            frame_count: 0,
            latched: None,
        }
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Iterates frames until end of stream or the first error.
    pub fn frames<'a>(&'a mut self, cx: &'a Context) -> Frames<'a, Self> {
        Frames::new(self, cx)
    }
}

impl FrameRead for FrameReader {
    fn read_frame(&mut self, cx: &Context) -> Result<Option<Frame>, Error> {
        let span = debug_span!(
            parent: cx.span(),
            "ReadFrame",
            framing_type = %self.reader.framing_type(),
            content_metadata = %self.reader.metadata(),
            byte_length = field::Empty
        );
        let _entered = span.enter();
        let cx = cx.clone().with_span(span.clone());

        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        let frame = match self.reader.read_frame(&cx) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("EOF");
                return Ok(None);
            }
            Err(err) => {
                debug!(error = %err, "read frame failed");
                return Err(err);
            }
        };
        if self.frame_count >= self.options.max_frames {
            let err = Error::frame_count_overflow(self.options.max_frames);
            debug!(error = %err, "read frame failed");
            self.latched = Some(err.clone());
            return Err(err);
        }
        self.frame_count += 1;
        span.record("byte_length", frame.len());
        Ok(Some(frame))
    }

    fn close(&mut self, cx: &Context) -> Result<(), Error> {
        let span = debug_span!(parent: cx.span(), "Close", framing_type = %self.reader.framing_type());
        let _entered = span.enter();
        let cx = cx.clone().with_span(span.clone());
        self.reader.close(&cx)
    }

    fn framing_type(&self) -> FramingType {
        self.reader.framing_type()
    }

    fn metadata(&self) -> &Metadata {
        self.reader.metadata()
    }
}

impl std::fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("framing_type", &self.reader.framing_type())
            .field("options", &self.options)
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

/// Thread-safe frame writer. Share it behind an `Arc` to write from many threads.
pub struct FrameWriter {
    writer: Box<dyn FrameWrite>,
    options: WriterOptions,
    frame_count: Mutex<u64>,
}

impl FrameWriter {
    pub fn new(writer: Box<dyn FrameWrite>, options: WriterOptions) -> Self {
        Self {
            writer,
            options,
            frame_count: Mutex::new(0),
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Frames successfully written so far.
    pub fn frame_count(&self) -> u64 {
        *lock(&self.frame_count)
    }

    fn write_locked(&self, cx: &Context, count: &mut u64, frame: &[u8]) -> Result<(), Error> {
        if frame.len() as u64 > self.options.max_frame_size {
            return Err(Error::frame_size_overflow(self.options.max_frame_size));
        }
        if *count >= self.options.max_frames {
            return Err(Error::frame_count_overflow(self.options.max_frames));
        }
        let framing_type = self.writer.framing_type();
        let frame = self.options.sanitizer.sanitize(&framing_type, frame)?;
        cx.span().record("byte_length", frame.len());
        if framing_type.is_blank_frame(&frame) {
            trace!("dropping blank frame");
            return Ok(());
        }
        self.writer.write_frame(cx, &frame)?;
        *count += 1;
        Ok(())
    }
}

impl FrameWrite for FrameWriter {
    fn write_frame(&self, cx: &Context, frame: &[u8]) -> Result<(), Error> {
        let mut count = lock(&self.frame_count);
        let span = debug_span!(
            parent: cx.span(),
            "WriteFrame",
            framing_type = %self.writer.framing_type(),
            byte_length = field::Empty
        );
        let _entered = span.enter();
        let cx = cx.clone().with_span(span.clone());
        let result = self.write_locked(&cx, &mut count, frame);
        if let Err(err) = &result {
            debug!(error = %err, "write frame failed");
        }
        result
    }

    fn close(&self, cx: &Context) -> Result<(), Error> {
        let span = debug_span!(parent: cx.span(), "Close", framing_type = %self.writer.framing_type());
        let _entered = span.enter();
        let cx = cx.clone().with_span(span.clone());
        self.writer.close(&cx)
    }

    fn framing_type(&self) -> FramingType {
        self.writer.framing_type()
    }

    fn metadata(&self) -> &Metadata {
        self.writer.metadata()
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("framing_type", &self.writer.framing_type())
            .field("options", &self.options)
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameReader, FrameWriter};
    use crate::core::context::Context;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::framing::FramingType;
    use crate::core::layer::Closable;
    use crate::core::metadata::Metadata;
    use crate::core::source::from_string;
    use crate::core::writer::ContentWriter;
    use crate::frame::document::DocumentReader;
    use crate::frame::document::document_writer;
    use crate::frame::object::object_writer;
    use crate::frame::{FrameRead, FrameWrite, ReaderOptions, Sanitizer, WriterOptions};
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Sink {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().expect("sink").clone()
        }
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("sink").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn json_writer(sink: &Sink, options: WriterOptions) -> FrameWriter {
        let content = ContentWriter::from_writer(sink.clone(), Metadata::new());
        FrameWriter::new(Box::new(object_writer(content, &options)), options)
    }

    #[test]
    fn oversized_frame_fails_identically_and_keeps_count() {
        let cx = Context::new();
        let sink = Sink::default();
        let writer = json_writer(&sink, WriterOptions::new().with_max_frame_size(10));
        let blob = [b'x'; 11];
        for _ in 0..2 {
            let err = writer.write_frame(&cx, &blob).expect_err("too large");
            assert_eq!(err.kind(), ErrorKind::FrameSizeOverflow);
            assert_eq!(err.limit(), Some(10));
        }
        assert_eq!(writer.frame_count(), 0);
        assert!(sink.contents().is_empty());

        writer.write_frame(&cx, b"{}").expect("small frame still fits");
        assert_eq!(writer.frame_count(), 1);
    }

    #[test]
    fn count_limit_rejects_the_next_write() {
        let cx = Context::new();
        let sink = Sink::default();
        let writer = json_writer(&sink, WriterOptions::new().with_max_frames(2));
        writer.write_frame(&cx, b"{\"a\":1}").expect("first");
        writer.write_frame(&cx, b"{\"a\":2}").expect("second");
        let err = writer.write_frame(&cx, b"{\"a\":3}").expect_err("third");
        assert_eq!(err.kind(), ErrorKind::FrameCountOverflow);
        assert_eq!(err.limit(), Some(2));
        assert_eq!(writer.frame_count(), 2);
        assert_eq!(sink.contents(), b"{\"a\":1}{\"a\":2}");
    }

    #[test]
    fn sanitizer_can_drop_frames_without_counting() {
        let cx = Context::new();
        let sink = Sink::default();
        let options = WriterOptions::new().with_sanitizer(Sanitizer::new(|_, frame| {
            Ok(if frame == b"{}" { Vec::new() } else { frame.to_vec() })
        }));
        let writer = json_writer(&sink, options);
        writer.write_frame(&cx, b"{}").expect("dropped");
        assert_eq!(writer.frame_count(), 0);
        writer.write_frame(&cx, b"[1]").expect("kept");
        assert_eq!(writer.frame_count(), 1);
        assert_eq!(sink.contents(), b"[1]");
    }

    #[test]
    fn whitespace_only_documents_are_dropped_so_counts_round_trip() {
        let cx = Context::new();
        let sink = Sink::default();
        let options = WriterOptions::new();
        let content = ContentWriter::from_writer(sink.clone(), Metadata::new());
        let writer = FrameWriter::new(Box::new(document_writer(content, &options)), options);
        for frame in ["a: 1\n", "  \n", "\n\t", "b: 2\n"] {
            writer.write_frame(&cx, frame.as_bytes()).expect("write");
        }
        assert_eq!(writer.frame_count(), 2);

        let read_options = ReaderOptions::new();
        let text = String::from_utf8(sink.contents()).expect("utf8");
        let low = DocumentReader::new(from_string(text, []), &read_options);
        let mut reader = FrameReader::new(Box::new(low), read_options);
        let frames = reader
            .frames(&cx)
            .collect::<Result<Vec<_>, _>>()
            .expect("frames");
        assert_eq!(frames.len() as u64, writer.frame_count());
    }

    #[test]
    fn whitespace_only_objects_are_dropped() {
        let cx = Context::new();
        let sink = Sink::default();
        let writer = json_writer(&sink, WriterOptions::new());
        writer.write_frame(&cx, b" \n").expect("dropped");
        writer.write_frame(&cx, b"{}").expect("kept");
        assert_eq!(writer.frame_count(), 1);
        assert_eq!(sink.contents(), b"{}");
    }

    #[test]
    fn writer_close_is_idempotent() {
        let cx = Context::new();
        let sink = Sink::default();
        let options = WriterOptions::new();
        let content = ContentWriter::from_write_closer(Closable::new(sink.clone()), Metadata::new());
        let writer = FrameWriter::new(Box::new(object_writer(content, &options)), options);
        writer.write_frame(&cx, b"{}").expect("write");
        writer.close(&cx).expect("first close");
        writer.close(&cx).expect("second close");
        let err = writer.write_frame(&cx, b"[]").expect_err("write after close");
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert_eq!(sink.contents(), b"{}");
        assert_eq!(writer.frame_count(), 1);
    }

    #[test]
    fn sanitizer_errors_propagate() {
        let cx = Context::new();
        let sink = Sink::default();
        let options = WriterOptions::new().with_sanitizer(Sanitizer::new(|framing_type, _| {
            Err(Error::new(ErrorKind::Malformed).with_framing_type(framing_type.as_str()))
        }));
        let writer = json_writer(&sink, options);
        let err = writer.write_frame(&cx, b"{}").expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.framing_type(), Some("json"));
        assert_eq!(writer.frame_count(), 0);
        assert_eq!(writer.framing_type(), FramingType::Json);
    }

    #[test]
    fn reader_enforces_max_frames() {
        let cx = Context::new();
        let options = ReaderOptions::new().with_max_frames(1);
        let low = DocumentReader::new(from_string("a: 1\n---\nb: 2\n", []), &options);
        let mut reader = FrameReader::new(Box::new(low), options);
        assert!(reader.read_frame(&cx).expect("first").is_some());
        let err = reader.read_frame(&cx).expect_err("second");
        assert_eq!(err.kind(), ErrorKind::FrameCountOverflow);
        let again = reader.read_frame(&cx).expect_err("latched");
        assert_eq!(again.kind(), ErrorKind::FrameCountOverflow);
        assert_eq!(reader.frame_count(), 1);
    }

    #[test]
    fn frames_iterator_stops_at_end() {
        let cx = Context::new();
        let options = ReaderOptions::new();
        let low = DocumentReader::new(from_string("a: 1\n---\nb: 2\n", []), &options);
        let mut reader = FrameReader::new(Box::new(low), options);
        let frames = reader
            .frames(&cx)
            .collect::<Result<Vec<_>, _>>()
            .expect("frames");
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][..], b"b: 2\n");
    }
}
