// Convenience helpers over frame readers and writers.
use std::io::{self, Write};

use crate::core::context::Context;
use crate::core::error::Error;
use crate::frame::{Frame, FrameRead, FrameWrite};

pub type FrameList = Vec<Frame>;

/// Reads frames until end of stream; stops at the first error.
pub fn read_frame_list<R: FrameRead + ?Sized>(cx: &Context, reader: &mut R) -> Result<FrameList, Error> {
    let mut frames = FrameList::new();
    while let Some(frame) = reader.read_frame(cx)? {
        frames.push(frame);
    }
    Ok(frames)
}

/// Writes every frame in order; stops at the first error.
pub fn write_frame_list<W, F>(cx: &Context, writer: &W, frames: &[F]) -> Result<(), Error>
where
    W: FrameWrite + ?Sized,
    F: AsRef<[u8]>,
{
    for frame in frames {
        writer.write_frame(cx, frame.as_ref())?;
    }
    Ok(())
}

/// Iterator over a reader's frames; ends after end of stream or the first error.
pub struct Frames<'a, R: FrameRead + ?Sized> {
    reader: &'a mut R,
    cx: &'a Context,
    done: bool,
}

impl<'a, R: FrameRead + ?Sized> Frames<'a, R> {
    pub fn new(reader: &'a mut R, cx: &'a Context) -> Self {
        Self {
            reader,
            cx,
            done: false,
        }
    }
}

impl<R: FrameRead + ?Sized> Iterator for Frames<'_, R> {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_frame(self.cx) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// `io::Write` over a frame writer: each `write` call is one whole frame.
/// A successful write always reports the full length.
pub struct FrameIoWriter<'a, W: FrameWrite + ?Sized> {
    writer: &'a W,
    cx: Context,
}

impl<'a, W: FrameWrite + ?Sized> FrameIoWriter<'a, W> {
    pub fn new(writer: &'a W, cx: Context) -> Self {
        Self { writer, cx }
    }

    pub fn close(&self) -> Result<(), Error> {
        self.writer.close(&self.cx)
    }
}

impl<W: FrameWrite + ?Sized> Write for FrameIoWriter<'_, W> {
    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.writer
            .write_frame(&self.cx, frame)
            .map(|()| frame.len())
            .map_err(Error::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameIoWriter, read_frame_list, write_frame_list};
    use crate::core::context::Context;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::metadata::Metadata;
    use crate::core::source::from_string;
    use crate::core::writer::ContentWriter;
    use crate::frame::document::{DocumentReader, document_writer};
    use crate::frame::object::object_writer;
    use crate::frame::policy::FrameWriter;
    use crate::frame::{FrameWrite, ReaderOptions, WriterOptions};
    use std::io::{self, Write};
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
    fn frame_lists_round_trip() {
        let cx = Context::new();
        let sink = Sink::default();
        let writer = document_writer(
            ContentWriter::from_writer(sink.clone(), Metadata::new()),
            &WriterOptions::new(),
        );
        write_frame_list(&cx, &writer, &["a: 1\n", "b: 2\n"]).expect("write list");

        let written = String::from_utf8(sink.0.lock().expect("sink").clone()).expect("utf8");
        let mut reader = DocumentReader::new(from_string(written, []), &ReaderOptions::new());
        let frames = read_frame_list(&cx, &mut reader).expect("read list");
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], b"a: 1\n");
    }

    #[test]
    fn write_list_stops_at_first_error() {
        let cx = Context::new();
        let options = WriterOptions::new().with_max_frames(1);
        let sink = Sink::default();
        let content = ContentWriter::from_writer(sink.clone(), Metadata::new());
        let writer = FrameWriter::new(Box::new(object_writer(content, &options)), options);
        let err = write_frame_list(&cx, &writer, &[b"{}".to_vec(), b"[]".to_vec(), b"{}".to_vec()])
            .expect_err("second frame over count");
        assert_eq!(err.kind(), ErrorKind::FrameCountOverflow);
        assert_eq!(sink.0.lock().expect("sink").as_slice(), b"{}");
    }

    #[test]
    fn io_writer_maps_frames_to_writes() {
        let cx = Context::new();
        let options = WriterOptions::new().with_max_frame_size(4);
        let sink = Sink::default();
        let content = ContentWriter::from_writer(sink.clone(), Metadata::new());
        let writer = FrameWriter::new(Box::new(object_writer(content, &options)), options);

        let mut io_writer = FrameIoWriter::new(&writer, cx);
        assert_eq!(io_writer.write(b"[1]").expect("fits"), 3);
        let err = Error::from(io_writer.write(b"[1,2]").expect_err("too large"));
        assert_eq!(err.kind(), ErrorKind::FrameSizeOverflow);
        io_writer.close().expect("close");
        assert_eq!(writer.frame_count(), 1);
        assert_eq!(writer.framing_type().as_str(), "json");
    }
}
