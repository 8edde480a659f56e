// Whole-stream framing: the entire input is one frame, and exactly one frame is written.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::context::Context;
use crate::core::error::{Error, ErrorKind};
use crate::core::framing::FramingType;
use crate::core::limited::wrap_limited;
use crate::core::metadata::Metadata;
use crate::core::reader::ContentReader;
use crate::core::writer::ContentWriter;
use crate::frame::{Frame, FrameRead, FrameWrite, ReaderOptions, WriterOptions};

pub struct SingleReader {
    framing_type: FramingType,
    reader: ContentReader,
    read: bool,
    latched: Option<Error>,
}

impl SingleReader {
    pub fn new(framing_type: FramingType, reader: ContentReader, opts: &ReaderOptions) -> Self {
        let (reader, _reset) = wrap_limited(&reader, opts.max_frame_size);
        Self {
            framing_type,
            reader,
            read: false,
            latched: None,
        }
    }
}

impl FrameRead for SingleReader {
    fn read_frame(&mut self, cx: &Context) -> Result<Option<Frame>, Error> {
        if let Some(err) = &self.latched {
            return Err(err.clone());
        }
        if self.read {
            return Ok(None);
        }
        let mut frame = Vec::new();
        match self.reader.read_to_end(cx, &mut frame) {
            Ok(_) => {
                self.read = true;
                Ok(Some(Frame::from(frame)))
            }
            Err(err) => {
                if err.is_overflow() {
                    self.latched = Some(err.clone());
                } else {
                    self.read = true;
                }
                Err(err)
            }
        }
    }

    fn close(&mut self, cx: &Context) -> Result<(), Error> {
        self.reader.close(cx)
    }

    fn framing_type(&self) -> FramingType {
        self.framing_type.clone()
    }

    fn metadata(&self) -> &Metadata {
        self.reader.metadata()
    }
}

pub struct SingleWriter {
    framing_type: FramingType,
    writer: ContentWriter,
    written: AtomicBool,
}

impl SingleWriter {
    pub fn new(framing_type: FramingType, writer: ContentWriter, _opts: &WriterOptions) -> Self {
        Self {
            framing_type,
            writer,
            written: AtomicBool::new(false),
        }
    }
}

impl FrameWrite for SingleWriter {
    fn write_frame(&self, cx: &Context, frame: &[u8]) -> Result<(), Error> {
        if self.written.swap(true, Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::ClosedWrite)
                .with_message("single frame already written")
                .with_framing_type(self.framing_type.as_str()));
        }
        self.writer.write(cx, frame).map(|_| ())
    }

    fn close(&self, cx: &Context) -> Result<(), Error> {
        self.writer.close(cx)
    }

    fn framing_type(&self) -> FramingType {
        self.framing_type.clone()
    }

    fn metadata(&self) -> &Metadata {
        self.writer.metadata()
    }
}
