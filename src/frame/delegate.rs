// Pass-through writer shared by the document and object strategies, plus the
// strategies handed out for framing types nothing else understands.
use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::framing::FramingType;
use crate::core::metadata::Metadata;
use crate::core::writer::ContentWriter;
use crate::frame::{Frame, FrameRead, FrameWrite};

/// Writes each frame to the content writer as one call.
pub struct DelegatingWriter {
    framing_type: FramingType,
    writer: ContentWriter,
}

impl DelegatingWriter {
    pub fn new(framing_type: FramingType, writer: ContentWriter) -> Self {
        Self {
            framing_type,
            writer,
        }
    }
}

impl FrameWrite for DelegatingWriter {
    fn write_frame(&self, cx: &Context, frame: &[u8]) -> Result<(), Error> {
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

/// Fails every frame call with `UnsupportedFramingType`. Close never touches
/// the stream.
pub struct UnsupportedReader {
    framing_type: FramingType,
    metadata: Metadata,
}

impl UnsupportedReader {
    pub fn new(framing_type: FramingType, metadata: Metadata) -> Self {
        Self {
            framing_type,
            metadata,
        }
    }
}

impl FrameRead for UnsupportedReader {
    fn read_frame(&mut self, _cx: &Context) -> Result<Option<Frame>, Error> {
        Err(Error::unsupported_framing_type(self.framing_type.as_str()))
    }

    fn close(&mut self, _cx: &Context) -> Result<(), Error> {
        Ok(())
    }

    fn framing_type(&self) -> FramingType {
        self.framing_type.clone()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

pub struct UnsupportedWriter {
    framing_type: FramingType,
    metadata: Metadata,
}

impl UnsupportedWriter {
    pub fn new(framing_type: FramingType, metadata: Metadata) -> Self {
        Self {
            framing_type,
            metadata,
        }
    }
}

impl FrameWrite for UnsupportedWriter {
    fn write_frame(&self, _cx: &Context, _frame: &[u8]) -> Result<(), Error> {
        Err(Error::unsupported_framing_type(self.framing_type.as_str()))
    }

    fn close(&self, _cx: &Context) -> Result<(), Error> {
        Ok(())
    }

    fn framing_type(&self) -> FramingType {
        self.framing_type.clone()
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::{UnsupportedReader, UnsupportedWriter};
    use crate::core::context::Context;
    use crate::core::error::ErrorKind;
    use crate::core::framing::FramingType;
    use crate::core::metadata::Metadata;
    use crate::frame::{FrameRead, FrameWrite};

    #[test]
    fn unsupported_strategies_fail_every_call() {
        let cx = Context::new();
        let toml = FramingType::from("toml");

        let mut reader = UnsupportedReader::new(toml.clone(), Metadata::new());
        for _ in 0..2 {
            let err = reader.read_frame(&cx).expect_err("unsupported");
            assert_eq!(err.kind(), ErrorKind::UnsupportedFramingType);
            assert_eq!(err.framing_type(), Some("toml"));
        }
        reader.close(&cx).expect("close is a no-op");

        let writer = UnsupportedWriter::new(toml, Metadata::new());
        let err = writer.write_frame(&cx, b"x").expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::UnsupportedFramingType);
        writer.close(&cx).expect("close is a no-op");
    }
}
