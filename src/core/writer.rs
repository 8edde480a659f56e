// Instrumented content writer with layered wrapping.
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::core::context::{CallScope, Context};
use crate::core::error::Error;
use crate::core::layer::{Close, IoCall, IoOp, Layer, SharedCloser, Wrapped, lock};
use crate::core::metadata::Metadata;

/// A writable byte stream bound to [`Metadata`].
///
/// `write` has `write_all` semantics: a sink that stops accepting bytes
/// without an error surfaces as `ErrorKind::ShortWrite`.
#[derive(Clone)]
pub struct ContentWriter {
    layer: Layer<dyn Write + Send>,
}

impl ContentWriter {
    /// Writer whose close is a no-op (for example stdout).
    pub fn from_writer(writer: impl Write + Send + 'static, metadata: Metadata) -> Self {
        let stream: Arc<Mutex<dyn Write + Send>> = Arc::new(Mutex::new(writer));
        Self {
            layer: Layer::new(stream, SharedCloser::noop(), metadata),
        }
    }

    pub fn from_write_closer<W: Write + Close + Send + 'static>(
        writer: W,
        metadata: Metadata,
    ) -> Self {
        let concrete = Arc::new(Mutex::new(writer));
        let closer = SharedCloser::owning(concrete.clone());
        let stream: Arc<Mutex<dyn Write + Send>> = concrete;
        Self {
            layer: Layer::new(stream, closer, metadata),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.layer.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.layer.metadata
    }

    pub fn has_closer(&self) -> bool {
        !self.layer.closer.is_noop()
    }

    pub fn write(&self, cx: &Context, buf: &[u8]) -> Result<usize, Error> {
        let call = IoCall::begin(cx, IoOp::Write, &self.layer.metadata)?;
        let result = lock(&self.layer.stream)
            .write_all(buf)
            .map(|()| buf.len())
            .map_err(Error::from);
        if result.is_ok() {
            call.record_bytes(buf);
        }
        call.finish(result)
    }

    pub fn flush(&self, cx: &Context) -> Result<(), Error> {
        cx.check()?;
        lock(&self.layer.stream).flush().map_err(Error::from)
    }

    pub fn close(&self, cx: &Context) -> Result<(), Error> {
        self.layer.close(cx)
    }

    pub fn with_context<'a>(&'a self, cx: &'a Context) -> BoundWriter<'a> {
        BoundWriter { writer: self, cx }
    }

    pub fn underlying(&self) -> UnderlyingWriter {
        UnderlyingWriter {
            writer: self.clone(),
        }
    }

    /// New layer over this one; see [`ContentReader::wrap`](crate::core::reader::ContentReader::wrap).
    pub fn wrap(
        &self,
        transform: impl FnOnce(UnderlyingWriter) -> Wrapped<dyn Write + Send>,
    ) -> ContentWriter {
        let wrapped = transform(self.underlying());
        let inner = self.clone();
        ContentWriter {
            layer: Layer::wrapped(wrapped, self.metadata().clone(), move || {
                inner.close(&CallScope::current().unwrap_or_default())
            }),
        }
    }
}

impl std::fmt::Debug for ContentWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentWriter")
            .field("metadata", &self.layer.metadata)
            .field("closer", &self.layer.closer)
            .finish()
    }
}

/// `io::Write` view of a [`ContentWriter`] with its context fixed.
pub struct BoundWriter<'a> {
    writer: &'a ContentWriter,
    cx: &'a Context,
}

impl BoundWriter<'_> {
    pub fn close(&self) -> Result<(), Error> {
        self.writer.close(self.cx)
    }
}

impl Write for BoundWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(self.cx, buf).map_err(Error::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush(self.cx).map_err(Error::into_io)
    }
}

/// The wrapped layer as seen from inside a transform.
pub struct UnderlyingWriter {
    writer: ContentWriter,
}

impl UnderlyingWriter {
    pub fn metadata(&self) -> &Metadata {
        self.writer.metadata()
    }
}

impl Write for UnderlyingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let cx = CallScope::current().unwrap_or_default();
        self.writer.write(&cx, buf).map_err(Error::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        let cx = CallScope::current().unwrap_or_default();
        self.writer.flush(&cx).map_err(Error::into_io)
    }
}

impl Close for UnderlyingWriter {
    fn close(&mut self) -> io::Result<()> {
        let cx = CallScope::current().unwrap_or_default();
        self.writer.close(&cx).map_err(Error::into_io)
    }
}
