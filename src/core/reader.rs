// Instrumented content reader with layered wrapping.
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use crate::core::context::{CallScope, Context};
use crate::core::error::Error;
use crate::core::layer::{Close, IoCall, IoOp, Layer, SharedCloser, Wrapped, lock};
use crate::core::metadata::Metadata;
use crate::core::segment::{RawSegmentRead, SegmentReader};

/// A readable byte stream bound to [`Metadata`].
///
/// Clones share the raw stream and closer. Every call opens a `Read` or
/// `Close` span under the caller's context.
#[derive(Clone)]
pub struct ContentReader {
    layer: Layer<dyn Read + Send>,
}

impl ContentReader {
    /// Reader whose close is a no-op (for example stdin).
    pub fn from_reader(reader: impl Read + Send + 'static, metadata: Metadata) -> Self {
        let stream: Arc<Mutex<dyn Read + Send>> = Arc::new(Mutex::new(reader));
        Self {
            layer: Layer::new(stream, SharedCloser::noop(), metadata),
        }
    }

    pub fn from_read_closer<R: Read + Close + Send + 'static>(reader: R, metadata: Metadata) -> Self {
        let concrete = Arc::new(Mutex::new(reader));
        let closer = SharedCloser::owning(concrete.clone());
        let stream: Arc<Mutex<dyn Read + Send>> = concrete;
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

    pub fn read(&self, cx: &Context, buf: &mut [u8]) -> Result<usize, Error> {
        let call = IoCall::begin(cx, IoOp::Read, &self.layer.metadata)?;
        let result = lock(&self.layer.stream).read(buf).map_err(Error::from);
        match &result {
            Ok(0) if !buf.is_empty() => call.record_eof(),
            Ok(n) => call.record_bytes(&buf[..*n]),
            Err(_) => {}
        }
        call.finish(result)
    }

    /// Reads until end of stream.
    pub fn read_to_end(&self, cx: &Context, out: &mut Vec<u8>) -> Result<usize, Error> {
        let start = out.len();
        let mut chunk = [0u8; 8 * 1024];
        loop {
            match self.read(cx, &mut chunk) {
                Ok(0) => return Ok(out.len() - start),
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(err) => return Err(err),
            }
        }
    }

    pub fn close(&self, cx: &Context) -> Result<(), Error> {
        self.layer.close(cx)
    }

    pub fn with_context<'a>(&'a self, cx: &'a Context) -> BoundReader<'a> {
        BoundReader { reader: self, cx }
    }

    /// Handle to this layer for use inside a wrap transform.
    pub fn underlying(&self) -> UnderlyingReader {
        UnderlyingReader {
            reader: self.clone(),
        }
    }

    /// New layer over this one. The transform's [`Wrapped`] decides whether
    /// closing the new layer closes this one or a stream of its own.
    pub fn wrap(
        &self,
        transform: impl FnOnce(UnderlyingReader) -> Wrapped<dyn Read + Send>,
    ) -> ContentReader {
        let wrapped = transform(self.underlying());
        ContentReader {
            layer: Layer::wrapped(wrapped, self.metadata().clone(), self.delegate_close()),
        }
    }

    pub fn wrap_segment(
        &self,
        transform: impl FnOnce(UnderlyingReader) -> Wrapped<dyn RawSegmentRead>,
    ) -> SegmentReader {
        let wrapped = transform(self.underlying());
        SegmentReader::from_layer(Layer::wrapped(
            wrapped,
            self.metadata().clone(),
            self.delegate_close(),
        ))
    }

    fn delegate_close(&self) -> impl FnOnce() -> Result<(), Error> + Send + 'static {
        let inner = self.clone();
        move || inner.close(&CallScope::current().unwrap_or_default())
    }
}

impl std::fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentReader")
            .field("metadata", &self.layer.metadata)
            .field("closer", &self.layer.closer)
            .finish()
    }
}

/// `io::Read` view of a [`ContentReader`] with its context fixed.
pub struct BoundReader<'a> {
    reader: &'a ContentReader,
    cx: &'a Context,
}

impl BoundReader<'_> {
    pub fn close(&self) -> Result<(), Error> {
        self.reader.close(self.cx)
    }
}

impl Read for BoundReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(self.cx, buf).map_err(Error::into_io)
    }
}

/// The wrapped layer as seen from inside a transform. Calls run under the
/// context of the call that reached them, so their spans nest under it.
pub struct UnderlyingReader {
    reader: ContentReader,
}

impl UnderlyingReader {
    pub fn metadata(&self) -> &Metadata {
        self.reader.metadata()
    }
}

impl Read for UnderlyingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cx = CallScope::current().unwrap_or_default();
        self.reader.read(&cx, buf).map_err(Error::into_io)
    }
}

impl Close for UnderlyingReader {
    fn close(&mut self) -> io::Result<()> {
        let cx = CallScope::current().unwrap_or_default();
        self.reader.close(&cx).map_err(Error::into_io)
    }
}
