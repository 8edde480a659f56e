// Instrumented reader of pre-split segments (documents or objects).
use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::layer::{Close, IoCall, IoOp, Layer, SharedCloser, Wrapped, lock};
use crate::core::metadata::Metadata;
use std::sync::{Arc, Mutex};

/// A raw source of whole segments. `Ok(None)` ends the stream.
pub trait RawSegmentRead: Send {
    fn read_segment(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

impl Wrapped<dyn RawSegmentRead> {
    pub fn segment(segments: impl RawSegmentRead + 'static) -> Self {
        Self {
            stream: Arc::new(Mutex::new(segments)),
            closer: None,
        }
    }

    pub fn segment_closer<S: RawSegmentRead + Close + 'static>(segments: S) -> Self {
        let concrete = Arc::new(Mutex::new(segments));
        let closer = SharedCloser::owning(concrete.clone());
        let stream: Arc<Mutex<dyn RawSegmentRead>> = concrete;
        Self {
            stream,
            closer: Some(closer),
        }
    }
}

/// Segment-level counterpart of [`ContentReader`](crate::core::reader::ContentReader),
/// built with `ContentReader::wrap_segment`.
#[derive(Clone)]
pub struct SegmentReader {
    layer: Layer<dyn RawSegmentRead>,
}

impl SegmentReader {
    pub(crate) fn from_layer(layer: Layer<dyn RawSegmentRead>) -> Self {
        Self { layer }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.layer.metadata
    }

    pub fn read(&self, cx: &Context) -> Result<Option<Vec<u8>>, Error> {
        let call = IoCall::begin(cx, IoOp::Read, &self.layer.metadata)?;
        let result = lock(&self.layer.stream).read_segment();
        match &result {
            Ok(Some(segment)) => call.record_bytes(segment),
            Ok(None) => call.record_eof(),
            Err(_) => {}
        }
        call.finish(result)
    }

    pub fn close(&self, cx: &Context) -> Result<(), Error> {
        self.layer.close(cx)
    }

    pub fn with_context<'a>(&'a self, cx: &'a Context) -> BoundSegmentReader<'a> {
        BoundSegmentReader { reader: self, cx }
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("metadata", &self.layer.metadata)
            .finish()
    }
}

pub struct BoundSegmentReader<'a> {
    reader: &'a SegmentReader,
    cx: &'a Context,
}

impl BoundSegmentReader<'_> {
    pub fn read(&self) -> Result<Option<Vec<u8>>, Error> {
        self.reader.read(self.cx)
    }

    pub fn close(&self) -> Result<(), Error> {
        self.reader.close(self.cx)
    }
}
