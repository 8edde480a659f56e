//! Purpose: Shared plumbing for layered content streams.
//! Exports: `Close`, `Closable`, `SharedCloser`, `Wrapped`.
//! Role: Holds one layer's raw stream and closer, decides closer ownership when a
//! layer is wrapped, and opens the per-call I/O span.
//! Invariants: A closer runs at most once; its first outcome is replayed to later callers.
//! Invariants: Closer ownership is fixed when a `Wrapped` is built and never re-derived.
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bstr::BStr;
use tracing::span::EnteredSpan;
use tracing::{Span, debug, field, trace, trace_span};

use crate::core::context::{CallScope, Context};
use crate::core::error::{Error, ErrorKind};
use crate::core::metadata::Metadata;

const PREVIEW_BYTES: usize = 512;

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A stream with an explicit close step.
pub trait Close {
    fn close(&mut self) -> io::Result<()>;
}

/// Makes any stream closable: `close` drops the inner value and later I/O
/// fails with `ErrorKind::Closed`.
#[derive(Debug)]
pub struct Closable<T> {
    inner: Option<T>,
}

impl<T> Closable<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn live(&mut self) -> io::Result<&mut T> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Closed).with_message("stream closed").into_io())
    }
}

impl<T: Read> Read for Closable<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.live()?.read(buf)
    }
}

impl<T: Write> Write for Closable<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.live()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<T> Close for Closable<T> {
    fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}

type CloseFn = Box<dyn FnOnce() -> Result<(), Error> + Send>;

struct CloseSlot {
    close: Option<CloseFn>,
    outcome: Option<Result<(), Error>>,
}

/// Close handle shared by every clone of a layer.
#[derive(Clone)]
pub struct SharedCloser {
    slot: Option<Arc<Mutex<CloseSlot>>>,
}

impl SharedCloser {
    /// A closer that does nothing; used for standard streams.
    pub fn noop() -> Self {
        Self { slot: None }
    }

    pub fn new(close: impl FnOnce() -> Result<(), Error> + Send + 'static) -> Self {
        Self {
            slot: Some(Arc::new(Mutex::new(CloseSlot {
                close: Some(Box::new(close)),
                outcome: None,
            }))),
        }
    }

    pub(crate) fn owning<S: Close + Send + ?Sized + 'static>(stream: Arc<Mutex<S>>) -> Self {
        Self::new(move || lock(&stream).close().map_err(Error::from))
    }

    pub fn is_noop(&self) -> bool {
        self.slot.is_none()
    }

    pub fn close(&self) -> Result<(), Error> {
        let Some(slot) = &self.slot else {
            return Ok(());
        };
        let mut slot = lock(slot);
        if let Some(outcome) = &slot.outcome {
            return outcome.clone();
        }
        let outcome = match slot.close.take() {
            Some(close) => close(),
            None => Ok(()),
        };
        slot.outcome = Some(outcome.clone());
        outcome
    }
}

impl std::fmt::Debug for SharedCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedCloser")
            .field("noop", &self.is_noop())
            .finish()
    }
}

/// Result of a wrap transform: the new raw stream and who closes it.
///
/// `reader`/`writer`/`segment` delegate close to the wrapped layer;
/// `read_closer`/`write_closer`/`segment_closer` close the new stream instead.
pub struct Wrapped<T: ?Sized> {
    pub(crate) stream: Arc<Mutex<T>>,
    pub(crate) closer: Option<SharedCloser>,
}

impl<T: ?Sized> Wrapped<T> {
    pub fn owns_close(&self) -> bool {
        self.closer.is_some()
    }
}

impl Wrapped<dyn Read + Send> {
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            stream: Arc::new(Mutex::new(reader)),
            closer: None,
        }
    }

    pub fn read_closer<R: Read + Close + Send + 'static>(reader: R) -> Self {
        let concrete = Arc::new(Mutex::new(reader));
        let closer = SharedCloser::owning(concrete.clone());
        let stream: Arc<Mutex<dyn Read + Send>> = concrete;
        Self {
            stream,
            closer: Some(closer),
        }
    }
}

impl Wrapped<dyn Write + Send> {
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            stream: Arc::new(Mutex::new(writer)),
            closer: None,
        }
    }

    pub fn write_closer<W: Write + Close + Send + 'static>(writer: W) -> Self {
        let concrete = Arc::new(Mutex::new(writer));
        let closer = SharedCloser::owning(concrete.clone());
        let stream: Arc<Mutex<dyn Write + Send>> = concrete;
        Self {
            stream,
            closer: Some(closer),
        }
    }
}

/// One layer: shared raw stream, shared closer, own metadata.
pub(crate) struct Layer<T: ?Sized> {
    pub(crate) stream: Arc<Mutex<T>>,
    pub(crate) closer: SharedCloser,
    pub(crate) metadata: Metadata,
}

impl<T: ?Sized> Clone for Layer<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
            closer: self.closer.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl<T: ?Sized> Layer<T> {
    pub(crate) fn new(stream: Arc<Mutex<T>>, closer: SharedCloser, metadata: Metadata) -> Self {
        Self {
            stream,
            closer,
            metadata,
        }
    }

    /// Layer built from a transform result. `delegate` closes the wrapped
    /// layer and is only used when the result does not own close.
    pub(crate) fn wrapped(
        wrapped: Wrapped<T>,
        metadata: Metadata,
        delegate: impl FnOnce() -> Result<(), Error> + Send + 'static,
    ) -> Self {
        let closer = wrapped
            .closer
            .unwrap_or_else(|| SharedCloser::new(delegate));
        Self::new(wrapped.stream, closer, metadata)
    }

    pub(crate) fn close(&self, cx: &Context) -> Result<(), Error> {
        let op = if self.closer.is_noop() {
            IoOp::CloseNoop
        } else {
            IoOp::Close
        };
        let call = IoCall::begin_unchecked(cx, op, &self.metadata);
        call.finish(self.closer.close())
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum IoOp {
    Read,
    Write,
    Close,
    CloseNoop,
}

impl IoOp {
    fn span(self, metadata: &Metadata) -> Span {
        match self {
            IoOp::Read => trace_span!(
                "Read",
                content_metadata = %metadata,
                byte_length = field::Empty,
                byte_content = field::Empty
            ),
            IoOp::Write => trace_span!(
                "Write",
                content_metadata = %metadata,
                byte_length = field::Empty,
                byte_content = field::Empty
            ),
            IoOp::Close => trace_span!("Close", content_metadata = %metadata),
            IoOp::CloseNoop => trace_span!("CloseNoop", content_metadata = %metadata),
        }
    }
}

/// One instrumented call. Field order matters: the I/O span exits before the
/// scope pops and leaves the context span.
pub(crate) struct IoCall {
    span: EnteredSpan,
    _scope: CallScope,
    op: IoOp,
}

impl IoCall {
    /// Checks the context, then enters the scope and the I/O span.
    pub(crate) fn begin(cx: &Context, op: IoOp, metadata: &Metadata) -> Result<Self, Error> {
        if let Err(err) = cx.check() {
            debug!(error = %err, op = ?op, "call refused");
            return Err(err);
        }
        Ok(Self::begin_unchecked(cx, op, metadata))
    }

    /// Close always runs so resources are released even after cancellation.
    pub(crate) fn begin_unchecked(cx: &Context, op: IoOp, metadata: &Metadata) -> Self {
        let scope = CallScope::enter(cx);
        let span = op.span(metadata).entered();
        Self {
            span,
            _scope: scope,
            op,
        }
    }

    pub(crate) fn record_bytes(&self, bytes: &[u8]) {
        if self.span.is_disabled() {
            return;
        }
        self.span.record("byte_length", bytes.len());
        let preview = &bytes[..bytes.len().min(PREVIEW_BYTES)];
        self.span
            .record("byte_content", field::display(BStr::new(preview)));
    }

    pub(crate) fn record_eof(&self) {
        trace!(op = ?self.op, "EOF");
    }

    pub(crate) fn finish<R>(&self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(err) = &result {
            debug!(error = %err, op = ?self.op, "call failed");
        }
        result
    }
}
