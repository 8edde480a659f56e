// Error taxonomy shared by content streams, framing strategies and the CLI.
// End-of-stream is not an error; readers signal it with `Ok(None)`.
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    FrameSizeOverflow,
    FrameCountOverflow,
    UnsupportedFramingType,
    ShortWrite,
    ClosedWrite,
    Closed,
    Cancelled,
    Malformed,
    NotFound,
    Usage,
    Io,
    Internal,
}

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    limit: Option<u64>,
    framing_type: Option<String>,
    path: Option<PathBuf>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            limit: None,
            framing_type: None,
            path: None,
            source: None,
        }
    }

    pub fn frame_size_overflow(limit: u64) -> Self {
        Self::new(ErrorKind::FrameSizeOverflow)
            .with_message("frame size exceeds maximum")
            .with_limit(limit)
    }

    pub fn frame_count_overflow(limit: u64) -> Self {
        Self::new(ErrorKind::FrameCountOverflow)
            .with_message("frame count exceeds maximum")
            .with_limit(limit)
    }

    pub fn unsupported_framing_type(framing_type: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedFramingType)
            .with_message("unsupported framing type")
            .with_framing_type(framing_type)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn framing_type(&self) -> Option<&str> {
        self.framing_type.as_deref()
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_framing_type(mut self, framing_type: impl Into<String>) -> Self {
        self.framing_type = Some(framing_type.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Embed this error in an `io::Error` so it can cross `Read`/`Write`
    /// boundaries; `From<io::Error>` recovers it unchanged.
    ///
    /// `Cancelled` must not become `Interrupted`: std buffered readers retry
    /// interrupted reads and would spin on a cancelled context.
    pub fn into_io(self) -> io::Error {
        let io_kind = match self.kind {
            ErrorKind::ShortWrite => io::ErrorKind::WriteZero,
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::Malformed => io::ErrorKind::InvalidData,
            ErrorKind::Closed | ErrorKind::ClosedWrite => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(io_kind, self)
    }

    pub fn is_overflow(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::FrameSizeOverflow | ErrorKind::FrameCountOverflow
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            if let Some(inner) = err.into_inner() {
                if let Ok(own) = inner.downcast::<Error>() {
                    return *own;
                }
            }
            return Error::new(ErrorKind::Internal).with_message("lost embedded error");
        }
        match err.kind() {
            io::ErrorKind::WriteZero => Error::new(ErrorKind::ShortWrite)
                .with_message("short write")
                .with_source(err),
            io::ErrorKind::NotFound => Error::new(ErrorKind::NotFound)
                .with_message("not found")
                .with_source(err),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
                Error::new(ErrorKind::Malformed)
                    .with_message(err.to_string())
                    .with_source(err)
            }
            _ => Error::new(ErrorKind::Io)
                .with_message("i/o failure")
                .with_source(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(limit) = self.limit {
            write!(f, " (limit: {limit})")?;
        }
        if let Some(framing_type) = &self.framing_type {
            write!(f, " (framing type: {framing_type})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::FrameSizeOverflow => 4,
        ErrorKind::FrameCountOverflow => 5,
        ErrorKind::UnsupportedFramingType => 6,
        ErrorKind::Malformed => 7,
        ErrorKind::Io
        | ErrorKind::ShortWrite
        | ErrorKind::ClosedWrite
        | ErrorKind::Closed => 8,
        ErrorKind::Cancelled => 9,
    }
}
