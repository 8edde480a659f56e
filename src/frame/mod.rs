//! Purpose: Split content streams into frames and join frames back into streams.
//! Exports: `FrameRead`, `FrameWrite`, `ReaderOptions`, `WriterOptions`, `Sanitizer`,
//! plus the strategies, policy wrappers, factory, and list helpers.
//! Role: Low-level strategies do format work only; `policy` adds limits, locking, and spans.
//! Invariants: `Ok(None)` from `read_frame` is end of stream and repeats forever after.
//! Invariants: Every delivered frame satisfies `len <= max_frame_size`.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::framing::FramingType;
use crate::core::metadata::Metadata;

pub mod delegate;
pub mod document;
pub mod factory;
pub mod object;
pub mod policy;
pub mod single;
pub mod util;

/// One frame: an immutable byte sequence.
pub type Frame = Bytes;

pub const DEFAULT_MAX_FRAME_SIZE: u64 = 10 * 1024 * 1024;

/// `max <= 0` selects [`DEFAULT_MAX_FRAME_SIZE`].
pub fn or_default_max_frame_size(max: i64) -> u64 {
    if max <= 0 {
        DEFAULT_MAX_FRAME_SIZE
    } else {
        max as u64
    }
}

fn or_unbounded(max: i64) -> u64 {
    if max <= 0 { u64::MAX } else { max as u64 }
}

/// Sequential frame source. Callers must not issue concurrent calls.
pub trait FrameRead: Send {
    fn read_frame(&mut self, cx: &Context) -> Result<Option<Frame>, Error>;
    fn close(&mut self, cx: &Context) -> Result<(), Error>;
    fn framing_type(&self) -> FramingType;
    fn metadata(&self) -> &Metadata;
}

/// Frame sink. Low-level implementations assume calls are already serialized.
pub trait FrameWrite: Send + Sync {
    fn write_frame(&self, cx: &Context, frame: &[u8]) -> Result<(), Error>;
    fn close(&self, cx: &Context) -> Result<(), Error>;
    fn framing_type(&self) -> FramingType;
    fn metadata(&self) -> &Metadata;
}

type SanitizeFn = dyn Fn(&FramingType, &[u8]) -> Result<Vec<u8>, Error> + Send + Sync;

/// Cleanup applied to every frame before it is written. Returning an empty
/// frame drops it.
#[derive(Clone)]
pub struct Sanitizer {
    sanitize: Option<Arc<SanitizeFn>>,
}

impl Sanitizer {
    pub fn identity() -> Self {
        Self { sanitize: None }
    }

    pub fn new(
        sanitize: impl Fn(&FramingType, &[u8]) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sanitize: Some(Arc::new(sanitize)),
        }
    }

    pub fn sanitize<'a>(
        &self,
        framing_type: &FramingType,
        frame: &'a [u8],
    ) -> Result<std::borrow::Cow<'a, [u8]>, Error> {
        match &self.sanitize {
            Some(sanitize) => sanitize(framing_type, frame).map(std::borrow::Cow::Owned),
            None => Ok(std::borrow::Cow::Borrowed(frame)),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.sanitize.is_none()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_identity() {
            "Sanitizer(identity)"
        } else {
            "Sanitizer(custom)"
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReaderOptions {
    pub max_frame_size: u64,
    pub max_frames: u64,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_frames: u64::MAX,
        }
    }

    pub fn with_max_frame_size(mut self, max: i64) -> Self {
        self.max_frame_size = or_default_max_frame_size(max);
        self
    }

    pub fn with_max_frames(mut self, max: i64) -> Self {
        self.max_frames = or_unbounded(max);
        self
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct WriterOptions {
    pub max_frame_size: u64,
    pub max_frames: u64,
    pub sanitizer: Sanitizer,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_frames: u64::MAX,
            sanitizer: Sanitizer::identity(),
        }
    }

    pub fn with_max_frame_size(mut self, max: i64) -> Self {
        self.max_frame_size = or_default_max_frame_size(max);
        self
    }

    pub fn with_max_frames(mut self, max: i64) -> Self {
        self.max_frames = or_unbounded(max);
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_MAX_FRAME_SIZE, ReaderOptions, Sanitizer, WriterOptions, or_default_max_frame_size,
    };
    use crate::core::framing::FramingType;

    #[test]
    fn non_positive_limits_fall_back() {
        assert_eq!(or_default_max_frame_size(0), DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(or_default_max_frame_size(-5), DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(or_default_max_frame_size(64), 64);

        let opts = ReaderOptions::new().with_max_frame_size(-1).with_max_frames(0);
        assert_eq!(opts.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(opts.max_frames, u64::MAX);

        let opts = WriterOptions::default().with_max_frames(3).with_max_frame_size(10);
        assert_eq!(opts.max_frames, 3);
        assert_eq!(opts.max_frame_size, 10);
    }

    #[test]
    fn sanitizer_defaults_to_identity() {
        let frame = b"a: 1\n";
        let out = Sanitizer::default()
            .sanitize(&FramingType::Yaml, frame)
            .expect("identity");
        assert_eq!(&*out, &frame[..]);

        let upper = Sanitizer::new(|_, frame| Ok(frame.to_ascii_uppercase()));
        let out = upper.sanitize(&FramingType::Json, b"{}x").expect("custom");
        assert_eq!(&*out, &b"{}X"[..]);
    }
}
