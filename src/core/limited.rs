//! Purpose: Byte budget over a content reader with a sticky overflow.
//! Exports: `wrap_limited`, `LimitReset`.
//! Role: Keeps framing strategies from buffering unbounded input before a
//! separator or object end is found.
//! Invariants: Reads never return more bytes than the remaining budget.
//! Invariants: Once overflowed, every read fails with `FrameSizeOverflow` until `reset`.
//! Notes: Reaching the budget exactly at end of stream is a clean EOF, not an overflow.
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use crate::core::error::Error;
use crate::core::layer::{Wrapped, lock};
use crate::core::reader::{ContentReader, UnderlyingReader};

#[derive(Debug, Default)]
struct LimitState {
    count: u64,
    overflowed: bool,
}

/// Handle for rearming a limited reader between frames.
#[derive(Clone, Debug)]
pub struct LimitReset {
    state: Arc<Mutex<LimitState>>,
    max_bytes: u64,
}

impl LimitReset {
    /// Zeroes the running count and clears a latched overflow.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.count = 0;
        state.overflowed = false;
    }

    pub fn count(&self) -> u64 {
        lock(&self.state).count
    }

    pub fn is_overflowed(&self) -> bool {
        lock(&self.state).overflowed
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

struct LimitedRead {
    inner: UnderlyingReader,
    max_bytes: u64,
    state: Arc<Mutex<LimitState>>,
}

impl LimitedRead {
    fn overflow(&self) -> io::Error {
        lock(&self.state).overflowed = true;
        Error::frame_size_overflow(self.max_bytes).into_io()
    }
}

impl Read for LimitedRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = {
            let state = lock(&self.state);
            if state.overflowed {
                return Err(Error::frame_size_overflow(self.max_bytes).into_io());
            }
            self.max_bytes.saturating_sub(state.count)
        };
        if buf.is_empty() {
            return Ok(0);
        }
        if remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => Err(self.overflow()),
            };
        }
        let cap = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
        let n = self.inner.read(&mut buf[..cap])?;
        lock(&self.state).count += n as u64;
        Ok(n)
    }
}

/// Wraps `reader` so at most `max_bytes` can be read between resets. Close
/// is delegated to `reader`.
pub fn wrap_limited(reader: &ContentReader, max_bytes: u64) -> (ContentReader, LimitReset) {
    let state = Arc::new(Mutex::new(LimitState::default()));
    let reset = LimitReset {
        state: state.clone(),
        max_bytes,
    };
    let limited = reader.wrap(|inner| {
        Wrapped::reader(LimitedRead {
            inner,
            max_bytes,
            state,
        })
    });
    (limited, reset)
}

#[cfg(test)]
mod tests {
    use super::wrap_limited;
    use crate::core::context::Context;
    use crate::core::error::ErrorKind;
    use crate::core::layer::Closable;
    use crate::core::metadata::Metadata;
    use crate::core::reader::ContentReader;
    use std::io::Cursor;

    fn source(bytes: &[u8]) -> ContentReader {
        ContentReader::from_read_closer(Closable::new(Cursor::new(bytes.to_vec())), Metadata::new())
    }

    #[test]
    fn exact_budget_at_eof_is_clean() {
        let cx = Context::new();
        let (limited, reset) = wrap_limited(&source(b"12345"), 5);
        let mut out = Vec::new();
        limited.read_to_end(&cx, &mut out).expect("fits exactly");
        assert_eq!(out, b"12345");
        assert_eq!(reset.count(), 5);
        assert!(!reset.is_overflowed());
    }

    #[test]
    fn overflow_is_sticky_until_reset() {
        let cx = Context::new();
        let (limited, reset) = wrap_limited(&source(b"123456789"), 4);
        let mut buf = [0u8; 16];
        assert_eq!(limited.read(&cx, &mut buf).expect("capped read"), 4);

        let err = limited.read(&cx, &mut buf).expect_err("over budget");
        assert_eq!(err.kind(), ErrorKind::FrameSizeOverflow);
        assert_eq!(err.limit(), Some(4));
        let again = limited.read(&cx, &mut buf).expect_err("still latched");
        assert_eq!(again.kind(), ErrorKind::FrameSizeOverflow);
        assert!(reset.is_overflowed());

        reset.reset();
        assert_eq!(reset.count(), 0);
        assert_eq!(limited.read(&cx, &mut buf).expect("rearmed"), 4);
        assert_eq!(&buf[..4], b"6789");
    }

    #[test]
    fn close_is_delegated() {
        let cx = Context::new();
        let base = source(b"abc");
        let (limited, _reset) = wrap_limited(&base, 10);
        limited.close(&cx).expect("close");
        let mut buf = [0u8; 1];
        let err = base.read(&cx, &mut buf).expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Closed);
    }
}
