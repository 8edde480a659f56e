//! Purpose: Stream framing and instrumented content I/O.
//! Exports: `api` (public surface), `core` (content streams, metadata, errors), `frame` (strategies).
//! Role: Library backing the `framekit` CLI and its tests.
//! Invariants: End of stream is `Ok(None)`, never an error.
//! Invariants: Every content call runs inside a tracing span tied to its caller's context.
#![allow(clippy::result_large_err)]
pub mod api;
pub mod core;
pub mod frame;
