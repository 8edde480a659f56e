//! Purpose: Define the public Rust API boundary for framekit.
//! Exports: Content streams, metadata, framing types, frame readers/writers, and errors.
//! Role: Public, additive-only surface used by the CLI and integration tests.
//! Invariants: Callers only need this module; internal layering stays reachable but unlisted.

pub use crate::core::context::{CancelToken, Context};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::framing::FramingType;
pub use crate::core::layer::{Closable, Close, Wrapped};
pub use crate::core::limited::{LimitReset, wrap_limited};
pub use crate::core::metadata::{
    CONTENT_LENGTH_KEY, CONTENT_LOCATION_KEY, CONTENT_TYPE_KEY, FRAMING_TYPE_KEY, Metadata,
    MetadataOption,
};
pub use crate::core::reader::{ContentReader, UnderlyingReader};
pub use crate::core::segment::{RawSegmentRead, SegmentReader};
pub use crate::core::source::{
    STDERR_PATH, STDIN_PATH, STDOUT_PATH, from_bytes, from_file, from_string, to_file,
};
pub use crate::core::writer::{ContentWriter, UnderlyingWriter};
pub use crate::frame::factory::{
    FrameFactory, new_json_reader, new_json_writer, new_reader, new_writer, new_yaml_reader,
    new_yaml_writer,
};
pub use crate::frame::policy::{FrameReader, FrameWriter};
pub use crate::frame::util::{FrameIoWriter, FrameList, Frames, read_frame_list, write_frame_list};
pub use crate::frame::{
    DEFAULT_MAX_FRAME_SIZE, Frame, FrameRead, FrameWrite, ReaderOptions, Sanitizer, WriterOptions,
};
