//! Purpose: Map a framing type to its strategy and wrap it in the policy layer.
//! Exports: `FrameFactory` plus free-function shorthands.
//! Role: The only place that knows which strategy serves which framing type.
//! Invariants: The factory holds no state; every call builds a fresh reader or writer.
//! Invariants: Unsupported strategies never touch the content stream.
use tracing::debug;

use crate::core::framing::FramingType;
use crate::core::reader::ContentReader;
use crate::core::writer::ContentWriter;
use crate::frame::delegate::{UnsupportedReader, UnsupportedWriter};
use crate::frame::document::{DocumentReader, document_writer};
use crate::frame::object::{ObjectReader, object_writer};
use crate::frame::policy::{FrameReader, FrameWriter};
use crate::frame::single::{SingleReader, SingleWriter};
use crate::frame::{FrameRead, FrameWrite, ReaderOptions, WriterOptions};

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameFactory;

impl FrameFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn new_reader(
        &self,
        framing_type: FramingType,
        reader: ContentReader,
        mut options: ReaderOptions,
    ) -> FrameReader {
        let low: Box<dyn FrameRead> = match &framing_type {
            FramingType::Yaml => Box::new(DocumentReader::new(reader, &options)),
            FramingType::Json => Box::new(ObjectReader::new(reader, &options)),
            FramingType::Single => {
                options.max_frames = 1;
                Box::new(SingleReader::new(framing_type.clone(), reader, &options))
            }
            FramingType::Unrecognized(_) if options.max_frames == 1 => {
                Box::new(SingleReader::new(framing_type.clone(), reader, &options))
            }
            FramingType::Unrecognized(_) => {
                debug!(framing_type = %framing_type, "no reader strategy");
                Box::new(UnsupportedReader::new(framing_type.clone(), reader.metadata().clone()))
            }
        };
        FrameReader::new(low, options)
    }

    pub fn new_writer(
        &self,
        framing_type: FramingType,
        writer: ContentWriter,
        mut options: WriterOptions,
    ) -> FrameWriter {
        let low: Box<dyn FrameWrite> = match &framing_type {
            FramingType::Yaml => Box::new(document_writer(writer, &options)),
            FramingType::Json => Box::new(object_writer(writer, &options)),
            FramingType::Single => {
                options.max_frames = 1;
                Box::new(SingleWriter::new(framing_type.clone(), writer, &options))
            }
            FramingType::Unrecognized(_) if options.max_frames == 1 => {
                Box::new(SingleWriter::new(framing_type.clone(), writer, &options))
            }
            FramingType::Unrecognized(_) => {
                debug!(framing_type = %framing_type, "no writer strategy");
                Box::new(UnsupportedWriter::new(framing_type.clone(), writer.metadata().clone()))
            }
        };
        FrameWriter::new(low, options)
    }
}

pub fn new_reader(
    framing_type: FramingType,
    reader: ContentReader,
    options: ReaderOptions,
) -> FrameReader {
    FrameFactory::new().new_reader(framing_type, reader, options)
}

pub fn new_writer(
    framing_type: FramingType,
    writer: ContentWriter,
    options: WriterOptions,
) -> FrameWriter {
    FrameFactory::new().new_writer(framing_type, writer, options)
}

pub fn new_yaml_reader(reader: ContentReader, options: ReaderOptions) -> FrameReader {
    new_reader(FramingType::Yaml, reader, options)
}

pub fn new_json_reader(reader: ContentReader, options: ReaderOptions) -> FrameReader {
    new_reader(FramingType::Json, reader, options)
}

pub fn new_yaml_writer(writer: ContentWriter, options: WriterOptions) -> FrameWriter {
    new_writer(FramingType::Yaml, writer, options)
}

pub fn new_json_writer(writer: ContentWriter, options: WriterOptions) -> FrameWriter {
    new_writer(FramingType::Json, writer, options)
}
