// Constructors binding files, standard streams, and in-memory bytes to content streams.
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::core::error::Error;
use crate::core::layer::Closable;
use crate::core::metadata::{Metadata, MetadataOption};
use crate::core::reader::ContentReader;
use crate::core::writer::ContentWriter;

pub const STDIN_PATH: &str = "/dev/stdin";
pub const STDOUT_PATH: &str = "/dev/stdout";
pub const STDERR_PATH: &str = "/dev/stderr";

/// Opens `path` for reading. `-` and `/dev/stdin` read the live standard
/// input, which is never closed.
pub fn from_file(
    path: impl AsRef<Path>,
    opts: impl IntoIterator<Item = MetadataOption>,
) -> Result<ContentReader, Error> {
    let path = path.as_ref();
    if path == Path::new("-") || path == Path::new(STDIN_PATH) {
        let mut metadata = Metadata::with_options([MetadataOption::content_location(STDIN_PATH)]);
        metadata.apply_options(opts);
        return Ok(ContentReader::from_reader(io::stdin(), metadata));
    }

    let path = absolute(path)?;
    let file = File::open(&path).map_err(|err| Error::from(err).with_path(&path))?;
    let mut metadata = Metadata::with_options([MetadataOption::content_location(
        path.display().to_string(),
    )]);
    if let Ok(stat) = file.metadata() {
        metadata.apply_options([MetadataOption::content_length(stat.len())]);
    }
    metadata.apply_options(opts);
    Ok(ContentReader::from_read_closer(Closable::new(file), metadata))
}

/// Opens `path` for writing, truncating it and creating parent directories.
/// `-`, `/dev/stdout`, and `/dev/stderr` write to the live standard streams,
/// which are never closed.
pub fn to_file(
    path: impl AsRef<Path>,
    opts: impl IntoIterator<Item = MetadataOption>,
) -> Result<ContentWriter, Error> {
    let path = path.as_ref();
    if path == Path::new("-") || path == Path::new(STDOUT_PATH) {
        let mut metadata = Metadata::with_options([MetadataOption::content_location(STDOUT_PATH)]);
        metadata.apply_options(opts);
        return Ok(ContentWriter::from_writer(io::stdout(), metadata));
    }
    if path == Path::new(STDERR_PATH) {
        let mut metadata = Metadata::with_options([MetadataOption::content_location(STDERR_PATH)]);
        metadata.apply_options(opts);
        return Ok(ContentWriter::from_writer(io::stderr(), metadata));
    }

    let path = absolute(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| Error::from(err).with_path(parent))?;
    }
    let file = File::create(&path).map_err(|err| Error::from(err).with_path(&path))?;
    let mut metadata = Metadata::with_options([MetadataOption::content_location(
        path.display().to_string(),
    )]);
    metadata.apply_options(opts);
    Ok(ContentWriter::from_write_closer(Closable::new(file), metadata))
}

pub fn from_bytes(
    content: impl Into<Bytes>,
    opts: impl IntoIterator<Item = MetadataOption>,
) -> ContentReader {
    let content = content.into();
    let mut metadata =
        Metadata::with_options([MetadataOption::content_length(content.len() as u64)]);
    metadata.apply_options(opts);
    ContentReader::from_reader(Cursor::new(content), metadata)
}

pub fn from_string(
    content: impl Into<String>,
    opts: impl IntoIterator<Item = MetadataOption>,
) -> ContentReader {
    from_bytes(Bytes::from(content.into()), opts)
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    std::path::absolute(path).map_err(|err| Error::from(err).with_path(path))
}
