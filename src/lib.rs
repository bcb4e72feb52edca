//! Streaming writer for GNU flavoured USTAR archives.
//!
//! Members can be appended in three ways:
//!
//! - [`ArchiveWriter::add_file`] when the size is known before writing,
//! - [`ArchiveWriter::add_file_from_stream`] when the content is produced
//!   by a sequence of writes; the header is patched afterwards, so the sink
//!   has to be seekable,
//! - [`ArchiveWriter::add_file_placeholder`] to reserve room for a file
//!   that is only written later through [`ArchiveWriter::with_placeholder`].
//!
//! Content is never buffered in memory.

use std::io;
use std::num::ParseIntError;

pub mod constants;
pub mod header;
pub mod metadata;
pub mod numeric;
pub mod region;
mod utils;
pub mod writer;

pub use crate::header::HeaderRecord;
pub use crate::metadata::{EntryAttributes, OwnerResolver, SourceMetadata, SystemOwnerResolver};
pub use crate::region::{BoundedWriteRegion, UnrestrictedWriteRegion};
pub use crate::writer::{ArchiveWriter, Placeholder, PlaceholderScope};

#[derive(Debug, thiserror::Error)]
pub enum TarError {
    #[error("invalid sink: {0}")]
    InvalidSink(String),
    #[error("archive writer is closed")]
    ClosedWriter,
    #[error("writing {len} bytes at {position} is outside of {start}..{end}")]
    WriteOutOfRange { position: u64, len: u64, start: u64, end: u64 },
    #[error("value {value} does not fit in a {length} byte field")]
    ValueTooLarge { value: String, length: usize },
    #[error("unsupported value {0}")]
    UnsupportedValue(String),
    #[error("placeholder {0} does not exist")]
    PlaceholderNotFound(usize),
    #[error("source provided {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("checksum {stored} does not match computed {computed}")]
    CheckSum { stored: u64, computed: u32 },
    #[error("malformed numeric field")]
    EncodingError,
    #[error(transparent)]
    ParseError(#[from] ParseIntError),
    #[error(transparent)]
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, TarError>;

/// Bounded regions report their errors through `io::Error`; take the
/// original error back out so callers can match on it.
impl From<io::Error> for TarError {
    fn from(err: io::Error) -> Self {
        let wrapped = err.get_ref().map_or(false, |inner| inner.is::<TarError>());
        if !wrapped {
            return TarError::Io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<TarError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => TarError::Io(io::Error::new(kind, other)),
            None => TarError::Io(kind.into()),
        }
    }
}

impl From<TarError> for io::Error {
    fn from(err: TarError) -> Self {
        match err {
            TarError::Io(err) => err,
            other => io::Error::new(other.kind(), other),
        }
    }
}

impl TarError {
    fn kind(&self) -> io::ErrorKind {
        match self {
            TarError::Io(err) => err.kind(),
            TarError::WriteOutOfRange { .. } | TarError::SizeMismatch { .. } => io::ErrorKind::WriteZero,
            _ => io::ErrorKind::InvalidInput,
        }
    }
}
