//! Error types for storage operations.

use spindle_codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a segment.
    #[error("read beyond end of segment: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: u64,
        /// The current segment size.
        size: u64,
    },

    /// A stored event failed to decode or verify.
    #[error("corrupt event at offset {offset} in {}: {source}", segment.display())]
    CorruptEvent {
        /// Offset of the event header.
        offset: u64,
        /// Segment file the event was read from.
        segment: PathBuf,
        /// The underlying codec failure.
        #[source]
        source: CodecError,
    },
}

/// A file/socket transfer that failed part-way.
///
/// `transferred` counts the bytes consumed from the source before the
/// failure, so a caller can keep its framing in step with the stream.
#[derive(Debug, Error)]
#[error("transfer failed after {transferred} bytes: {source}")]
pub struct TransferError {
    /// Bytes consumed from the source before the failure.
    pub transferred: u64,
    /// The underlying I/O failure.
    #[source]
    pub source: io::Error,
}

impl TransferError {
    pub(crate) fn new(transferred: u64, source: io::Error) -> Self {
        Self {
            transferred,
            source,
        }
    }
}
