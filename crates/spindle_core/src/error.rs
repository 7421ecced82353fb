//! Error types for Spindle core.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while ingesting, sequencing or replicating events.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] spindle_storage::StorageError),

    /// Event codec error.
    #[error("codec error: {0}")]
    Codec(#[from] spindle_codec::CodecError),

    /// A socket or segment operation failed.
    #[error("I/O error during {operation} at offset {offset} of {}: {source}", segment.display())]
    Io {
        /// What was being done.
        operation: &'static str,
        /// Offset of the event header in the segment.
        offset: u64,
        /// The segment involved.
        segment: PathBuf,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A socket operation failed before any segment was involved.
    #[error("connection error during {operation}: {source}")]
    Connection {
        /// What was being done.
        operation: &'static str,
        /// The underlying failure.
        #[source]
        source: io::Error,
    },

    /// A callback arrived in a state that cannot handle it.
    #[error("{handler}: {callback} is not valid in state {state}")]
    IllegalState {
        /// The handler receiving the callback.
        handler: &'static str,
        /// The state the handler was in.
        state: &'static str,
        /// The callback that was delivered.
        callback: &'static str,
    },

    /// A consumer fell further behind the sequencer than its capacity.
    #[error(
        "sequence {requested} was overwritten by {overwritten_by} (capacity {capacity})"
    )]
    LagExceeded {
        /// The sequence the consumer asked for.
        requested: i64,
        /// The sequence now occupying the slot.
        overwritten_by: i64,
        /// Ring capacity.
        capacity: usize,
    },

    /// A sequence was read before it was published.
    #[error("sequence {requested} is not published (cursor {cursor})")]
    NotPublished {
        /// The sequence asked for.
        requested: i64,
        /// The published cursor at the time.
        cursor: i64,
    },

    /// A blocked wait was cancelled.
    #[error("wait on the sequencer was alerted")]
    Alerted,

    /// Configuration value out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an I/O fault tied to a segment location.
    pub fn io(operation: &'static str, offset: u64, segment: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            offset,
            segment: segment.to_path_buf(),
            source,
        }
    }

    /// Creates a connection fault.
    pub fn connection(operation: &'static str, source: io::Error) -> Self {
        Self::Connection { operation, source }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(
        handler: &'static str,
        state: &'static str,
        callback: &'static str,
    ) -> Self {
        Self::IllegalState {
            handler,
            state,
            callback,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this is the cancel signal rather than a fault.
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        matches!(self, Self::Alerted)
    }
}
