//! Error types for the storage node.

use spindle_codec::CodecError;
use spindle_core::CoreError;
use spindle_storage::StorageError;
use thiserror::Error;

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors that can occur while running a node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Invalid node configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// State machine or sequencer error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Segment storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Event encoding error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Socket or runtime I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the node never started because of its configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NodeError::Config { .. } | NodeError::Core(CoreError::InvalidConfig { .. })
        )
    }
}
