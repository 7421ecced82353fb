//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while framing or unframing events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough bytes for a complete header or payload.
    ///
    /// On a socket this is a partial-read condition, not a fault: wait for
    /// more bytes and try again.
    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required to decode.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// The stored size is smaller than the header itself.
    #[error("invalid event size {size}: smaller than header length {header_len}")]
    InvalidSize {
        /// Size field as stored on the wire.
        size: u32,
        /// Header length of the wire format in use.
        header_len: usize,
    },

    /// The payload does not fit in the 32-bit size field.
    #[error("payload too large: {len} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge {
        /// Payload length that was rejected.
        len: usize,
        /// Largest payload the format can describe.
        max: usize,
    },

    /// The payload checksum does not match the header.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the header.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },
}

impl CodecError {
    /// Creates a truncated input error.
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }

    /// Returns true if more bytes would resolve this error.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_is_partial() {
        assert!(CodecError::truncated(20, 3).is_partial());
        assert!(!CodecError::ChecksumMismatch {
            expected: 1,
            actual: 2
        }
        .is_partial());
    }

    #[test]
    fn checksum_display_is_hex() {
        let err = CodecError::ChecksumMismatch {
            expected: 0xCBF4_3926,
            actual: 0,
        };
        assert!(err.to_string().contains("cbf43926"));
    }
}
