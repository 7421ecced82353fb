//! Core configuration.

use crate::error::{CoreError, CoreResult};

/// Configuration shared by the sequencer and the state machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of commit record slots in the sequencer ring.
    ///
    /// This is the largest lag a replicator can fall behind ingestion
    /// before it loses records.
    pub ring_capacity: usize,

    /// Whether to sync a payload to disk before publishing its commit record.
    pub sync_on_append: bool,

    /// Bytes moved per copy step of a socket/file transfer.
    pub transfer_chunk: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ring_capacity: 1024,
            sync_on_append: true,
            transfer_chunk: 64 * 1024, // 64 KiB
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sequencer ring capacity.
    #[must_use]
    pub const fn ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Sets whether appends are synced before they are published.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Sets the transfer chunk size.
    #[must_use]
    pub const fn transfer_chunk(mut self, size: usize) -> Self {
        self.transfer_chunk = size;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero capacity or chunk.
    pub fn validate(&self) -> CoreResult<()> {
        if self.ring_capacity == 0 {
            return Err(CoreError::invalid_config("ring_capacity must be non-zero"));
        }
        if self.transfer_chunk == 0 {
            return Err(CoreError::invalid_config("transfer_chunk must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.ring_capacity, 1024);
        assert!(config.sync_on_append);
        assert_eq!(config.transfer_chunk, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .ring_capacity(4)
            .sync_on_append(false)
            .transfer_chunk(7);

        assert_eq!(config.ring_capacity, 4);
        assert!(!config.sync_on_append);
        assert_eq!(config.transfer_chunk, 7);
    }

    #[test]
    fn zero_values_rejected() {
        assert!(Config::new().ring_capacity(0).validate().is_err());
        assert!(Config::new().transfer_chunk(0).validate().is_err());
    }
}
