//! Node configuration.

use crate::error::{NodeError, NodeResult};
use spindle_core::Config;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a storage node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address producers connect to.
    pub bind_addr: SocketAddr,
    /// Directory holding one segment file per channel.
    pub data_dir: PathBuf,
    /// Replicas to stream committed events to, one link each.
    pub replicas: Vec<SocketAddr>,
    /// Delay between attempts to reach an unreachable replica.
    pub reconnect_interval: Duration,
    /// How often an idle replication link checks its replicator is alive.
    pub liveness_interval: Duration,
    /// Settings for the sequencer and the state machines.
    pub core: Config,
}

impl NodeConfig {
    /// Creates a node configuration storing data under `data_dir`.
    pub fn new(bind_addr: SocketAddr, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            data_dir: data_dir.into(),
            replicas: Vec::new(),
            reconnect_interval: Duration::from_millis(500),
            liveness_interval: Duration::from_secs(1),
            core: Config::default(),
        }
    }

    /// Adds a replica.
    pub fn with_replica(mut self, addr: SocketAddr) -> Self {
        self.replicas.push(addr);
        self
    }

    /// Replaces the replica list.
    pub fn with_replicas(mut self, replicas: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.replicas = replicas.into_iter().collect();
        self
    }

    /// Sets the delay between replica connection attempts.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the replication link liveness check interval.
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval;
        self
    }

    /// Sets the core configuration.
    pub fn with_core(mut self, core: Config) -> Self {
        self.core = core;
        self
    }

    /// The data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Checks that the configuration can start a node.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Config`] if a value is unusable.
    pub fn validate(&self) -> NodeResult<()> {
        self.core.validate()?;
        if self.reconnect_interval.is_zero() {
            return Err(NodeError::config("reconnect_interval must be non-zero"));
        }
        if self.liveness_interval.is_zero() {
            return Err(NodeError::config("liveness_interval must be non-zero"));
        }
        if self.replicas.contains(&self.bind_addr) {
            return Err(NodeError::config(format!(
                "node {} cannot replicate to itself",
                self.bind_addr
            )));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 7070)), "spindle-data")
    }
}
