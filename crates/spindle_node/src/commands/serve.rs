//! Serve command implementation.

use spindle_core::Config;
use spindle_node::{Node, NodeConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// Options for the serve command.
#[derive(Debug)]
pub struct ServeOptions {
    /// Ingest address.
    pub bind: SocketAddr,
    /// Segment directory.
    pub data_dir: PathBuf,
    /// Replica addresses.
    pub replicas: Vec<SocketAddr>,
    /// Sequencer ring capacity.
    pub ring_capacity: usize,
    /// Whether appends are synced before publishing.
    pub sync_on_append: bool,
    /// Transfer chunk size.
    pub transfer_chunk: usize,
}

impl ServeOptions {
    fn into_config(self) -> NodeConfig {
        let core = Config::new()
            .ring_capacity(self.ring_capacity)
            .sync_on_append(self.sync_on_append)
            .transfer_chunk(self.transfer_chunk);
        NodeConfig::new(self.bind, self.data_dir)
            .with_replicas(self.replicas)
            .with_core(core)
    }
}

/// Runs the serve command until interrupted.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.into_config();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        let node: Node = Node::bind(config).await?;
        println!("Serving on {}", node.local_addr()?);

        let shutdown = node.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
            }
            shutdown.shutdown();
        });

        node.run().await?;
        println!("✓ Node stopped");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_map_to_config() {
        let options = ServeOptions {
            bind: "127.0.0.1:9100".parse().unwrap(),
            data_dir: PathBuf::from("data"),
            replicas: vec!["127.0.0.1:9200".parse().unwrap()],
            ring_capacity: 16,
            sync_on_append: false,
            transfer_chunk: 512,
        };
        let config = options.into_config();
        assert_eq!(config.bind_addr.port(), 9100);
        assert_eq!(config.replicas.len(), 1);
        assert_eq!(config.core.ring_capacity, 16);
        assert!(!config.core.sync_on_append);
        assert_eq!(config.core.transfer_chunk, 512);
    }
}
