//! A minimal producer for pushing events into a node.

use crate::error::NodeResult;
use spindle_codec::{Event, Tag};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Streams framed events to a node's ingest address.
#[derive(Debug)]
pub struct Producer {
    stream: TcpStream,
    sent: u64,
}

impl Producer {
    /// Connects to a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: SocketAddr) -> NodeResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(%addr, "producer connected");
        Ok(Self { stream, sent: 0 })
    }

    /// Writes one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn send<T: Tag>(&mut self, event: &Event<T>) -> NodeResult<()> {
        self.stream.write_all(&event.encode()).await?;
        self.sent += 1;
        Ok(())
    }

    /// Writes raw bytes, which need not end on an event boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> NodeResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Number of events written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Closes the connection, returning the number of events written.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be shut down cleanly.
    pub async fn finish(mut self) -> NodeResult<u64> {
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        Ok(self.sent)
    }
}
