//! The storage node: accept loop, ingestion tasks and replication links.

use crate::config::NodeConfig;
use crate::error::NodeResult;
use crate::runtime::{run_blocking, BlockingExecutor, ChannelSelector, Interest, TryIo};
use spindle_codec::Tag;
use spindle_core::{
    Config, Executor, ReadHandler, Replicator, Sequencer, Spinner, WriteHandler, INITIAL_CURSOR,
};
use spindle_storage::Bundle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Requests shutdown of a running [`Node`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Stops accepting, closes every connection and halts every replicator.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolves once shutdown is requested or every handle is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// A bound storage node.
///
/// Producers connect to the bind address and stream framed events; each
/// event is appended to its channel's segment, sequenced, and streamed to
/// every configured replica in commit order. A replica is any peer that
/// accepts the same framing, including another node.
///
/// # Example
///
/// ```rust,no_run
/// use spindle_node::{Node, NodeConfig};
///
/// # async fn serve() -> spindle_node::NodeResult<()> {
/// let config = NodeConfig::new("127.0.0.1:7070".parse().unwrap(), "/var/lib/spindle")
///     .with_replica("10.0.0.2:7070".parse().unwrap());
/// let node: Node = Node::bind(config).await?;
/// let shutdown = node.shutdown_handle();
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.shutdown();
/// });
/// node.run().await
/// # }
/// ```
pub struct Node<T: Tag = u64> {
    config: NodeConfig,
    listener: TcpListener,
    bundle: Arc<Bundle<T>>,
    sequencer: Arc<Sequencer<T>>,
    shutdown: ShutdownHandle,
}

impl<T: Tag> Node<T> {
    /// Opens the data directory and binds the ingest listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the data directory
    /// cannot be opened, or the address cannot be bound.
    pub async fn bind(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let bundle = Arc::new(Bundle::open(config.data_dir())?);
        let sequencer = Arc::new(Sequencer::from_config(&config.core)?);
        let listener = TcpListener::bind(config.bind_addr).await?;

        info!(
            addr = %listener.local_addr()?,
            data_dir = %config.data_dir().display(),
            replicas = config.replicas.len(),
            ring_capacity = config.core.ring_capacity,
            "node bound"
        );

        Ok(Self {
            config,
            listener,
            bundle,
            sequencer,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// The address producers connect to.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener address cannot be read.
    pub fn local_addr(&self) -> NodeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The node's segment storage.
    pub fn bundle(&self) -> Arc<Bundle<T>> {
        Arc::clone(&self.bundle)
    }

    /// The sequencer every connection publishes to.
    pub fn sequencer(&self) -> Arc<Sequencer<T>> {
        Arc::clone(&self.sequencer)
    }

    /// A handle that stops [`Node::run`].
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serves producers and replicas until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok`; accept failures are logged and the
    /// loop keeps going.
    pub async fn run(self) -> NodeResult<()> {
        let executor: Arc<dyn Executor> = Arc::new(BlockingExecutor::current());
        let mut tasks = JoinSet::new();

        for &addr in &self.config.replicas {
            let link = Link {
                addr,
                sequencer: Arc::clone(&self.sequencer),
                executor: Arc::clone(&executor),
                core: self.config.core.clone(),
                reconnect_interval: self.config.reconnect_interval,
                liveness_interval: self.config.liveness_interval,
            };
            tasks.spawn(link.run(self.shutdown.subscribe()));
        }

        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let spinner = Spinner::new(
                            self.bundle.clone(),
                            Arc::clone(&self.sequencer),
                            &self.config.core,
                        );
                        tasks.spawn(ingest(stream, peer, spinner, self.shutdown.subscribe()));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "connection task failed");
                    }
                }
                () = stopped(&mut shutdown) => break,
            }
        }

        info!(connections = tasks.len(), "node shutting down");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "connection task failed");
            }
        }
        info!(cursor = self.sequencer.cursor(), "node stopped");
        Ok(())
    }
}

/// Drives one producer connection through its spinner.
///
/// Each readable callback runs on the blocking pool: a callback may sync the
/// segment, and that must not hold up the async workers other connections
/// share.
async fn ingest<T: Tag>(
    stream: TcpStream,
    peer: SocketAddr,
    mut spinner: Spinner<T>,
    mut shutdown: watch::Receiver<bool>,
) {
    let stream = Arc::new(stream);
    let (selector, mut interest) = ChannelSelector::new();
    debug!(%peer, "producer connected");
    spinner.on_accept(&selector);

    loop {
        tokio::select! {
            requested = interest.recv() => match requested {
                Some(Interest::Read) => {}
                Some(Interest::Write) => continue,
                None => break,
            },
            () = stopped(&mut shutdown) => break,
        }
        tokio::select! {
            ready = stream.readable() => {
                if let Err(e) = ready {
                    warn!(%peer, error = %e, "producer connection failed");
                    break;
                }
            }
            () = stopped(&mut shutdown) => break,
        }

        let callback = {
            let stream = Arc::clone(&stream);
            let selector = selector.clone();
            run_blocking(move || {
                let mut io = TryIo::new(&stream);
                spinner.on_readable(&mut io, &selector);
                let (eof, fault) = (io.is_eof(), io.fault());
                (spinner, eof, fault)
            })
        };
        let (returned, eof, fault) = match callback.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%peer, error = %e, "readable callback failed");
                return;
            }
        };
        spinner = returned;
        if let Some(kind) = fault {
            warn!(%peer, error = ?kind, "producer connection failed");
            break;
        }
        if eof {
            break;
        }
    }

    spinner.on_closing();
    debug!(%peer, committed = spinner.committed(), "producer disconnected");
}

enum SessionEnd {
    Shutdown,
    Disconnected,
    Halted,
}

/// Keeps one replica fed, reconnecting after a dropped connection.
struct Link<T: Tag> {
    addr: SocketAddr,
    sequencer: Arc<Sequencer<T>>,
    executor: Arc<dyn Executor>,
    core: Config,
    reconnect_interval: Duration,
    liveness_interval: Duration,
}

impl<T: Tag> Link<T> {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let label = self.addr.to_string();
        let mut resume = INITIAL_CURSOR;
        let mut failed_attempts = 0u32;

        loop {
            let connected = tokio::select! {
                connected = TcpStream::connect(self.addr) => connected,
                () = stopped(&mut shutdown) => return,
            };
            let stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    if failed_attempts == 0 {
                        warn!(replica = %label, error = %e, "replica unreachable, retrying");
                    } else {
                        debug!(replica = %label, attempt = failed_attempts, error = %e, "replica still unreachable");
                    }
                    failed_attempts += 1;
                    tokio::select! {
                        () = tokio::time::sleep(self.reconnect_interval) => continue,
                        () = stopped(&mut shutdown) => return,
                    }
                }
            };
            failed_attempts = 0;

            // Everything up to `resume` already reached this replica.
            let replicator = Replicator::new(
                label.clone(),
                self.sequencer.new_barrier(),
                Arc::clone(&self.executor),
                &self.core,
            )
            .starting_after(resume);
            info!(replica = %label, after = resume, "replication link up");

            let end = self.session(&stream, &replicator, &mut shutdown).await;
            replicator.halt();
            resume = replicator.last_replicated();

            match end {
                SessionEnd::Shutdown => {
                    debug!(replica = %label, replicated = resume, "replication link stopped");
                    return;
                }
                SessionEnd::Disconnected => {
                    warn!(replica = %label, replicated = resume, "replica disconnected, reconnecting");
                }
                SessionEnd::Halted => {
                    error!(replica = %label, replicated = resume, "replicator halted, link closed");
                    return;
                }
            }
        }
    }

    async fn session(
        &self,
        stream: &TcpStream,
        replicator: &Replicator<T>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (selector, mut interest) = ChannelSelector::new();
        replicator.on_connect(Arc::new(selector));
        replicator.start();
        let mut liveness = tokio::time::interval(self.liveness_interval);

        loop {
            tokio::select! {
                requested = interest.recv() => match requested {
                    Some(Interest::Write) => {}
                    Some(Interest::Read) => continue,
                    None => return SessionEnd::Halted,
                },
                _ = liveness.tick() => {
                    if !replicator.is_running() {
                        return SessionEnd::Halted;
                    }
                    continue;
                }
                () = stopped(shutdown) => return SessionEnd::Shutdown,
            }
            tokio::select! {
                ready = stream.writable() => {
                    if let Err(e) = ready {
                        warn!(replica = %replicator.label(), error = %e, "replica connection failed");
                        replicator.on_closing();
                        return SessionEnd::Disconnected;
                    }
                }
                () = stopped(shutdown) => return SessionEnd::Shutdown,
            }

            let mut io = TryIo::new(stream);
            replicator.on_writable(&mut io);
            if io.is_closed() {
                replicator.on_closing();
                return SessionEnd::Disconnected;
            }
        }
    }
}
