//! Glue between tokio readiness and the callback-driven state machines.
//!
//! The state machines in `spindle_core` never touch a socket directly. They
//! are handed a non-blocking [`Read`]/[`Write`] for the duration of one
//! callback and ask for the next callback through a [`Selector`]. This
//! module provides those three pieces on top of a tokio [`TcpStream`].

use spindle_core::{Executor, Selector, Task};
use std::io::{self, ErrorKind, Read, Write};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Readiness a handler asked to be called back for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Call back when the connection is readable.
    Read,
    /// Call back when the connection is writable.
    Write,
}

/// A [`Selector`] that queues interest requests for the connection task.
///
/// Requests made from any thread land on the same queue, so a replicator
/// worker can ask for write readiness while the driver is parked.
#[derive(Debug, Clone)]
pub struct ChannelSelector {
    tx: mpsc::UnboundedSender<Interest>,
}

impl ChannelSelector {
    /// Creates a selector and the receiving end its driver listens on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Interest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Selector for ChannelSelector {
    fn request_read_interest(&self) {
        // A closed queue means the driver is gone; nobody is left to call back.
        let _ = self.tx.send(Interest::Read);
    }

    fn request_write_interest(&self) {
        let _ = self.tx.send(Interest::Write);
    }
}

/// Non-blocking [`Read`]/[`Write`] over a tokio stream for one callback.
///
/// Reads and writes map onto `try_read`/`try_write`, so an exhausted socket
/// reports [`ErrorKind::WouldBlock`]. End of stream and hard faults are
/// remembered so the driver can close the connection after the callback.
#[derive(Debug)]
pub struct TryIo<'a> {
    stream: &'a TcpStream,
    eof: bool,
    fault: Option<ErrorKind>,
}

impl<'a> TryIo<'a> {
    /// Wraps `stream` for one callback.
    pub fn new(stream: &'a TcpStream) -> Self {
        Self {
            stream,
            eof: false,
            fault: None,
        }
    }

    /// Returns true if the peer closed its side.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// The kind of the first hard I/O error seen, if any.
    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

    /// Returns true if the connection cannot be used any more.
    pub fn is_closed(&self) -> bool {
        self.eof || self.fault.is_some()
    }

    fn record(&mut self, err: io::Error) -> io::Error {
        if !matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) {
            self.fault.get_or_insert(err.kind());
        }
        err
    }
}

impl Read for TryIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.try_read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.eof = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }
}

impl Write for TryIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.try_write(buf) {
            Ok(0) if !buf.is_empty() => {
                self.eof = true;
                Err(io::Error::new(ErrorKind::WriteZero, "replica closed the connection"))
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` on the tokio blocking pool and waits for its result.
///
/// # Errors
///
/// Returns an error if `f` panicked or the runtime is shutting down.
pub async fn run_blocking<F, R>(f: F) -> io::Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)
}

/// Runs executor tasks on the tokio blocking pool.
///
/// Replicators park in a blocking sequencer wait, which must stay off the
/// async workers.
#[derive(Debug, Clone)]
pub struct BlockingExecutor {
    handle: Handle,
}

impl BlockingExecutor {
    /// Creates an executor on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates an executor on the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for BlockingExecutor {
    fn execute(&self, task: Task) {
        // Detached; the task ends when its replicator halts.
        drop(self.handle.spawn_blocking(task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn selector_queues_interest() {
        let (selector, mut rx) = ChannelSelector::new();
        selector.request_read_interest();
        selector.request_write_interest();
        assert_eq!(rx.try_recv().unwrap(), Interest::Read);
        assert_eq!(rx.try_recv().unwrap(), Interest::Write);
        assert!(rx.try_recv().is_err());

        drop(rx);
        selector.request_read_interest();
    }

    #[tokio::test]
    async fn empty_socket_would_block() {
        let (_client, server) = pair().await;
        let mut io = TryIo::new(&server);
        let mut buf = [0u8; 8];
        let err = io.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert!(!io.is_closed());
    }

    #[tokio::test]
    async fn reads_then_sees_eof() {
        let (mut client, server) = pair().await;
        client.write_all(b"spindle").await.unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        server.readable().await.unwrap();
        let mut io = TryIo::new(&server);
        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        loop {
            match io.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => got.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    server.readable().await.unwrap();
                    io = TryIo::new(&server);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(got, b"spindle");
        assert!(io.is_eof());
        assert!(io.fault().is_none());
    }

    #[tokio::test]
    async fn run_blocking_leaves_the_async_thread() {
        let caller = std::thread::current().id();
        let worker = run_blocking(|| std::thread::current().id()).await.unwrap();
        assert_ne!(worker, caller);

        let failed = run_blocking(|| -> u8 { panic!("callback blew up") }).await;
        assert!(failed.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_executor_runs_tasks() {
        let executor = BlockingExecutor::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        executor.execute(Box::new(move || flag.store(true, Ordering::Release)));

        for _ in 0..200 {
            if ran.load(Ordering::Acquire) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ran.load(Ordering::Acquire));
    }
}
