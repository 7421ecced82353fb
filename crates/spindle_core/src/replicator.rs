//! Replication state machine.
//!
//! One [`Replicator`] per outbound replica connection. A background task
//! blocks on the sequencer for the next commit record; the I/O side then
//! sends its header and streams its payload out of the segment over as many
//! write-readiness callbacks as it takes.
//!
//! ```text
//!   executor task                         write-readiness callbacks
//!   ─────────────                         ─────────────────────────
//!   Waiting ── wait_for(next) ──┐
//!                                ▼
//!                          WriteHeader ── header sent ──► WritePayload
//!                                                              │
//!   Waiting ◄── execute(process_next) ◄── remaining == 0 ──────┘
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::executor::Executor;
use crate::handler::{Selector, WriteHandler};
use crate::sequencer::{CommitRecord, SequenceBarrier, INITIAL_CURSOR};
use parking_lot::Mutex;
use spindle_codec::{HeaderBytes, Tag};
use std::fmt;
use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Observable state of a [`Replicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicatorState {
    /// No record in flight.
    Waiting,
    /// Header bytes partially sent.
    WriteHeader,
    /// Payload bytes partially sent.
    WritePayload,
}

impl ReplicatorState {
    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::WriteHeader => "write_header",
            Self::WritePayload => "write_payload",
        }
    }
}

impl fmt::Display for ReplicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record currently being sent.
struct InFlight<T: Tag> {
    sequence: i64,
    record: CommitRecord<T>,
    header: HeaderBytes<T>,
    header_sent: usize,
    position: u64,
    remaining: u64,
}

impl<T: Tag> InFlight<T> {
    fn new(sequence: i64, record: CommitRecord<T>) -> Self {
        Self {
            sequence,
            header: record.header.to_bytes(),
            header_sent: 0,
            position: record.payload_offset(),
            remaining: u64::from(record.header.size()),
            record,
        }
    }

    /// Returns true once the whole header is out.
    fn write_header(&mut self, channel: &mut dyn Write) -> CoreResult<bool> {
        let bytes = self.header.as_slice();
        while self.header_sent < bytes.len() {
            match channel.write(&bytes[self.header_sent..]) {
                Ok(0) => return Ok(false),
                Ok(n) => self.header_sent += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fault("replicate header", e)),
            }
        }
        Ok(true)
    }

    /// Returns true once the whole payload is out.
    fn write_payload(&mut self, channel: &mut dyn Write, scratch: &mut [u8]) -> CoreResult<bool> {
        let moved = self
            .record
            .segment
            .transfer_to(self.position, self.remaining, channel, scratch)
            .map_err(|e| self.fault("replicate payload", e.source))?;
        self.position += moved;
        self.remaining -= moved;
        Ok(self.remaining == 0)
    }

    fn fault(&self, operation: &'static str, source: std::io::Error) -> CoreError {
        CoreError::io(
            operation,
            self.record.offset,
            self.record.segment.path(),
            source,
        )
    }
}

enum Phase<T: Tag> {
    Waiting,
    WriteHeader(InFlight<T>),
    WritePayload(InFlight<T>),
}

impl<T: Tag> Phase<T> {
    fn state(&self) -> ReplicatorState {
        match self {
            Self::Waiting => ReplicatorState::Waiting,
            Self::WriteHeader(_) => ReplicatorState::WriteHeader,
            Self::WritePayload(_) => ReplicatorState::WritePayload,
        }
    }
}

struct Progress<T: Tag> {
    phase: Phase<T>,
    scratch: Box<[u8]>,
}

struct Inner<T: Tag> {
    label: String,
    barrier: SequenceBarrier<T>,
    executor: Arc<dyn Executor>,
    selector: Mutex<Option<Arc<dyn Selector>>>,
    progress: Mutex<Progress<T>>,
    running: AtomicBool,
    /// Set by the first halt and never cleared.
    halted: AtomicBool,
    /// Last sequence taken from the barrier.
    claimed: AtomicI64,
    /// Last sequence whose payload was fully sent.
    replicated: AtomicI64,
    sent: AtomicU64,
}

/// Streams committed events to one replica.
///
/// Cloning gives another handle to the same replicator.
pub struct Replicator<T: Tag = u64> {
    inner: Arc<Inner<T>>,
}

impl<T: Tag> Clone for Replicator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Tag> Replicator<T> {
    /// Creates a stopped replicator reading through `barrier`.
    ///
    /// `label` names the replica in logs.
    pub fn new(
        label: impl Into<String>,
        barrier: SequenceBarrier<T>,
        executor: Arc<dyn Executor>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                barrier,
                executor,
                selector: Mutex::new(None),
                progress: Mutex::new(Progress {
                    phase: Phase::Waiting,
                    scratch: vec![0; config.transfer_chunk.max(1)].into_boxed_slice(),
                }),
                running: AtomicBool::new(false),
                halted: AtomicBool::new(false),
                claimed: AtomicI64::new(INITIAL_CURSOR),
                replicated: AtomicI64::new(INITIAL_CURSOR),
                sent: AtomicU64::new(0),
            }),
        }
    }

    /// Begins replication after `sequence` instead of from the start.
    ///
    /// Used to resume a replica that already holds everything up to and
    /// including `sequence`.
    #[must_use]
    pub fn starting_after(self, sequence: i64) -> Self {
        self.inner.claimed.store(sequence, Ordering::Release);
        self.inner.replicated.store(sequence, Ordering::Release);
        self
    }

    /// Starts waiting for records. Calling it again, or after
    /// [`Replicator::halt`], has no effect.
    pub fn start(&self) {
        if self.inner.halted.load(Ordering::Acquire) {
            debug!(replica = %self.inner.label, "start ignored, replicator halted");
            return;
        }
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(replica = %self.inner.label, after = self.last_replicated(), "replicator started");
            Inner::schedule(&self.inner);
        }
    }

    /// Stops the replicator and wakes its blocked wait.
    ///
    /// Idempotent and safe to call from any thread. A halted replicator
    /// drops its in-flight record and makes no further progress, even if
    /// started again.
    pub fn halt(&self) {
        self.inner.halt();
    }

    /// Returns true between [`Replicator::start`] and the first
    /// [`Replicator::halt`]. Once false after a halt, it stays false.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ReplicatorState {
        self.inner.progress.lock().phase.state()
    }

    /// Last sequence whose event was fully sent, or [`INITIAL_CURSOR`].
    #[must_use]
    pub fn last_replicated(&self) -> i64 {
        self.inner.replicated.load(Ordering::Acquire)
    }

    /// Number of events fully sent.
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.inner.sent.load(Ordering::Relaxed)
    }

    /// Replica name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl<T: Tag> Inner<T> {
    fn schedule(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        this.executor.execute(Box::new(move || inner.process_next()));
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.halted.load(Ordering::Acquire)
    }

    /// Must not be called with `progress` locked.
    fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.barrier.alert();
        self.progress.lock().phase = Phase::Waiting;
        if was_running {
            debug!(replica = %self.label, replicated = self.replicated.load(Ordering::Acquire), "replicator halted");
        }
    }

    fn request_write(&self) {
        let selector = self.selector.lock().clone();
        if let Some(selector) = selector {
            selector.request_write_interest();
        }
    }

    /// Blocks for the next record and arms the write side with it.
    ///
    /// Runs on the executor, never on an I/O callback.
    fn process_next(&self) {
        if !self.is_running() {
            return;
        }
        let next = self.claimed.load(Ordering::Acquire) + 1;
        if let Err(e) = self.barrier.wait_for(next) {
            if e.is_alerted() {
                trace!(replica = %self.label, sequence = next, "wait alerted");
            } else {
                error!(replica = %self.label, sequence = next, error = %e, "wait failed");
            }
            return;
        }
        let record = match self.barrier.get(next) {
            Ok(record) => record,
            Err(e) => {
                error!(replica = %self.label, sequence = next, error = %e, "commit record lost");
                self.halt();
                return;
            }
        };

        let mut progress = self.progress.lock();
        // A halt that raced the wait must not put anything on the wire.
        if !self.is_running() {
            return;
        }
        trace!(
            replica = %self.label,
            sequence = next,
            offset = record.offset,
            segment = %record.segment.path().display(),
            "replicating"
        );
        self.claimed.store(next, Ordering::Release);
        progress.phase = Phase::WriteHeader(InFlight::new(next, record));
        drop(progress);

        self.request_write();
    }

    fn report(&self, sequence: i64, err: &CoreError) {
        match err {
            CoreError::Io {
                operation,
                offset,
                segment,
                source,
            } => error!(
                replica = %self.label,
                sequence,
                operation,
                offset,
                segment = %segment.display(),
                error = %source,
                "replication failed"
            ),
            other => error!(replica = %self.label, sequence, error = %other, "replication failed"),
        }
    }
}

impl<T: Tag> WriteHandler for Replicator<T> {
    fn on_connect(&self, selector: Arc<dyn Selector>) {
        let in_flight = {
            let mut slot = self.inner.selector.lock();
            *slot = Some(selector);
            !matches!(self.inner.progress.lock().phase, Phase::Waiting)
        };
        debug!(replica = %self.inner.label, "replica connected");
        if in_flight {
            self.inner.request_write();
        }
    }

    fn on_writable(&self, channel: &mut dyn Write) {
        let inner = &self.inner;
        if !inner.is_running() {
            return;
        }

        let mut guard = inner.progress.lock();
        let Progress { phase, scratch } = &mut *guard;
        match std::mem::replace(phase, Phase::Waiting) {
            Phase::Waiting => {
                drop(guard);
                let err = CoreError::illegal_state("replicator", "waiting", "on_writable");
                error!(replica = %inner.label, error = %err, "unexpected write readiness");
            }
            Phase::WriteHeader(mut flight) => match flight.write_header(channel) {
                Ok(done) => {
                    *phase = if done {
                        Phase::WritePayload(flight)
                    } else {
                        Phase::WriteHeader(flight)
                    };
                    drop(guard);
                    inner.request_write();
                }
                Err(e) => {
                    drop(guard);
                    inner.report(flight.sequence, &e);
                    inner.halt();
                }
            },
            Phase::WritePayload(mut flight) => match flight.write_payload(channel, scratch) {
                Ok(true) => {
                    drop(guard);
                    inner.replicated.store(flight.sequence, Ordering::Release);
                    inner.sent.fetch_add(1, Ordering::Relaxed);
                    trace!(replica = %inner.label, sequence = flight.sequence, "replicated");
                    Inner::schedule(inner);
                }
                Ok(false) => {
                    *phase = Phase::WritePayload(flight);
                    drop(guard);
                    inner.request_write();
                }
                Err(e) => {
                    drop(guard);
                    inner.report(flight.sequence, &e);
                    inner.halt();
                }
            },
        }
    }

    fn on_closing(&self) {
        debug!(replica = %self.inner.label, state = %self.state(), "replica connection closing");
        self.inner.halt();
    }
}

impl<T: Tag> fmt::Debug for Replicator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replicator")
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("last_replicated", &self.last_replicated())
            .finish()
    }
}
