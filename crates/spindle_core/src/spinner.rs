//! Ingestion state machine.
//!
//! One [`Spinner`] per inbound connection. Each readiness callback consumes
//! whatever the socket currently offers and returns; a header or payload may
//! arrive over any number of callbacks.
//!
//! ```text
//!            ┌──────────┐  clear header buffer  ┌────────────┐
//!    ───────►│ Accepted ├──────────────────────►│ ReadHeader │◄─┐ partial
//!            └──────────┘                       └─────┬──────┘──┘
//!                 ▲                                   │ header complete:
//!                 │ remaining == 0:                   │ resolve segment,
//!                 │ sync, publish                     │ reserve, write header
//!            ┌────┴─────┐                             │
//!            │  Append  │◄────────────────────────────┘
//!            └──┬───────┘◄─┐ partial
//!               └──────────┘
//!
//!   a segment fault abandons the append; Discard drains the rest of the
//!   payload from the socket and returns to Accepted
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::handler::{ReadHandler, Selector};
use crate::sequencer::{CommitRecord, Sequencer};
use spindle_codec::{EventHeader, Tag, MAX_HEADER_LEN};
use spindle_storage::{Segment, SegmentProvider};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Observable state of a [`Spinner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinnerState {
    /// Ready to read a new header.
    Accepted,
    /// Header bytes partially received.
    ReadHeader,
    /// Payload bytes partially transferred to the segment.
    Append,
    /// Draining the payload of an abandoned append.
    Discard,
}

impl SpinnerState {
    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::ReadHeader => "read_header",
            Self::Append => "append",
            Self::Discard => "discard",
        }
    }
}

impl fmt::Display for SpinnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Append<T: Tag> {
    segment: Arc<Segment>,
    offset: u64,
    header: EventHeader<T>,
    position: u64,
    remaining: u64,
}

enum Phase<T: Tag> {
    Accepted,
    ReadHeader { filled: usize },
    Append(Append<T>),
    Discard { remaining: u64 },
}

enum Step {
    /// The state changed; run the next step in this callback.
    Continue,
    /// Nothing more can happen until the next callback.
    Yield,
}

/// Reads framed events off one connection into channel segments.
pub struct Spinner<T: Tag = u64> {
    provider: Arc<dyn SegmentProvider<T>>,
    sequencer: Arc<Sequencer<T>>,
    sync_on_append: bool,
    phase: Phase<T>,
    header: [u8; MAX_HEADER_LEN],
    scratch: Box<[u8]>,
    committed: u64,
}

impl<T: Tag> Spinner<T> {
    /// Creates a spinner that appends through `provider` and publishes to
    /// `sequencer`.
    pub fn new(
        provider: Arc<dyn SegmentProvider<T>>,
        sequencer: Arc<Sequencer<T>>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            sequencer,
            sync_on_append: config.sync_on_append,
            phase: Phase::Accepted,
            header: [0; MAX_HEADER_LEN],
            scratch: vec![0; config.transfer_chunk.max(1)].into_boxed_slice(),
            committed: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SpinnerState {
        match self.phase {
            Phase::Accepted => SpinnerState::Accepted,
            Phase::ReadHeader { .. } => SpinnerState::ReadHeader,
            Phase::Append(_) => SpinnerState::Append,
            Phase::Discard { .. } => SpinnerState::Discard,
        }
    }

    /// Number of events this spinner has published.
    #[must_use]
    pub fn committed(&self) -> u64 {
        self.committed
    }

    fn step(&mut self, channel: &mut dyn Read) -> CoreResult<Step> {
        match std::mem::replace(&mut self.phase, Phase::Accepted) {
            Phase::Accepted => {
                self.header.fill(0);
                self.phase = Phase::ReadHeader { filled: 0 };
                Ok(Step::Continue)
            }
            Phase::ReadHeader { filled } => self.read_header(channel, filled),
            Phase::Append(append) => self.append(channel, append),
            Phase::Discard { remaining } => self.discard(channel, remaining),
        }
    }

    fn read_header(&mut self, channel: &mut dyn Read, mut filled: usize) -> CoreResult<Step> {
        let len = EventHeader::<T>::LEN;
        while filled < len {
            match channel.read(&mut self.header[filled..len]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.phase = Phase::ReadHeader { filled };
                    return Err(CoreError::connection("read header", e));
                }
            }
        }
        if filled < len {
            self.phase = Phase::ReadHeader { filled };
            return Ok(Step::Yield);
        }

        // The header bytes are consumed whatever happens next.
        let header = EventHeader::<T>::decode(&self.header[..len])?;
        let payload = u64::from(header.size());

        let segment = match self.provider.segment_for(&header) {
            Ok(segment) => segment,
            Err(e) => {
                self.phase = Phase::Discard { remaining: payload };
                return Err(e.into());
            }
        };
        let offset = segment.reserve(header.frame_len());
        if let Err(e) = segment.write_at(&self.header[..len], offset) {
            self.phase = Phase::Discard { remaining: payload };
            return Err(CoreError::io("write header", offset, segment.path(), e));
        }
        trace!(
            offset,
            segment = %segment.path().display(),
            tag = ?header.tag(),
            size = header.size(),
            "header appended"
        );

        self.phase = Phase::Append(Append {
            segment,
            offset,
            header,
            position: EventHeader::<T>::payload_offset(offset),
            remaining: payload,
        });
        Ok(Step::Continue)
    }

    fn append(&mut self, channel: &mut dyn Read, mut append: Append<T>) -> CoreResult<Step> {
        let moved = match append.segment.transfer_from(
            channel,
            append.position,
            append.remaining,
            &mut self.scratch,
        ) {
            Ok(moved) => moved,
            Err(e) => {
                self.phase = Phase::Discard {
                    remaining: append.remaining.saturating_sub(e.transferred),
                };
                return Err(CoreError::io(
                    "append payload",
                    append.offset,
                    append.segment.path(),
                    e.source,
                ));
            }
        };
        append.position += moved;
        append.remaining -= moved;

        if append.remaining > 0 {
            self.phase = Phase::Append(append);
            return Ok(Step::Yield);
        }
        self.commit(append)?;
        Ok(Step::Continue)
    }

    fn commit(&mut self, append: Append<T>) -> CoreResult<()> {
        let Append {
            segment,
            offset,
            header,
            ..
        } = append;
        if self.sync_on_append {
            segment
                .sync_data()
                .map_err(|e| CoreError::io("sync", offset, segment.path(), e))?;
        }
        let sequence = self.sequencer.publish(CommitRecord {
            offset,
            header,
            segment,
        });
        self.committed += 1;
        trace!(sequence, offset, tag = ?header.tag(), "event committed");
        Ok(())
    }

    fn discard(&mut self, channel: &mut dyn Read, mut remaining: u64) -> CoreResult<Step> {
        while remaining > 0 {
            let want = usize::try_from(remaining).map_or(self.scratch.len(), |r| {
                r.min(self.scratch.len())
            });
            match channel.read(&mut self.scratch[..want]) {
                Ok(0) => break,
                Ok(n) => remaining -= n as u64,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.phase = Phase::Discard { remaining };
                    return Err(CoreError::connection("discard payload", e));
                }
            }
        }
        if remaining > 0 {
            self.phase = Phase::Discard { remaining };
            return Ok(Step::Yield);
        }
        debug!("abandoned payload drained");
        Ok(Step::Continue)
    }

    fn report(&self, err: &CoreError) {
        match err {
            CoreError::Io {
                operation,
                offset,
                segment,
                source,
            } => error!(
                operation,
                offset,
                segment = %segment.display(),
                state = %self.state(),
                error = %source,
                "append abandoned"
            ),
            other => error!(state = %self.state(), error = %other, "append abandoned"),
        }
    }
}

impl<T: Tag> ReadHandler for Spinner<T> {
    fn on_accept(&mut self, selector: &dyn Selector) {
        debug!("connection accepted");
        selector.request_read_interest();
    }

    fn on_readable(&mut self, channel: &mut dyn Read, selector: &dyn Selector) {
        loop {
            match self.step(channel) {
                Ok(Step::Continue) => {}
                Ok(Step::Yield) => break,
                Err(e) => {
                    self.report(&e);
                    break;
                }
            }
        }
        selector.request_read_interest();
    }

    fn on_closing(&mut self) {
        match &self.phase {
            Phase::Append(append) => warn!(
                offset = append.offset,
                segment = %append.segment.path().display(),
                remaining = append.remaining,
                "connection closed mid-append"
            ),
            Phase::ReadHeader { filled } if *filled > 0 => {
                warn!(filled, "connection closed mid-header");
            }
            _ => debug!(committed = self.committed, "connection closed"),
        }
        self.phase = Phase::Accepted;
    }
}

impl<T: Tag> fmt::Debug for Spinner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Spinner");
        s.field("state", &self.state());
        if let Phase::Append(append) = &self.phase {
            s.field("segment", &append.segment.path())
                .field("offset", &append.offset)
                .field("position", &append.position)
                .field("remaining", &append.remaining);
        }
        s.field("committed", &self.committed).finish()
    }
}
