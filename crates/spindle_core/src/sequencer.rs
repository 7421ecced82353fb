//! Commit sequencer: the ordered hand-off from ingestion to replication.
//!
//! A fixed ring of [`CommitRecord`] slots indexed by `sequence % capacity`.
//! Producers write a slot completely and only then advance the published
//! cursor; consumers read a slot only once the cursor has reached it.
//!
//! ```text
//!   publish(record)                      SequenceBarrier (one per replica)
//!   ─────────────────                    ─────────────────────────────────
//!   claim next sequence s                wait_for(n) ── blocks until cursor >= n
//!   slot[s % cap] = record                             or alert()
//!   cursor = s   (release)               get(n)     ── slot[n % cap], checked
//!   notify waiters                                     against overwrite
//! ```
//!
//! There is no producer gating. A consumer that falls more than `capacity`
//! records behind finds its slot overwritten and gets
//! [`CoreError::LagExceeded`] instead of stale data.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use spindle_codec::{EventHeader, Tag};
use spindle_storage::Segment;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cursor value before anything has been published.
pub const INITIAL_CURSOR: i64 = -1;

/// The published record of one durably appended event.
#[derive(Debug, Clone)]
pub struct CommitRecord<T: Tag = u64> {
    /// Offset of the event header within its segment.
    pub offset: u64,
    /// Owned copy of the event header.
    pub header: EventHeader<T>,
    /// The channel segment holding the event.
    pub segment: Arc<Segment>,
}

impl<T: Tag> CommitRecord<T> {
    /// Offset of the first payload byte.
    #[must_use]
    pub fn payload_offset(&self) -> u64 {
        EventHeader::<T>::payload_offset(self.offset)
    }
}

#[derive(Debug)]
struct Slot<T: Tag> {
    sequence: i64,
    record: Option<CommitRecord<T>>,
}

/// Single-cursor ring buffer of commit records.
#[derive(Debug)]
pub struct Sequencer<T: Tag = u64> {
    slots: Box<[Mutex<Slot<T>>]>,
    /// Last claimed sequence; held across a whole publish.
    claim: Mutex<i64>,
    cursor: AtomicI64,
    signal: Mutex<()>,
    advanced: Condvar,
}

impl<T: Tag> Sequencer<T> {
    /// Creates a sequencer with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `capacity` is zero.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::invalid_config("ring_capacity must be non-zero"));
        }
        let slots = (0..capacity)
            .map(|_| {
                Mutex::new(Slot {
                    sequence: INITIAL_CURSOR,
                    record: None,
                })
            })
            .collect();
        Ok(Self {
            slots,
            claim: Mutex::new(INITIAL_CURSOR),
            cursor: AtomicI64::new(INITIAL_CURSOR),
            signal: Mutex::new(()),
            advanced: Condvar::new(),
        })
    }

    /// Creates a sequencer sized by `config.ring_capacity`.
    ///
    /// # Errors
    ///
    /// See [`Sequencer::new`].
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        Self::new(config.ring_capacity)
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Highest published sequence, or [`INITIAL_CURSOR`].
    #[must_use]
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Publishes a record and returns its sequence.
    ///
    /// The slot is fully written before the cursor moves, so no consumer
    /// can observe a partially written record.
    pub fn publish(&self, record: CommitRecord<T>) -> i64 {
        let mut last = self.claim.lock();
        let sequence = *last + 1;
        {
            let mut slot = self.slots[self.index(sequence)].lock();
            slot.sequence = sequence;
            slot.record = Some(record);
        }
        *last = sequence;
        self.cursor.store(sequence, Ordering::Release);
        drop(last);

        self.wake_all();
        sequence
    }

    /// Creates an independent consumer handle.
    #[must_use]
    pub fn new_barrier(self: &Arc<Self>) -> SequenceBarrier<T> {
        SequenceBarrier {
            sequencer: Arc::clone(self),
            alerted: AtomicBool::new(false),
        }
    }

    fn index(&self, sequence: i64) -> usize {
        // Callers only index published or claimed sequences, which are >= 0.
        (sequence as u64 % self.slots.len() as u64) as usize
    }

    fn wake_all(&self) {
        let _guard = self.signal.lock();
        self.advanced.notify_all();
    }

    fn get(&self, sequence: i64) -> CoreResult<CommitRecord<T>> {
        let cursor = self.cursor();
        if sequence < 0 || sequence > cursor {
            return Err(CoreError::NotPublished {
                requested: sequence,
                cursor,
            });
        }
        let slot = self.slots[self.index(sequence)].lock();
        if slot.sequence > sequence {
            return Err(CoreError::LagExceeded {
                requested: sequence,
                overwritten_by: slot.sequence,
                capacity: self.capacity(),
            });
        }
        match &slot.record {
            Some(record) if slot.sequence == sequence => Ok(record.clone()),
            _ => Err(CoreError::NotPublished {
                requested: sequence,
                cursor,
            }),
        }
    }
}

/// One consumer's view of a [`Sequencer`].
///
/// Each replica owns a barrier; alerting one barrier never disturbs the
/// others.
#[derive(Debug)]
pub struct SequenceBarrier<T: Tag = u64> {
    sequencer: Arc<Sequencer<T>>,
    alerted: AtomicBool,
}

impl<T: Tag> SequenceBarrier<T> {
    /// Blocks until `sequence` is published and returns the cursor seen.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Alerted`] if [`SequenceBarrier::alert`] was
    /// called before or during the wait.
    pub fn wait_for(&self, sequence: i64) -> CoreResult<i64> {
        self.wait(sequence, None)?.ok_or(CoreError::Alerted)
    }

    /// Like [`SequenceBarrier::wait_for`], giving up after `timeout`.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Alerted`] if the barrier is alerted.
    pub fn wait_for_timeout(&self, sequence: i64, timeout: Duration) -> CoreResult<Option<i64>> {
        self.wait(sequence, Some(timeout))
    }

    fn wait(&self, sequence: i64, timeout: Option<Duration>) -> CoreResult<Option<i64>> {
        let deadline = timeout.map(|t| std::time::Instant::now() + t);
        let mut guard = self.sequencer.signal.lock();
        loop {
            if self.is_alerted() {
                return Err(CoreError::Alerted);
            }
            let cursor = self.sequencer.cursor();
            if cursor >= sequence {
                return Ok(Some(cursor));
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .sequencer
                        .advanced
                        .wait_until(&mut guard, deadline)
                        .timed_out()
                    {
                        return Ok(None);
                    }
                }
                None => self.sequencer.advanced.wait(&mut guard),
            }
        }
    }

    /// Reads the record published at `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotPublished`] if the cursor has not reached
    /// `sequence` and [`CoreError::LagExceeded`] if its slot was reused.
    pub fn get(&self, sequence: i64) -> CoreResult<CommitRecord<T>> {
        self.sequencer.get(sequence)
    }

    /// Highest published sequence.
    #[must_use]
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor()
    }

    /// Wakes any blocked wait on this barrier and fails later ones.
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.sequencer.wake_all();
    }

    /// Clears a previous alert.
    pub fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    /// Returns true if the barrier is alerted.
    #[must_use]
    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }
}
