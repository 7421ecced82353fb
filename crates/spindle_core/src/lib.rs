//! # Spindle Core
//!
//! The moving parts of a Spindle storage node:
//!
//! - [`Spinner`] - reads framed events off an inbound connection straight
//!   into channel segments and publishes a [`CommitRecord`] for each
//! - [`Sequencer`] - the ordered ring that hands commit records from
//!   ingestion to replication without ever blocking ingestion
//! - [`Replicator`] - waits on the sequencer and streams each committed
//!   event to one replica
//!
//! The state machines are driven by readiness callbacks through the
//! [`ReadHandler`] and [`WriteHandler`] roles; the I/O framework is not part
//! of this crate.
//!
//! ```text
//! socket ─► Spinner ─► segment file ─► Sequencer ─► Replicator ─► replica
//! ```
//!
//! ## Example
//!
//! ```rust
//! use spindle_codec::Event;
//! use spindle_core::{Config, ReadHandler, Selector, Sequencer, Spinner};
//! use spindle_storage::Bundle;
//! use std::sync::Arc;
//!
//! struct Noop;
//! impl Selector for Noop {
//!     fn request_read_interest(&self) {}
//!     fn request_write_interest(&self) {}
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = Config::default();
//! let bundle = Arc::new(Bundle::<u64>::open(dir.path()).unwrap());
//! let sequencer = Arc::new(Sequencer::from_config(&config).unwrap());
//! let mut spinner = Spinner::new(bundle, Arc::clone(&sequencer), &config);
//!
//! let frame = Event::new(1, 42_u64, &b"hello"[..]).unwrap().encode();
//! spinner.on_readable(&mut &frame[..], &Noop);
//!
//! assert_eq!(sequencer.cursor(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod handler;
mod replicator;
mod sequencer;
mod spinner;

pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use executor::{Executor, Task, ThreadExecutor};
pub use handler::{ReadHandler, Selector, WriteHandler};
pub use replicator::{Replicator, ReplicatorState};
pub use sequencer::{CommitRecord, SequenceBarrier, Sequencer, INITIAL_CURSOR};
pub use spinner::{Spinner, SpinnerState};
