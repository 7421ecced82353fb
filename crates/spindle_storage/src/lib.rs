//! # Spindle Storage
//!
//! Append-only log segments and the mapping from channels to segments.
//!
//! A segment is an opaque byte file to this crate except for read-back:
//! the ingestion path writes framed events into it and the replication path
//! streams byte ranges back out, both through positional I/O.
//!
//! ## Design Principles
//!
//! - One shared [`Segment`] handle per channel, handed out by a
//!   [`SegmentProvider`]
//! - Appends claim their region up front with [`Segment::reserve`]
//! - Readers only touch ranges that were published after being written
//! - Socket/file copies go through bounded scratch buffers
//!   ([`Segment::transfer_from`], [`Segment::transfer_to`])
//!
//! ## Example
//!
//! ```rust
//! use spindle_codec::Event;
//! use spindle_storage::Segment;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let segment = Segment::open(&dir.path().join("c.seg")).unwrap();
//!
//! let frame = Event::new(1, 9_u64, &b"hello"[..]).unwrap().encode();
//! let offset = segment.reserve(frame.len() as u64);
//! segment.write_at(&frame, offset).unwrap();
//!
//! let event = segment.read_event::<u64>(offset).unwrap();
//! assert!(event.validate());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bundle;
mod error;
mod pio;
mod provider;
mod segment;

pub use bundle::{Bundle, SEGMENT_EXTENSION};
pub use error::{StorageError, StorageResult, TransferError};
pub use provider::SegmentProvider;
pub use segment::{Segment, SegmentEvents};
