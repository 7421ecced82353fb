//! # Spindle Testkit
//!
//! Test utilities for Spindle.
//!
//! This crate provides:
//! - Scripted non-blocking channels that deliver bytes in planned chunks
//! - A recording [`Selector`](spindle_core::Selector) and a manually driven
//!   executor
//! - Temporary bundle and pipeline fixtures
//! - Property-based test generators using proptest
//! - Wire-format vectors
//!
//! ## Usage
//!
//! ```rust
//! use spindle_core::ReadHandler;
//! use spindle_testkit::prelude::*;
//!
//! let pipeline: Pipeline = Pipeline::new();
//! let mut spinner = pipeline.spinner();
//! let selector = RecordingSelector::default();
//!
//! let frame = slack_event().encode();
//! let mut channel = ScriptedReader::chunked(&frame, &[7, 7, 6, 30]);
//! while !channel.is_drained() {
//!     spinner.on_readable(&mut channel, &selector);
//! }
//! assert_eq!(pipeline.sequencer.cursor(), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod fixtures;
pub mod generators;
pub mod selector;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::channel::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::selector::*;
    pub use crate::vectors::*;
}

pub use channel::*;
pub use fixtures::*;
pub use generators::*;
pub use selector::*;
pub use vectors::*;
