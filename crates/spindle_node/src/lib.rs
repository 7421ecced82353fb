//! # Spindle Node
//!
//! A runnable storage node built on `spindle_core`.
//!
//! The core state machines are callback driven and know nothing about
//! sockets. This crate supplies the rest:
//!
//! - [`Node`] - binds the ingest port, runs a [`spindle_core::Spinner`] per
//!   producer connection and a replication link per replica
//! - [`runtime`] - tokio readiness adapters: [`TryIo`], [`ChannelSelector`],
//!   [`BlockingExecutor`] and [`run_blocking`]
//! - [`Producer`] - a small client for pushing events into a node
//!
//! The `spindle` binary wraps all of this behind `serve`, `send`, `verify`
//! and `inspect` subcommands.
//!
//! ## Replication topology
//!
//! A replica receives exactly the framing producers send, so a node can
//! replicate into another node's ingest port:
//!
//! ```text
//! producer ─► node A ─► segment ─► sequencer ─► link ─► node B ─► segment
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod node;
mod producer;
pub mod runtime;

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use node::{Node, ShutdownHandle};
pub use producer::Producer;
pub use runtime::{run_blocking, BlockingExecutor, ChannelSelector, Interest, TryIo};
