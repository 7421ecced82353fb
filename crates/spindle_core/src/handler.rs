//! Connection handler roles.
//!
//! A readiness dispatcher drives each connection through one of two narrow
//! roles. Inbound connections get a [`ReadHandler`], outbound replica
//! connections a [`WriteHandler`]; neither role has the other's callbacks.
//!
//! Handlers keep themselves scheduled by calling back into a [`Selector`]
//! with the kind of readiness they need next.

use std::io::{Read, Write};
use std::sync::Arc;

/// The dispatcher side of a connection: interest registration.
pub trait Selector: Send + Sync {
    /// Asks to be called back when the connection is readable.
    fn request_read_interest(&self);

    /// Asks to be called back when the connection is writable.
    fn request_write_interest(&self);
}

/// The readable role, implemented by the ingestion state machine.
pub trait ReadHandler: Send {
    /// The connection was accepted.
    fn on_accept(&mut self, selector: &dyn Selector);

    /// The connection has bytes to read.
    ///
    /// `channel` is non-blocking: a read returning
    /// [`std::io::ErrorKind::WouldBlock`] means nothing more is available
    /// for now.
    fn on_readable(&mut self, channel: &mut dyn Read, selector: &dyn Selector);

    /// The connection is closing.
    fn on_closing(&mut self);
}

/// The writable role, implemented by the replication state machine.
///
/// Callbacks take `&self` because the handler is also driven by the
/// background worker waiting on the sequencer.
pub trait WriteHandler: Send + Sync {
    /// The outbound connection is established.
    fn on_connect(&self, selector: Arc<dyn Selector>);

    /// The connection can accept more bytes.
    fn on_writable(&self, channel: &mut dyn Write);

    /// The connection is closing.
    fn on_closing(&self);
}
