//! Correlation tags carried in every event header.

use bytes::{Buf, BufMut};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

/// A channel/event correlation identifier with a fixed wire width.
///
/// The tag width fixes the header length of a wire format at compile time:
/// `u64` tags give a 20-byte header, [`Uuid`] tags a 28-byte header.
pub trait Tag: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes the tag in network byte order.
    fn put<B: BufMut>(&self, buf: &mut B);

    /// Reads a tag in network byte order.
    ///
    /// The caller guarantees at least [`Self::WIDTH`] bytes remain.
    fn get<B: Buf>(buf: &mut B) -> Self;

    /// A filesystem-safe name for the channel this tag identifies.
    fn file_stem(&self) -> String;
}

impl Tag for u64 {
    const WIDTH: usize = 8;

    fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64(*self);
    }

    fn get<B: Buf>(buf: &mut B) -> Self {
        buf.get_u64()
    }

    fn file_stem(&self) -> String {
        format!("{self:016x}")
    }
}

impl Tag for Uuid {
    const WIDTH: usize = 16;

    // Most significant half first, the same order as two big-endian longs.
    fn put<B: BufMut>(&self, buf: &mut B) {
        buf.put_u128(self.as_u128());
    }

    fn get<B: Buf>(buf: &mut B) -> Self {
        Uuid::from_u128(buf.get_u128())
    }

    fn file_stem(&self) -> String {
        self.simple().to_string()
    }
}
