//! Fixed-layout event header.

use crate::error::{CodecError, CodecResult};
use crate::tag::Tag;
use bytes::{Buf, BufMut};
use std::marker::PhantomData;

/// Length of the header with the widest supported tag.
pub const MAX_HEADER_LEN: usize = 28;

const SIZE_LEN: usize = 4;
const MAGIC_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// An event header, laid out big-endian as:
///
/// ```text
/// | size (4) | magic (4) | tag (8 or 16) | crc32 (4) |
/// ```
///
/// `size` on the wire counts the header as well as the payload; the
/// accessor [`EventHeader::size`] returns the payload length only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHeader<T = u64> {
    payload_len: u32,
    magic: i32,
    tag: T,
    crc32: u32,
}

impl<T: Tag> EventHeader<T> {
    /// Encoded header length for this tag width.
    pub const LEN: usize = SIZE_LEN + MAGIC_LEN + T::WIDTH + CRC_LEN;

    /// Largest payload whose frame size still fits the size field.
    pub const MAX_PAYLOAD: usize = u32::MAX as usize - Self::LEN;

    /// Creates a header describing a payload of `payload_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if the frame size would not
    /// fit in 32 bits.
    pub fn new(payload_len: usize, magic: i32, tag: T, crc32: u32) -> CodecResult<Self> {
        if payload_len > Self::MAX_PAYLOAD {
            return Err(CodecError::PayloadTooLarge {
                len: payload_len,
                max: Self::MAX_PAYLOAD,
            });
        }
        Ok(Self {
            payload_len: payload_len as u32,
            magic,
            tag,
            crc32,
        })
    }

    /// Creates a header from the raw wire `size`, which includes the header.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidSize`] if `size` is smaller than the
    /// header length.
    pub fn from_wire(size: u32, magic: i32, tag: T, crc32: u32) -> CodecResult<Self> {
        let payload_len = (size as usize)
            .checked_sub(Self::LEN)
            .ok_or(CodecError::InvalidSize {
                size,
                header_len: Self::LEN,
            })?;
        Ok(Self {
            payload_len: payload_len as u32,
            magic,
            tag,
            crc32,
        })
    }

    /// Decodes a header from the first [`Self::LEN`] bytes of `bytes`.
    ///
    /// Never decodes partially: anything shorter is reported as truncated.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] on short input and
    /// [`CodecError::InvalidSize`] on an impossible size field.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < Self::LEN {
            return Err(CodecError::truncated(Self::LEN, bytes.len()));
        }
        let mut buf = &bytes[..Self::LEN];
        let size = buf.get_u32();
        let magic = buf.get_i32();
        let tag = T::get(&mut buf);
        let crc32 = buf.get_u32();
        Self::from_wire(size, magic, tag, crc32)
    }

    /// Writes the header in wire order.
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32(self.wire_size());
        buf.put_i32(self.magic);
        self.tag.put(buf);
        buf.put_u32(self.crc32);
    }

    /// Encodes the header into a fixed-size stack buffer.
    #[must_use]
    pub fn to_bytes(&self) -> HeaderBytes<T> {
        let mut bytes = [0u8; MAX_HEADER_LEN];
        self.write_to(&mut &mut bytes[..Self::LEN]);
        HeaderBytes {
            bytes,
            _tag: PhantomData,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.payload_len
    }

    /// The size field as stored: payload plus header length.
    #[must_use]
    pub fn wire_size(&self) -> u32 {
        self.payload_len + Self::LEN as u32
    }

    /// Header plus payload length.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        u64::from(self.wire_size())
    }

    /// Application-defined payload type.
    #[must_use]
    pub const fn magic(&self) -> i32 {
        self.magic
    }

    /// Channel/event correlation tag.
    #[must_use]
    pub const fn tag(&self) -> T {
        self.tag
    }

    /// CRC-32 of the payload.
    #[must_use]
    pub const fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Offset of the payload for an event whose header starts at `offset`.
    #[must_use]
    pub fn payload_offset(offset: u64) -> u64 {
        offset + Self::LEN as u64
    }
}

/// An encoded header that lives on the stack.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HeaderBytes<T = u64> {
    bytes: [u8; MAX_HEADER_LEN],
    _tag: PhantomData<T>,
}

impl<T: Tag> HeaderBytes<T> {
    /// The encoded header.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..EventHeader::<T>::LEN]
    }
}

impl<T: Tag> AsRef<[u8]> for HeaderBytes<T> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<T: Tag> std::fmt::Debug for HeaderBytes<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HeaderBytes").field(&self.as_slice()).finish()
    }
}

/// Decodes a header; see [`EventHeader::decode`].
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] if fewer than a header's worth of bytes
/// are present.
pub fn decode_header<T: Tag>(bytes: &[u8]) -> CodecResult<EventHeader<T>> {
    EventHeader::decode(bytes)
}

/// Encodes a header from its wire fields. `size` already includes the
/// header length.
///
/// # Errors
///
/// Returns [`CodecError::InvalidSize`] if `size` is smaller than the header.
pub fn encode_header<T: Tag>(
    size: u32,
    magic: i32,
    tag: T,
    crc32: u32,
) -> CodecResult<HeaderBytes<T>> {
    Ok(EventHeader::from_wire(size, magic, tag, crc32)?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn header_lengths() {
        assert_eq!(EventHeader::<u64>::LEN, 20);
        assert_eq!(EventHeader::<Uuid>::LEN, 28);
        assert_eq!(EventHeader::<Uuid>::LEN, MAX_HEADER_LEN);
    }

    #[test]
    fn accessors() {
        let header = EventHeader::new(25, 777, 666_u64, 23456).unwrap();
        assert_eq!(header.size(), 25);
        assert_eq!(header.tag(), 666);
        assert_eq!(header.magic(), 777);
        assert_eq!(header.crc32(), 23456);
        assert_eq!(header.wire_size(), 45);
    }

    #[test]
    fn wire_layout() {
        let header = EventHeader::new(1, 2, 0x0304_0506_0708_090A_u64, 0x0B0C_0D0E).unwrap();
        let bytes = header.to_bytes();
        assert_eq!(
            bytes.as_slice(),
            &[
                0, 0, 0, 21, // size = 1 + 20
                0, 0, 0, 2, // magic
                3, 4, 5, 6, 7, 8, 9, 10, // tag
                11, 12, 13, 14, // crc32
            ]
        );
    }

    #[test]
    fn negative_magic_survives() {
        let header = EventHeader::new(0, -7, 1_u64, 0).unwrap();
        let decoded = EventHeader::<u64>::decode(header.to_bytes().as_slice()).unwrap();
        assert_eq!(decoded.magic(), -7);
    }

    #[test]
    fn decode_truncated() {
        let err = decode_header::<u64>(&[0u8; 19]).unwrap_err();
        assert_eq!(err, CodecError::truncated(20, 19));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let header = EventHeader::new(3, 1, 2_u64, 3).unwrap();
        let mut bytes = header.to_bytes().as_slice().to_vec();
        bytes.extend_from_slice(b"abc");
        assert_eq!(decode_header::<u64>(&bytes).unwrap(), header);
    }

    #[test]
    fn decode_rejects_size_below_header() {
        let bytes = encode_header::<u64>(20, 0, 0, 0).unwrap();
        let mut raw = bytes.as_slice().to_vec();
        raw[3] = 19;
        assert!(matches!(
            decode_header::<u64>(&raw),
            Err(CodecError::InvalidSize { size: 19, .. })
        ));
    }

    #[test]
    fn encode_header_takes_wire_size() {
        let bytes = encode_header::<u64>(20 + 42, 666, 777, 9).unwrap();
        let header = decode_header::<u64>(bytes.as_slice()).unwrap();
        assert_eq!(header.size(), 42);
        assert_eq!(header.wire_size(), 62);
    }

    #[test]
    fn uuid_header_roundtrip() {
        let tag = Uuid::new_v4();
        let header = EventHeader::new(10, 5, tag, 99).unwrap();
        let bytes = header.to_bytes();
        assert_eq!(bytes.as_slice().len(), 28);
        assert_eq!(EventHeader::<Uuid>::decode(bytes.as_slice()).unwrap(), header);
    }

    #[test]
    fn payload_too_large() {
        let err = EventHeader::new(EventHeader::<u64>::MAX_PAYLOAD + 1, 0, 0_u64, 0).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
    }

    #[test]
    fn payload_offset() {
        assert_eq!(EventHeader::<u64>::payload_offset(100), 120);
        assert_eq!(EventHeader::<Uuid>::payload_offset(0), 28);
    }
}
