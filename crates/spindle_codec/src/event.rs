//! Events: a header plus its immutable payload.

use crate::error::{CodecError, CodecResult};
use crate::header::EventHeader;
use crate::tag::Tag;
use bytes::{BufMut, Bytes, BytesMut};

/// Computes the CRC-32 (IEEE) of a payload.
///
/// Only payload bytes are checksummed; the header is never included.
#[must_use]
pub fn crc32(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Returns true iff the event's payload still matches its header checksum.
#[must_use]
pub fn validate<T: Tag>(event: &Event<T>) -> bool {
    event.validate()
}

/// The currency of channels: a header and the payload it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<T = u64> {
    header: EventHeader<T>,
    payload: Bytes,
}

impl<T: Tag> Event<T> {
    /// Creates an event, computing the payload checksum.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if the payload cannot be framed.
    pub fn new(magic: i32, tag: T, payload: impl Into<Bytes>) -> CodecResult<Self> {
        let payload = payload.into();
        let header = EventHeader::new(payload.len(), magic, tag, crc32(&payload))?;
        Ok(Self { header, payload })
    }

    /// Pairs a header with payload bytes read from elsewhere.
    ///
    /// The checksum is not verified; call [`Event::verify`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] if the payload is shorter than the
    /// header declares. Extra trailing bytes are dropped.
    pub fn from_parts(header: EventHeader<T>, mut payload: Bytes) -> CodecResult<Self> {
        let len = header.size() as usize;
        if payload.len() < len {
            return Err(CodecError::truncated(len, payload.len()));
        }
        payload.truncate(len);
        Ok(Self { header, payload })
    }

    /// Decodes a complete frame (header followed by payload).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] if the frame is incomplete.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let header = EventHeader::<T>::decode(bytes)?;
        let start = EventHeader::<T>::LEN;
        let end = start + header.size() as usize;
        if bytes.len() < end {
            return Err(CodecError::truncated(end, bytes.len()));
        }
        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&bytes[start..end]),
        })
    }

    /// Encodes the full frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(EventHeader::<T>::LEN + self.payload.len());
        self.header.write_to(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// The event header.
    #[must_use]
    pub const fn header(&self) -> &EventHeader<T> {
        &self.header
    }

    /// The payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.header.size()
    }

    /// Application-defined payload type.
    #[must_use]
    pub const fn magic(&self) -> i32 {
        self.header.magic()
    }

    /// Correlation tag.
    #[must_use]
    pub const fn tag(&self) -> T {
        self.header.tag()
    }

    /// Stored payload checksum.
    #[must_use]
    pub const fn crc32(&self) -> u32 {
        self.header.crc32()
    }

    /// Recomputes the payload checksum and compares it to the header.
    #[must_use]
    pub fn validate(&self) -> bool {
        crc32(&self.payload) == self.header.crc32()
    }

    /// Like [`Event::validate`] but reports both checksums on failure.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::ChecksumMismatch`] if the payload was altered.
    pub fn verify(&self) -> CodecResult<()> {
        let actual = crc32(&self.payload);
        if actual == self.header.crc32() {
            Ok(())
        } else {
            Err(CodecError::ChecksumMismatch {
                expected: self.header.crc32(),
                actual,
            })
        }
    }

    /// Splits the event into header and payload.
    #[must_use]
    pub fn into_parts(self) -> (EventHeader<T>, Bytes) {
        (self.header, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SLACK: &[u8] = b"Give me Slack, or give me Food, or Kill me";

    #[test]
    fn crc32_known_value() {
        // Known test vector: "123456789" should give 0xCBF43926
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_empty() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn offsets() {
        let src = vec![7u8; 23];
        let tag = Uuid::new_v4();
        let event = Event::new(777, tag, src.clone()).unwrap();
        assert_eq!(event.size(), 23);
        assert_eq!(event.tag(), tag);
        assert_eq!(event.magic(), 777);
        assert_eq!(event.crc32(), crc32(&src));
        assert!(event.validate());
    }

    #[test]
    fn encode_decode() {
        let event = Event::new(666, 777_u64, SLACK).unwrap();
        let frame = event.encode();
        assert_eq!(frame.len(), 20 + SLACK.len());

        let decoded = Event::<u64>::decode(&frame).unwrap();
        assert_eq!(decoded, event);
        assert!(validate(&decoded));
    }

    #[test]
    fn flipped_byte_fails_validation() {
        let event = Event::new(666, 777_u64, SLACK).unwrap();
        let mut frame = event.encode().to_vec();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        let corrupted = Event::<u64>::decode(&frame).unwrap();
        assert!(!corrupted.validate());
        assert!(matches!(
            corrupted.verify(),
            Err(CodecError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn decode_short_payload() {
        let event = Event::new(1, 2_u64, SLACK).unwrap();
        let frame = event.encode();
        let err = Event::<u64>::decode(&frame[..frame.len() - 5]).unwrap_err();
        assert!(err.is_partial());
    }

    #[test]
    fn from_parts_trims_excess() {
        let event = Event::new(1, 2_u64, &b"abc"[..]).unwrap();
        let rebuilt =
            Event::from_parts(*event.header(), Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(rebuilt.payload().as_ref(), b"abc");
        assert!(rebuilt.validate());
    }

    #[test]
    fn empty_payload() {
        let event = Event::new(0, 0_u64, Bytes::new()).unwrap();
        assert_eq!(event.encode().len(), 20);
        assert!(event.validate());
    }
}
