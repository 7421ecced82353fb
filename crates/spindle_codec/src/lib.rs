//! # Spindle Codec
//!
//! The on-wire and on-disk event framing for Spindle.
//!
//! Every event is a fixed-size header followed by an opaque payload:
//!
//! ```text
//! | size (4) | magic (4) | tag (8 or 16) | crc32 (4) | payload (size - header) |
//! ```
//!
//! All integers are big-endian. `size` counts the header too, so readers
//! subtract [`EventHeader::LEN`] to find the payload length. The checksum
//! covers the payload only.
//!
//! ## Usage
//!
//! ```
//! use spindle_codec::{decode_header, Event};
//!
//! let event = Event::new(666, 777_u64, &b"hello"[..]).unwrap();
//! let frame = event.encode();
//!
//! let header = decode_header::<u64>(&frame).unwrap();
//! assert_eq!(header.size(), 5);
//! assert!(Event::<u64>::decode(&frame).unwrap().validate());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod header;
mod tag;

pub use error::{CodecError, CodecResult};
pub use event::{crc32, validate, Event};
pub use header::{decode_header, encode_header, EventHeader, HeaderBytes, MAX_HEADER_LEN};
pub use tag::Tag;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn header_roundtrip(
            payload in prop::collection::vec(any::<u8>(), 0..512),
            magic in any::<i32>(),
            tag in any::<u64>(),
        ) {
            let size = (payload.len() + EventHeader::<u64>::LEN) as u32;
            let bytes = encode_header(size, magic, tag, crc32(&payload)).unwrap();
            let header = decode_header::<u64>(bytes.as_slice()).unwrap();
            prop_assert_eq!(header.size() as usize, payload.len());
            prop_assert_eq!(header.magic(), magic);
            prop_assert_eq!(header.tag(), tag);
            prop_assert_eq!(header.crc32(), crc32(&payload));
        }

        #[test]
        fn any_flipped_payload_bit_is_detected(
            payload in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let event = Event::new(1, 2_u64, payload).unwrap();
            prop_assert!(event.validate());

            let mut frame = event.encode().to_vec();
            let at = EventHeader::<u64>::LEN + index.index(event.size() as usize);
            frame[at] ^= 1 << bit;
            prop_assert!(!Event::<u64>::decode(&frame).unwrap().validate());
        }
    }
}
