//! Wire-format test vectors.
//!
//! Byte-exact frames that any implementation of the event format must
//! produce and accept.

/// A header encoding vector.
#[derive(Debug, Clone)]
pub struct HeaderVector {
    /// Unique identifier for this vector.
    pub id: &'static str,
    /// Wire size field (payload plus header).
    pub size: u32,
    /// Magic field.
    pub magic: i32,
    /// Tag field.
    pub tag: u64,
    /// Checksum field.
    pub crc32: u32,
    /// Expected encoding (hex).
    pub expected_hex: &'static str,
}

/// Header vectors for the 64-bit tag format.
pub fn header_vectors() -> Vec<HeaderVector> {
    vec![
        HeaderVector {
            id: "empty_payload",
            size: 20,
            magic: 0,
            tag: 0,
            crc32: 0,
            expected_hex: "0000001400000000000000000000000000000000",
        },
        HeaderVector {
            id: "slack",
            size: 62,
            magic: 666,
            tag: 777,
            crc32: 0xDEAD_BEEF,
            expected_hex: "0000003e0000029a0000000000000309deadbeef",
        },
        HeaderVector {
            id: "negative_magic",
            size: 21,
            magic: -1,
            tag: u64::MAX,
            crc32: 1,
            expected_hex: "00000015ffffffffffffffffffffffff00000001",
        },
    ]
}

/// Payload checksum vectors (standard CRC-32).
pub fn crc32_vectors() -> Vec<(&'static [u8], u32)> {
    vec![
        (b"", 0x0000_0000),
        (b"123456789", 0xCBF4_3926),
        (b"The quick brown fox jumps over the lazy dog", 0x414F_A339),
    ]
}

/// Lowercase hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_codec::{crc32, decode_header, encode_header};

    #[test]
    fn header_vectors_encode() {
        for v in header_vectors() {
            let bytes = encode_header(v.size, v.magic, v.tag, v.crc32).unwrap();
            assert_eq!(hex_encode(bytes.as_slice()), v.expected_hex, "{}", v.id);

            let header = decode_header::<u64>(bytes.as_slice()).unwrap();
            assert_eq!(header.wire_size(), v.size, "{}", v.id);
            assert_eq!(header.magic(), v.magic, "{}", v.id);
            assert_eq!(header.tag(), v.tag, "{}", v.id);
        }
    }

    #[test]
    fn crc32_vectors_match() {
        for (input, expected) in crc32_vectors() {
            assert_eq!(crc32(input), expected);
        }
    }
}
