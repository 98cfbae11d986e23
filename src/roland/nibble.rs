//! 7-bit safe value packing and Roland checksums

use super::address::ValueKind;

/// Split a byte into `[high, low]` nibbles, each 0-15
pub fn encode_nibbles(byte: u8) -> [u8; 2] {
    [byte >> 4, byte & 0x0F]
}

/// Join two nibbles back into a byte; bits above the low nibble are ignored
pub fn decode_nibbles(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}

/// Roland checksum over address and payload bytes
///
/// `(0x80 - (sum mod 0x80)) mod 0x80`. An empty payload still yields a
/// checksum over the address alone.
pub fn checksum(address: &[u8], payload: &[u8]) -> u8 {
    let sum: u32 = address
        .iter()
        .chain(payload.iter())
        .map(|&b| b as u32)
        .sum();
    ((0x80 - (sum % 0x80)) % 0x80) as u8
}

/// Recompute and compare; never corrects
pub fn verify_checksum(address: &[u8], payload: &[u8], expected: u8) -> bool {
    checksum(address, payload) == expected
}

/// Serialize `value` into `length` wire bytes for the given kind
///
/// Callers check the value against the entry width first; bits that do not
/// fit are discarded here.
pub fn pack_value(kind: ValueKind, length: usize, value: u32) -> Vec<u8> {
    match kind {
        ValueKind::Byte | ValueKind::AsciiBlock => (0..length)
            .map(|i| {
                let shift = 7 * (length - 1 - i) as u32;
                shift_right(value, shift) as u8 & 0x7F
            })
            .collect(),
        ValueKind::NibblePair => {
            let logical = length.div_ceil(2);
            let mut out = Vec::with_capacity(logical * 2);
            for j in 0..logical {
                let shift = 8 * (logical - 1 - j) as u32;
                out.extend_from_slice(&encode_nibbles(shift_right(value, shift) as u8));
            }
            // Odd lengths keep the low nibbles only
            out.split_off(out.len() - length)
        }
    }
}

/// Combine wire bytes into a number according to kind
pub fn unpack_value(kind: ValueKind, bytes: &[u8]) -> u32 {
    match kind {
        ValueKind::Byte | ValueKind::AsciiBlock => bytes
            .iter()
            .fold(0u32, |acc, &b| acc.wrapping_shl(7) | (b & 0x7F) as u32),
        ValueKind::NibblePair => {
            let lead = bytes.len() % 2;
            let mut acc = bytes[..lead]
                .iter()
                .fold(0u32, |acc, &b| (acc << 4) | (b & 0x0F) as u32);
            for pair in bytes[lead..].chunks_exact(2) {
                acc = acc.wrapping_shl(8) | decode_nibbles(pair[0], pair[1]) as u32;
            }
            acc
        }
    }
}

fn shift_right(value: u32, shift: u32) -> u32 {
    value.checked_shr(shift).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_nibbles() {
        assert_eq!(encode_nibbles(0x00), [0x00, 0x00]);
        assert_eq!(encode_nibbles(0x7F), [0x07, 0x0F]);
        assert_eq!(encode_nibbles(0xA5), [0x0A, 0x05]);
    }

    #[test]
    fn test_checksum_matches_known_frames() {
        // GS "part 1 M-FX on": 40 41 22 01 -> 5C
        assert_eq!(checksum(&[0x40, 0x41, 0x22], &[0x01]), 0x5C);
        assert_eq!(checksum(&[0x40, 0x03, 0x00], &[0x01, 0x72]), 0x4A);
    }

    #[test]
    fn test_checksum_empty_payload() {
        assert_eq!(checksum(&[0x01, 0x02, 0x13], &[]), 0x6A);
        // Sum already a multiple of 0x80 gives zero, not 0x80
        assert_eq!(checksum(&[0x40, 0x40, 0x00], &[]), 0x00);
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let sum = checksum(&[0x01, 0x02, 0x13], &[0x64]);
        assert!(verify_checksum(&[0x01, 0x02, 0x13], &[0x64], sum));
        assert!(!verify_checksum(&[0x01, 0x02, 0x13], &[0x64], sum ^ 0x01));
    }

    #[test]
    fn test_pack_byte_kind() {
        assert_eq!(pack_value(ValueKind::Byte, 1, 100), vec![100]);
        assert_eq!(pack_value(ValueKind::Byte, 2, 256), vec![0x02, 0x00]);
        assert_eq!(pack_value(ValueKind::Byte, 3, 0x00_0102), vec![0x00, 0x02, 0x02]);
    }

    #[test]
    fn test_pack_nibble_kind() {
        assert_eq!(pack_value(ValueKind::NibblePair, 2, 0xA5), vec![0x0A, 0x05]);
        assert_eq!(
            pack_value(ValueKind::NibblePair, 4, 0x1234),
            vec![0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(pack_value(ValueKind::NibblePair, 3, 0x123), vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_unpack_matches_pack() {
        assert_eq!(unpack_value(ValueKind::Byte, &[0x02, 0x00]), 256);
        assert_eq!(unpack_value(ValueKind::NibblePair, &[0x0A, 0x05]), 0xA5);
        assert_eq!(unpack_value(ValueKind::NibblePair, &[0x01, 0x02, 0x03]), 0x123);
    }

    proptest! {
        #[test]
        fn prop_nibbles_roundtrip(b in 0u8..=127) {
            let [hi, lo] = encode_nibbles(b);
            prop_assert!(hi < 0x10 && lo < 0x10);
            prop_assert_eq!(decode_nibbles(hi, lo), b);
        }

        #[test]
        fn prop_checksum_verifies(
            address in proptest::array::uniform3(0u8..0x80),
            payload in proptest::collection::vec(0u8..0x80, 0..64),
        ) {
            let sum = checksum(&address, &payload);
            prop_assert!(sum < 0x80);
            prop_assert!(verify_checksum(&address, &payload, sum));
        }

        #[test]
        fn prop_packed_bytes_are_7bit(value in 0u32..(1 << 21)) {
            for byte in pack_value(ValueKind::Byte, 3, value) {
                prop_assert!(byte < 0x80);
            }
            prop_assert_eq!(unpack_value(ValueKind::Byte, &pack_value(ValueKind::Byte, 3, value)), value);
        }
    }
}
