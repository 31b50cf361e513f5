//! Variable-length 29-bit integers.
//!
//! The first three bytes carry 7 payload bits each, with the high bit set when
//! another byte follows. A fourth byte, if reached, carries a full 8 bits and is
//! always the last.
//!
//! ```text
//! 0x00000000 - 0x0000007F : 0xxxxxxx
//! 0x00000080 - 0x00003FFF : 1xxxxxxx 0xxxxxxx
//! 0x00004000 - 0x001FFFFF : 1xxxxxxx 1xxxxxxx 0xxxxxxx
//! 0x00200000 - 0x1FFFFFFF : 1xxxxxxx 1xxxxxxx 1xxxxxxx xxxxxxxx
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{DecodeError, EncodeError};

/// Largest value a U29 can carry.
pub const U29_MAX: u32 = 0x1FFF_FFFF;

/// Largest value of the signed 29-bit integer type.
pub const INT_MAX: i32 = 0x0FFF_FFFF;

/// Smallest value of the signed 29-bit integer type.
pub const INT_MIN: i32 = -0x1000_0000;

/// Largest length, count or table index that fits in a flagged U29.
pub const MAX_INDEX: usize = 0x0FFF_FFFF;

const SIGN_BIT: u32 = 0x1000_0000;

/// Writes `value` as a 1 to 4 byte U29.
pub fn encode_u29(buf: &mut BytesMut, value: u32) -> Result<(), EncodeError> {
    if value > U29_MAX {
        return Err(EncodeError::IntegerOverflow {
            value: u64::from(value),
        });
    }
    if value <= 0x7F {
        buf.put_u8(value as u8);
    } else if value <= 0x3FFF {
        buf.put_u8((value >> 7) as u8 | 0x80);
        buf.put_u8(value as u8 & 0x7F);
    } else if value <= 0x1F_FFFF {
        buf.put_u8((value >> 14) as u8 | 0x80);
        buf.put_u8((value >> 7) as u8 | 0x80);
        buf.put_u8(value as u8 & 0x7F);
    } else {
        buf.put_u8((value >> 22) as u8 | 0x80);
        buf.put_u8((value >> 15) as u8 | 0x80);
        buf.put_u8((value >> 8) as u8 | 0x80);
        buf.put_u8(value as u8);
    }
    Ok(())
}

/// Writes a length, count or index shifted left with its low flag bit.
///
/// Fails with `IntegerOverflow` if `n` exceeds [`MAX_INDEX`].
pub fn encode_flagged(buf: &mut BytesMut, n: usize, flag: bool) -> Result<(), EncodeError> {
    if n > MAX_INDEX {
        return Err(EncodeError::IntegerOverflow { value: n as u64 });
    }
    encode_u29(buf, ((n as u32) << 1) | u32::from(flag))
}

/// Reads a U29 at `offset`, returning the value and the number of bytes consumed.
pub fn decode_u29(bytes: &[u8], offset: usize) -> Result<(u32, usize), DecodeError> {
    let mut value = 0u32;
    let mut len = 0;
    loop {
        let Some(&b) = bytes.get(offset + len) else {
            return Err(DecodeError::MalformedInteger { offset });
        };
        len += 1;
        if len == 4 {
            value = (value << 8) | u32::from(b);
            break;
        }
        value = (value << 7) | u32::from(b & 0x7F);
        if b & 0x80 == 0 {
            break;
        }
    }
    Ok((value, len))
}

/// Number of bytes `value` occupies as a U29.
pub fn u29_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

/// Returns `true` if `value` is representable by the integer type.
pub fn fits_int(value: i64) -> bool {
    (i64::from(INT_MIN)..=i64::from(INT_MAX)).contains(&value)
}

/// Maps a signed 29-bit integer into U29 space (modulo 2^29).
pub fn int_to_u29(value: i32) -> u32 {
    (value as u32) & U29_MAX
}

/// Interprets bit 28 of a U29 as the sign bit.
pub fn u29_to_int(value: u32) -> i32 {
    let value = value & U29_MAX;
    if value & SIGN_BIT != 0 {
        value as i32 - 0x2000_0000
    } else {
        value as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_u29(&mut buf, value).expect("in range");
        buf.to_vec()
    }

    #[test]
    fn encode_one_byte() {
        assert_eq!(encoded(0), [0x00]);
        assert_eq!(encoded(127), [0x7F]);
    }

    #[test]
    fn encode_two_bytes() {
        assert_eq!(encoded(128), [0x81, 0x00]);
        assert_eq!(encoded(16383), [0xFF, 0x7F]);
    }

    #[test]
    fn encode_three_bytes() {
        assert_eq!(encoded(16384), [0x81, 0x80, 0x00]);
        assert_eq!(encoded(2_097_151), [0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn encode_four_bytes() {
        assert_eq!(encoded(2_097_152), [0x80, 0xC0, 0x80, 0x00]);
        assert_eq!(encoded(U29_MAX), [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn encode_rejects_overflow() {
        let mut buf = BytesMut::new();
        assert_eq!(
            encode_u29(&mut buf, U29_MAX + 1),
            Err(EncodeError::IntegerOverflow {
                value: u64::from(U29_MAX) + 1
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn boundaries_round_trip() {
        for value in [
            0,
            127,
            128,
            16383,
            16384,
            2_097_151,
            2_097_152,
            (1 << 28) - 1,
            1 << 28,
            U29_MAX,
        ] {
            let bytes = encoded(value);
            assert_eq!(bytes.len(), u29_len(value), "length for {value}");
            assert_eq!(decode_u29(&bytes, 0), Ok((value, bytes.len())), "value {value}");
        }
    }

    #[test]
    fn decode_at_offset() {
        let bytes = [0xAA, 0x81, 0x00, 0xBB];
        assert_eq!(decode_u29(&bytes, 1), Ok((128, 2)));
    }

    #[test]
    fn decode_fourth_byte_uses_all_bits() {
        // A set high bit in the fourth byte is payload, not a continuation.
        assert_eq!(decode_u29(&[0x80, 0x80, 0x80, 0xFF, 0x01], 0), Ok((0xFF, 4)));
    }

    #[test]
    fn decode_truncated_continuation() {
        assert_eq!(
            decode_u29(&[0x81, 0x80], 0),
            Err(DecodeError::MalformedInteger { offset: 0 })
        );
        assert_eq!(
            decode_u29(&[], 0),
            Err(DecodeError::MalformedInteger { offset: 0 })
        );
    }

    #[test]
    fn flagged_values() {
        let mut buf = BytesMut::new();
        encode_flagged(&mut buf, 3, true).unwrap();
        encode_flagged(&mut buf, 2, false).unwrap();
        assert_eq!(&buf[..], &[0x07, 0x04]);

        assert_eq!(
            encode_flagged(&mut buf, MAX_INDEX + 1, true),
            Err(EncodeError::IntegerOverflow {
                value: (MAX_INDEX + 1) as u64
            })
        );
    }

    #[test]
    fn signed_mapping() {
        assert_eq!(int_to_u29(-1), U29_MAX);
        assert_eq!(int_to_u29(INT_MIN), 1 << 28);
        assert_eq!(u29_to_int(U29_MAX), -1);
        assert_eq!(u29_to_int(1 << 28), INT_MIN);
        assert_eq!(u29_to_int((1 << 28) - 1), INT_MAX);
        assert_eq!(u29_to_int(int_to_u29(-4567)), -4567);
    }

    #[test]
    fn int_range() {
        assert!(fits_int(i64::from(INT_MAX)));
        assert!(fits_int(i64::from(INT_MIN)));
        assert!(!fits_int(i64::from(INT_MAX) + 1));
        assert!(!fits_int(i64::from(INT_MIN) - 1));
    }
}
