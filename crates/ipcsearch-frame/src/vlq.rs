//! Tiered variable-length encoding for lengths and counts.
//!
//! ```text
//! value < 0xFF                      -> u8 value
//! value - 0xFF < 0xFFFF             -> 0xFF, u16 (value - 0xFF)
//! value - 0x100FE < 0xFFFFFFFF      -> 0xFF, 0xFFFF, u32 (value - 0x100FE)
//! otherwise (64-bit peers only)     -> 0xFF, 0xFFFF, 0xFFFFFFFF, u64 (value - 0x1000100FD)
//! ```
//!
//! Encoded sizes are therefore 1, 3, 7 or 15 bytes. All integers are little-endian.

use bytes::{Buf, BufMut, BytesMut};

const TIER1_BASE: u64 = 0xFF;
const TIER2_BASE: u64 = TIER1_BASE + 0xFFFF;
const TIER3_BASE: u64 = TIER2_BASE + 0xFFFF_FFFF;

/// Encode `value`, appending to `dst` when given.
///
/// Returns the number of bytes the encoding occupies. With `dst == None`
/// nothing is written, so packet sizes can be computed before allocating.
pub fn encode_len_vlq(value: u64, dst: Option<&mut BytesMut>) -> usize {
    if value < TIER1_BASE {
        if let Some(dst) = dst {
            dst.put_u8(value as u8);
        }
        return 1;
    }

    let rest = value - TIER1_BASE;
    if rest < 0xFFFF {
        if let Some(dst) = dst {
            dst.put_u8(0xFF);
            dst.put_u16_le(rest as u16);
        }
        return 3;
    }

    let rest = value - TIER2_BASE;
    if rest < 0xFFFF_FFFF {
        if let Some(dst) = dst {
            dst.put_u8(0xFF);
            dst.put_u16_le(0xFFFF);
            dst.put_u32_le(rest as u32);
        }
        return 7;
    }

    if let Some(dst) = dst {
        dst.put_u8(0xFF);
        dst.put_u16_le(0xFFFF);
        dst.put_u32_le(0xFFFF_FFFF);
        dst.put_u64_le(value - TIER3_BASE);
    }
    15
}

/// Size in bytes of the encoding of `value`.
pub fn encoded_len_vlq(value: u64) -> usize {
    encode_len_vlq(value, None)
}

/// Decode a length, pulling little-endian integers of the requested width
/// (1, 2, 4 or 8 bytes) from `next`.
///
/// `max` is the largest size the decoding side can represent (`u32::MAX` for
/// a 32-bit peer). Returns `None` when the decoded length does not fit; a
/// 32-bit decoder never reads the 8-byte tier.
pub fn decode_len_vlq(mut next: impl FnMut(usize) -> u64, max: u64) -> Option<u64> {
    let value = next(1);
    if value < 0xFF {
        return fit(value, max);
    }

    let value = next(2);
    if value < 0xFFFF {
        return fit(TIER1_BASE + value, max);
    }

    let value = next(4);
    if value < 0xFFFF_FFFF {
        return fit(TIER2_BASE + value, max);
    }

    if max <= u64::from(u32::MAX) {
        return None;
    }

    TIER3_BASE.checked_add(next(8)).and_then(|v| fit(v, max))
}

fn fit(value: u64, max: u64) -> Option<u64> {
    (value <= max).then_some(value)
}

/// Decode a length from an in-memory buffer.
///
/// Returns `None` on overflow or when `src` runs out of bytes.
pub fn get_len_vlq(src: &mut impl Buf, max: u64) -> Option<u64> {
    let mut short = false;
    let value = decode_len_vlq(
        |width| {
            if src.remaining() < width {
                short = true;
                return 0;
            }
            src.get_uint_le(width)
        },
        max,
    );
    if short {
        None
    } else {
        value
    }
}
