//! Row-encoding primitives.
//!
//! Pure functions computing the auxiliary column values (byte counts, powers
//! of 256, bit decompositions, padded limbs) used by the RLP tracing modules
//! to let the constraint system recompute RLP prefixes counter by counter.

use ethereum_types::U256;
use zktracer_common::constants::{
    LLARGE, RLP_PREFIX_INT_LONG, RLP_PREFIX_INT_SHORT, RLP_PREFIX_LIST_LONG,
    RLP_PREFIX_LIST_SHORT,
};

/// Per-counter byte accumulator and power of 256, see [`byte_counting`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteCounting {
    pub acc_byte_size: Vec<usize>,
    pub power: Vec<U256>,
}

/// Per-counter bits of a byte and their running accumulator, see
/// [`bit_decomposition`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitDecomposition {
    pub bits: Vec<bool>,
    pub bit_acc: Vec<u8>,
}

/// Spreads the counting of a `byte_size`-byte integer over `ct_max`
/// counters.
///
/// The integer occupies the last `byte_size` counters. Before those, the
/// byte accumulator stays at 0 and the power is multiplied by 256 at every
/// step; while counting, the accumulator increases by one per counter and
/// the power stays put. On the last counter the accumulator equals
/// `byte_size` and the power is `256^(LLARGE - byte_size)`, the factor
/// moving a `byte_size`-byte value to the front of a limb.
pub fn byte_counting(byte_size: usize, ct_max: usize) -> ByteCounting {
    debug_assert!(byte_size <= ct_max && ct_max <= LLARGE);
    let mut acc_byte_size = Vec::with_capacity(ct_max);
    let mut power = Vec::with_capacity(ct_max);

    let base = U256::from(256);
    let mut exponent = LLARGE - ct_max;
    let mut acc = 0;
    if byte_size == ct_max {
        acc = 1;
    } else {
        exponent += 1;
    }
    let mut current = base.pow(exponent.into());
    acc_byte_size.push(acc);
    power.push(current);

    for ct in 1..ct_max {
        if byte_size + ct < ct_max {
            current *= base;
        } else {
            acc += 1;
        }
        acc_byte_size.push(acc);
        power.push(current);
    }

    ByteCounting {
        acc_byte_size,
        power,
    }
}

/// Decomposes `byte` into bits, most significant first, over the last 8 of
/// `ct_max` counters. Earlier counters hold zero bits.
pub fn bit_decomposition(byte: u8, ct_max: usize) -> BitDecomposition {
    debug_assert!(ct_max >= 8, "a byte needs 8 counters");
    let mut bits = vec![false; ct_max];
    let mut bit_acc = vec![0u8; ct_max];
    let mut acc = 0u8;
    for i in (0..8).rev() {
        let bit = (byte >> i) & 1 == 1;
        acc = (acc << 1) | u8::from(bit);
        bits[ct_max - i - 1] = bit;
        bit_acc[ct_max - i - 1] = acc;
    }
    BitDecomposition { bits, bit_acc }
}

/// Left-pads `bytes` with zeros up to `size`. Longer inputs are returned
/// unchanged.
pub fn pad_left(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut padded = vec![0; size.saturating_sub(bytes.len())];
    padded.extend_from_slice(bytes);
    padded
}

/// Right-pads `bytes` with zeros up to `size`. Longer inputs are returned
/// unchanged.
pub fn pad_right(bytes: &[u8], size: usize) -> Vec<u8> {
    let mut padded = bytes.to_vec();
    if padded.len() < size {
        padded.resize(size, 0);
    }
    padded
}

/// Big-endian bytes of `value` without leading zeros. Zero has no bytes.
pub fn minimal_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Big-endian bytes of `value` without leading zeros. Zero has no bytes.
pub fn minimal_bytes_u256(value: U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Number of bytes of `value` without leading zeros.
pub const fn byte_size(value: u64) -> usize {
    ((u64::BITS - value.leading_zeros()) as usize).div_ceil(8)
}

/// Size of an RLP item whose payload is `length` bytes long, prefix
/// included.
pub const fn outer_rlp_size(length: usize) -> usize {
    let mut size = length + 1;
    if length >= 56 {
        size += byte_size(length as u64);
    }
    size
}

/// RLP prefix of a byte string (or of a list) with a `length`-byte payload.
///
/// Single bytes below 0x80 are their own encoding; callers deal with that
/// case before asking for a prefix.
pub fn rlp_prefix(length: usize, is_list: bool) -> Vec<u8> {
    let (short, long) = if is_list {
        (RLP_PREFIX_LIST_SHORT, RLP_PREFIX_LIST_LONG)
    } else {
        (RLP_PREFIX_INT_SHORT, RLP_PREFIX_INT_LONG)
    };
    if length < 56 {
        vec![short + length as u8]
    } else {
        let length_bytes = minimal_bytes(length as u64);
        let mut prefix = Vec::with_capacity(length_bytes.len() + 1);
        prefix.push(long + length_bytes.len() as u8);
        prefix.extend(length_bytes);
        prefix
    }
}

/// RLP encoding of an unsigned integer.
pub fn rlp_integer(value: u64) -> Vec<u8> {
    match value {
        0 => vec![RLP_PREFIX_INT_SHORT],
        1..=0x7f => vec![value as u8],
        _ => {
            let bytes = minimal_bytes(value);
            let mut encoded = rlp_prefix(bytes.len(), false);
            encoded.extend(bytes);
            encoded
        }
    }
}

/// Splits a 32-byte word into its high and low 16-byte limbs.
pub fn hi_lo(word: &[u8; 32]) -> (U256, U256) {
    (
        U256::from_big_endian(&word[..LLARGE]),
        U256::from_big_endian(&word[LLARGE..]),
    )
}

/// Splits a `U256` into its high and low 128-bit halves.
pub fn u256_hi_lo(value: U256) -> (U256, U256) {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    hi_lo(&word)
}
