//! Shared RLP framing requests.
//!
//! Modules needing the RLP encoding of an integer, or the prefix of a byte
//! string, delegate it here instead of tracing it themselves. Identical
//! requests within a conflation are traced once.

use ethereum_types::U256;
use static_assertions::const_assert_eq;
use zktracer_common::constants::{
    RLP_PREFIX_INT_LONG, RLP_PREFIX_INT_SHORT, RLP_PREFIX_LIST_LONG, RLP_PREFIX_LIST_SHORT,
};
use zktracer_proc_macro::TraceRow;

use crate::column::ColumnHeader;
use crate::container::StackedSet;
use crate::encoding::{bit_decomposition, byte_counting, byte_size, minimal_bytes, pad_left};
use crate::error::TraceError;
use crate::module::Module;
use crate::table::{TraceRow, TraceTable};

pub const MODULE_KEY: &str = "rlpUtils";
/// Number of columns of the `rlpUtils` table.
pub const NUM_COLUMNS: usize = 16;

const CT_MAX: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RlpUtilsCall {
    /// The RLP encoding of an integer.
    Integer(u64),
    /// The RLP prefix of a byte string, or of a list, with a `length`-byte
    /// payload.
    ByteStringPrefix { length: u64, is_list: bool },
}

impl RlpUtilsCall {
    pub const fn row_count(&self) -> usize {
        match self {
            Self::Integer(value) if *value < RLP_PREFIX_INT_SHORT as u64 => 1,
            _ => CT_MAX,
        }
    }

    /// The bytes the call frames: the whole encoding of an integer, or the
    /// prefix alone.
    pub fn encoding(&self) -> Vec<u8> {
        match *self {
            Self::Integer(0) => vec![RLP_PREFIX_INT_SHORT],
            Self::Integer(value) if value < RLP_PREFIX_INT_SHORT as u64 => vec![value as u8],
            Self::Integer(value) => {
                let bytes = minimal_bytes(value);
                let mut encoded = vec![RLP_PREFIX_INT_SHORT + bytes.len() as u8];
                encoded.extend(bytes);
                encoded
            }
            Self::ByteStringPrefix { length, is_list } => {
                crate::encoding::rlp_prefix(length as usize, is_list)
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, TraceRow)]
pub struct RlpUtilsRow {
    pub acc: U256,
    pub acc_size: u64,
    pub bit: bool,
    pub bit_acc: u8,
    pub byte: u8,
    pub ct: u64,
    pub ct_max: u64,
    pub input: u64,
    pub is_byte_string_prefix: bool,
    pub is_integer: bool,
    pub is_list: bool,
    pub limb: Vec<u8>,
    pub limb_constructed: bool,
    #[column(name = "nBYTES")]
    pub n_bytes: u8,
    pub power: U256,
    pub stamp: u64,
}

const_assert_eq!(<RlpUtilsRow as TraceRow>::COLUMN_COUNT, NUM_COLUMNS);

/// A limb placed at the front of a 16-byte cell.
fn limb(bytes: &[u8]) -> Vec<u8> {
    crate::encoding::pad_right(bytes, 16)
}

/// Expands one call into its rows. `stamp` numbers calls from 1.
pub fn call_rows(call: &RlpUtilsCall, stamp: u64) -> Vec<RlpUtilsRow> {
    match *call {
        RlpUtilsCall::Integer(value) if value < RLP_PREFIX_INT_SHORT as u64 => {
            vec![RlpUtilsRow {
                acc: value.into(),
                byte: value as u8,
                input: value,
                is_integer: true,
                limb: limb(&call.encoding()),
                limb_constructed: true,
                n_bytes: 1,
                stamp,
                ..Default::default()
            }]
        }
        RlpUtilsCall::Integer(value) => counted_rows(value, stamp, |ct, size| match ct {
            6 => Some((vec![RLP_PREFIX_INT_SHORT + size as u8], 1)),
            7 => Some((minimal_bytes(value), size)),
            _ => None,
        })
        .into_iter()
        .map(|row| RlpUtilsRow {
            is_integer: true,
            ..row
        })
        .collect(),
        RlpUtilsCall::ByteStringPrefix { length, is_list } => {
            let (short, long) = if is_list {
                (RLP_PREFIX_LIST_SHORT, RLP_PREFIX_LIST_LONG)
            } else {
                (RLP_PREFIX_INT_SHORT, RLP_PREFIX_INT_LONG)
            };
            counted_rows(length, stamp, |ct, size| match ct {
                6 if length >= 56 => Some((vec![long + size as u8], 1)),
                7 if length >= 56 => Some((minimal_bytes(length), size)),
                7 => Some((vec![short + length as u8], 1)),
                _ => None,
            })
            .into_iter()
            .map(|row| RlpUtilsRow {
                is_byte_string_prefix: true,
                is_list,
                ..row
            })
            .collect()
        }
    }
}

/// Eight rows counting the bytes of `input`, left-padded to 8 bytes. `limb_at`
/// gives the limb constructed at a counter, if any, and its byte count.
fn counted_rows(
    input: u64,
    stamp: u64,
    limb_at: impl Fn(usize, usize) -> Option<(Vec<u8>, usize)>,
) -> Vec<RlpUtilsRow> {
    let size = byte_size(input);
    let padded = pad_left(&minimal_bytes(input), CT_MAX);
    let counting = byte_counting(size, CT_MAX);
    let bits = bit_decomposition(padded[CT_MAX - 1], CT_MAX);

    (0..CT_MAX)
        .map(|ct| {
            let (limb, n_bytes, limb_constructed) = match limb_at(ct, size) {
                Some((bytes, n_bytes)) => (self::limb(&bytes), n_bytes as u8, true),
                None => (vec![], 0, false),
            };
            RlpUtilsRow {
                acc: U256::from_big_endian(&padded[..=ct]),
                acc_size: counting.acc_byte_size[ct] as u64,
                bit: bits.bits[ct],
                bit_acc: bits.bit_acc[ct],
                byte: padded[ct],
                ct: ct as u64,
                ct_max: (CT_MAX - 1) as u64,
                input,
                limb,
                limb_constructed,
                n_bytes,
                power: counting.power[ct],
                stamp,
                ..Default::default()
            }
        })
        .collect()
}

/// The `rlpUtils` module.
#[derive(Debug, Default)]
pub struct RlpUtils {
    calls: StackedSet<RlpUtilsCall>,
}

impl RlpUtils {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request. Returns whether it was new.
    pub fn call(&mut self, call: RlpUtilsCall) -> bool {
        self.calls.insert(call)
    }

    pub fn calls(&self) -> impl Iterator<Item = &RlpUtilsCall> {
        self.calls.iter()
    }
}

impl Module for RlpUtils {
    fn module_key(&self) -> &'static str {
        MODULE_KEY
    }

    fn enter_transaction(&mut self) {
        self.calls.enter();
    }

    fn pop_transaction(&mut self) {
        self.calls.pop();
    }

    fn line_count(&self) -> usize {
        self.calls.iter().map(RlpUtilsCall::row_count).sum()
    }

    fn columns_headers(&self) -> Vec<ColumnHeader> {
        RlpUtilsRow::headers(MODULE_KEY, self.line_count())
    }

    fn commit(&self, table: &mut TraceTable) -> Result<(), TraceError> {
        for (i, call) in self.calls.iter().enumerate() {
            for row in call_rows(call, i as u64 + 1) {
                row.write_row(table)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constructed(rows: &[RlpUtilsRow]) -> Vec<u8> {
        rows.iter()
            .filter(|row| row.limb_constructed)
            .flat_map(|row| row.limb[..row.n_bytes as usize].to_vec())
            .collect()
    }

    #[test]
    fn small_integers_take_one_row() {
        for value in [0u64, 1, 0x7f] {
            let call = RlpUtilsCall::Integer(value);
            let rows = call_rows(&call, 1);
            assert_eq!(rows.len(), 1);
            assert_eq!(call.row_count(), 1);
            assert_eq!(constructed(&rows), rlp::encode(&value).to_vec());
        }
    }

    #[test]
    fn integers_match_the_reference_encoder() {
        for value in [0x80u64, 0xff, 0x0100, 0xdead_beef, u64::MAX] {
            let call = RlpUtilsCall::Integer(value);
            let rows = call_rows(&call, 1);
            assert_eq!(rows.len(), call.row_count());
            assert_eq!(constructed(&rows), rlp::encode(&value).to_vec());
            assert_eq!(call.encoding(), rlp::encode(&value).to_vec());
            assert_eq!(rows[7].acc, U256::from(value));
            assert_eq!(rows[7].acc_size, byte_size(value) as u64);
        }
    }

    #[test]
    fn prefixes_match_the_reference_encoder() {
        for length in [0u64, 1, 55, 56, 1000] {
            let payload = vec![0xaa; length as usize];
            let encoded = rlp::encode(&payload);
            let call = RlpUtilsCall::ByteStringPrefix {
                length,
                is_list: false,
            };
            let rows = call_rows(&call, 1);
            assert_eq!(rows.len(), 8);
            assert_eq!(constructed(&rows), &encoded[..encoded.len() - length as usize]);
            assert_eq!(constructed(&rows), call.encoding());
        }

        let rows = call_rows(
            &RlpUtilsCall::ByteStringPrefix {
                length: 60,
                is_list: true,
            },
            1,
        );
        assert_eq!(constructed(&rows), [0xf8, 60]);
        assert!(rows.iter().all(|row| row.is_list && row.is_byte_string_prefix));
    }

    #[test]
    fn identical_calls_are_traced_once() {
        let mut module = RlpUtils::new();
        module.enter_transaction();
        assert!(module.call(RlpUtilsCall::Integer(1000)));
        assert!(!module.call(RlpUtilsCall::Integer(1000)));
        module.enter_transaction();
        assert!(module.call(RlpUtilsCall::Integer(5)));
        module.pop_transaction();
        assert_eq!(module.line_count(), 8);

        let mut table = TraceTable::new(MODULE_KEY, module.columns_headers());
        module.commit(&mut table).unwrap();
        assert_eq!(table.build().unwrap().rows(), 8);
    }
}
