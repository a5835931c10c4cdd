//! RLP tracing of transaction receipts.
//!
//! Each receipt `[status, cumulative_gas_used, logs_bloom, logs]`, preceded by
//! the EIP-2718 type byte, is traced in five phases:
//!
//! 1. the type byte and the RLP prefix of the receipt list;
//! 2. the status code;
//! 3. the cumulative gas used;
//! 4. the 256-byte logs bloom;
//! 5. the list of log entries.
//!
//! Running counters (`TXRCPT_SIZE`, `PHASE_SIZE`, `LOG_ENTRY_SIZE`,
//! `LOCAL_SIZE`) count down the bytes still to be constructed and must reach
//! zero exactly when their phase ends.

use ethereum_types::{Bloom, BloomInput, U256};
use static_assertions::const_assert_eq;
use zktracer_common::constants::{
    LLARGE, RLP_PREFIX_INT_LONG, RLP_PREFIX_INT_SHORT, RLP_PREFIX_LIST_LONG,
    RLP_PREFIX_LIST_SHORT,
};
use zktracer_proc_macro::TraceRow;

use crate::column::ColumnHeader;
use crate::container::StackedList;
use crate::encoding::{
    bit_decomposition, byte_counting, byte_size, minimal_bytes, outer_rlp_size, pad_left,
    pad_right, rlp_integer,
};
use crate::error::TraceError;
use crate::host::{Log, TransactionResult, TransactionType};
use crate::module::Module;
use crate::rlp_utils::RlpUtilsCall;
use crate::table::{TraceRow, TraceTable};

pub const MODULE_KEY: &str = "rlpTxRcpt";
/// Number of columns of the `rlpTxRcpt` table.
pub const NUM_COLUMNS: usize = 43;

/// Rows of phases 1 to 4, which do not depend on the logs: 1 + 8 for the
/// type byte and list prefix, 1 for the status, 8 for the gas, 1 + 64 for
/// the bloom.
const FIXED_PHASES_ROWS: usize = 83;
/// Size of the RLP encoding of a topic.
const TOPIC_RLP_SIZE: usize = 33;
/// Size of the RLP encoding of a log's address.
const ADDRESS_RLP_SIZE: usize = 21;
/// Size of the RLP encoding of the bloom, prefix included.
const BLOOM_RLP_SIZE: usize = 259;
const BLOOM_SIZE: usize = 256;

/// The receipt of one executed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RlpTxRcptChunk {
    pub tx_type: TransactionType,
    pub status: bool,
    pub cumulative_gas_used: u64,
    pub logs: Vec<Log>,
}

impl RlpTxRcptChunk {
    pub fn new(tx_type: TransactionType, result: &TransactionResult) -> Self {
        Self {
            tx_type,
            status: result.status,
            cumulative_gas_used: result.cumulative_gas_used,
            logs: result.logs.clone(),
        }
    }

    /// Number of rows the chunk expands to.
    pub fn row_count(&self) -> usize {
        if self.logs.is_empty() {
            return FIXED_PHASES_ROWS + 1;
        }
        // Prefix of the list of log entries.
        let mut rows = FIXED_PHASES_ROWS + 8;
        for log in &self.logs {
            // Entry prefix (8), address (3), topics prefix (1), 3 per topic.
            rows += 12 + 3 * log.topics.len();
            rows += match log.data.len() {
                0 => 1,
                len => 8 + (len - 1) / LLARGE + 1,
            };
        }
        rows
    }

    /// Size of the RLP encoding of the receipt, without its list prefix.
    pub fn payload_size(&self) -> usize {
        let mut size = 1 + rlp_integer(self.cumulative_gas_used).len() + BLOOM_RLP_SIZE;
        size += if self.logs.is_empty() {
            1
        } else {
            outer_rlp_size(self.logs.iter().map(|log| outer_rlp_size(log_size(log))).sum())
        };
        size
    }

    pub fn bloom(&self) -> Bloom {
        logs_bloom(&self.logs)
    }

    /// The list and byte string prefixes framing the receipt, whose
    /// construction is delegated to RlpUtils.
    pub fn prefix_calls(&self) -> Vec<RlpUtilsCall> {
        let list = |length: usize| RlpUtilsCall::ByteStringPrefix {
            length: length as u64,
            is_list: true,
        };
        let mut calls = vec![list(self.payload_size())];
        if self.logs.is_empty() {
            return calls;
        }
        calls.push(list(
            self.logs.iter().map(|log| outer_rlp_size(log_size(log))).sum(),
        ));
        for log in &self.logs {
            calls.push(list(log_size(log)));
            calls.push(list(TOPIC_RLP_SIZE * log.topics.len()));
            if !matches!(log.data.as_ref(), [byte] if *byte < RLP_PREFIX_INT_SHORT) {
                calls.push(RlpUtilsCall::ByteStringPrefix {
                    length: log.data.len() as u64,
                    is_list: false,
                });
            }
        }
        calls
    }
}

/// Size of the RLP encoding of a log entry, without its list prefix.
pub fn log_size(log: &Log) -> usize {
    let data_size = match log.data.as_ref() {
        [byte] if *byte < RLP_PREFIX_INT_SHORT => 1,
        [_] => 2,
        data => outer_rlp_size(data.len()),
    };
    ADDRESS_RLP_SIZE + outer_rlp_size(TOPIC_RLP_SIZE * log.topics.len()) + data_size
}

/// The 2048-bit bloom of a list of logs, accruing each log's address and
/// topics.
pub fn logs_bloom(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::zero();
    for log in logs {
        bloom.accrue(BloomInput::Raw(log.address.as_bytes()));
        for topic in &log.topics {
            bloom.accrue(BloomInput::Raw(topic.as_bytes()));
        }
    }
    bloom
}

#[derive(Clone, Debug, Default, PartialEq, Eq, TraceRow)]
pub struct RlpTxRcptRow {
    pub abs_log_num: u64,
    pub abs_log_num_max: u64,
    pub abs_tx_num: u64,
    pub abs_tx_num_max: u64,
    pub acc_1: Vec<u8>,
    pub acc_2: Vec<u8>,
    pub acc_3: Vec<u8>,
    pub acc_4: Vec<u8>,
    pub acc_size: u64,
    pub bit: bool,
    pub bit_acc: u8,
    pub byte_1: u8,
    pub byte_2: u8,
    pub byte_3: u8,
    pub byte_4: u8,
    pub counter: u64,
    pub depth_1: bool,
    pub done: bool,
    pub index: u64,
    pub index_local: u64,
    pub input_1: Vec<u8>,
    pub input_2: Vec<u8>,
    pub input_3: Vec<u8>,
    pub input_4: Vec<u8>,
    pub is_data: bool,
    pub is_prefix: bool,
    pub is_topic: bool,
    pub lc_correction: bool,
    pub limb: Vec<u8>,
    pub limb_constructed: bool,
    pub local_size: u64,
    pub log_entry_size: u64,
    #[column(name = "nBYTES")]
    pub n_bytes: u8,
    #[column(name = "nSTEP")]
    pub n_step: u64,
    pub phase_1: bool,
    pub phase_2: bool,
    pub phase_3: bool,
    pub phase_4: bool,
    pub phase_5: bool,
    pub phase_end: bool,
    pub phase_size: u64,
    pub power: U256,
    pub txrcpt_size: u64,
}

const_assert_eq!(<RlpTxRcptRow as TraceRow>::COLUMN_COUNT, NUM_COLUMNS);

/// Which input column holds the integer traced by [`ReceiptCursor::rlp_int`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IntInput {
    First,
    /// `INPUT_3`, with `INPUT_1` holding the size of the data.
    Third,
}

/// Flags shared by the rows of one framing step.
#[derive(Clone, Copy, Debug, Default)]
struct Framing {
    is_prefix: bool,
    depth_1: bool,
    is_data: bool,
    end_phase: bool,
}

/// Column values carried from row to row while expanding one receipt.
#[derive(Debug, Default)]
struct ReceiptCursor {
    phase: u8,
    n_step: u64,
    counter: u64,
    input_1: Vec<u8>,
    input_2: Vec<u8>,
    input_3: Vec<u8>,
    input_4: Vec<u8>,
    acc_1: Vec<u8>,
    acc_2: Vec<u8>,
    acc_3: Vec<u8>,
    acc_4: Vec<u8>,
    byte_1: u8,
    byte_2: u8,
    byte_3: u8,
    byte_4: u8,
    acc_size: u64,
    power: U256,
    bit: bool,
    bit_acc: u8,
    limb: Vec<u8>,
    limb_constructed: bool,
    lc_correction: bool,
    n_bytes: u8,
    is_prefix: bool,
    is_topic: bool,
    is_data: bool,
    depth_1: bool,
    phase_end: bool,

    // Kept across framing steps.
    txrcpt_size: i64,
    phase_size: i64,
    log_entry_size: i64,
    local_size: i64,
    index: u64,
    index_local: u64,
    abs_tx_num: u64,
    abs_tx_num_max: u64,
    abs_log_num: u64,
    abs_log_num_max: u64,

    rows: Vec<RlpTxRcptRow>,
}

impl ReceiptCursor {
    /// Starts a framing step of `n_step` rows, clearing every per-row value.
    fn partial_reset(&mut self, phase: u8, n_step: usize) {
        self.phase = phase;
        self.n_step = n_step as u64;
        self.counter = 0;
        self.input_1.clear();
        self.input_2.clear();
        self.input_3.clear();
        self.input_4.clear();
        self.acc_1.clear();
        self.acc_2.clear();
        self.acc_3.clear();
        self.acc_4.clear();
        self.byte_1 = 0;
        self.byte_2 = 0;
        self.byte_3 = 0;
        self.byte_4 = 0;
        self.acc_size = 0;
        self.power = U256::zero();
        self.bit = false;
        self.bit_acc = 0;
        self.limb.clear();
        self.limb_constructed = false;
        self.lc_correction = false;
        self.n_bytes = 0;
        self.is_prefix = false;
        self.is_topic = false;
        self.is_data = false;
        self.depth_1 = false;
        self.phase_end = false;
    }

    fn set_framing(&mut self, framing: Framing) {
        self.is_prefix = framing.is_prefix;
        self.depth_1 = framing.depth_1;
        self.is_data = framing.is_data;
    }

    fn construct(&mut self, limb: &[u8], n_bytes: usize) {
        self.limb_constructed = true;
        self.limb = limb.to_vec();
        self.n_bytes = n_bytes as u8;
    }

    fn trace_row(&mut self) -> Result<(), TraceError> {
        if self.limb_constructed {
            let n_bytes = i64::from(self.n_bytes);
            if self.phase != 1 {
                self.txrcpt_size -= n_bytes;
            }
            if (self.phase == 4 && !self.is_prefix) || (self.phase == 5 && self.depth_1) {
                self.phase_size -= n_bytes;
            }
            if (self.phase == 5 && self.depth_1 && !self.is_prefix) || self.is_topic || self.is_data
            {
                self.log_entry_size -= n_bytes;
            }
        }

        let phase = self.phase;
        let row = RlpTxRcptRow {
            abs_log_num: self.abs_log_num,
            abs_log_num_max: self.abs_log_num_max,
            abs_tx_num: self.abs_tx_num,
            abs_tx_num_max: self.abs_tx_num_max,
            acc_1: self.acc_1.clone(),
            acc_2: self.acc_2.clone(),
            acc_3: self.acc_3.clone(),
            acc_4: self.acc_4.clone(),
            acc_size: self.acc_size,
            bit: self.bit,
            bit_acc: self.bit_acc,
            byte_1: self.byte_1,
            byte_2: self.byte_2,
            byte_3: self.byte_3,
            byte_4: self.byte_4,
            counter: self.counter,
            depth_1: self.depth_1,
            done: self.counter + 1 == self.n_step,
            index: self.index,
            index_local: self.index_local,
            input_1: self.input_1.clone(),
            input_2: self.input_2.clone(),
            input_3: self.input_3.clone(),
            input_4: self.input_4.clone(),
            is_data: self.is_data,
            is_prefix: self.is_prefix,
            is_topic: self.is_topic,
            lc_correction: self.lc_correction,
            limb: pad_right(&self.limb, LLARGE),
            limb_constructed: self.limb_constructed,
            local_size: counter_value("LOCAL_SIZE", self.local_size, phase)?,
            log_entry_size: counter_value("LOG_ENTRY_SIZE", self.log_entry_size, phase)?,
            n_bytes: self.n_bytes,
            n_step: self.n_step,
            phase_1: phase == 1,
            phase_2: phase == 2,
            phase_3: phase == 3,
            phase_4: phase == 4,
            phase_5: phase == 5,
            phase_end: self.phase_end,
            phase_size: counter_value("PHASE_SIZE", self.phase_size, phase)?,
            power: self.power,
            txrcpt_size: counter_value("TXRCPT_SIZE", self.txrcpt_size, phase)?,
        };
        self.rows.push(row);

        if self.limb_constructed {
            self.index += 1;
        }
        Ok(())
    }

    /// Eight rows framing a byte string (or list) of `length` bytes.
    fn rlp_byte_string(
        &mut self,
        phase: u8,
        length: u64,
        is_list: bool,
        framing: Framing,
        input_2: Option<u64>,
    ) -> Result<(), TraceError> {
        let length_size = byte_size(length);
        let counting = byte_counting(length_size, 8);

        self.partial_reset(phase, 8);
        self.input_1 = minimal_bytes(length);
        self.set_framing(framing);
        if let Some(value) = input_2 {
            self.input_2 = minimal_bytes(value);
        }

        let length_shifted = pad_left(&self.input_1, 8);
        let acc_2_last = if length >= 56 { length - 56 } else { 55 - length };
        let acc_2_shifted = pad_left(&minimal_bytes(acc_2_last), 8);

        for ct in 0..8 {
            self.counter = ct as u64;
            self.acc_size = counting.acc_byte_size[ct] as u64;
            self.power = counting.power[ct];
            self.byte_1 = length_shifted[ct];
            self.acc_1 = length_shifted[..=ct].to_vec();
            self.byte_2 = acc_2_shifted[ct];
            self.acc_2 = acc_2_shifted[..=ct].to_vec();

            if length >= 56 {
                if ct == 6 {
                    let long = if is_list {
                        RLP_PREFIX_LIST_LONG
                    } else {
                        RLP_PREFIX_INT_LONG
                    };
                    self.construct(&[long + length_size as u8], 1);
                }
                if ct == 7 {
                    self.construct(&minimal_bytes(length), length_size);
                    self.bit = true;
                    self.bit_acc = 1;
                    self.phase_end = framing.end_phase;
                }
            } else if ct == 7 {
                let short = if is_list {
                    RLP_PREFIX_LIST_SHORT
                } else {
                    RLP_PREFIX_INT_SHORT
                };
                self.construct(&[short + length as u8], 1);
                self.phase_end = framing.end_phase;
            }

            self.trace_row()?;
        }
        Ok(())
    }

    /// Eight rows encoding an integer. With `only_prefix`, only the RLP
    /// prefix is constructed and the integer itself is left to later rows.
    fn rlp_int(
        &mut self,
        phase: u8,
        slot: IntInput,
        input: u64,
        framing: Framing,
        only_prefix: bool,
        input_2: Option<u64>,
    ) -> Result<(), TraceError> {
        let input_bytes = match minimal_bytes(input) {
            bytes if bytes.is_empty() => vec![0],
            bytes => bytes,
        };
        let input_size = input_bytes.len();

        self.partial_reset(phase, 8);
        self.set_framing(framing);
        match slot {
            IntInput::First => self.input_1 = input_bytes.clone(),
            IntInput::Third => {
                self.input_1 = vec![1];
                self.input_3 = input_bytes.clone();
            }
        }
        if let Some(value) = input_2 {
            self.input_2 = minimal_bytes(value);
        }

        let counting = byte_counting(input_size, 8);
        let padded = pad_left(&input_bytes, 8);
        let bits = bit_decomposition(padded[7], 8);

        for ct in 0..8 {
            self.counter = ct as u64;
            self.byte_1 = padded[ct];
            self.acc_1 = padded[..=ct].to_vec();
            self.power = counting.power[ct];
            self.acc_size = counting.acc_byte_size[ct] as u64;
            self.bit = bits.bits[ct];
            self.bit_acc = bits.bit_acc[ct];

            if input >= 128 && ct == 6 {
                self.construct(&[RLP_PREFIX_INT_SHORT + input_size as u8], 1);
            }
            if ct == 7 {
                if only_prefix {
                    self.lc_correction = true;
                    self.limb_constructed = false;
                    self.limb.clear();
                    self.n_bytes = 0;
                } else {
                    self.construct(&input_bytes, input_size);
                    self.phase_end = framing.end_phase;
                }
            }

            self.trace_row()?;
        }
        Ok(())
    }

    fn phase_1(&mut self, tx_type: TransactionType) -> Result<(), TraceError> {
        self.partial_reset(1, 1);
        self.is_prefix = true;
        match tx_type.type_byte() {
            None => self.lc_correction = true,
            Some(type_byte) => {
                self.input_1 = vec![type_byte];
                self.construct(&[type_byte], 1);
            }
        }
        self.trace_row()?;

        let framing = Framing {
            end_phase: true,
            ..Default::default()
        };
        self.rlp_byte_string(1, self.txrcpt_size as u64, true, framing, None)
    }

    fn phase_2(&mut self, status: bool) -> Result<(), TraceError> {
        self.partial_reset(2, 1);
        if status {
            self.input_1 = vec![1];
            self.construct(&[1], 1);
        } else {
            self.construct(&[RLP_PREFIX_INT_SHORT], 1);
        }
        self.phase_end = true;
        self.trace_row()
    }

    fn phase_3(&mut self, cumulative_gas_used: u64) -> Result<(), TraceError> {
        if cumulative_gas_used == 0 {
            return Err(TraceError::ZeroCumulativeGas);
        }
        let framing = Framing {
            end_phase: true,
            ..Default::default()
        };
        self.rlp_int(3, IntInput::First, cumulative_gas_used, framing, false, None)
    }

    fn phase_4(&mut self, bloom: &Bloom) -> Result<(), TraceError> {
        self.partial_reset(4, 1);
        self.is_prefix = true;
        self.phase_size = BLOOM_SIZE as i64;
        let mut prefix = vec![RLP_PREFIX_INT_LONG + 2];
        prefix.extend(minimal_bytes(BLOOM_SIZE as u64));
        self.construct(&prefix, 3);
        self.trace_row()?;

        let bloom = bloom.as_bytes();
        for i in 0..4 {
            self.partial_reset(4, LLARGE);
            let slice = |k: usize| bloom[64 * i + k * LLARGE..64 * i + (k + 1) * LLARGE].to_vec();
            self.input_1 = slice(0);
            self.input_2 = slice(1);
            self.input_3 = slice(2);
            self.input_4 = slice(3);

            for ct in 0..LLARGE {
                self.counter = ct as u64;
                self.byte_1 = self.input_1[ct];
                self.acc_1 = self.input_1[..=ct].to_vec();
                self.byte_2 = self.input_2[ct];
                self.acc_2 = self.input_2[..=ct].to_vec();
                self.byte_3 = self.input_3[ct];
                self.acc_3 = self.input_3[..=ct].to_vec();
                self.byte_4 = self.input_4[ct];
                self.acc_4 = self.input_4[..=ct].to_vec();

                match ct {
                    12 => self.construct(&self.input_1.clone(), LLARGE),
                    13 => self.construct(&self.input_2.clone(), LLARGE),
                    14 => self.construct(&self.input_3.clone(), LLARGE),
                    15 => {
                        self.construct(&self.input_4.clone(), LLARGE);
                        self.phase_end = i == 3;
                    }
                    _ => {
                        self.limb_constructed = false;
                        self.limb.clear();
                        self.n_bytes = 0;
                    }
                }
                self.trace_row()?;
                if self.limb_constructed {
                    self.index_local += 1;
                }
            }
        }
        self.index_local = 0;
        self.expect_zero("PHASE_SIZE", self.phase_size, 4)
    }

    fn phase_5(&mut self, logs: &[Log]) -> Result<(), TraceError> {
        if logs.is_empty() {
            self.log_entry_size = 1;
            self.partial_reset(5, 1);
            self.construct(&[RLP_PREFIX_LIST_SHORT], 1);
            self.is_prefix = true;
            self.phase_end = true;
            return self.trace_row();
        }

        self.phase_size += logs
            .iter()
            .map(|log| outer_rlp_size(log_size(log)) as i64)
            .sum::<i64>();
        let list_prefix = Framing {
            is_prefix: true,
            ..Default::default()
        };
        self.rlp_byte_string(5, self.phase_size as u64, true, list_prefix, None)?;

        for (i, log) in logs.iter().enumerate() {
            let last = i + 1 == logs.len();
            self.abs_log_num += 1;
            self.log_entry(log, last)?;
            self.expect_zero("LOG_ENTRY_SIZE", self.log_entry_size, 5)?;
        }
        self.expect_zero("PHASE_SIZE", self.phase_size, 5)
    }

    fn log_entry(&mut self, log: &Log, last: bool) -> Result<(), TraceError> {
        self.log_entry_size = log_size(log) as i64;
        let entry_prefix = Framing {
            is_prefix: true,
            depth_1: true,
            ..Default::default()
        };
        self.rlp_byte_string(5, self.log_entry_size as u64, true, entry_prefix, None)?;

        // Address.
        let address = log.address.as_bytes();
        self.partial_reset(5, 3);
        self.depth_1 = true;
        self.input_1 = address[..4].to_vec();
        self.input_2 = address[4..].to_vec();
        let limbs = [
            (vec![RLP_PREFIX_INT_SHORT + 20], 1),
            (self.input_1.clone(), 4),
            (self.input_2.clone(), LLARGE),
        ];
        for (ct, (limb, n_bytes)) in limbs.into_iter().enumerate() {
            self.counter = ct as u64;
            self.construct(&limb, n_bytes);
            self.trace_row()?;
        }

        // Topics.
        self.partial_reset(5, 1);
        self.depth_1 = true;
        self.is_prefix = true;
        self.is_topic = true;
        self.local_size = (TOPIC_RLP_SIZE * log.topics.len()) as i64;
        if log.topics.len() < 2 {
            self.construct(&[RLP_PREFIX_LIST_SHORT + self.local_size as u8], 1);
        } else {
            self.construct(&[RLP_PREFIX_LIST_LONG + 1, self.local_size as u8], 2);
        }
        self.trace_row()?;

        for topic in &log.topics {
            self.partial_reset(5, 3);
            self.depth_1 = true;
            self.is_topic = true;
            self.index_local += 1;
            self.input_1 = topic[..LLARGE].to_vec();
            self.input_2 = topic[LLARGE..].to_vec();
            let limbs = [
                (vec![RLP_PREFIX_INT_SHORT + 32], 1),
                (self.input_1.clone(), LLARGE),
                (self.input_2.clone(), LLARGE),
            ];
            for (ct, (limb, n_bytes)) in limbs.into_iter().enumerate() {
                self.counter = ct as u64;
                self.construct(&limb, n_bytes);
                self.local_size -= n_bytes as i64;
                self.trace_row()?;
            }
        }
        self.expect_zero("LOCAL_SIZE", self.local_size, 5)?;
        let topic_count = self.index_local;
        self.index_local = 0;

        // Data prefix.
        let data = log.data.as_ref();
        self.local_size = data.len() as i64;
        let data_prefix = Framing {
            is_prefix: true,
            depth_1: true,
            is_data: true,
            end_phase: false,
        };
        match data {
            [] => {
                self.partial_reset(5, 1);
                self.input_2 = minimal_bytes(topic_count);
                self.set_framing(data_prefix);
                self.construct(&[RLP_PREFIX_INT_SHORT], 1);
                self.phase_end = last;
                self.trace_row()?;
            }
            [byte] => self.rlp_int(
                5,
                IntInput::Third,
                u64::from(*byte),
                data_prefix,
                true,
                Some(topic_count),
            )?,
            _ => self.rlp_byte_string(5, data.len() as u64, false, data_prefix, Some(topic_count))?,
        }

        // Data.
        if !data.is_empty() {
            let slices = data.chunks(LLARGE).collect::<Vec<_>>();
            self.partial_reset(5, slices.len());
            self.local_size = data.len() as i64;
            self.depth_1 = true;
            self.is_data = true;
            for (ct, slice) in slices.iter().enumerate() {
                self.counter = ct as u64;
                self.index_local = ct as u64;
                self.input_1 = pad_right(slice, LLARGE);
                self.construct(&self.input_1.clone(), slice.len());
                self.local_size -= slice.len() as i64;
                if ct + 1 == slices.len() {
                    self.phase_end = last;
                }
                self.trace_row()?;
            }
            self.index_local = 0;
            self.expect_zero("LOCAL_SIZE", self.local_size, 5)?;
        }
        Ok(())
    }

    fn expect_zero(
        &self,
        counter: &'static str,
        remaining: i64,
        phase: u8,
    ) -> Result<(), TraceError> {
        if remaining != 0 {
            return Err(TraceError::SizeCounterMismatch {
                module: MODULE_KEY,
                counter,
                remaining,
                phase,
            });
        }
        Ok(())
    }
}

fn counter_value(counter: &'static str, value: i64, phase: u8) -> Result<u64, TraceError> {
    u64::try_from(value).map_err(|_| TraceError::SizeCounterMismatch {
        module: MODULE_KEY,
        counter,
        remaining: value,
        phase,
    })
}

/// Expands one receipt into its rows.
///
/// `abs_tx_num` numbers transactions from 1; `abs_log_num` is the number of
/// logs of the previous transactions.
pub fn chunk_rows(
    chunk: &RlpTxRcptChunk,
    abs_tx_num: u64,
    abs_tx_num_max: u64,
    abs_log_num: u64,
    abs_log_num_max: u64,
) -> Result<Vec<RlpTxRcptRow>, TraceError> {
    let mut cursor = ReceiptCursor {
        txrcpt_size: chunk.payload_size() as i64,
        abs_tx_num,
        abs_tx_num_max,
        abs_log_num,
        abs_log_num_max,
        rows: Vec::with_capacity(chunk.row_count()),
        ..Default::default()
    };

    cursor.phase_1(chunk.tx_type)?;
    cursor.phase_2(chunk.status)?;
    cursor.phase_3(chunk.cumulative_gas_used)?;
    cursor.phase_4(&chunk.bloom())?;
    cursor.phase_5(&chunk.logs)?;
    cursor.expect_zero("TXRCPT_SIZE", cursor.txrcpt_size, 5)?;

    Ok(cursor.rows)
}

/// The `rlpTxRcpt` module.
#[derive(Debug, Default)]
pub struct RlpTxRcpt {
    chunks: StackedList<RlpTxRcptChunk>,
}

impl RlpTxRcpt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the receipt and returns the prefix requests it issues.
    pub fn call_end_transaction(
        &mut self,
        tx_type: TransactionType,
        result: &TransactionResult,
    ) -> Vec<RlpUtilsCall> {
        let chunk = RlpTxRcptChunk::new(tx_type, result);
        let prefixes = chunk.prefix_calls();
        self.chunks.push(chunk);
        prefixes
    }

    pub fn chunks(&self) -> impl Iterator<Item = &RlpTxRcptChunk> {
        self.chunks.iter()
    }
}

impl Module for RlpTxRcpt {
    fn module_key(&self) -> &'static str {
        MODULE_KEY
    }

    fn enter_transaction(&mut self) {
        self.chunks.enter();
    }

    fn pop_transaction(&mut self) {
        self.chunks.pop();
    }

    fn line_count(&self) -> usize {
        self.chunks.iter().map(RlpTxRcptChunk::row_count).sum()
    }

    fn columns_headers(&self) -> Vec<ColumnHeader> {
        RlpTxRcptRow::headers(MODULE_KEY, self.line_count())
    }

    fn commit(&self, table: &mut TraceTable) -> Result<(), TraceError> {
        let abs_tx_num_max = self.chunks.len() as u64;
        let abs_log_num_max = self.chunks.iter().map(|c| c.logs.len() as u64).sum();
        let mut abs_log_num = 0;
        for (i, chunk) in self.chunks.iter().enumerate() {
            let rows = chunk_rows(
                chunk,
                i as u64 + 1,
                abs_tx_num_max,
                abs_log_num,
                abs_log_num_max,
            )?;
            for row in &rows {
                row.write_row(table)?;
            }
            abs_log_num += chunk.logs.len() as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ethereum_types::{Address, H256};
    use rand::{Rng, SeedableRng};
    use rlp::RlpStream;

    use super::*;

    fn log(topics: usize, data: &[u8]) -> Log {
        Log {
            address: Address::repeat_byte(0xab),
            topics: (0..topics).map(|i| H256::repeat_byte(i as u8 + 1)).collect(),
            data: Bytes::copy_from_slice(data),
        }
    }

    fn chunk(logs: Vec<Log>) -> RlpTxRcptChunk {
        RlpTxRcptChunk {
            tx_type: TransactionType::Eip1559,
            status: true,
            cumulative_gas_used: 21_000,
            logs,
        }
    }

    /// The receipt encoded with the `rlp` crate, type byte excluded.
    fn reference_receipt(chunk: &RlpTxRcptChunk) -> Vec<u8> {
        let mut stream = RlpStream::new_list(4);
        stream.append(&u8::from(chunk.status));
        stream.append(&chunk.cumulative_gas_used);
        stream.append(&chunk.bloom().as_bytes().to_vec());
        stream.begin_list(chunk.logs.len());
        for log in &chunk.logs {
            stream.begin_list(3);
            stream.append(&log.address);
            stream.append_list::<H256, H256>(&log.topics);
            stream.append(&log.data.to_vec());
        }
        stream.out().to_vec()
    }

    /// Concatenation of the constructed limbs.
    fn constructed_bytes(rows: &[RlpTxRcptRow]) -> Vec<u8> {
        rows.iter()
            .filter(|row| row.limb_constructed)
            .flat_map(|row| row.limb[..row.n_bytes as usize].to_vec())
            .collect()
    }

    #[test]
    fn limbs_spell_the_encoded_receipt() {
        let logs = vec![
            log(0, &[]),
            log(1, &[0x7f]),
            log(2, &[0x80]),
            log(4, &[0x11; 40]),
            log(3, &[0x22; 100]),
        ];
        for chunk in [chunk(vec![]), chunk(logs)] {
            let rows = chunk_rows(&chunk, 1, 1, 0, chunk.logs.len() as u64).unwrap();
            assert_eq!(rows.len(), chunk.row_count());

            let bytes = constructed_bytes(&rows);
            assert_eq!(bytes[0], 2, "type byte");
            assert_eq!(&bytes[1..], reference_receipt(&chunk));
            assert_eq!(outer_rlp_size(chunk.payload_size()), bytes.len() - 1);
        }
    }

    #[test]
    fn prefixes_are_delegated_to_rlp_utils() {
        let chunk = chunk(vec![log(2, &[0x80]), log(1, &[0x7f])]);
        let calls = chunk.prefix_calls();
        // Receipt and log list, then entry, topics and data of each log; a
        // single byte below 0x80 has no prefix.
        assert_eq!(calls.len(), 7);
        assert!(reference_receipt(&chunk).starts_with(&calls[0].encoding()));
        assert_eq!(
            calls[4],
            RlpUtilsCall::ByteStringPrefix {
                length: 1,
                is_list: false
            }
        );
        assert_eq!(
            calls[6],
            RlpUtilsCall::ByteStringPrefix {
                length: 33,
                is_list: true
            }
        );
        assert_eq!(self::chunk(vec![]).prefix_calls().len(), 1);
    }

    #[test]
    fn legacy_receipts_have_no_type_byte() {
        let mut chunk = chunk(vec![log(1, b"hello")]);
        chunk.tx_type = TransactionType::Frontier;
        chunk.status = false;
        let rows = chunk_rows(&chunk, 1, 1, 0, 1).unwrap();
        assert!(rows[0].lc_correction);
        assert!(!rows[0].limb_constructed);
        assert_eq!(constructed_bytes(&rows), reference_receipt(&chunk));
    }

    #[test]
    fn empty_log_entry_counts_down_to_zero() {
        let chunk = chunk(vec![log(0, &[])]);
        let rows = chunk_rows(&chunk, 1, 1, 0, 1).unwrap();
        let last = rows.last().unwrap();
        assert!(last.phase_5 && last.phase_end && last.is_data);
        assert_eq!(last.log_entry_size, 0);
        assert_eq!(last.phase_size, 0);
        assert_eq!(last.txrcpt_size, 0);
        assert_eq!(last.abs_log_num, 1);
    }

    #[test]
    fn transaction_without_logs_takes_the_trivial_path() {
        let chunk = chunk(vec![]);
        let rows = chunk_rows(&chunk, 1, 1, 0, 0).unwrap();
        assert_eq!(rows.len(), 84);
        let last = rows.last().unwrap();
        assert_eq!(last.log_entry_size, 1);
        assert_eq!(last.limb[0], RLP_PREFIX_LIST_SHORT);
        assert_eq!(last.txrcpt_size, 0);
    }

    #[test]
    fn zero_cumulative_gas_is_rejected() {
        let mut chunk = chunk(vec![]);
        chunk.cumulative_gas_used = 0;
        assert!(matches!(
            chunk_rows(&chunk, 1, 1, 0, 0),
            Err(TraceError::ZeroCumulativeGas)
        ));
    }

    #[test]
    fn bloom_limbs_are_traced_every_fourth_counter() {
        let chunk = chunk(vec![log(2, &[])]);
        let rows = chunk_rows(&chunk, 1, 1, 0, 1).unwrap();
        let phase_4 = rows.iter().filter(|row| row.phase_4).collect::<Vec<_>>();
        assert_eq!(phase_4.len(), 65);
        assert_eq!(phase_4[0].limb[..3], [0xb9, 0x01, 0x00]);
        let bloom = chunk.bloom();
        assert_eq!(phase_4[13].limb, bloom.as_bytes()[..16]);
        assert_eq!(phase_4[14].limb, bloom.as_bytes()[16..32]);
        assert_eq!(phase_4.iter().filter(|row| row.limb_constructed).count(), 17);
        assert!(phase_4[64].phase_end);
        assert!(bloom.contains_input(BloomInput::Raw(Address::repeat_byte(0xab).as_bytes())));
    }

    #[test]
    fn row_count_prediction_on_random_receipts() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let logs = (0..rng.gen_range(0..4))
                .map(|_| {
                    let data = (0..rng.gen_range(0..70)).map(|_| rng.gen()).collect::<Vec<u8>>();
                    log(rng.gen_range(0..=4), &data)
                })
                .collect();
            let mut chunk = chunk(logs);
            chunk.cumulative_gas_used = rng.gen_range(1..u64::MAX);
            let rows = chunk_rows(&chunk, 1, 1, 0, chunk.logs.len() as u64).unwrap();
            assert_eq!(rows.len(), chunk.row_count());
            assert_eq!(&constructed_bytes(&rows)[1..], reference_receipt(&chunk));
        }
    }

    #[test]
    fn popped_receipts_are_not_committed() {
        let mut module = RlpTxRcpt::new();
        let result = TransactionResult {
            status: true,
            cumulative_gas_used: 21_000,
            ..Default::default()
        };
        module.enter_transaction();
        module.call_end_transaction(TransactionType::Frontier, &result);
        module.enter_transaction();
        module.call_end_transaction(TransactionType::Frontier, &result);
        module.pop_transaction();
        assert_eq!(module.line_count(), 84);

        let mut table = TraceTable::new(MODULE_KEY, module.columns_headers());
        module.commit(&mut table).unwrap();
        let trace = table.build().unwrap();
        assert_eq!(
            trace.column("ABS_TX_NUM_MAX").unwrap().value(83),
            Some(U256::one())
        );
    }
}
