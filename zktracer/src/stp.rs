//! The gas stipend module.
//!
//! Traces, for every CALL-family and CREATE-family instruction, the upfront
//! gas check and the 63/64 rule deciding how much gas the child frame gets.
//! Each row names the comparison or division a separate module verifies.

use ethereum_types::U256;
use static_assertions::const_assert_eq;
use zktracer_common::constants::{
    GAS_CONST_G_CALL_STIPEND, GAS_CONST_G_CALL_VALUE, GAS_CONST_G_COLD_ACCOUNT_ACCESS,
    GAS_CONST_G_CREATE, GAS_CONST_G_INIT_CODE_WORD, GAS_CONST_G_KECCAK_256_WORD,
    GAS_CONST_G_NEW_ACCOUNT, GAS_CONST_G_WARM_ACCESS, WORD_SIZE,
};
use zktracer_common::OpCode;
use zktracer_proc_macro::TraceRow;

use crate::column::ColumnHeader;
use crate::container::StackedList;
use crate::encoding::u256_hi_lo;
use crate::error::TraceError;
use crate::host::{Frame, WorldView};
use crate::module::Module;
use crate::platform::Exceptions;
use crate::table::{TraceRow, TraceTable};

pub const MODULE_KEY: &str = "stp";
/// Number of columns of the `stp` table.
pub const NUM_COLUMNS: usize = 29;

/// Inputs of one gas stipend computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StpChunk {
    pub opcode: OpCode,
    /// Gas argument of a call; zero for creations.
    pub gas: U256,
    pub value: U256,
    /// Whether the callee exists; false for creations.
    pub exists: bool,
    /// Whether the callee is warm; false for creations.
    pub warm: bool,
    /// Gas left before the instruction executes.
    pub gas_actual: u64,
    pub gas_mxp: u64,
    /// Init code size in words; zero for calls.
    pub init_code_words: u64,
    /// Whether the hub raised an out-of-gas exception for the instruction.
    pub out_of_gas_exception: bool,
}

impl StpChunk {
    /// Reads the chunk of a CALL-family or CREATE-family instruction from the
    /// frame about to execute it, given the exceptions the platform
    /// controller found for it. Other instructions have none.
    pub fn from_frame(
        frame: &Frame,
        world: &dyn WorldView,
        exceptions: Exceptions,
    ) -> Option<Self> {
        let opcode = frame.opcode()?;
        let (gas, value, exists, warm) = match opcode {
            OpCode::Call | OpCode::CallCode => {
                let callee = frame.address_arg(1);
                (frame.arg(0), frame.arg(2), world.exists(&callee), world.is_warm(&callee))
            }
            OpCode::DelegateCall | OpCode::StaticCall => {
                let callee = frame.address_arg(1);
                (frame.arg(0), U256::zero(), world.exists(&callee), world.is_warm(&callee))
            }
            OpCode::Create | OpCode::Create2 => (U256::zero(), frame.arg(0), false, false),
            _ => return None,
        };
        Some(Self {
            opcode,
            gas,
            value,
            exists,
            warm,
            gas_actual: frame.gas_remaining,
            gas_mxp: frame.memory_expansion_cost,
            init_code_words: init_code_size(opcode, frame).div_ceil(WORD_SIZE as u64),
            out_of_gas_exception: exceptions.contains(Exceptions::OUT_OF_GAS),
        })
    }

    pub const fn is_create(&self) -> bool {
        self.opcode.is_create()
    }

    /// Upfront gas cost, memory expansion excluded.
    pub fn gas_upfront(&self) -> u64 {
        match self.opcode {
            OpCode::Create => GAS_CONST_G_CREATE
                .saturating_add(GAS_CONST_G_INIT_CODE_WORD.saturating_mul(self.init_code_words)),
            OpCode::Create2 => GAS_CONST_G_CREATE.saturating_add(
                (GAS_CONST_G_INIT_CODE_WORD + GAS_CONST_G_KECCAK_256_WORD)
                    .saturating_mul(self.init_code_words),
            ),
            _ => {
                let access = if self.warm {
                    GAS_CONST_G_WARM_ACCESS
                } else {
                    GAS_CONST_G_COLD_ACCOUNT_ACCESS
                };
                let transfers_value =
                    self.opcode.call_has_value_argument() && !self.value.is_zero();
                let value = if transfers_value {
                    GAS_CONST_G_CALL_VALUE
                } else {
                    0
                };
                let new_account = if transfers_value && self.opcode == OpCode::Call && !self.exists
                {
                    GAS_CONST_G_NEW_ACCOUNT
                } else {
                    0
                };
                access + value + new_account
            }
        }
    }

    /// Gas the instruction needs before its child frame gets any.
    pub fn gas_prelim(&self) -> u64 {
        self.gas_upfront().saturating_add(self.gas_mxp)
    }

    pub const fn out_of_gas(&self) -> bool {
        self.out_of_gas_exception
    }

    /// Gas left after the upfront cost. Only meaningful without an
    /// out-of-gas exception.
    fn gas_diff(&self) -> u64 {
        self.gas_actual.saturating_sub(self.gas_prelim())
    }

    /// All but one 64th of the gas left after the upfront cost.
    fn all_but_one_64th(&self) -> u64 {
        let diff = self.gas_diff();
        diff - diff / 64
    }

    /// Gas handed to the child frame out of the caller's pocket.
    pub fn gas_out_of_pocket(&self) -> u64 {
        if self.out_of_gas() {
            return 0;
        }
        let cap = self.all_but_one_64th();
        if self.is_create() || self.gas >= U256::from(cap) {
            cap
        } else {
            self.gas.low_u64()
        }
    }

    pub fn gas_stipend(&self) -> u64 {
        if !self.out_of_gas() && self.opcode.call_has_value_argument() && !self.value.is_zero() {
            GAS_CONST_G_CALL_STIPEND
        } else {
            0
        }
    }

    /// Index of the last row.
    pub fn ct_max(&self) -> usize {
        match (self.is_create(), self.out_of_gas()) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 1,
            (false, false) => 3,
        }
    }

    pub fn row_count(&self) -> usize {
        self.ct_max() + 1
    }
}

fn init_code_size(opcode: OpCode, frame: &Frame) -> u64 {
    if !opcode.is_create() {
        return 0;
    }
    let size = frame.arg(2);
    if size > U256::from(u64::MAX) {
        u64::MAX
    } else {
        size.low_u64()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, TraceRow)]
pub struct StpRow {
    pub arg_1_hi: U256,
    pub arg_1_lo: U256,
    pub arg_2_lo: U256,
    pub ct: u64,
    pub ct_max: u64,
    pub exists: bool,
    pub exogenous_module_instruction: u8,
    pub gas_actual: u64,
    pub gas_hi: U256,
    pub gas_lo: U256,
    pub gas_mxp: u64,
    pub gas_oopkt: u64,
    pub gas_stipend: u64,
    pub gas_upfront: u64,
    pub instruction: u8,
    pub is_call: bool,
    pub is_callcode: bool,
    pub is_create: bool,
    pub is_create2: bool,
    pub is_delegatecall: bool,
    pub is_staticcall: bool,
    pub mod_flag: bool,
    pub out_of_gas_exception: bool,
    pub res_lo: U256,
    pub stamp: u64,
    pub val_hi: U256,
    pub val_lo: U256,
    pub warm: bool,
    pub wcp_flag: bool,
}

const_assert_eq!(<StpRow as TraceRow>::COLUMN_COUNT, NUM_COLUMNS);

/// One exogenous check: `res_lo = arg_1 <instruction> arg_2_lo`.
struct Check {
    instruction: OpCode,
    arg_1: U256,
    arg_2_lo: u64,
    res_lo: U256,
}

impl Check {
    fn lt(arg_1: U256, arg_2_lo: u64) -> Self {
        Self {
            instruction: OpCode::Lt,
            arg_1,
            arg_2_lo,
            res_lo: U256::from(u8::from(arg_1 < U256::from(arg_2_lo))),
        }
    }

    fn is_zero(arg_1: U256) -> Self {
        Self {
            instruction: OpCode::IsZero,
            arg_1,
            arg_2_lo: 0,
            res_lo: U256::from(u8::from(arg_1.is_zero())),
        }
    }

    fn div(arg_1: u64, arg_2_lo: u64) -> Self {
        Self {
            instruction: OpCode::Div,
            arg_1: arg_1.into(),
            arg_2_lo,
            res_lo: (arg_1 / arg_2_lo).into(),
        }
    }
}

/// Expands one chunk into its rows. `stamp` numbers chunks from 1.
pub fn chunk_rows(chunk: &StpChunk, stamp: u64) -> Vec<StpRow> {
    let gas_actual = U256::from(chunk.gas_actual);
    let mut checks = if chunk.is_create() {
        vec![
            Check::lt(gas_actual, chunk.gas_prelim()),
            Check::div(chunk.gas_diff(), 64),
        ]
    } else {
        vec![
            Check::is_zero(chunk.value),
            Check::lt(gas_actual, chunk.gas_prelim()),
            Check::div(chunk.gas_diff(), 64),
            Check::lt(chunk.gas, chunk.all_but_one_64th()),
        ]
    };
    checks.truncate(chunk.row_count());

    let (gas_hi, gas_lo) = u256_hi_lo(chunk.gas);
    let (val_hi, val_lo) = u256_hi_lo(chunk.value);
    let ct_max = chunk.ct_max() as u64;
    let out_of_gas_exception = chunk.out_of_gas();

    checks
        .into_iter()
        .enumerate()
        .map(|(ct, check)| {
            let (arg_1_hi, arg_1_lo) = u256_hi_lo(check.arg_1);
            let mod_flag = check.instruction == OpCode::Div;
            StpRow {
                arg_1_hi,
                arg_1_lo,
                arg_2_lo: check.arg_2_lo.into(),
                ct: ct as u64,
                ct_max,
                exists: chunk.exists,
                exogenous_module_instruction: check.instruction.byte(),
                gas_actual: chunk.gas_actual,
                gas_hi,
                gas_lo,
                gas_mxp: chunk.gas_mxp,
                gas_oopkt: chunk.gas_out_of_pocket(),
                gas_stipend: chunk.gas_stipend(),
                gas_upfront: chunk.gas_upfront(),
                instruction: chunk.opcode.byte(),
                is_call: chunk.opcode == OpCode::Call,
                is_callcode: chunk.opcode == OpCode::CallCode,
                is_create: chunk.opcode == OpCode::Create,
                is_create2: chunk.opcode == OpCode::Create2,
                is_delegatecall: chunk.opcode == OpCode::DelegateCall,
                is_staticcall: chunk.opcode == OpCode::StaticCall,
                mod_flag,
                out_of_gas_exception,
                res_lo: check.res_lo,
                stamp,
                val_hi,
                val_lo,
                warm: chunk.warm,
                wcp_flag: !mod_flag,
            }
        })
        .collect()
}

/// The `stp` module.
#[derive(Debug, Default)]
pub struct Stp {
    chunks: StackedList<StpChunk>,
}

impl Stp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(&mut self, chunk: StpChunk) {
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> impl Iterator<Item = &StpChunk> {
        self.chunks.iter()
    }
}

impl Module for Stp {
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
        self.chunks.iter().map(StpChunk::row_count).sum()
    }

    fn columns_headers(&self) -> Vec<ColumnHeader> {
        StpRow::headers(MODULE_KEY, self.line_count())
    }

    fn commit(&self, table: &mut TraceTable) -> Result<(), TraceError> {
        for (i, chunk) in self.chunks.iter().enumerate() {
            for row in chunk_rows(chunk, i as u64 + 1) {
                row.write_row(table)?;
            }
        }
        Ok(())
    }
}
