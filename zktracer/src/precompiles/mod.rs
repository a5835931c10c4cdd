//! Precompile calls as the hub sees them.
//!
//! Every call to a precompile is classified as a hub failure (the precompile
//! cannot even be priced or paid for), a ram failure (it was paid for but
//! did not succeed) or a success, and this classification decides which
//! lower level calls trace it.

use bytes::Bytes;
use ethereum_types::U256;
use zktracer_common::constants::{
    GAS_CONST_BLAKE2F_ROUND, GAS_CONST_ECADD, GAS_CONST_ECMUL, GAS_CONST_ECPAIRING,
    GAS_CONST_ECPAIRING_PAIR, GAS_CONST_ECRECOVER, GAS_CONST_IDENTITY, GAS_CONST_IDENTITY_WORD,
    GAS_CONST_MODEXP_MIN, GAS_CONST_MODEXP_QUAD_DIVISOR, GAS_CONST_RIPEMD, GAS_CONST_RIPEMD_WORD,
    GAS_CONST_SHA2, GAS_CONST_SHA2_WORD, MODEXP_HEADER_SIZE, MODEXP_MAX_OPERAND_SIZE,
    PRECOMPILE_CALL_DATA_SIZE_BLAKE2F, PRECOMPILE_CALL_DATA_SIZE_ECADD,
    PRECOMPILE_CALL_DATA_SIZE_ECMUL, PRECOMPILE_CALL_DATA_SIZE_ECRECOVER,
    PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING, PRECOMPILE_RETURN_DATA_SIZE_BLAKE2F,
    PRECOMPILE_RETURN_DATA_SIZE_ECADD, WORD_SIZE,
};
use zktracer_common::{PrecompileKind, EMPTY_RIPEMD_HASH, EMPTY_SHA2_HASH};

use crate::encoding::{hi_lo, u256_hi_lo};
use crate::error::TraceError;
use crate::host::Frame;

pub mod imc;

use imc::*;

/// Offset of the hashed state in BLAKE2F call data, after the rounds.
const BLAKE2F_HASH_INPUT_OFFSET: u64 = 4;
/// State, message and offset counters of BLAKE2F.
const BLAKE2F_HASH_INPUT_SIZE: u64 = 208;
const ECRECOVER_RESULT_SIZE: u64 = 32;
const ECPAIRING_RESULT_SIZE: u64 = 32;

/// What the host reports after executing a precompile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrecompileOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl PrecompileOutcome {
    /// Reads the outcome of a call from the caller's frame right after the
    /// call returned: the success flag on top of the stack and the callee's
    /// return data.
    pub fn from_post_frame(frame: &Frame) -> Self {
        Self {
            success: !frame.arg(0).is_zero(),
            return_data: frame.return_data.clone(),
        }
    }
}

/// A call to a precompile, as issued by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrecompileCall {
    pub call_data: Bytes,
    pub call_data_offset: u64,
    pub return_at_offset: u64,
    pub return_at_capacity: u64,
    /// Gas handed to the precompile, stipend included.
    pub callee_gas: u64,
    /// Context number of the caller.
    pub caller_context: u32,
    /// Identifier the exogenous modules file this call under.
    pub exo_id: u32,
}

/// Operand sizes and leading exponent word of a MODEXP call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModexpMetadata {
    pub bbs: u64,
    pub ebs: u64,
    pub mbs: u64,
    /// The 32 bytes of call data starting with the exponent.
    pub raw_leading_word: U256,
}

impl ModexpMetadata {
    /// Reads the operand sizes. Sizes above what the arithmetization supports
    /// are rejected.
    pub fn from_call_data(call_data: &[u8]) -> Result<Self, TraceError> {
        let size = |offset: usize| -> Result<u64, TraceError> {
            let value = word_at(call_data, offset);
            if value > U256::from(MODEXP_MAX_OPERAND_SIZE) {
                return Err(TraceError::InvalidChunk {
                    module: "modexp",
                    reason: format!("operand size {value} exceeds {MODEXP_MAX_OPERAND_SIZE} bytes"),
                });
            }
            Ok(value.low_u64())
        };
        let bbs = size(0)?;
        let ebs = size(WORD_SIZE)?;
        let mbs = size(2 * WORD_SIZE)?;
        Ok(Self {
            bbs,
            ebs,
            mbs,
            raw_leading_word: word_at(call_data, MODEXP_HEADER_SIZE + bbs as usize),
        })
    }

    pub fn cds_cutoff(&self, call_data_size: u64) -> u64 {
        call_data_size
            .saturating_sub(MODEXP_HEADER_SIZE as u64 + self.bbs)
            .min(WORD_SIZE as u64)
    }

    pub fn ebs_cutoff(&self) -> u64 {
        self.ebs.min(WORD_SIZE as u64)
    }

    /// Whether the leading exponent word is read from memory at all.
    pub fn load_lead(&self, call_data_size: u64) -> bool {
        self.ebs != 0 && call_data_size > MODEXP_HEADER_SIZE as u64 + self.bbs
    }

    /// The leading exponent word: its first `ebs_cutoff` bytes.
    pub fn leading_word(&self) -> U256 {
        match self.ebs_cutoff() {
            0 => U256::zero(),
            cutoff => self.raw_leading_word >> (8 * (WORD_SIZE as u64 - cutoff) as usize),
        }
    }

    pub fn leading_word_log(&self) -> u64 {
        (self.leading_word().bits() as u64).saturating_sub(1)
    }

    /// Adjusted exponent length of EIP-2565.
    pub fn exponent_log(&self) -> u64 {
        8 * self.ebs.saturating_sub(WORD_SIZE as u64) + self.leading_word_log()
    }

    pub fn max_mbs_bbs(&self) -> u64 {
        self.mbs.max(self.bbs)
    }

    /// Gas price of EIP-2565.
    pub fn gas_cost(&self) -> u64 {
        let words = self.max_mbs_bbs().div_ceil(8);
        let multiplication_complexity = words * words;
        let iterations = self.exponent_log().max(1);
        (multiplication_complexity * iterations / GAS_CONST_MODEXP_QUAD_DIVISOR)
            .max(GAS_CONST_MODEXP_MIN)
    }

    pub fn extract_modulus(&self, call_data_size: u64) -> bool {
        call_data_size > MODEXP_HEADER_SIZE as u64 + self.bbs + self.ebs && self.mbs != 0
    }

    pub fn extract_base(&self, call_data_size: u64) -> bool {
        self.extract_modulus(call_data_size) && self.bbs != 0
    }

    pub fn extract_exponent(&self, call_data_size: u64) -> bool {
        self.extract_modulus(call_data_size) && self.ebs != 0
    }
}

/// Rounds and final block flag of a BLAKE2F call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlakeMetadata {
    pub rounds: u32,
    pub final_flag: u8,
}

impl BlakeMetadata {
    pub fn from_call_data(call_data: &[u8]) -> Self {
        Self {
            rounds: crate::limits::blake2f_rounds(call_data),
            final_flag: call_data
                .get(PRECOMPILE_CALL_DATA_SIZE_BLAKE2F - 1)
                .copied()
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrecompileMetadata {
    Modexp(ModexpMetadata),
    Blake(BlakeMetadata),
}

/// A classified precompile call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileInvocation {
    pub kind: PrecompileKind,
    pub metadata: Option<PrecompileMetadata>,
    pub call: PrecompileCall,
    /// Gas price of the call; zero when it cannot be priced.
    pub cost: u64,
    pub hub_failure: bool,
    pub ram_failure: bool,
    /// Gas handed back to the caller.
    pub return_gas: u64,
    pub return_data: Bytes,
}

impl PrecompileInvocation {
    pub fn new(
        kind: PrecompileKind,
        call: PrecompileCall,
        outcome: &PrecompileOutcome,
    ) -> Result<Self, TraceError> {
        let cds = call.call_data.len();
        let metadata = match kind {
            PrecompileKind::ModExp => Some(PrecompileMetadata::Modexp(
                ModexpMetadata::from_call_data(&call.call_data)?,
            )),
            PrecompileKind::Blake2f => Some(PrecompileMetadata::Blake(
                BlakeMetadata::from_call_data(&call.call_data),
            )),
            _ => None,
        };

        let malformed = match kind {
            PrecompileKind::EcPairing => cds % PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING != 0,
            PrecompileKind::Blake2f => cds != PRECOMPILE_CALL_DATA_SIZE_BLAKE2F,
            _ => false,
        };
        let cost = if malformed {
            0
        } else {
            gas_cost(kind, cds, metadata.as_ref())
        };
        // BLAKE2F only checks its call data size before the call; its gas
        // and final flag are checked against the parameters read from RAM.
        let hub_failure = match kind {
            PrecompileKind::Blake2f => malformed,
            _ => malformed || call.callee_gas < cost,
        };
        let ram_failure = !hub_failure
            && match &metadata {
                Some(PrecompileMetadata::Blake(blake)) => {
                    call.callee_gas < cost || blake.final_flag > 1
                }
                _ => kind.is_ec_data() && !outcome.success,
            };
        let success = !hub_failure && !ram_failure;

        Ok(Self {
            kind,
            metadata,
            return_gas: if success { call.callee_gas - cost } else { 0 },
            return_data: if success {
                outcome.return_data.clone()
            } else {
                Bytes::new()
            },
            call,
            cost,
            hub_failure,
            ram_failure,
        })
    }

    pub const fn success(&self) -> bool {
        !self.hub_failure && !self.ram_failure
    }

    fn call_data_size(&self) -> u64 {
        self.call.call_data.len() as u64
    }

    fn modexp(&self) -> Option<&ModexpMetadata> {
        match &self.metadata {
            Some(PrecompileMetadata::Modexp(modexp)) => Some(modexp),
            _ => None,
        }
    }

    fn blake(&self) -> Option<&BlakeMetadata> {
        match &self.metadata {
            Some(PrecompileMetadata::Blake(blake)) => Some(blake),
            _ => None,
        }
    }

    /// The calls tracing this invocation, in trace order.
    pub fn lower_level_calls(&self) -> Vec<LowerLevelCall> {
        if let Some(modexp) = self.modexp() {
            return self.modexp_calls(modexp);
        }
        if let Some(blake) = self.blake() {
            return self.blake_calls(blake);
        }
        self.common_calls()
    }

    fn common_calls(&self) -> Vec<LowerLevelCall> {
        let instruction = match self.kind {
            PrecompileKind::EcRecover => OobInstruction::EcRecover,
            PrecompileKind::Sha2_256 => OobInstruction::Sha2,
            PrecompileKind::Ripemd160 => OobInstruction::Ripemd,
            PrecompileKind::Identity => OobInstruction::Identity,
            PrecompileKind::EcAdd => OobInstruction::EcAdd,
            PrecompileKind::EcMul => OobInstruction::EcMul,
            PrecompileKind::EcPairing => OobInstruction::EcPairing,
            PrecompileKind::ModExp | PrecompileKind::Blake2f => return vec![],
        };
        let mut calls = vec![OobCall::Common {
            instruction,
            call_gas: self.call.callee_gas,
            call_data_size: self.call_data_size(),
            return_at_capacity: self.call.return_at_capacity,
            hub_success: !self.hub_failure,
            return_gas: self.return_gas,
        }
        .into()];
        if self.hub_failure {
            return calls;
        }
        if self.ram_failure {
            calls.push(self.call_data_extraction().into());
            return calls;
        }

        if self.call_data_size() > 0 {
            calls.push(self.call_data_extraction().into());
        }
        if let Some(transfer) = self.full_result_transfer() {
            calls.push(transfer.into());
        }
        if self.call.return_at_capacity > 0 && !self.return_data.is_empty() {
            calls.push(self.partial_return_data_copy(self.result_size(), 0).into());
        }
        calls
    }

    /// Size of the result as written to the precompile's own memory.
    fn result_size(&self) -> u64 {
        match self.kind {
            PrecompileKind::EcRecover => ECRECOVER_RESULT_SIZE,
            PrecompileKind::Sha2_256 | PrecompileKind::Ripemd160 => WORD_SIZE as u64,
            PrecompileKind::Identity => self.call_data_size(),
            PrecompileKind::EcAdd | PrecompileKind::EcMul => {
                PRECOMPILE_RETURN_DATA_SIZE_ECADD as u64
            }
            PrecompileKind::EcPairing => ECPAIRING_RESULT_SIZE,
            PrecompileKind::ModExp => MODEXP_MAX_OPERAND_SIZE as u64,
            PrecompileKind::Blake2f => PRECOMPILE_RETURN_DATA_SIZE_BLAKE2F as u64,
        }
    }

    fn call_data_extraction(&self) -> MmuCall {
        let (instruction, exo, phase, reference_size) = match self.kind {
            PrecompileKind::EcRecover => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::EC_DATA,
                PHASE_ECRECOVER_DATA,
                PRECOMPILE_CALL_DATA_SIZE_ECRECOVER as u64,
            ),
            PrecompileKind::Sha2_256 => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::RIP_SHA,
                PHASE_SHA2_DATA,
                self.call_data_size(),
            ),
            PrecompileKind::Ripemd160 => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::RIP_SHA,
                PHASE_RIPEMD_DATA,
                self.call_data_size(),
            ),
            PrecompileKind::Identity => (
                MmuInstruction::RamToRamSansPadding,
                ExoModules::empty(),
                0,
                self.call_data_size(),
            ),
            PrecompileKind::EcAdd => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::EC_DATA,
                PHASE_ECADD_DATA,
                PRECOMPILE_CALL_DATA_SIZE_ECADD as u64,
            ),
            PrecompileKind::EcMul => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::EC_DATA,
                PHASE_ECMUL_DATA,
                PRECOMPILE_CALL_DATA_SIZE_ECMUL as u64,
            ),
            PrecompileKind::EcPairing => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::EC_DATA,
                PHASE_ECPAIRING_DATA,
                self.call_data_size(),
            ),
            PrecompileKind::ModExp => (
                MmuInstruction::ModexpData,
                ExoModules::BLAKE_MODEXP,
                PHASE_MODEXP_BASE,
                self.call_data_size(),
            ),
            PrecompileKind::Blake2f => (
                MmuInstruction::RamToExoWithPadding,
                ExoModules::BLAKE_MODEXP,
                PHASE_BLAKE_DATA,
                BLAKE2F_HASH_INPUT_SIZE,
            ),
        };
        MmuCall {
            source_id: self.call.caller_context,
            target_id: self.call.exo_id,
            source_offset: self.call.call_data_offset,
            size: self.call_data_size(),
            reference_size,
            success_bit: self.kind.is_ec_data() && self.success(),
            phase,
            exo,
            ..MmuCall::new(instruction)
        }
    }

    /// The result written into the precompile's own memory, if any.
    fn full_result_transfer(&self) -> Option<MmuCall> {
        let empty_input = self.call_data_size() == 0;
        let (exo, phase) = match self.kind {
            PrecompileKind::EcRecover if self.return_data.is_empty() => return None,
            PrecompileKind::EcRecover => (ExoModules::EC_DATA, PHASE_ECRECOVER_RESULT),
            PrecompileKind::Sha2_256 | PrecompileKind::Ripemd160 if empty_input => {
                let empty_hash = if self.kind == PrecompileKind::Sha2_256 {
                    EMPTY_SHA2_HASH
                } else {
                    EMPTY_RIPEMD_HASH
                };
                let (limb_1, limb_2) = hi_lo(&empty_hash.0);
                return Some(MmuCall {
                    target_id: self.call.exo_id,
                    limb_1,
                    limb_2,
                    ..MmuCall::new(MmuInstruction::MStore)
                });
            }
            PrecompileKind::Sha2_256 => (ExoModules::RIP_SHA, PHASE_SHA2_RESULT),
            PrecompileKind::Ripemd160 => (ExoModules::RIP_SHA, PHASE_RIPEMD_RESULT),
            PrecompileKind::Identity => return None,
            PrecompileKind::EcAdd => (ExoModules::EC_DATA, PHASE_ECADD_RESULT),
            PrecompileKind::EcMul => (ExoModules::EC_DATA, PHASE_ECMUL_RESULT),
            PrecompileKind::EcPairing if empty_input => {
                return Some(MmuCall {
                    target_id: self.call.exo_id,
                    limb_2: U256::one(),
                    ..MmuCall::new(MmuInstruction::MStore)
                });
            }
            PrecompileKind::EcPairing => (ExoModules::EC_DATA, PHASE_ECPAIRING_RESULT),
            PrecompileKind::ModExp => (ExoModules::BLAKE_MODEXP, PHASE_MODEXP_RESULT),
            PrecompileKind::Blake2f => (ExoModules::BLAKE_MODEXP, PHASE_BLAKE_RESULT),
        };
        Some(MmuCall {
            source_id: self.call.exo_id,
            target_id: self.call.exo_id,
            size: self.result_size(),
            success_bit: self.kind.is_ec_data(),
            phase,
            exo,
            ..MmuCall::new(MmuInstruction::ExoToRamTransplants)
        })
    }

    fn partial_return_data_copy(&self, size: u64, source_offset: u64) -> MmuCall {
        MmuCall {
            source_id: self.call.exo_id,
            target_id: self.call.caller_context,
            source_offset,
            size,
            reference_offset: self.call.return_at_offset,
            reference_size: self.call.return_at_capacity,
            ..MmuCall::new(MmuInstruction::RamToRamSansPadding)
        }
    }

    fn modexp_calls(&self, modexp: &ModexpMetadata) -> Vec<LowerLevelCall> {
        let cds = self.call_data_size();
        let word = WORD_SIZE as u64;
        let header = MODEXP_HEADER_SIZE as u64;
        let mut calls: Vec<LowerLevelCall> = vec![
            OobCall::ModexpCds {
                call_data_size: cds,
                extract_bbs: cds > 0,
                extract_ebs: cds > word,
                extract_mbs: cds > 2 * word,
            }
            .into(),
            OobCall::ModexpXbs {
                xbs: modexp.bbs,
                ybs: 0,
                compute_max: false,
            }
            .into(),
            OobCall::ModexpXbs {
                xbs: modexp.ebs,
                ybs: 0,
                compute_max: false,
            }
            .into(),
            OobCall::ModexpXbs {
                xbs: modexp.mbs,
                ybs: modexp.bbs,
                compute_max: true,
            }
            .into(),
        ];

        for (index, size) in [modexp.bbs, modexp.ebs, modexp.mbs].into_iter().enumerate() {
            let offset = index as u64 * word;
            if cds > offset {
                let (limb_1, limb_2) = u256_hi_lo(size.into());
                calls.push(
                    MmuCall {
                        source_id: self.call.caller_context,
                        source_offset: offset,
                        reference_offset: self.call.call_data_offset,
                        reference_size: cds,
                        limb_1,
                        limb_2,
                        ..MmuCall::new(MmuInstruction::RightPaddedWordExtraction)
                    }
                    .into(),
                );
            }
        }

        let load_lead = modexp.load_lead(cds);
        calls.push(
            OobCall::ModexpLead {
                bbs: modexp.bbs,
                call_data_size: cds,
                ebs: modexp.ebs,
                load_lead,
                cds_cutoff: modexp.cds_cutoff(cds),
                ebs_cutoff: modexp.ebs_cutoff(),
                sub_ebs_32: modexp.ebs.saturating_sub(word),
            }
            .into(),
        );
        if load_lead {
            let (limb_1, limb_2) = u256_hi_lo(modexp.raw_leading_word);
            calls.push(
                MmuCall {
                    source_id: self.call.caller_context,
                    source_offset: self.call.call_data_offset + header + modexp.bbs,
                    limb_1,
                    limb_2,
                    ..MmuCall::new(MmuInstruction::MLoad)
                }
                .into(),
            );
            calls.push(
                ExpCall {
                    raw_leading_word: modexp.raw_leading_word,
                    cds_cutoff: modexp.cds_cutoff(cds),
                    ebs_cutoff: modexp.ebs_cutoff(),
                    leading_word_log: modexp.leading_word_log(),
                }
                .into(),
            );
        }

        calls.push(
            OobCall::ModexpPricing {
                call_gas: self.call.callee_gas,
                return_at_capacity: self.call.return_at_capacity,
                exponent_log: modexp.exponent_log(),
                max_mbs_bbs: modexp.max_mbs_bbs(),
                ram_success: !self.hub_failure,
                return_gas: self.return_gas,
            }
            .into(),
        );
        if self.hub_failure {
            return calls;
        }

        calls.push(
            OobCall::ModexpExtract {
                call_data_size: cds,
                bbs: modexp.bbs,
                ebs: modexp.ebs,
                mbs: modexp.mbs,
                extract_base: modexp.extract_base(cds),
                extract_exponent: modexp.extract_exponent(cds),
                extract_modulus: modexp.extract_modulus(cds),
            }
            .into(),
        );
        if !modexp.extract_modulus(cds) {
            return calls;
        }

        let operand = |extract: bool, offset: u64, size: u64, phase: u16| {
            if extract {
                MmuCall {
                    source_id: self.call.caller_context,
                    target_id: self.call.exo_id,
                    source_offset: offset,
                    size,
                    reference_offset: self.call.call_data_offset,
                    reference_size: cds,
                    phase,
                    exo: ExoModules::BLAKE_MODEXP,
                    ..MmuCall::new(MmuInstruction::ModexpData)
                }
            } else {
                MmuCall {
                    target_id: self.call.exo_id,
                    phase,
                    exo: ExoModules::BLAKE_MODEXP,
                    ..MmuCall::new(MmuInstruction::ModexpZero)
                }
            }
        };
        calls.push(
            operand(
                modexp.extract_base(cds),
                header,
                modexp.bbs,
                PHASE_MODEXP_BASE,
            )
            .into(),
        );
        calls.push(
            operand(
                modexp.extract_exponent(cds),
                header + modexp.bbs,
                modexp.ebs,
                PHASE_MODEXP_EXPONENT,
            )
            .into(),
        );
        calls.push(
            operand(
                true,
                header + modexp.bbs + modexp.ebs,
                modexp.mbs,
                PHASE_MODEXP_MODULUS,
            )
            .into(),
        );
        if let Some(transfer) = self.full_result_transfer() {
            calls.push(transfer.into());
        }
        if self.call.return_at_capacity > 0 {
            calls.push(
                self.partial_return_data_copy(modexp.mbs, self.result_size() - modexp.mbs)
                    .into(),
            );
        }
        calls
    }

    fn blake_calls(&self, blake: &BlakeMetadata) -> Vec<LowerLevelCall> {
        let well_sized = self.call_data_size() == PRECOMPILE_CALL_DATA_SIZE_BLAKE2F as u64;
        let mut calls: Vec<LowerLevelCall> = vec![OobCall::BlakeCds {
            call_data_size: self.call_data_size(),
            return_at_capacity: self.call.return_at_capacity,
            hub_success: well_sized,
        }
        .into()];
        if !well_sized {
            return calls;
        }
        calls.push(
            OobCall::BlakeParams {
                call_gas: self.call.callee_gas,
                rounds: blake.rounds,
                final_flag: blake.final_flag,
                ram_success: self.success(),
                return_gas: self.return_gas,
            }
            .into(),
        );

        calls.push(
            MmuCall {
                source_id: self.call.caller_context,
                target_id: self.call.exo_id,
                source_offset: self.call.call_data_offset,
                success_bit: self.success(),
                limb_1: blake.rounds.into(),
                limb_2: blake.final_flag.into(),
                phase: PHASE_BLAKE_PARAMS,
                exo: if self.success() {
                    ExoModules::BLAKE_MODEXP
                } else {
                    ExoModules::empty()
                },
                ..MmuCall::new(MmuInstruction::Blake)
            }
            .into(),
        );
        if self.ram_failure {
            return calls;
        }

        calls.push(
            MmuCall {
                source_id: self.call.caller_context,
                target_id: self.call.exo_id,
                source_offset: self.call.call_data_offset + BLAKE2F_HASH_INPUT_OFFSET,
                size: BLAKE2F_HASH_INPUT_SIZE,
                reference_size: BLAKE2F_HASH_INPUT_SIZE,
                phase: PHASE_BLAKE_DATA,
                exo: ExoModules::BLAKE_MODEXP,
                ..MmuCall::new(MmuInstruction::RamToExoWithPadding)
            }
            .into(),
        );
        if let Some(transfer) = self.full_result_transfer() {
            calls.push(transfer.into());
        }
        if self.call.return_at_capacity > 0 {
            calls.push(
                self.partial_return_data_copy(self.result_size(), 0)
                    .into(),
            );
        }
        calls
    }
}

/// Gas price of a well-formed call with `cds` bytes of call data.
fn gas_cost(kind: PrecompileKind, cds: usize, metadata: Option<&PrecompileMetadata>) -> u64 {
    let words = cds.div_ceil(WORD_SIZE) as u64;
    match (kind, metadata) {
        (PrecompileKind::EcRecover, _) => GAS_CONST_ECRECOVER,
        (PrecompileKind::Sha2_256, _) => GAS_CONST_SHA2 + GAS_CONST_SHA2_WORD * words,
        (PrecompileKind::Ripemd160, _) => GAS_CONST_RIPEMD + GAS_CONST_RIPEMD_WORD * words,
        (PrecompileKind::Identity, _) => GAS_CONST_IDENTITY + GAS_CONST_IDENTITY_WORD * words,
        (PrecompileKind::ModExp, Some(PrecompileMetadata::Modexp(modexp))) => modexp.gas_cost(),
        (PrecompileKind::EcAdd, _) => GAS_CONST_ECADD,
        (PrecompileKind::EcMul, _) => GAS_CONST_ECMUL,
        (PrecompileKind::EcPairing, _) => {
            GAS_CONST_ECPAIRING
                + GAS_CONST_ECPAIRING_PAIR * (cds / PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING) as u64
        }
        (PrecompileKind::Blake2f, Some(PrecompileMetadata::Blake(blake))) => {
            GAS_CONST_BLAKE2F_ROUND * blake.rounds as u64
        }
        (PrecompileKind::ModExp | PrecompileKind::Blake2f, _) => 0,
    }
}

/// The 32 bytes of `data` starting at `offset`, zero-padded on the right.
fn word_at(data: &[u8], offset: usize) -> U256 {
    let mut word = [0u8; 32];
    if offset < data.len() {
        let end = data.len().min(offset + WORD_SIZE);
        word[..end - offset].copy_from_slice(&data[offset..end]);
    }
    U256::from_big_endian(&word)
}
