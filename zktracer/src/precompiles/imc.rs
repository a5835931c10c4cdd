//! Instructions the hub hands over to lower level modules: memory movements
//! (MMU), bounds and gas checks (OOB) and exponent logarithms (EXP).

use ethereum_types::U256;

pub const PHASE_SHA2_DATA: u16 = 0x1;
pub const PHASE_SHA2_RESULT: u16 = 0x2;
pub const PHASE_RIPEMD_DATA: u16 = 0x3;
pub const PHASE_RIPEMD_RESULT: u16 = 0x4;
pub const PHASE_MODEXP_BASE: u16 = 0x1;
pub const PHASE_MODEXP_EXPONENT: u16 = 0x2;
pub const PHASE_MODEXP_MODULUS: u16 = 0x3;
pub const PHASE_MODEXP_RESULT: u16 = 0x4;
pub const PHASE_BLAKE_DATA: u16 = 0x5;
pub const PHASE_BLAKE_PARAMS: u16 = 0x6;
pub const PHASE_BLAKE_RESULT: u16 = 0x7;
pub const PHASE_ECRECOVER_DATA: u16 = 0x10a;
pub const PHASE_ECRECOVER_RESULT: u16 = 0x10b;
pub const PHASE_ECADD_DATA: u16 = 0x60a;
pub const PHASE_ECADD_RESULT: u16 = 0x60b;
pub const PHASE_ECMUL_DATA: u16 = 0x70a;
pub const PHASE_ECMUL_RESULT: u16 = 0x70b;
pub const PHASE_ECPAIRING_DATA: u16 = 0x80a;
pub const PHASE_ECPAIRING_RESULT: u16 = 0x80b;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MmuInstruction {
    MLoad = 0xfe01,
    MStore = 0xfe02,
    RightPaddedWordExtraction = 0xfe10,
    RamToExoWithPadding = 0xfe20,
    ExoToRamTransplants = 0xfe30,
    RamToRamSansPadding = 0xfe40,
    ModexpZero = 0xfe60,
    ModexpData = 0xfe70,
    Blake = 0xfe80,
}

impl MmuInstruction {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

bitflags::bitflags! {
    /// Exogenous modules an MMU call reads from or writes to. The bits are
    /// the weights of the MMU's `EXO_SUM` column.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ExoModules: u8 {
        const ROM = 1;
        const KEC = 1 << 1;
        const LOG = 1 << 2;
        const TXCD = 1 << 3;
        const EC_DATA = 1 << 4;
        const RIP_SHA = 1 << 5;
        const BLAKE_MODEXP = 1 << 6;
    }
}

/// One call to the memory management unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MmuCall {
    pub instruction: MmuInstruction,
    pub source_id: u32,
    pub target_id: u32,
    pub source_offset: u64,
    pub target_offset: u64,
    pub size: u64,
    pub reference_offset: u64,
    pub reference_size: u64,
    pub success_bit: bool,
    pub limb_1: U256,
    pub limb_2: U256,
    pub phase: u16,
    pub exo: ExoModules,
}

impl MmuCall {
    pub const fn new(instruction: MmuInstruction) -> Self {
        Self {
            instruction,
            source_id: 0,
            target_id: 0,
            source_offset: 0,
            target_offset: 0,
            size: 0,
            reference_offset: 0,
            reference_size: 0,
            success_bit: false,
            limb_1: U256::zero(),
            limb_2: U256::zero(),
            phase: 0,
            exo: ExoModules::empty(),
        }
    }

    pub const fn exo_sum(&self) -> u8 {
        self.exo.bits()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OobInstruction {
    EcRecover = 0xff01,
    Sha2 = 0xff02,
    Ripemd = 0xff03,
    Identity = 0xff04,
    EcAdd = 0xff06,
    EcMul = 0xff07,
    EcPairing = 0xff08,
    ModexpCds = 0xfa05,
    ModexpXbs = 0xfb05,
    ModexpLead = 0xfc05,
    ModexpPricing = 0xfd05,
    ModexpExtract = 0xfe05,
    BlakeCds = 0xfa09,
    BlakeParams = 0xfb09,
}

impl OobInstruction {
    pub const fn code(self) -> u16 {
        self as u16
    }
}

/// One call to the out-of-bounds module, with the arguments and results it
/// checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OobCall {
    /// The single check of the precompiles with a flat gas price or a price
    /// linear in the call data size.
    Common {
        instruction: OobInstruction,
        call_gas: u64,
        call_data_size: u64,
        return_at_capacity: u64,
        hub_success: bool,
        return_gas: u64,
    },
    ModexpCds {
        call_data_size: u64,
        extract_bbs: bool,
        extract_ebs: bool,
        extract_mbs: bool,
    },
    /// Bounds one of the three operand sizes. `compute_max` is set for the
    /// modulus size, compared against the base size.
    ModexpXbs {
        xbs: u64,
        ybs: u64,
        compute_max: bool,
    },
    ModexpLead {
        bbs: u64,
        call_data_size: u64,
        ebs: u64,
        load_lead: bool,
        cds_cutoff: u64,
        ebs_cutoff: u64,
        sub_ebs_32: u64,
    },
    ModexpPricing {
        call_gas: u64,
        return_at_capacity: u64,
        exponent_log: u64,
        max_mbs_bbs: u64,
        ram_success: bool,
        return_gas: u64,
    },
    ModexpExtract {
        call_data_size: u64,
        bbs: u64,
        ebs: u64,
        mbs: u64,
        extract_base: bool,
        extract_exponent: bool,
        extract_modulus: bool,
    },
    BlakeCds {
        call_data_size: u64,
        return_at_capacity: u64,
        hub_success: bool,
    },
    BlakeParams {
        call_gas: u64,
        rounds: u32,
        final_flag: u8,
        ram_success: bool,
        return_gas: u64,
    },
}

impl OobCall {
    pub const fn instruction(&self) -> OobInstruction {
        match self {
            OobCall::Common { instruction, .. } => *instruction,
            OobCall::ModexpCds { .. } => OobInstruction::ModexpCds,
            OobCall::ModexpXbs { .. } => OobInstruction::ModexpXbs,
            OobCall::ModexpLead { .. } => OobInstruction::ModexpLead,
            OobCall::ModexpPricing { .. } => OobInstruction::ModexpPricing,
            OobCall::ModexpExtract { .. } => OobInstruction::ModexpExtract,
            OobCall::BlakeCds { .. } => OobInstruction::BlakeCds,
            OobCall::BlakeParams { .. } => OobInstruction::BlakeParams,
        }
    }
}

pub const EXP_INST_MODEXPLOG: u16 = 0xee05;

/// Logarithm of the leading word of a MODEXP exponent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpCall {
    pub raw_leading_word: U256,
    pub cds_cutoff: u64,
    pub ebs_cutoff: u64,
    pub leading_word_log: u64,
}

impl ExpCall {
    pub const fn instruction(&self) -> u16 {
        EXP_INST_MODEXPLOG
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LowerLevelCall {
    Mmu(MmuCall),
    Oob(OobCall),
    Exp(ExpCall),
}

impl LowerLevelCall {
    pub fn as_mmu(&self) -> Option<&MmuCall> {
        match self {
            LowerLevelCall::Mmu(call) => Some(call),
            _ => None,
        }
    }

    pub const fn is_oob(&self) -> bool {
        matches!(self, LowerLevelCall::Oob(_))
    }

    pub const fn is_exp(&self) -> bool {
        matches!(self, LowerLevelCall::Exp(_))
    }
}

impl From<MmuCall> for LowerLevelCall {
    fn from(call: MmuCall) -> Self {
        LowerLevelCall::Mmu(call)
    }
}

impl From<OobCall> for LowerLevelCall {
    fn from(call: OobCall) -> Self {
        LowerLevelCall::Oob(call)
    }
}

impl From<ExpCall> for LowerLevelCall {
    fn from(call: ExpCall) -> Self {
        LowerLevelCall::Exp(call)
    }
}
