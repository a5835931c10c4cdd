//! Numeric constants of the EVM and of the trace format.

/// Size in bytes of a limb column.
pub const LLARGE: usize = 16;
/// Size in bytes of an EVM word.
pub const WORD_SIZE: usize = 32;

pub const RLP_PREFIX_INT_SHORT: u8 = 0x80;
pub const RLP_PREFIX_INT_LONG: u8 = 0xb7;
pub const RLP_PREFIX_LIST_SHORT: u8 = 0xc0;
pub const RLP_PREFIX_LIST_LONG: u8 = 0xf7;

pub const RLP_ADDR_RECIPE_1: u8 = 1;
pub const RLP_ADDR_RECIPE_2: u8 = 2;
pub const CREATE2_SHIFT: u8 = 0xff;

/// Maximum call depth of the EVM.
pub const MAX_CALL_DEPTH: usize = 1024;
/// Maximum number of items on the EVM stack.
pub const MAX_STACK_SIZE: usize = 1024;
/// Maximum size of deployed code (EIP-170).
pub const MAX_CODE_SIZE: usize = 0x6000;
/// Maximum size of init code (EIP-3860).
pub const MAX_INIT_CODE_SIZE: usize = 2 * MAX_CODE_SIZE;
/// First byte rejected in deployed code (EIP-3541).
pub const EIP_3541_MARKER: u8 = 0xef;
/// Largest nonce an account may reach (EIP-2681).
pub const EIP_2681_MAX_NONCE: u64 = u64::MAX;
/// Memory offsets at or beyond this bound raise a memory expansion exception.
pub const MEMORY_EXPANSION_BOUND: u64 = 1 << 32;

pub const GAS_CONST_G_CALL_STIPEND: u64 = 2300;
pub const GAS_CONST_G_CALL_VALUE: u64 = 9000;
pub const GAS_CONST_G_NEW_ACCOUNT: u64 = 25000;
pub const GAS_CONST_G_COLD_ACCOUNT_ACCESS: u64 = 2600;
pub const GAS_CONST_G_WARM_ACCESS: u64 = 100;
pub const GAS_CONST_G_CREATE: u64 = 32000;
pub const GAS_CONST_G_INIT_CODE_WORD: u64 = 2;
pub const GAS_CONST_G_KECCAK_256_WORD: u64 = 6;

pub const GAS_CONST_ECRECOVER: u64 = 3000;
pub const GAS_CONST_SHA2: u64 = 60;
pub const GAS_CONST_SHA2_WORD: u64 = 12;
pub const GAS_CONST_RIPEMD: u64 = 600;
pub const GAS_CONST_RIPEMD_WORD: u64 = 120;
pub const GAS_CONST_IDENTITY: u64 = 15;
pub const GAS_CONST_IDENTITY_WORD: u64 = 3;
pub const GAS_CONST_MODEXP_MIN: u64 = 200;
pub const GAS_CONST_MODEXP_QUAD_DIVISOR: u64 = 3;
pub const GAS_CONST_ECADD: u64 = 150;
pub const GAS_CONST_ECMUL: u64 = 6000;
pub const GAS_CONST_ECPAIRING: u64 = 45000;
pub const GAS_CONST_ECPAIRING_PAIR: u64 = 34000;
pub const GAS_CONST_BLAKE2F_ROUND: u64 = 1;

pub const PRECOMPILE_CALL_DATA_SIZE_ECRECOVER: usize = 128;
pub const PRECOMPILE_CALL_DATA_SIZE_ECADD: usize = 128;
pub const PRECOMPILE_CALL_DATA_SIZE_ECMUL: usize = 96;
pub const PRECOMPILE_CALL_DATA_UNIT_SIZE_ECPAIRING: usize = 192;
pub const PRECOMPILE_CALL_DATA_SIZE_BLAKE2F: usize = 213;
pub const PRECOMPILE_RETURN_DATA_SIZE_ECADD: usize = 64;
pub const PRECOMPILE_RETURN_DATA_SIZE_BLAKE2F: usize = 64;
/// Size of the base/exponent/modulus length header of a MODEXP call.
pub const MODEXP_HEADER_SIZE: usize = 96;
/// MODEXP operands wider than this are rejected by the arithmetization.
pub const MODEXP_MAX_OPERAND_SIZE: usize = 512;
