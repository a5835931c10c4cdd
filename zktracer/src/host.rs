//! What the tracer sees of the host EVM.
//!
//! The host executes transactions and reports every step through the
//! [`ConflationAwareTracer`](crate::ConflationAwareTracer) callbacks, passing
//! a [`Frame`] snapshot for opcode steps and a [`WorldView`] to query account
//! state.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use zktracer_common::OpCode;

/// Read access to the world state, as of the current execution step.
pub trait WorldView {
    fn nonce(&self, address: &Address) -> u64;
    fn balance(&self, address: &Address) -> U256;
    fn code(&self, address: &Address) -> Bytes;

    fn has_code(&self, address: &Address) -> bool {
        !self.code(address).is_empty()
    }

    /// Whether the account is non-empty in the EIP-161 sense.
    fn exists(&self, address: &Address) -> bool {
        self.nonce(address) != 0 || !self.balance(address).is_zero() || self.has_code(address)
    }

    /// Whether the address is in the access list of the running transaction.
    fn is_warm(&self, address: &Address) -> bool;
}

/// The state of the executing call frame right before an opcode executes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// The opcode byte about to be executed.
    pub opcode: u8,
    pub pc: usize,
    /// Stack items, bottom first: the top of the stack is the last item.
    pub stack: Vec<U256>,
    pub memory: Vec<u8>,
    pub gas_remaining: u64,
    /// Gas the host charges upfront for this opcode, memory expansion
    /// included.
    pub gas_cost: u64,
    /// Memory expansion part of `gas_cost`.
    pub memory_expansion_cost: u64,
    /// Call depth, 0 for the transaction's root frame.
    pub depth: usize,
    pub is_static: bool,
    /// Whether the frame runs init code.
    pub is_deployment: bool,
    /// The account whose code runs.
    pub recipient: Address,
    pub code: Bytes,
    pub return_data: Bytes,
}

impl Frame {
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_byte(self.opcode)
    }

    /// The `n`-th stack item from the top, `0` being the top.
    pub fn stack_item(&self, n: usize) -> Option<U256> {
        self.stack
            .len()
            .checked_sub(n + 1)
            .map(|index| self.stack[index])
    }

    /// Like [`Frame::stack_item`], reading missing items as zero.
    pub fn arg(&self, n: usize) -> U256 {
        self.stack_item(n).unwrap_or_default()
    }

    /// Address argument at stack position `n`.
    pub fn address_arg(&self, n: usize) -> Address {
        let mut word = [0u8; 32];
        self.arg(n).to_big_endian(&mut word);
        Address::from_slice(&word[12..])
    }

    /// Memory slice `[offset, offset + size)`, zero-extended past the end of
    /// the active memory.
    pub fn memory_slice(&self, offset: u64, size: u64) -> Vec<u8> {
        let mut out = vec![0; size as usize];
        let start = offset as usize;
        if start < self.memory.len() {
            let end = self.memory.len().min(start + size as usize);
            out[..end - start].copy_from_slice(&self.memory[start..end]);
        }
        out
    }

    /// Valid `JUMPDEST` positions of the frame's code, skipping push data.
    pub fn jump_destinations(&self) -> HashSet<usize> {
        let mut destinations = HashSet::new();
        let mut pc = 0;
        while pc < self.code.len() {
            match OpCode::from_byte(self.code[pc]) {
                Some(OpCode::JumpDest) => {
                    destinations.insert(pc);
                }
                Some(OpCode::Push(n)) => pc += n as usize,
                _ => {}
            }
            pc += 1;
        }
        destinations
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[default]
    Frontier,
    AccessList,
    Eip1559,
}

impl TransactionType {
    /// The EIP-2718 type byte. Legacy transactions have none.
    pub const fn type_byte(self) -> Option<u8> {
        match self {
            TransactionType::Frontier => None,
            TransactionType::AccessList => Some(1),
            TransactionType::Eip1559 => Some(2),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: TransactionType,
    pub sender: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas_limit: u64,
    pub payload: Bytes,
}

impl Transaction {
    pub const fn is_deployment(&self) -> bool {
        self.to.is_none()
    }
}

/// A log entry emitted by a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// The outcome of a transaction, as reported at its end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub status: bool,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Cumulative gas used in the block after this transaction.
    pub cumulative_gas_used: u64,
}
