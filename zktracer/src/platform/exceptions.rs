use ethereum_types::U256;
use zktracer_common::constants::{
    EIP_3541_MARKER, GAS_CONST_G_CALL_STIPEND, MAX_CODE_SIZE, MAX_INIT_CODE_SIZE, MAX_STACK_SIZE,
    MEMORY_EXPANSION_BOUND,
};
use zktracer_common::OpCode;

use crate::host::Frame;

bitflags::bitflags! {
    /// Exceptional halting conditions of one execution step.
    ///
    /// At most one flag is ever set: [`Exceptions::from_frame`] reports the
    /// first condition met, in the order of the flags' values, except for
    /// the code size and the opcode specific conditions, see there.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Exceptions: u16 {
        const INVALID_OPCODE = 1;
        const STACK_UNDERFLOW = 1 << 1;
        const STACK_OVERFLOW = 1 << 2;
        const MEMORY_EXPANSION = 1 << 3;
        const OUT_OF_GAS = 1 << 4;
        const RETURN_DATA_COPY_FAULT = 1 << 5;
        const JUMP_FAULT = 1 << 6;
        const STATIC_FAULT = 1 << 7;
        const OUT_OF_SSTORE = 1 << 8;
        const INVALID_CODE_PREFIX = 1 << 9;
        const MAX_CODE_SIZE = 1 << 10;
    }
}

impl Exceptions {
    /// Classifies the step `frame` is about to execute.
    ///
    /// The checks run in a fixed order and the first one to fail wins:
    /// invalid opcode, stack underflow, stack overflow, static fault, code
    /// size, memory expansion, out of gas, the opcode specific faults
    /// (return data copy, jump, SSTORE stipend), and finally the code prefix
    /// of deployed code.
    pub fn from_frame(frame: &Frame) -> Self {
        let Some(opcode) = frame.opcode().filter(|op| *op != OpCode::Invalid) else {
            return Self::INVALID_OPCODE;
        };
        let info = opcode.info();
        let height = frame.stack.len();

        if height < info.delta {
            return Self::STACK_UNDERFLOW;
        }
        if height - info.delta + info.alpha > MAX_STACK_SIZE {
            return Self::STACK_OVERFLOW;
        }
        if is_static_fault(frame, opcode) {
            return Self::STATIC_FAULT;
        }
        if is_code_size_overflow(frame, opcode) {
            return Self::MAX_CODE_SIZE;
        }
        if is_memory_expansion_fault(frame, opcode) {
            return Self::MEMORY_EXPANSION;
        }
        if frame.gas_cost > frame.gas_remaining {
            return Self::OUT_OF_GAS;
        }
        match opcode {
            OpCode::ReturnDataCopy if is_return_data_copy_fault(frame) => {
                return Self::RETURN_DATA_COPY_FAULT
            }
            OpCode::Jump | OpCode::JumpI if is_jump_fault(frame, opcode) => {
                return Self::JUMP_FAULT
            }
            OpCode::SStore if frame.gas_remaining <= GAS_CONST_G_CALL_STIPEND => {
                return Self::OUT_OF_SSTORE
            }
            _ => {}
        }
        if is_invalid_code_prefix(frame, opcode) {
            return Self::INVALID_CODE_PREFIX;
        }
        Self::empty()
    }

    /// Whether the step halts exceptionally.
    pub const fn any(self) -> bool {
        !self.is_empty()
    }

    pub const fn none(self) -> bool {
        self.is_empty()
    }
}

/// Size of a memory access: read from the stack, or implied by the opcode.
#[derive(Clone, Copy, Debug)]
enum AccessSize {
    Stack(usize),
    Fixed(u64),
}

/// Memory ranges an opcode reads or writes, as (offset, size) stack positions.
fn memory_accesses(opcode: OpCode) -> &'static [(usize, AccessSize)] {
    use AccessSize::{Fixed, Stack};
    match opcode {
        OpCode::Keccak256 | OpCode::Return | OpCode::Revert | OpCode::Log(_) => {
            &[(0, Stack(1))]
        }
        OpCode::CallDataCopy | OpCode::CodeCopy | OpCode::ReturnDataCopy => &[(0, Stack(2))],
        OpCode::ExtCodeCopy => &[(1, Stack(3))],
        OpCode::MCopy => &[(0, Stack(2)), (1, Stack(2))],
        OpCode::MLoad | OpCode::MStore => &[(0, Fixed(32))],
        OpCode::MStore8 => &[(0, Fixed(1))],
        OpCode::Create | OpCode::Create2 => &[(1, Stack(2))],
        OpCode::Call | OpCode::CallCode => &[(3, Stack(4)), (5, Stack(6))],
        OpCode::DelegateCall | OpCode::StaticCall => &[(2, Stack(3)), (4, Stack(5))],
        _ => &[],
    }
}

/// Whether some non-empty memory range accessed by `opcode` ends beyond the
/// addressable memory.
pub(crate) fn is_memory_expansion_fault(frame: &Frame, opcode: OpCode) -> bool {
    let bound = U256::from(MEMORY_EXPANSION_BOUND);
    memory_accesses(opcode).iter().any(|(offset, size)| {
        let size = match size {
            AccessSize::Stack(n) => frame.arg(*n),
            AccessSize::Fixed(size) => U256::from(*size),
        };
        if size.is_zero() {
            return false;
        }
        let offset = frame.arg(*offset);
        offset >= bound || size >= bound || offset + size > bound
    })
}

fn is_static_fault(frame: &Frame, opcode: OpCode) -> bool {
    if !frame.is_static {
        return false;
    }
    opcode.info().forbidden_in_static || (opcode == OpCode::Call && !frame.arg(2).is_zero())
}

fn is_code_size_overflow(frame: &Frame, opcode: OpCode) -> bool {
    match opcode {
        OpCode::Create | OpCode::Create2 => frame.arg(2) > U256::from(MAX_INIT_CODE_SIZE),
        OpCode::Return => frame.is_deployment && frame.arg(1) > U256::from(MAX_CODE_SIZE),
        _ => false,
    }
}

fn is_return_data_copy_fault(frame: &Frame) -> bool {
    let offset = frame.arg(1);
    let size = frame.arg(2);
    let (end, overflow) = offset.overflowing_add(size);
    overflow || end > U256::from(frame.return_data.len())
}

fn is_jump_fault(frame: &Frame, opcode: OpCode) -> bool {
    if opcode == OpCode::JumpI && frame.arg(1).is_zero() {
        return false;
    }
    let destination = frame.arg(0);
    destination >= U256::from(frame.code.len())
        || !frame
            .jump_destinations()
            .contains(&(destination.low_u64() as usize))
}

fn is_invalid_code_prefix(frame: &Frame, opcode: OpCode) -> bool {
    opcode == OpCode::Return
        && frame.is_deployment
        && !frame.arg(1).is_zero()
        && frame.memory_slice(frame.arg(0).low_u64(), 1)[0] == EIP_3541_MARKER
}
