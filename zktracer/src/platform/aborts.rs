use ethereum_types::U256;
use zktracer_common::constants::{EIP_2681_MAX_NONCE, MAX_CALL_DEPTH};
use zktracer_common::OpCode;

use crate::host::{Frame, WorldView};

bitflags::bitflags! {
    /// Conditions under which a CALL or CREATE returns immediately with
    /// failure, without entering a child frame.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AbortingConditions: u8 {
        const CALL_STACK_OVERFLOW = 1;
        const BALANCE_TOO_LOW = 1 << 1;
        const NONCE_OVERFLOW = 1 << 2;
    }
}

impl AbortingConditions {
    /// Only meaningful for a step without exceptions.
    pub fn prepare(frame: &Frame, world: &dyn WorldView) -> Self {
        let Some(opcode) = frame.opcode() else {
            return Self::empty();
        };
        let value = match opcode {
            OpCode::Call | OpCode::CallCode => frame.arg(2),
            OpCode::DelegateCall | OpCode::StaticCall => U256::zero(),
            OpCode::Create | OpCode::Create2 => frame.arg(0),
            _ => return Self::empty(),
        };

        let mut aborts = Self::empty();
        if frame.depth >= MAX_CALL_DEPTH {
            aborts |= Self::CALL_STACK_OVERFLOW;
        }
        if value > world.balance(&frame.recipient) {
            aborts |= Self::BALANCE_TOO_LOW;
        }
        if opcode.is_create() && world.nonce(&frame.recipient) == EIP_2681_MAX_NONCE {
            aborts |= Self::NONCE_OVERFLOW;
        }
        aborts
    }

    pub const fn any(self) -> bool {
        !self.is_empty()
    }

    pub const fn none(self) -> bool {
        self.is_empty()
    }
}
