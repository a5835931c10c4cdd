use ethereum_types::{Address, H256};
use zktracer_common::OpCode;

use crate::host::{Frame, WorldView};
use crate::rlp_addr::{create2_address, create_address};

bitflags::bitflags! {
    /// Failures of an instruction that passed the exception and abort checks.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FailureConditions: u8 {
        const DEPLOYMENT_ADDRESS_COLLISION = 1;
    }
}

impl FailureConditions {
    /// Only meaningful for a step without exceptions nor aborts.
    pub fn prepare(frame: &Frame, world: &dyn WorldView) -> Self {
        match deployment_address(frame, world) {
            Some(target) if world.nonce(&target) != 0 || world.has_code(&target) => {
                Self::DEPLOYMENT_ADDRESS_COLLISION
            }
            _ => Self::empty(),
        }
    }

    pub const fn any(self) -> bool {
        !self.is_empty()
    }
}

/// The address a CREATE or CREATE2 about to execute deploys to.
pub fn deployment_address(frame: &Frame, world: &dyn WorldView) -> Option<Address> {
    let deployer = frame.recipient;
    match frame.opcode()? {
        OpCode::Create => Some(create_address(&deployer, world.nonce(&deployer))),
        OpCode::Create2 => {
            let init_code = init_code(frame);
            let mut salt = H256::zero();
            frame.arg(3).to_big_endian(salt.as_bytes_mut());
            Some(create2_address(
                &deployer,
                &salt,
                &keccak_hash::keccak(init_code),
            ))
        }
        _ => None,
    }
}

/// Init code of a CREATE or CREATE2, read from memory.
pub fn init_code(frame: &Frame) -> Vec<u8> {
    let size = frame.arg(2);
    if size.is_zero() {
        return vec![];
    }
    frame.memory_slice(frame.arg(1).low_u64(), size.low_u64())
}
