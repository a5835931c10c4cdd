use zktracer_common::{InstructionFamily, OpCode, PrecompileKind};

use super::{AbortingConditions, Exceptions, FailureConditions};
use crate::host::{Frame, WorldView};

bitflags::bitflags! {
    /// Modules that must trace the current step.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Signals: u32 {
        const ADD = 1;
        const MUL = 1 << 1;
        const WCP = 1 << 2;
        const BIN = 1 << 3;
        const SHF = 1 << 4;
        const MOD = 1 << 5;
        const EXT = 1 << 6;
        const MMU = 1 << 7;
        const MXP = 1 << 8;
        const OOB = 1 << 9;
        const STP = 1 << 10;
        const EXP = 1 << 11;
        const TRM = 1 << 12;
        const HASH_INFO = 1 << 13;
        const ROM_LEX = 1 << 14;
        const RLP_ADDR = 1 << 15;
        const EC_DATA = 1 << 16;
        const GAS = 1 << 17;
        const BLOCKHASH = 1 << 18;
    }
}

const STACK_EXCEPTIONS: Exceptions = Exceptions::INVALID_OPCODE
    .union(Exceptions::STACK_UNDERFLOW)
    .union(Exceptions::STACK_OVERFLOW);

impl Signals {
    /// Decides which modules fire for the step `frame` is about to execute.
    pub fn prepare(
        frame: &Frame,
        world: &dyn WorldView,
        exceptions: Exceptions,
        aborts: AbortingConditions,
        failures: FailureConditions,
    ) -> Self {
        let Some(opcode) = frame.opcode() else {
            return Self::empty();
        };
        if exceptions.intersects(STACK_EXCEPTIONS) {
            return Self::empty();
        }

        let clean = exceptions.none();
        let mut signals = Self::GAS;
        let mut fire = |flags: Self, condition: bool| signals.set(flags, condition);

        match opcode.family() {
            InstructionFamily::Add => fire(Self::ADD, clean),
            InstructionFamily::Mul => {
                fire(Self::MUL, clean);
                fire(Self::EXP, clean && opcode == OpCode::Exp && !frame.arg(1).is_zero());
            }
            InstructionFamily::Mod => fire(Self::MOD, clean),
            InstructionFamily::Ext => fire(Self::EXT, clean),
            InstructionFamily::Wcp => fire(Self::WCP, clean),
            InstructionFamily::Bin => fire(Self::BIN, clean),
            InstructionFamily::Shf => fire(Self::SHF, clean),
            InstructionFamily::Kec => {
                let copies = clean && !frame.arg(1).is_zero();
                fire(Self::MXP, true);
                fire(Self::MMU | Self::HASH_INFO, copies);
            }
            InstructionFamily::Account => fire(Self::TRM, opcode != OpCode::SelfBalance),
            InstructionFamily::Copy => {
                let size = match opcode {
                    OpCode::ExtCodeCopy => frame.arg(3),
                    _ => frame.arg(2),
                };
                let copies = clean && !size.is_zero();
                fire(Self::MXP, true);
                fire(Self::MMU, copies);
                match opcode {
                    OpCode::ReturnDataCopy => fire(Self::OOB, true),
                    OpCode::ExtCodeCopy => {
                        let target = frame.address_arg(0);
                        fire(Self::TRM, true);
                        fire(Self::ROM_LEX, copies && world.has_code(&target));
                    }
                    OpCode::CodeCopy => fire(Self::ROM_LEX, copies),
                    _ => {}
                }
            }
            InstructionFamily::Batch => {
                if opcode == OpCode::BlockHash {
                    fire(Self::BLOCKHASH | Self::WCP, clean);
                }
            }
            InstructionFamily::StackRam => match opcode {
                OpCode::CallDataLoad => fire(Self::OOB | Self::MMU, clean),
                _ => {
                    fire(Self::MXP, true);
                    fire(Self::MMU, clean);
                }
            },
            InstructionFamily::Jump => fire(
                Self::OOB,
                !exceptions.intersects(Exceptions::OUT_OF_GAS),
            ),
            InstructionFamily::MachineState => fire(Self::MXP, opcode == OpCode::MSize),
            InstructionFamily::Log => {
                let static_fault = exceptions.contains(Exceptions::STATIC_FAULT);
                fire(Self::MXP, !static_fault);
                fire(Self::MMU, clean && !frame.arg(1).is_zero());
            }
            InstructionFamily::Create => {
                let sized = !exceptions
                    .intersects(Exceptions::STATIC_FAULT | Exceptions::MAX_CODE_SIZE);
                let no_mxpx = sized && !exceptions.contains(Exceptions::MEMORY_EXPANSION);
                let proceeds = clean && aborts.none();
                let deploys = proceeds && !failures.any() && !frame.arg(2).is_zero();
                fire(Self::MXP, sized);
                fire(Self::STP, no_mxpx);
                fire(Self::OOB, sized);
                fire(Self::RLP_ADDR, proceeds);
                fire(Self::HASH_INFO, deploys && opcode == OpCode::Create2);
                fire(Self::ROM_LEX | Self::MMU, deploys);
            }
            InstructionFamily::Call => {
                let static_fault = exceptions.contains(Exceptions::STATIC_FAULT);
                let no_mxpx = !static_fault && !exceptions.contains(Exceptions::MEMORY_EXPANSION);
                let callee = frame.address_arg(1);
                let proceeds = clean && aborts.none();
                let precompile = PrecompileKind::from_address(&callee).filter(|_| proceeds);
                fire(Self::TRM, true);
                fire(Self::MXP, !static_fault);
                fire(Self::STP | Self::OOB, no_mxpx);
                fire(Self::ROM_LEX, proceeds && precompile.is_none() && world.has_code(&callee));
                fire(Self::MMU, precompile.is_some());
                fire(
                    Self::EC_DATA,
                    precompile.is_some_and(PrecompileKind::is_ec_data),
                );
                fire(
                    Self::EXP,
                    precompile == Some(PrecompileKind::ModExp),
                );
            }
            InstructionFamily::Halt => match opcode {
                OpCode::Return | OpCode::Revert => {
                    let copies = clean && !frame.arg(1).is_zero();
                    fire(Self::MXP, !exceptions.contains(Exceptions::MAX_CODE_SIZE));
                    fire(Self::MMU, copies);
                    fire(
                        Self::ROM_LEX | Self::HASH_INFO,
                        copies && opcode == OpCode::Return && frame.is_deployment,
                    );
                }
                OpCode::SelfDestruct => fire(Self::TRM, true),
                _ => {}
            },
            InstructionFamily::Context
            | InstructionFamily::Transaction
            | InstructionFamily::Storage
            | InstructionFamily::PushPop
            | InstructionFamily::Dup
            | InstructionFamily::Swap
            | InstructionFamily::Invalid => {}
        }
        signals
    }

    /// An independent copy of the current signals.
    pub const fn snapshot(&self) -> Self {
        *self
    }

    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    pub const fn rlp_addr(&self) -> bool {
        self.contains(Self::RLP_ADDR)
    }

    pub const fn stp(&self) -> bool {
        self.contains(Self::STP)
    }

    pub const fn ec_data(&self) -> bool {
        self.contains(Self::EC_DATA)
    }
}
