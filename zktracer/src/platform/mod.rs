//! Per-step decisions: which exceptional condition, abort or failure the
//! next instruction runs into, and which modules must trace it.

mod aborts;
mod exceptions;
mod failures;
mod signals;

pub use aborts::AbortingConditions;
pub use exceptions::Exceptions;
pub use failures::{deployment_address, init_code, FailureConditions};
pub use signals::Signals;

use crate::host::{Frame, WorldView};

/// Holds the conditions of the step being traced. Everything is recomputed
/// by [`PlatformController::setup`]; nothing carries over from one step to
/// the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlatformController {
    exceptions: Exceptions,
    aborts: AbortingConditions,
    failures: FailureConditions,
    signals: Signals,
}

impl PlatformController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Classifies the step `frame` is about to execute.
    ///
    /// Aborts are only checked without exceptions, and failures only without
    /// aborts.
    pub fn setup(&mut self, frame: &Frame, world: &dyn WorldView) {
        self.reset();
        self.exceptions = Exceptions::from_frame(frame);
        if self.exceptions.none() {
            self.aborts = AbortingConditions::prepare(frame, world);
            if self.aborts.none() {
                self.failures = FailureConditions::prepare(frame, world);
            }
        }
        self.signals = Signals::prepare(frame, world, self.exceptions, self.aborts, self.failures);
    }

    pub const fn exceptions(&self) -> Exceptions {
        self.exceptions
    }

    pub const fn aborts(&self) -> AbortingConditions {
        self.aborts
    }

    pub const fn failures(&self) -> FailureConditions {
        self.failures
    }

    pub const fn signals(&self) -> Signals {
        self.signals
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::Address;
    use zktracer_common::constants::MAX_CALL_DEPTH;
    use zktracer_common::OpCode;

    use super::*;
    use crate::testing_utils::MockWorld;

    #[test]
    fn exceptions_mask_aborts() {
        let world = MockWorld::default();
        let mut frame = Frame {
            opcode: OpCode::Call.byte(),
            stack: vec![0.into(); 7],
            depth: MAX_CALL_DEPTH,
            gas_remaining: 10,
            ..Default::default()
        };
        let mut controller = PlatformController::new();
        controller.setup(&frame, &world);
        assert!(controller.exceptions().none());
        assert_eq!(controller.aborts(), AbortingConditions::CALL_STACK_OVERFLOW);

        frame.gas_cost = 11;
        controller.setup(&frame, &world);
        assert_eq!(controller.exceptions(), Exceptions::OUT_OF_GAS);
        assert!(controller.aborts().none());
    }

    #[test]
    fn aborts_mask_failures() {
        let deployer = Address::repeat_byte(0x22);
        let mut world = MockWorld::default();
        world.set_nonce(
            crate::rlp_addr::create_address(&deployer, 0),
            1,
        );
        let frame = Frame {
            opcode: OpCode::Create.byte(),
            stack: vec![0.into(), 0.into(), 1.into()],
            recipient: deployer,
            ..Default::default()
        };
        let mut controller = PlatformController::new();
        controller.setup(&frame, &world);
        assert_eq!(controller.aborts(), AbortingConditions::BALANCE_TOO_LOW);
        assert!(!controller.failures().any());

        world.set_balance(deployer, 1.into());
        controller.setup(&frame, &world);
        assert!(controller.aborts().none());
        assert_eq!(
            controller.failures(),
            FailureConditions::DEPLOYMENT_ADDRESS_COLLISION
        );
        assert!(controller.signals().rlp_addr());
    }

    #[test]
    fn setup_starts_from_scratch() {
        let world = MockWorld::default();
        let mut controller = PlatformController::new();
        controller.setup(
            &Frame {
                opcode: 0xfe,
                ..Default::default()
            },
            &world,
        );
        assert_eq!(controller.exceptions(), Exceptions::INVALID_OPCODE);
        controller.setup(
            &Frame {
                opcode: OpCode::Stop.byte(),
                ..Default::default()
            },
            &world,
        );
        assert!(controller.exceptions().none());
        assert_eq!(controller.signals(), Signals::GAS);
    }
}
