//! The hub: binds the host's execution callbacks to the trace modules.

use std::collections::BTreeMap;
use std::io::Write;

use ethereum_types::{H256, U256};
use itertools::Itertools;
use zktracer_common::{OpCode, PrecompileKind};

use crate::config::TracerConfig;
use crate::container::StackedList;
use crate::error::TraceError;
use crate::host::{Frame, Transaction, TransactionResult, WorldView};
use crate::limits::PrecompileLimits;
use crate::module::Module;
use crate::platform::{init_code, PlatformController};
use crate::precompiles::{PrecompileCall, PrecompileInvocation, PrecompileOutcome};
use crate::rlp_addr::RlpAddr;
use crate::rlp_txrcpt::RlpTxRcpt;
use crate::rlp_utils::{RlpUtils, RlpUtilsCall};
use crate::stp::{Stp, StpChunk};
use crate::table::{ModuleTrace, TraceTable};

/// The callbacks a host emits while executing the blocks of a conflation.
///
/// Callbacks come in strictly nested order: a conflation holds blocks, a
/// block holds transactions, and every opcode of a transaction is wrapped by
/// one `trace_pre_opcode` and one `trace_post_opcode` call.
pub trait ConflationAwareTracer {
    fn trace_start_conflation(&mut self, block_count: u64);

    fn trace_end_conflation(&mut self, world: &dyn WorldView);

    fn trace_start_block(&mut self, number: u64);

    fn trace_end_block(&mut self);

    fn trace_start_transaction(&mut self, world: &dyn WorldView, tx: &Transaction);

    fn trace_end_transaction(
        &mut self,
        world: &dyn WorldView,
        tx: &Transaction,
        result: &TransactionResult,
    ) -> Result<(), TraceError>;

    /// Called with the frame about to execute an instruction.
    fn trace_pre_opcode(&mut self, frame: &Frame, world: &dyn WorldView)
        -> Result<(), TraceError>;

    /// Called with the same frame once the instruction has executed.
    fn trace_post_opcode(&mut self, frame: &Frame) -> Result<(), TraceError>;
}

/// A module whose line count went over its configured limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleOverflow {
    pub module: String,
    pub line_count: usize,
    pub limit: usize,
}

/// A precompile call seen before execution, completed after it.
#[derive(Debug)]
struct PendingPrecompile {
    kind: PrecompileKind,
    depth: usize,
    call: PrecompileCall,
}

/// Traces one conflation.
#[derive(Debug)]
pub struct ZkTracer {
    config: TracerConfig,
    platform: PlatformController,

    rlp_addr: RlpAddr,
    rlp_txrcpt: RlpTxRcpt,
    rlp_utils: RlpUtils,
    stp: Stp,
    limits: PrecompileLimits,

    invocations: StackedList<PrecompileInvocation>,
    pending_precompile: Option<PendingPrecompile>,
    /// Context numbers of the frames of the current transaction, indexed by
    /// depth.
    contexts: Vec<u32>,

    block_count: u64,
    blocks_seen: u64,
    current_block: Option<u64>,
    /// Absolute number of the current transaction, starting at 1.
    tx_number: u64,
    /// Number of steps traced so far in the conflation.
    stamp: u64,
}

impl ZkTracer {
    pub fn new(config: TracerConfig) -> Self {
        Self {
            config,
            platform: PlatformController::new(),
            rlp_addr: RlpAddr::new(),
            rlp_txrcpt: RlpTxRcpt::new(),
            rlp_utils: RlpUtils::new(),
            stp: Stp::new(),
            limits: PrecompileLimits::new(),
            invocations: StackedList::new(),
            pending_precompile: None,
            contexts: vec![],
            block_count: 0,
            blocks_seen: 0,
            current_block: None,
            tx_number: 0,
            stamp: 0,
        }
    }

    pub const fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// The controller state of the last traced step.
    pub const fn platform(&self) -> &PlatformController {
        &self.platform
    }

    pub const fn rlp_addr(&self) -> &RlpAddr {
        &self.rlp_addr
    }

    pub const fn rlp_txrcpt(&self) -> &RlpTxRcpt {
        &self.rlp_txrcpt
    }

    pub const fn rlp_utils(&self) -> &RlpUtils {
        &self.rlp_utils
    }

    pub const fn stp(&self) -> &Stp {
        &self.stp
    }

    pub const fn limits(&self) -> &PrecompileLimits {
        &self.limits
    }

    /// Every precompile call of the committed transactions, in call order.
    pub fn precompile_invocations(&self) -> impl Iterator<Item = &PrecompileInvocation> {
        self.invocations.iter()
    }

    pub const fn tx_number(&self) -> u64 {
        self.tx_number
    }

    pub const fn stamp(&self) -> u64 {
        self.stamp
    }

    pub const fn block_count(&self) -> u64 {
        self.block_count
    }

    fn modules(&self) -> Vec<&dyn Module> {
        let mut modules: Vec<&dyn Module> =
            vec![&self.rlp_addr, &self.rlp_txrcpt, &self.rlp_utils, &self.stp];
        modules.extend(self.limits.counters().iter().map(|c| c as &dyn Module));
        modules
    }

    fn modules_mut(&mut self) -> Vec<&mut dyn Module> {
        let mut modules: Vec<&mut dyn Module> = vec![
            &mut self.rlp_addr,
            &mut self.rlp_txrcpt,
            &mut self.rlp_utils,
            &mut self.stp,
        ];
        modules.extend(
            self.limits
                .counters_mut()
                .iter_mut()
                .map(|c| c as &mut dyn Module),
        );
        modules
    }

    /// Discards everything the last transaction recorded.
    pub fn pop_transaction(&mut self) {
        for module in self.modules_mut() {
            module.pop_transaction();
        }
        self.invocations.pop();
        self.pending_precompile = None;
        self.contexts.clear();
    }

    /// Line count of every module, keyed by its JSON key.
    pub fn line_counts(&self) -> BTreeMap<String, usize> {
        self.modules()
            .into_iter()
            .map(|module| (module.json_key().to_owned(), module.line_count()))
            .collect()
    }

    /// Modules whose line count exceeds the limit configured for them.
    pub fn overflowing_modules(&self) -> Vec<ModuleOverflow> {
        self.line_counts()
            .into_iter()
            .filter_map(|(module, line_count)| {
                let limit = *self.config.module_limits.get(&module)?;
                (line_count > limit).then_some(ModuleOverflow {
                    module,
                    line_count,
                    limit,
                })
            })
            .collect()
    }

    /// Expands the chunks of every module into its trace table. Modules
    /// without columns produce no table.
    pub fn commit(&self) -> Result<Vec<ModuleTrace>, TraceError> {
        let mut traces = vec![];
        for module in self.modules() {
            let headers = module.columns_headers();
            if headers.is_empty() {
                continue;
            }
            let mut table = TraceTable::new(module.module_key(), headers);
            module.commit(&mut table)?;
            let trace = table.build()?;
            log::debug!("{}: {} rows", trace.module(), trace.rows());
            traces.push(trace);
        }
        Ok(traces)
    }

    /// Commits every module and writes the resulting trace file.
    pub fn write_trace_file<W: Write>(&self, out: W) -> Result<(), TraceError> {
        let traces = self.commit()?;
        crate::trace_file::write_trace_file(out, &traces)
    }

    /// Context number of the frame at `depth`, allocating one for a frame
    /// entered since the last step.
    fn context_at(&mut self, depth: usize) -> Result<u32, TraceError> {
        self.contexts.truncate(depth + 1);
        while self.contexts.len() <= depth {
            self.contexts.push(to_u32("stamp", self.stamp)?);
        }
        Ok(self.contexts[depth])
    }

    fn trace_rlp_addr(&mut self, frame: &Frame, world: &dyn WorldView) {
        let deployer = frame.recipient;
        match frame.opcode() {
            Some(OpCode::Create) => {
                let nonce = world.nonce(&deployer);
                self.rlp_addr.call_create(deployer, nonce);
                self.rlp_utils.call(RlpUtilsCall::Integer(nonce));
            }
            Some(OpCode::Create2) => {
                let mut salt = H256::zero();
                frame.arg(3).to_big_endian(salt.as_bytes_mut());
                self.rlp_addr
                    .call_create2(deployer, salt, &init_code(frame));
            }
            _ => {}
        }
    }

    /// Records a call to a precompile that passed the exception and abort
    /// checks. It is classified once the host reports how it went.
    fn prepare_precompile(
        &mut self,
        frame: &Frame,
        stp: &StpChunk,
        kind: PrecompileKind,
    ) -> Result<(), TraceError> {
        let opcode = stp.opcode;
        let first_memory_arg = if opcode.call_has_value_argument() { 3 } else { 2 };
        let (call_data_offset, call_data_size) = memory_range(frame, first_memory_arg)?;
        let (return_at_offset, return_at_capacity) = memory_range(frame, first_memory_arg + 2)?;
        let call_data = if call_data_size == 0 {
            vec![]
        } else {
            frame.memory_slice(call_data_offset, call_data_size)
        };
        let caller_context = self.context_at(frame.depth)?;
        self.pending_precompile = Some(PendingPrecompile {
            kind,
            depth: frame.depth,
            call: PrecompileCall {
                call_data: call_data.into(),
                call_data_offset,
                return_at_offset,
                return_at_capacity,
                callee_gas: stp.gas_out_of_pocket() + stp.gas_stipend(),
                caller_context,
                exo_id: to_u32("stamp", self.stamp + 1)?,
            },
        });
        Ok(())
    }
}

fn to_u32(operand: &'static str, value: u64) -> Result<u32, TraceError> {
    u32::try_from(value).map_err(|_| TraceError::OperandOutOfRange {
        operand,
        value: value.into(),
        bits: 32,
    })
}

/// The offset and size arguments at `index` and `index + 1`. An empty range
/// has no offset: the EVM ignores it however large it is. A non-empty one
/// fits, as the step passed the memory expansion check.
fn memory_range(frame: &Frame, index: usize) -> Result<(u64, u64), TraceError> {
    let to_u64 = |operand: &'static str, value: U256| {
        if value > U256::from(u64::MAX) {
            Err(TraceError::OperandOutOfRange {
                operand,
                value,
                bits: 64,
            })
        } else {
            Ok(value.low_u64())
        }
    };
    let size = to_u64("memory size", frame.arg(index + 1))?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((to_u64("memory offset", frame.arg(index))?, size))
}

impl ConflationAwareTracer for ZkTracer {
    fn trace_start_conflation(&mut self, block_count: u64) {
        log::info!("Starting conflation of {block_count} blocks");
        self.block_count = block_count;
        self.blocks_seen = 0;
    }

    fn trace_end_conflation(&mut self, _world: &dyn WorldView) {
        if self.blocks_seen != self.block_count {
            log::warn!(
                "Conflation announced {} blocks but traced {}",
                self.block_count,
                self.blocks_seen
            );
        }
        log::info!(
            "Conflation done: {} transactions, {} steps",
            self.tx_number,
            self.stamp
        );
        log::debug!(
            "Line counts: {}",
            self.line_counts()
                .iter()
                .map(|(module, count)| format!("{module}={count}"))
                .join(", ")
        );
        for overflow in self.overflowing_modules() {
            log::warn!(
                "{} has {} lines, above its limit of {}",
                overflow.module,
                overflow.line_count,
                overflow.limit
            );
        }
    }

    fn trace_start_block(&mut self, number: u64) {
        log::debug!("Starting block {number}");
        self.current_block = Some(number);
        self.blocks_seen += 1;
    }

    fn trace_end_block(&mut self) {
        self.current_block = None;
    }

    fn trace_start_transaction(&mut self, _world: &dyn WorldView, tx: &Transaction) {
        self.tx_number += 1;
        log::debug!(
            "Transaction #{} from {:?} (block {:?})",
            self.tx_number,
            tx.sender,
            self.current_block
        );
        for module in self.modules_mut() {
            module.enter_transaction();
        }
        self.invocations.enter();
        self.pending_precompile = None;
        self.contexts.clear();

        if tx.is_deployment() {
            self.rlp_addr.call_create(tx.sender, tx.nonce);
            self.rlp_utils.call(RlpUtilsCall::Integer(tx.nonce));
        }
    }

    fn trace_end_transaction(
        &mut self,
        _world: &dyn WorldView,
        tx: &Transaction,
        result: &TransactionResult,
    ) -> Result<(), TraceError> {
        if result.cumulative_gas_used == 0 {
            return Err(TraceError::ZeroCumulativeGas);
        }
        for prefix in self.rlp_txrcpt.call_end_transaction(tx.tx_type, result) {
            self.rlp_utils.call(prefix);
        }
        self.pending_precompile = None;
        Ok(())
    }

    fn trace_pre_opcode(
        &mut self,
        frame: &Frame,
        world: &dyn WorldView,
    ) -> Result<(), TraceError> {
        self.stamp += 1;
        self.platform.setup(frame, world);
        let signals = self.platform.signals();

        if signals.rlp_addr() {
            self.trace_rlp_addr(frame, world);
        }

        let Some(stp) = StpChunk::from_frame(frame, world, self.platform.exceptions()) else {
            return Ok(());
        };
        if signals.stp() {
            self.stp.call(stp.clone());
        }
        if stp.opcode.is_call()
            && self.platform.exceptions().none()
            && self.platform.aborts().none()
        {
            if let Some(kind) = PrecompileKind::from_address(&frame.address_arg(1)) {
                self.prepare_precompile(frame, &stp, kind)?;
            }
        }
        Ok(())
    }

    fn trace_post_opcode(&mut self, frame: &Frame) -> Result<(), TraceError> {
        if !matches!(&self.pending_precompile, Some(pending) if pending.depth == frame.depth) {
            return Ok(());
        }
        let Some(pending) = self.pending_precompile.take() else {
            return Ok(());
        };
        let outcome = PrecompileOutcome::from_post_frame(frame);
        let invocation = PrecompileInvocation::new(pending.kind, pending.call, &outcome)?;
        if invocation.success() {
            self.limits
                .record(invocation.kind, &invocation.call.call_data);
        }
        log::trace!(
            "{:?}(0x{}) at step {}: hub failure {}, ram failure {}",
            invocation.kind,
            hex::encode(&invocation.call.call_data),
            self.stamp,
            invocation.hub_failure,
            invocation.ram_failure
        );
        self.invocations.push(invocation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ethereum_types::{Address, U256};

    use super::*;
    use crate::host::TransactionType;
    use crate::limits::CountedResource;
    use crate::testing_utils::{init_logger, MockWorld};

    fn transfer(sender: Address, to: Option<Address>, nonce: u64) -> Transaction {
        Transaction {
            tx_type: TransactionType::Eip1559,
            sender,
            to,
            nonce,
            value: U256::zero(),
            gas_limit: 100_000,
            payload: Bytes::new(),
        }
    }

    fn success(cumulative_gas_used: u64) -> TransactionResult {
        TransactionResult {
            status: true,
            output: Bytes::new(),
            logs: vec![],
            cumulative_gas_used,
        }
    }

    #[test]
    fn deployment_transactions_derive_an_address() {
        init_logger();
        let sender = Address::repeat_byte(0x11);
        let mut world = MockWorld::default();
        world.set_nonce(sender, 3);
        let mut tracer = ZkTracer::new(TracerConfig::default());

        tracer.trace_start_conflation(1);
        tracer.trace_start_block(1);
        let tx = transfer(sender, None, 3);
        tracer.trace_start_transaction(&world, &tx);
        tracer
            .trace_end_transaction(&world, &tx, &success(53_000))
            .unwrap();
        tracer.trace_end_block();
        tracer.trace_end_conflation(&world);

        let counts = tracer.line_counts();
        assert_eq!(counts["rlpAddr"], 8);
        // The nonce, and the prefix of the receipt.
        assert_eq!(counts["rlpUtils"], 1 + 8);
        assert_eq!(tracer.tx_number(), 1);
    }

    #[test]
    fn popped_transactions_leave_no_trace() {
        let sender = Address::repeat_byte(0x11);
        let world = MockWorld::default();
        let mut tracer = ZkTracer::new(TracerConfig::default());

        tracer.trace_start_conflation(1);
        let tx = transfer(sender, None, 0);
        tracer.trace_start_transaction(&world, &tx);
        tracer.pop_transaction();

        assert!(tracer.line_counts().values().all(|&count| count == 0));
        assert!(tracer.commit().unwrap().iter().all(|t| t.rows() == 0));
    }

    #[test]
    fn zero_cumulative_gas_is_an_error() {
        let world = MockWorld::default();
        let mut tracer = ZkTracer::new(TracerConfig::default());
        let tx = transfer(Address::zero(), Some(Address::zero()), 0);
        tracer.trace_start_transaction(&world, &tx);
        assert!(matches!(
            tracer.trace_end_transaction(&world, &tx, &success(0)),
            Err(TraceError::ZeroCumulativeGas)
        ));
    }

    #[test]
    fn precompile_calls_are_classified_after_execution() {
        let world = MockWorld::default();
        let mut tracer = ZkTracer::new(TracerConfig::default());
        let tx = transfer(Address::zero(), Some(Address::repeat_byte(0x42)), 0);
        tracer.trace_start_transaction(&world, &tx);

        // STATICCALL(gas, 0x02, 0, 3, 0, 32) with "abc" in memory.
        let mut frame = Frame {
            opcode: OpCode::StaticCall.byte(),
            stack: [32u64, 0, 3, 0, 2, 10_000]
                .into_iter()
                .map(U256::from)
                .collect(),
            memory: b"abc".to_vec(),
            gas_remaining: 100_000,
            gas_cost: 100,
            depth: 1,
            ..Default::default()
        };
        tracer.trace_pre_opcode(&frame, &world).unwrap();
        assert!(tracer.platform().signals().stp());

        frame.stack = vec![U256::one()];
        tracer.trace_post_opcode(&frame).unwrap();

        let invocations: Vec<_> = tracer.precompile_invocations().collect();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].kind, PrecompileKind::Sha2_256);
        assert!(invocations[0].success());
        assert_eq!(invocations[0].call.call_data.as_ref(), b"abc");
        assert_eq!(invocations[0].call.callee_gas, 10_000);
        assert_eq!(tracer.limits().count(CountedResource::Sha2Blocks), 1);
        assert_eq!(tracer.stp().chunks().count(), 1);
    }

    #[test]
    fn empty_memory_ranges_ignore_their_offset() {
        let world = MockWorld::default();
        let mut tracer = ZkTracer::new(TracerConfig::default());
        let tx = transfer(Address::zero(), Some(Address::repeat_byte(0x42)), 0);
        tracer.trace_start_transaction(&world, &tx);

        // STATICCALL(gas, 0x04, 2**255, 0, 2**255, 0)
        let far = U256::one() << 255;
        let mut frame = Frame {
            opcode: OpCode::StaticCall.byte(),
            stack: vec![0.into(), far, 0.into(), far, 4.into(), 10_000.into()],
            gas_remaining: 100_000,
            gas_cost: 100,
            ..Default::default()
        };
        assert_eq!(memory_range(&frame, 2).unwrap(), (0, 0));
        tracer.trace_pre_opcode(&frame, &world).unwrap();
        frame.stack = vec![U256::one()];
        tracer.trace_post_opcode(&frame).unwrap();

        let invocation = tracer.precompile_invocations().next().unwrap();
        assert_eq!(invocation.kind, PrecompileKind::Identity);
        assert_eq!(invocation.call.call_data_offset, 0);
        assert_eq!(invocation.call.return_at_offset, 0);

        // A non-empty range that far out never passes the expansion check.
        let frame = Frame {
            stack: vec![0.into(), 0.into(), 1.into(), far],
            ..Default::default()
        };
        assert!(matches!(
            memory_range(&frame, 0),
            Err(TraceError::OperandOutOfRange {
                operand: "memory offset",
                bits: 64,
                ..
            })
        ));
        assert!(matches!(
            to_u32("stamp", u64::from(u32::MAX) + 1),
            Err(TraceError::OperandOutOfRange { bits: 32, .. })
        ));
    }

    #[test]
    fn overflowing_modules_are_reported() {
        let world = MockWorld::default();
        let config = TracerConfig::default()
            .with_limit("rlpAddr", 7)
            .with_limit("rlpTxRcpt", 1_000);
        let mut tracer = ZkTracer::new(config);
        let tx = transfer(Address::zero(), None, 0);
        tracer.trace_start_transaction(&world, &tx);
        tracer
            .trace_end_transaction(&world, &tx, &success(21_000))
            .unwrap();

        assert_eq!(
            tracer.overflowing_modules(),
            vec![ModuleOverflow {
                module: "rlpAddr".to_owned(),
                line_count: 8,
                limit: 7,
            }]
        );
    }
}
