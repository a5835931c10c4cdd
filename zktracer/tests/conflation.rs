//! Drives a whole conflation through the public callback interface, the way
//! a host replaying blocks would.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use zktracer::host::{Frame, Log, Transaction, TransactionResult, TransactionType};
use zktracer::limits::CountedResource;
use zktracer::testing_utils::{init_logger, MockWorld};
use zktracer::trace_file::read_trace_file;
use zktracer::{ConflationAwareTracer, TracerConfig, ZkTracer};
use zktracer_common::{OpCode, PrecompileKind};

const CONTRACT: Address = Address::repeat_byte(0xc0);

fn words(stack_top_first: &[u64]) -> Vec<U256> {
    stack_top_first.iter().rev().map(|&x| U256::from(x)).collect()
}

fn call_tx(sender: Address, nonce: u64) -> Transaction {
    Transaction {
        tx_type: TransactionType::Eip1559,
        sender,
        to: Some(CONTRACT),
        nonce,
        value: U256::zero(),
        gas_limit: 1_000_000,
        payload: Bytes::new(),
    }
}

fn receipt(cumulative_gas_used: u64, logs: Vec<Log>) -> TransactionResult {
    TransactionResult {
        status: true,
        output: Bytes::new(),
        logs,
        cumulative_gas_used,
    }
}

/// CREATE of a 4-byte init code from `CONTRACT`.
fn create_frame() -> Frame {
    Frame {
        opcode: OpCode::Create.byte(),
        // value, offset, size
        stack: words(&[0, 0, 4]),
        memory: vec![0x60, 0x00, 0x60, 0x00],
        gas_remaining: 1_000_000,
        gas_cost: 32_002,
        depth: 0,
        recipient: CONTRACT,
        ..Default::default()
    }
}

/// STATICCALL of `precompile` with the first `size` bytes of memory as input.
fn precompile_frame(precompile: PrecompileKind, size: u64) -> Frame {
    let address = U256::from_big_endian(precompile.address().as_bytes());
    let mut stack = words(&[50_000, 0, 0, size, 0, 32]);
    let len = stack.len();
    stack[len - 2] = address;
    Frame {
        opcode: OpCode::StaticCall.byte(),
        stack,
        memory: vec![0xab; size as usize],
        gas_remaining: 900_000,
        gas_cost: 2_600,
        depth: 0,
        recipient: CONTRACT,
        ..Default::default()
    }
}

/// The caller's frame once a call returned `success`.
fn returned(mut frame: Frame, success: bool) -> Frame {
    frame.stack = vec![U256::from(u8::from(success))];
    frame
}

#[test]
fn conflation_with_a_reverted_transaction() -> anyhow::Result<()> {
    init_logger();

    let sender = Address::repeat_byte(0x5e);
    let mut world = MockWorld::default();
    world.set_nonce(CONTRACT, 1);
    world.set_code(CONTRACT, Bytes::from_static(&[0x00]));

    let mut tracer = ZkTracer::new(TracerConfig::with_chain_id(59144));
    tracer.trace_start_conflation(2);

    // Block 1: a CREATE and a SHA2-256 call, with one log.
    tracer.trace_start_block(1);
    let tx = call_tx(sender, 0);
    tracer.trace_start_transaction(&world, &tx);
    let create = create_frame();
    tracer.trace_pre_opcode(&create, &world)?;
    tracer.trace_post_opcode(&returned(create, true))?;
    let sha = precompile_frame(PrecompileKind::Sha2_256, 100);
    tracer.trace_pre_opcode(&sha, &world)?;
    tracer.trace_post_opcode(&returned(sha, true))?;
    let log = Log {
        address: CONTRACT,
        topics: vec![H256::repeat_byte(1), H256::repeat_byte(2)],
        data: Bytes::from(vec![7; 40]),
    };
    tracer.trace_end_transaction(&world, &tx, &receipt(80_000, vec![log]))?;
    tracer.trace_end_block();

    let after_block_1 = tracer.line_counts();

    // Block 2: a reverted transaction, then a plain one.
    tracer.trace_start_block(2);
    let reverted = call_tx(sender, 1);
    tracer.trace_start_transaction(&world, &reverted);
    let create = create_frame();
    tracer.trace_pre_opcode(&create, &world)?;
    let sha = precompile_frame(PrecompileKind::Sha2_256, 300);
    tracer.trace_pre_opcode(&sha, &world)?;
    tracer.trace_post_opcode(&returned(sha, true))?;
    tracer.pop_transaction();

    let plain = call_tx(sender, 1);
    tracer.trace_start_transaction(&world, &plain);
    tracer.trace_end_transaction(&world, &plain, &receipt(101_000, vec![]))?;
    tracer.trace_end_block();
    tracer.trace_end_conflation(&world);

    let counts = tracer.line_counts();
    assert_eq!(counts["rlpAddr"], 8);
    assert_eq!(counts["rlpAddr"], after_block_1["rlpAddr"]);
    // The CREATE nonce, then six distinct prefixes of 8 rows: the first
    // receipt, its log list, log entry, topics and data, and the second
    // receipt.
    assert_eq!(counts["rlpUtils"], 1 + 6 * 8);
    // CREATE: 2 rows, STATICCALL: 4 rows.
    assert_eq!(counts["stp"], 6);
    assert!(counts["rlpTxRcpt"] > after_block_1["rlpTxRcpt"]);
    assert_eq!(tracer.limits().count(CountedResource::Sha2Blocks), 2);
    assert_eq!(tracer.precompile_invocations().count(), 1);
    assert!(tracer.overflowing_modules().is_empty());

    let mut file = vec![];
    tracer.write_trace_file(&mut file)?;
    let columns = read_trace_file(file.as_slice())?;
    assert_eq!(columns.len(), 25 + 43 + 16 + 29);
    for column in &columns {
        let (module, _) = column.name().split_once('.').unwrap();
        assert_eq!(column.rows(), counts[module], "{}", column.name());
    }

    Ok(())
}

#[test]
fn receipt_prefixes_are_traced_once() -> anyhow::Result<()> {
    let world = MockWorld::default();
    let mut tracer = ZkTracer::new(TracerConfig::default());
    tracer.trace_start_conflation(1);
    tracer.trace_start_block(1);

    // Both gas amounts take two bytes: the receipts have the same size.
    for (nonce, gas) in [(0, 21_000), (1, 42_000)] {
        let tx = call_tx(Address::zero(), nonce);
        tracer.trace_start_transaction(&world, &tx);
        tracer.trace_end_transaction(&world, &tx, &receipt(gas, vec![]))?;
    }
    assert_eq!(tracer.line_counts()["rlpUtils"], 8);

    let reverted = call_tx(Address::zero(), 2);
    tracer.trace_start_transaction(&world, &reverted);
    tracer.trace_end_transaction(&world, &reverted, &receipt(1_000_000, vec![]))?;
    assert_eq!(tracer.line_counts()["rlpUtils"], 16);
    tracer.pop_transaction();
    assert_eq!(tracer.line_counts()["rlpUtils"], 8);

    tracer.trace_end_block();
    tracer.trace_end_conflation(&world);
    let traces = tracer.commit()?;
    let rlp_utils = traces
        .iter()
        .find(|trace| trace.module() == "rlpUtils")
        .unwrap();
    assert_eq!(rlp_utils.rows(), 8);
    Ok(())
}

#[test]
fn failed_precompiles_are_not_counted() -> anyhow::Result<()> {
    let world = MockWorld::default();
    let mut tracer = ZkTracer::new(TracerConfig::default());
    let tx = call_tx(Address::zero(), 0);
    tracer.trace_start_transaction(&world, &tx);

    // 100 bytes is not a multiple of the 192-byte pairing input.
    let pairing = precompile_frame(PrecompileKind::EcPairing, 100);
    tracer.trace_pre_opcode(&pairing, &world)?;
    tracer.trace_post_opcode(&returned(pairing, false))?;

    let invocation = tracer.precompile_invocations().next().unwrap();
    assert!(invocation.hub_failure);
    assert_eq!(invocation.return_gas, 0);
    assert_eq!(
        tracer
            .limits()
            .count(CountedResource::EcPairingEffectiveCalls),
        0
    );
    Ok(())
}

#[test]
fn limits_are_checked_per_module() -> anyhow::Result<()> {
    let world = MockWorld::default();
    let config = TracerConfig::default().with_limit("stp", 3);
    let mut tracer = ZkTracer::new(config);
    let tx = call_tx(Address::zero(), 0);
    tracer.trace_start_transaction(&world, &tx);
    tracer.trace_pre_opcode(&precompile_frame(PrecompileKind::Identity, 0), &world)?;

    let overflows = tracer.overflowing_modules();
    assert_eq!(overflows.len(), 1);
    assert_eq!(overflows[0].module, "stp");
    assert_eq!(overflows[0].line_count, 4);
    Ok(())
}
