//! Benchmarks committing a conflation: expanding the recorded chunks of every
//! module into trace tables and serializing them.
//!
//! The conflation holds deployment transactions with randomly sized receipts,
//! which exercises `rlpAddr`, `rlpUtils` and `rlpTxRcpt`.

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion};
use ethereum_types::{Address, H256, U256};
use rand::{Rng, SeedableRng};
use zktracer::host::{Log, Transaction, TransactionResult, TransactionType};
use zktracer::testing_utils::MockWorld;
use zktracer::{ConflationAwareTracer, TracerConfig, ZkTracer};

fn conflation(transactions: u64) -> ZkTracer {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    let world = MockWorld::default();
    let mut tracer = ZkTracer::new(TracerConfig::default());
    tracer.trace_start_conflation(1);
    tracer.trace_start_block(1);
    for nonce in 0..transactions {
        let tx = Transaction {
            tx_type: TransactionType::Eip1559,
            sender: Address::repeat_byte(0x42),
            to: None,
            nonce,
            value: U256::zero(),
            gas_limit: 1_000_000,
            payload: Bytes::new(),
        };
        let logs = (0..rng.gen_range(0..4))
            .map(|_| Log {
                address: Address::from(rng.gen::<[u8; 20]>()),
                topics: (0..rng.gen_range(0..=4))
                    .map(|_| H256::from(rng.gen::<[u8; 32]>()))
                    .collect(),
                data: (0..rng.gen_range(0..200)).map(|_| rng.gen()).collect(),
            })
            .collect();
        let result = TransactionResult {
            status: rng.gen(),
            output: Bytes::new(),
            logs,
            cumulative_gas_used: 21_000 * (nonce + 1),
        };
        tracer.trace_start_transaction(&world, &tx);
        tracer
            .trace_end_transaction(&world, &tx, &result)
            .expect("non-zero cumulative gas");
    }
    tracer.trace_end_block();
    tracer.trace_end_conflation(&world);
    tracer
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Commit");
    for transactions in [10, 100, 1_000] {
        let tracer = conflation(transactions);
        group.bench_function(format!("{transactions} deployments"), |b| {
            b.iter(|| tracer.commit().unwrap())
        });
        group.bench_function(format!("{transactions} deployments, trace file"), |b| {
            b.iter(|| {
                let mut out = Vec::new();
                tracer.write_trace_file(&mut out).unwrap();
                out
            })
        });
    }
    group.finish()
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = criterion_benchmark);
criterion_main!(benches);
