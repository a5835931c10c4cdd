use std::path::PathBuf;

use bytes::Bytes;
use ethereum_types::{Address, U256};
use trace_service::{
    generate_conflated_traces, BlockRange, BlockReplayer, RequestError, TraceRequest,
    TraceServiceConfig,
};
use zktracer::host::{Transaction, TransactionResult, TransactionType, WorldView};
use zktracer::testing_utils::MockWorld;
use zktracer::trace_file::read_trace_file;
use zktracer::ConflationAwareTracer;

/// Replays one deployment transaction per block.
#[derive(Default)]
struct DeployingReplayer {
    world: MockWorld,
    fail_at: Option<u64>,
    zero_gas_at: Option<u64>,
}

impl BlockReplayer for DeployingReplayer {
    fn replay_block(
        &mut self,
        block: u64,
        tracer: &mut dyn ConflationAwareTracer,
    ) -> anyhow::Result<()> {
        if self.fail_at == Some(block) {
            anyhow::bail!("block {block} not found");
        }
        let sender = Address::repeat_byte(0xaa);
        let nonce = self.world.nonce(&sender);
        let tx = Transaction {
            tx_type: TransactionType::Frontier,
            sender,
            to: None,
            nonce,
            value: U256::zero(),
            gas_limit: 100_000,
            payload: Bytes::from_static(&[0x00]),
        };
        let gas = if self.zero_gas_at == Some(block) {
            0
        } else {
            60_000
        };
        tracer.trace_start_transaction(&self.world, &tx);
        tracer.trace_end_transaction(
            &self.world,
            &tx,
            &TransactionResult {
                status: true,
                output: Bytes::new(),
                logs: vec![],
                cumulative_gas_used: gas,
            },
        )?;
        self.world.set_nonce(sender, nonce + 1);
        Ok(())
    }

    fn world(&self) -> &dyn WorldView {
        &self.world
    }
}

fn output_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("trace_service-{name}-{}", std::process::id()))
}

fn trace_files(dir: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => vec![],
    }
}

#[test]
fn writes_one_file_per_conflation() {
    trace_service::tracing::init();
    let dir = output_dir("ok");
    let config = TraceServiceConfig::new(&dir);
    let request = TraceRequest::new(BlockRange::new(10, 12).unwrap(), trace_service::version());

    let path =
        generate_conflated_traces(&config, &request, &mut DeployingReplayer::default()).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("10-12.conflated.{}.lt", trace_service::version())
    );
    assert_eq!(trace_files(&dir), vec![path.clone()]);

    let columns = read_trace_file(std::fs::File::open(&path).unwrap()).unwrap();
    let rlp_addr = columns
        .iter()
        .find(|c| c.name() == "rlpAddr.NONCE")
        .unwrap();
    // Three CREATE derivations of 8 rows each, for nonces 0, 1 and 2.
    assert_eq!(rlp_addr.rows(), 24);
    assert_eq!(rlp_addr.value(23), Some(U256::from(2)));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn rejected_requests_write_nothing() {
    let dir = output_dir("rejected");
    let config = TraceServiceConfig::new(&dir).with_engine_version("1.2.3");

    let request = TraceRequest::new(BlockRange::single(1), "1.2.2");
    let err = generate_conflated_traces(&config, &request, &mut DeployingReplayer::default())
        .unwrap_err();
    assert_eq!(err.code(), -32010);

    let request = TraceRequest {
        start_block: 5,
        end_block: 4,
        expected_version: "1.2.3".into(),
    };
    let err = generate_conflated_traces(&config, &request, &mut DeployingReplayer::default())
        .unwrap_err();
    assert_eq!(err.code(), -32602);

    assert!(trace_files(&dir).is_empty());
}

#[test]
fn failed_generations_write_nothing() {
    let dir = output_dir("failed");
    let config = TraceServiceConfig::new(&dir);
    let request = TraceRequest::new(BlockRange::new(1, 3).unwrap(), trace_service::version());

    let mut replayer = DeployingReplayer {
        fail_at: Some(2),
        ..Default::default()
    };
    let err = generate_conflated_traces(&config, &request, &mut replayer).unwrap_err();
    assert!(matches!(err, RequestError::ReplayFailed(_)));
    assert_eq!(err.code(), -32000);

    let mut replayer = DeployingReplayer {
        zero_gas_at: Some(3),
        ..Default::default()
    };
    let err = generate_conflated_traces(&config, &request, &mut replayer).unwrap_err();
    assert!(matches!(err, RequestError::TraceGenerationFailed(_)));
    assert_eq!(err.code(), -32603);

    assert!(trace_files(&dir).is_empty());
}
