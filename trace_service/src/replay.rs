use std::path::PathBuf;

use tracing::{info, info_span, warn};
use zktracer::host::WorldView;
use zktracer::{ConflationAwareTracer, ZkTracer};

use crate::config::TraceServiceConfig;
use crate::fs::{conflated_trace_file_path, write_atomically};
use crate::request::{RequestError, TraceRequest};

/// An execution client able to re-execute historical blocks while reporting
/// to a tracer.
pub trait BlockReplayer {
    /// Re-executes `block`, emitting the transaction and opcode callbacks of
    /// its execution. Block boundaries are reported by the caller.
    fn replay_block(
        &mut self,
        block: u64,
        tracer: &mut dyn ConflationAwareTracer,
    ) -> anyhow::Result<()>;

    /// The world state once the last replayed block executed.
    fn world(&self) -> &dyn WorldView;
}

/// Traces the blocks of `request` as a single conflation and writes the
/// trace file into the configured output directory. Returns its path.
///
/// Nothing is written unless the whole conflation traced successfully.
pub fn generate_conflated_traces<R: BlockReplayer + ?Sized>(
    config: &TraceServiceConfig,
    request: &TraceRequest,
    replayer: &mut R,
) -> Result<PathBuf, RequestError> {
    let range = request.validate(config.engine_version())?;
    let span = info_span!("conflation", blocks = %range);
    let _guard = span.enter();

    let mut tracer = ZkTracer::new(config.tracer().clone());
    tracer.trace_start_conflation(range.len());
    for block in range {
        tracer.trace_start_block(block);
        replayer
            .replay_block(block, &mut tracer)
            .map_err(RequestError::from_replay)?;
        tracer.trace_end_block();
    }
    tracer.trace_end_conflation(replayer.world());

    for overflow in tracer.overflowing_modules() {
        warn!(
            module = %overflow.module,
            line_count = overflow.line_count,
            limit = overflow.limit,
            "module line count above its limit"
        );
    }

    let path = conflated_trace_file_path(
        config.traces_output_dir(),
        &range,
        config.engine_version(),
    );
    write_atomically(&path, |out| tracer.write_trace_file(out))?;
    info!("Wrote conflated trace file {}", path.display());
    Ok(path)
}
