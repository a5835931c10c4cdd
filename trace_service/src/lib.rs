//! The request boundary of the tracer: validates trace generation requests,
//! drives an execution client's block replay through a [`zktracer::ZkTracer`]
//! and writes the resulting conflated trace file.

pub mod block_range;
pub mod config;
pub mod fs;
pub mod replay;
pub mod request;
pub mod tracing;

pub use block_range::BlockRange;
pub use config::{ServiceConfig, TraceServiceConfig};
pub use replay::{generate_conflated_traces, BlockReplayer};
pub use request::{RequestError, TraceRequest};

/// Version of the trace engine, which requests must name to be served.
pub fn version() -> String {
    zktracer::VERSION.to_owned()
}
