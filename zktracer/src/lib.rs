//! Execution trace generation for a zk-EVM.
//!
//! While a host replays the transactions of a conflation, [`ZkTracer`]
//! consumes its execution callbacks and records, per trace module, the
//! inputs ("chunks") each module has to arithmetize. Once the conflation is
//! over, every module expands its chunks into the rows of a fixed-width
//! columnar [`table::TraceTable`], and the tables are written out as a single
//! trace file.
//!
//! Row counts are always known before a table is allocated: each module
//! reports its [`module::Module::line_count`] first, the table is sized
//! accordingly, and writing one row more or less than planned is a
//! [`TraceError`].
//!
//! Which modules a step involves is decided by the
//! [`platform::PlatformController`]: it classifies the exceptions, aborts and
//! failures of the instruction about to execute, and raises one signal per
//! module that has to trace it.

#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]

extern crate self as zktracer;

// Trace table machinery
pub mod column;
pub mod container;
pub mod encoding;
pub mod error;
pub mod table;
pub mod trace_file;

// Modules
pub mod limits;
pub mod module;
pub mod rlp_addr;
pub mod rlp_txrcpt;
pub mod rlp_utils;
pub mod stp;

// Per-step dispatch and the hub
pub mod config;
pub mod host;
pub mod platform;
pub mod precompiles;
pub mod tracer;

// Utility modules
pub mod testing_utils;

// Public definitions and re-exports
/// Version of the tracer; trace files are only comparable between identical
/// versions.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::TracerConfig;
pub use error::TraceError;
pub use tracer::{ConflationAwareTracer, ModuleOverflow, ZkTracer};
pub use zktracer_proc_macro::TraceRow;
