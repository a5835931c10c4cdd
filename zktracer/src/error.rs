use ethereum_types::U256;
use thiserror::Error;

/// Violations of the trace construction invariants.
///
/// None of these describe a property of the traced execution: they all mean
/// that the row encoding logic is wrong, and that any trace produced so far
/// must be discarded.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("{column} already set")]
    AlreadySet { column: String },

    #[error("{column} has not been filled")]
    NotFilled { column: String },

    #[error("{module}: row {row} exceeds the {capacity} rows planned for the table")]
    CapacityExceeded {
        module: String,
        row: usize,
        capacity: usize,
    },

    #[error("{module}: cannot measure a trace with a non-validated row")]
    RowInProgress { module: String },

    #[error("{module}: planned {expected} rows but {actual} were written")]
    RowCountMismatch {
        module: String,
        expected: usize,
        actual: usize,
    },

    #[error("{column}: a {len}-byte value does not fit in {byte_width} bytes")]
    ValueTooWide {
        column: String,
        len: usize,
        byte_width: usize,
    },

    #[error("{module}: no column at index {index}")]
    UnknownColumn { module: String, index: usize },

    #[error("a transaction receipt must report a non-zero cumulative gas used")]
    ZeroCumulativeGas,

    #[error("{module}: {counter} is {remaining} instead of 0 at the end of phase {phase}")]
    SizeCounterMismatch {
        module: &'static str,
        counter: &'static str,
        remaining: i64,
        phase: u8,
    },

    #[error("{module}: {reason}")]
    InvalidChunk { module: &'static str, reason: String },

    #[error("hub: {operand} {value} does not fit in {bits} bits")]
    OperandOutOfRange {
        operand: &'static str,
        value: U256,
        bits: u32,
    },

    #[error("failed to write trace file: {0}")]
    Io(#[from] std::io::Error),
}
