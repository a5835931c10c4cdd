use serde::{Deserialize, Serialize};
use zktracer::TraceError;

use crate::block_range::BlockRange;

/// Parameters of a conflated trace generation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRequest {
    pub start_block: u64,
    pub end_block: u64,
    /// Version of the trace engine the caller expects to run.
    pub expected_version: String,
}

impl TraceRequest {
    pub fn new(range: BlockRange, expected_version: impl Into<String>) -> Self {
        Self {
            start_block: range.start(),
            end_block: range.end(),
            expected_version: expected_version.into(),
        }
    }

    /// Checks the request against the engine serving it, and returns the
    /// blocks to trace.
    pub fn validate(&self, engine_version: &str) -> Result<BlockRange, RequestError> {
        let range = BlockRange::new(self.start_block, self.end_block).ok_or(
            RequestError::InvalidBlockRange {
                start: self.start_block,
                end: self.end_block,
            },
        )?;
        if self.expected_version != engine_version {
            return Err(RequestError::VersionMismatch {
                expected: self.expected_version.clone(),
                actual: engine_version.to_owned(),
            });
        }
        Ok(range)
    }
}

/// Why a request was not served. Every variant maps to a stable JSON-RPC
/// error code.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid block range: start block {start} is after end block {end}")]
    InvalidBlockRange { start: u64, end: u64 },

    #[error("trace engine version mismatch: expected {expected}, running {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("block replay failed: {0:#}")]
    ReplayFailed(anyhow::Error),

    #[error("trace generation failed: {0}")]
    TraceGenerationFailed(#[from] TraceError),
}

impl RequestError {
    pub const INVALID_PARAMS: i32 = -32602;
    pub const VERSION_MISMATCH: i32 = -32010;
    pub const REPLAY_FAILED: i32 = -32000;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const fn code(&self) -> i32 {
        match self {
            RequestError::InvalidBlockRange { .. } => Self::INVALID_PARAMS,
            RequestError::VersionMismatch { .. } => Self::VERSION_MISMATCH,
            RequestError::ReplayFailed(_) => Self::REPLAY_FAILED,
            RequestError::TraceGenerationFailed(_) => Self::INTERNAL_ERROR,
        }
    }

    /// Classifies a replay error: trace invariant violations surfacing
    /// through the replayer are still trace generation failures.
    pub fn from_replay(err: anyhow::Error) -> Self {
        match err.downcast::<TraceError>() {
            Ok(err) => RequestError::TraceGenerationFailed(err),
            Err(err) => RequestError::ReplayFailed(err),
        }
    }
}
