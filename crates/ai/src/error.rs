use std::time::Duration;

use thiserror::Error;

/// Failure of one external stage call.
///
/// All variants are transient from the orchestrator's point of view and
/// eligible for retry. Deterministic rejections (policy disapproval) are not
/// errors — see [`crate::PolicyOutcome`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The external call itself failed (network, rate limit, 5xx).
    #[error("stage call failed: {0}")]
    Transport(String),

    /// The call succeeded but the response did not match the contract.
    #[error("stage produced invalid output: {0}")]
    InvalidOutput(String),

    /// The call exceeded its per-attempt deadline.
    #[error("stage timed out after {0:?}")]
    Timeout(Duration),
}

impl StageError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }
}
