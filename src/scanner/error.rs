//! Scanner-specific error handling.

use thiserror::Error;

/// Errors raised by the detection workflow.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Missing or invalid operator input, or an operation invoked in an
    /// incompatible phase. Never reaches the network.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Network unreachable, request timeout, or non-2xx response from the
    /// scoring or ledger service. Always retryable.
    #[error("Request to detection service failed: {0}")]
    Transport(String),

    /// Response body matched none of the supported payload shapes.
    #[error("Could not interpret detection response: {0}")]
    Normalization(String),

    /// Commit attempted on a result that is not commit-eligible.
    #[error("Commit conflict: {0}")]
    CommitConflict(String),
}

impl ScanError {
    /// Whether the failed operation can be retried as-is.
    ///
    /// Transport and commit-conflict failures leave the controller in a
    /// state from which the same operation can be re-invoked; validation
    /// failures require corrected input first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Transport(_) | ScanError::CommitConflict(_))
    }
}

// Note: anyhow already has a blanket impl for thiserror::Error types
