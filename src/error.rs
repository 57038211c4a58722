//! Error types for the transaction client

use thiserror::Error;

/// Main error type for transaction lifecycle operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Fee estimation unavailable: {0}")]
    EstimationUnavailable(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Extrinsic failed in block {block_hash}: {reason}")]
    SubmissionFailed { block_hash: String, reason: String },

    #[error("Finalized block feed unavailable: {0}")]
    MonitorUnavailable(String),

    #[error("Confirmation channel interrupted: {0}")]
    MonitorInterrupted(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain client error: {0}")]
    Chain(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Local input errors, detected before any network call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidAddress(_)
                | ClientError::InvalidAmount(_)
                | ClientError::InvalidSecret(_)
                | ClientError::InvalidBatch(_)
        )
    }

    /// Check if the caller may reasonably retry. Nothing inside the crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::EstimationUnavailable(_)
                | ClientError::MonitorUnavailable(_)
                | ClientError::MonitorInterrupted(_)
                | ClientError::Chain(_)
        )
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_validation() => 2,
            ClientError::SubmissionFailed { .. } => 3,
            ClientError::Cancelled => 4,
            _ => 1,
        }
    }
}

impl From<subxt::Error> for ClientError {
    fn from(e: subxt::Error) -> Self {
        ClientError::Chain(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Internal(format!("I/O error: {}", e))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
