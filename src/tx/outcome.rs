//! Submission outcome state machine

use crate::error::{ClientError, ClientResult};

use serde::Serialize;
use std::fmt;

/// Where a submission stands. Moves strictly forward; `Succeeded` and
/// `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Pending,
    InBlock { block_hash: String },
    Finalized { block_hash: String },
    Succeeded { block_hash: String, tx_hash: String },
    Failed { block_hash: String, reason: String },
}

impl SubmissionOutcome {
    fn rank(&self) -> u8 {
        match self {
            SubmissionOutcome::Pending => 0,
            SubmissionOutcome::InBlock { .. } => 1,
            SubmissionOutcome::Finalized { .. } => 2,
            SubmissionOutcome::Succeeded { .. } | SubmissionOutcome::Failed { .. } => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SubmissionOutcome::Pending => "pending",
            SubmissionOutcome::InBlock { .. } => "in_block",
            SubmissionOutcome::Finalized { .. } => "finalized",
            SubmissionOutcome::Succeeded { .. } => "succeeded",
            SubmissionOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }

    /// Block the outcome refers to, if any
    pub fn block_hash(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Pending => None,
            SubmissionOutcome::InBlock { block_hash }
            | SubmissionOutcome::Finalized { block_hash }
            | SubmissionOutcome::Succeeded { block_hash, .. }
            | SubmissionOutcome::Failed { block_hash, .. } => Some(block_hash),
        }
    }

    /// Move to `next` if it is strictly further along
    pub fn advance(&self, next: SubmissionOutcome) -> ClientResult<SubmissionOutcome> {
        if self.is_terminal() || next.rank() <= self.rank() {
            return Err(ClientError::InvalidStateTransition {
                from: self.name().to_string(),
                to: next.name().to_string(),
            });
        }
        Ok(next)
    }

    /// Treat an on-chain failure as an error
    pub fn into_result(self) -> ClientResult<SubmissionOutcome> {
        match self {
            SubmissionOutcome::Failed { block_hash, reason } => {
                Err(ClientError::SubmissionFailed { block_hash, reason })
            }
            other => Ok(other),
        }
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Pending => write!(f, "pending"),
            SubmissionOutcome::InBlock { block_hash } => write!(f, "in block {}", block_hash),
            SubmissionOutcome::Finalized { block_hash } => write!(f, "finalized in {}", block_hash),
            SubmissionOutcome::Succeeded {
                block_hash,
                tx_hash,
            } => write!(f, "{} succeeded in block {}", tx_hash, block_hash),
            SubmissionOutcome::Failed { block_hash, reason } => {
                write!(f, "failed in block {}: {}", block_hash, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_block() -> SubmissionOutcome {
        SubmissionOutcome::InBlock {
            block_hash: "0xaa".into(),
        }
    }

    fn succeeded() -> SubmissionOutcome {
        SubmissionOutcome::Succeeded {
            block_hash: "0xaa".into(),
            tx_hash: "0x01".into(),
        }
    }

    #[test]
    fn test_forward_transitions() {
        let pending = SubmissionOutcome::Pending;
        let next = pending.advance(in_block()).unwrap();
        assert_eq!(next, in_block());
        assert!(next.advance(succeeded()).unwrap().is_terminal());
    }

    #[test]
    fn test_backward_and_repeated_transitions_rejected() {
        assert!(matches!(
            in_block().advance(SubmissionOutcome::Pending),
            Err(ClientError::InvalidStateTransition { .. })
        ));
        assert!(in_block().advance(in_block()).is_err());
    }

    #[test]
    fn test_terminal_is_final() {
        let failed = SubmissionOutcome::Failed {
            block_hash: "0xbb".into(),
            reason: "BadOrigin".into(),
        };
        assert!(succeeded().advance(failed.clone()).is_err());
        assert!(failed.advance(succeeded()).is_err());
    }

    #[test]
    fn test_into_result() {
        let failed = SubmissionOutcome::Failed {
            block_hash: "0xbb".into(),
            reason: "Module { index: 5, error: [2, 0, 0, 0] }".into(),
        };
        assert_eq!(
            failed.into_result(),
            Err(ClientError::SubmissionFailed {
                block_hash: "0xbb".into(),
                reason: "Module { index: 5, error: [2, 0, 0, 0] }".into(),
            })
        );
        assert_eq!(succeeded().into_result(), Ok(succeeded()));
    }
}
