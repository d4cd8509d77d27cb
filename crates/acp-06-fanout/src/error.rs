//! Error types for the Fan-out Manager

use acp_04_commit_log::ReplayError;
use shared_types::{ResumeInvalid, TokenError};
use thiserror::Error;
use uuid::Uuid;

/// Why `subscribe` refused a request.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The supplied resume token cannot be honored; the caller must
    /// resubscribe from the current tip.
    #[error("Resume refused: {0}")]
    ResumeInvalid(#[from] ResumeInvalid),
}

impl From<ReplayError> for SubscribeError {
    fn from(err: ReplayError) -> Self {
        let invalid = match err {
            ReplayError::AgedOut {
                requested,
                oldest_retained,
                ..
            } => ResumeInvalid::AgedOut {
                sequence_number: requested,
                oldest_retained,
            },
            ReplayError::CheckpointMismatch {
                sequence_number, ..
            } => ResumeInvalid::CheckpointMismatch { sequence_number },
            ReplayError::UnknownPartition { partition } => {
                ResumeInvalid::Undecodable(TokenError::Malformed {
                    reason: format!("token names unknown partition {partition}"),
                })
            }
        };
        SubscribeError::ResumeInvalid(invalid)
    }
}

/// Manager-level errors.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("Unknown subscription {0}")]
    UnknownSubscription(Uuid),
}

/// Result type for fan-out operations.
pub type FanoutResult<T> = Result<T, FanoutError>;
