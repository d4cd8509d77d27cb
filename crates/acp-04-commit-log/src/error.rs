//! Error types for the Commit Log

use shared_types::PartitionId;
use thiserror::Error;

/// Commit-path errors.
#[derive(Debug, Error)]
pub enum CommitLogError {
    /// A record hashed to a partition outside the configured range.
    #[error("Unknown partition {partition}")]
    UnknownPartition { partition: PartitionId },

    /// The outbound transport refused an append. The sequence number is
    /// already consumed; the caller retries with a fresh commit.
    #[error("Transport append failed on partition {partition}: {reason}")]
    TransportFailed {
        partition: PartitionId,
        reason: String,
    },
}

/// Result type for commit-log operations.
pub type CommitLogResult<T> = Result<T, CommitLogError>;

/// Failure modes for `replay_from`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Unknown partition {partition}")]
    UnknownPartition { partition: PartitionId },

    /// The requested position fell out of the bounded retention window.
    #[error(
        "Sequence {requested} on partition {partition} aged out; oldest retained is {oldest_retained}"
    )]
    AgedOut {
        partition: PartitionId,
        requested: u64,
        oldest_retained: u64,
    },

    /// The requested position exists but no longer means what the token
    /// thinks it means, either because a rollback invalidated the span
    /// or because the checkpoint hash disagrees.
    #[error("Checkpoint mismatch at sequence {sequence_number} on partition {partition}")]
    CheckpointMismatch {
        partition: PartitionId,
        sequence_number: u64,
    },
}
