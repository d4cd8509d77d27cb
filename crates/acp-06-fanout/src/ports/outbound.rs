//! Driven Ports (SPI - Outbound Dependencies)

use acp_04_commit_log::{CommitLog, LogTransport, ReplayError};
use shared_types::{BankHash, PartitionId, SequencedRecord};

/// Where the fan-out manager replays missed spans from.
///
/// `replay_from` validates the position (aged-out, rolled-back,
/// checkpoint) before serving; `retained` dumps a partition's whole
/// window for the cold side of a cross-partition resume.
pub trait ReplaySource: Send + Sync {
    fn replay_from(
        &self,
        partition: PartitionId,
        sequence: u64,
        expected_checkpoint: &BankHash,
    ) -> Result<Vec<SequencedRecord>, ReplayError>;

    fn retained(&self, partition: PartitionId) -> Vec<SequencedRecord>;

    fn partition_count(&self) -> u32;
}

impl<T> ReplaySource for CommitLog<T>
where
    T: LogTransport,
{
    fn replay_from(
        &self,
        partition: PartitionId,
        sequence: u64,
        expected_checkpoint: &BankHash,
    ) -> Result<Vec<SequencedRecord>, ReplayError> {
        CommitLog::replay_from(self, partition, sequence, expected_checkpoint)
    }

    fn retained(&self, partition: PartitionId) -> Vec<SequencedRecord> {
        CommitLog::retained(self, partition)
    }

    fn partition_count(&self) -> u32 {
        CommitLog::partition_count(self)
    }
}
