//! Commit Log Service - Core business logic

use crate::domain::window::ReplayWindow;
use crate::error::{CommitLogError, CommitLogResult, ReplayError};
use crate::ports::outbound::LogTransport;
use parking_lot::Mutex;
use shared_types::{
    partition_for, BankHash, ChangeRecord, IdempotencyKey, PartitionId, RecordPayload,
    SequencedRecord, Slot,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Commit-log configuration.
#[derive(Clone, Copy, Debug)]
pub struct CommitLogConfig {
    /// Number of sequencing partitions. An account always maps to the
    /// same partition, so per-account order is total.
    pub partitions: u32,
    /// Replay records retained per partition.
    pub replay_window: usize,
    /// Capacity of the live tail broadcast channel.
    pub tail_capacity: usize,
}

impl Default for CommitLogConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            replay_window: 65_536,
            tail_capacity: 4_096,
        }
    }
}

struct PartitionState {
    next_sequence: AtomicU64,
    window: Mutex<ReplayWindow>,
}

/// Ordered Commit Log.
///
/// Assigns per-partition sequence numbers with atomic counters, hands
/// each record to the durable transport, then retains it in a bounded
/// window and publishes it on the live tail.
pub struct CommitLog<T>
where
    T: LogTransport,
{
    config: CommitLogConfig,
    partitions: Vec<PartitionState>,
    transport: Arc<T>,
    tail: broadcast::Sender<SequencedRecord>,
}

impl<T> CommitLog<T>
where
    T: LogTransport,
{
    pub fn new(config: CommitLogConfig, transport: Arc<T>) -> Self {
        let partitions = (0..config.partitions)
            .map(|_| PartitionState {
                next_sequence: AtomicU64::new(0),
                window: Mutex::new(ReplayWindow::new(config.replay_window)),
            })
            .collect();
        let (tail, _) = broadcast::channel(config.tail_capacity);
        Self {
            config,
            partitions,
            transport,
            tail,
        }
    }

    /// Number of configured partitions.
    #[must_use]
    pub fn partition_count(&self) -> u32 {
        self.config.partitions
    }

    /// Subscribe to records as they are committed. Lossy under lag; the
    /// fan-out layer falls back to `replay_from` when it misses.
    pub fn tail(&self) -> broadcast::Receiver<SequencedRecord> {
        self.tail.subscribe()
    }

    /// Sequence a canonical record, append it durably, and publish it.
    pub async fn commit(&self, record: ChangeRecord) -> CommitLogResult<SequencedRecord> {
        let partition = partition_for(&record.pubkey, self.config.partitions);
        let checkpoint = record.bank_hash;
        self.sequence_and_append(partition, checkpoint, RecordPayload::Write(record))
            .await
    }

    /// Sequence a compensating tombstone for a rolled-back key. The
    /// checkpoint binds it to the branch taking over.
    pub async fn tombstone(
        &self,
        key: IdempotencyKey,
        new_branch: BankHash,
    ) -> CommitLogResult<SequencedRecord> {
        let partition = partition_for(&key.pubkey, self.config.partitions);
        self.sequence_and_append(partition, new_branch, RecordPayload::Tombstone(key))
            .await
    }

    /// Mark every retained record at or past `divergence_slot` as rolled
    /// back, in every partition. Resume tokens pointing into the marked
    /// spans fail with `CheckpointMismatch` from now on.
    pub fn mark_rolled_back(&self, divergence_slot: Slot) {
        for state in &self.partitions {
            state.window.lock().invalidate_from_slot(divergence_slot);
        }
        warn!(divergence_slot, "Marked rolled-back spans in replay windows");
    }

    /// Retained records strictly after `sequence` on `partition`, after
    /// validating that the position is still live and still means what
    /// `expected_checkpoint` says it means.
    pub fn replay_from(
        &self,
        partition: PartitionId,
        sequence: u64,
        expected_checkpoint: &BankHash,
    ) -> Result<Vec<SequencedRecord>, ReplayError> {
        let state = self
            .partitions
            .get(partition as usize)
            .ok_or(ReplayError::UnknownPartition { partition })?;
        let window = state.window.lock();

        if sequence < window.oldest_retained() {
            return Err(ReplayError::AgedOut {
                partition,
                requested: sequence,
                oldest_retained: window.oldest_retained(),
            });
        }
        if window.is_invalidated(sequence) {
            return Err(ReplayError::CheckpointMismatch {
                partition,
                sequence_number: sequence,
            });
        }
        if window.checkpoint_matches(sequence, expected_checkpoint) == Some(false) {
            return Err(ReplayError::CheckpointMismatch {
                partition,
                sequence_number: sequence,
            });
        }
        Ok(window.after(sequence))
    }

    /// Everything still retained on `partition`, in order. Serves the
    /// cold part of a resume that spans partitions.
    pub fn retained(&self, partition: PartitionId) -> Vec<SequencedRecord> {
        self.partitions
            .get(partition as usize)
            .map(|s| s.window.lock().all())
            .unwrap_or_default()
    }

    /// Oldest sequence still replayable on `partition`.
    pub fn oldest_retained(&self, partition: PartitionId) -> Option<u64> {
        self.partitions
            .get(partition as usize)
            .map(|s| s.window.lock().oldest_retained())
    }

    /// Highest sequence committed on `partition`, if any.
    pub fn latest_sequence(&self, partition: PartitionId) -> Option<u64> {
        self.partitions
            .get(partition as usize)
            .and_then(|s| s.window.lock().latest())
    }

    async fn sequence_and_append(
        &self,
        partition: PartitionId,
        checkpoint_hash: BankHash,
        payload: RecordPayload,
    ) -> CommitLogResult<SequencedRecord> {
        let state = self
            .partitions
            .get(partition as usize)
            .ok_or(CommitLogError::UnknownPartition { partition })?;

        let sequence_number = state.next_sequence.fetch_add(1, Ordering::SeqCst);
        let sequenced = SequencedRecord {
            sequence_number,
            partition,
            checkpoint_hash,
            payload,
        };

        // Acknowledge only after the transport took the record; the
        // window and the tail see it afterwards.
        self.transport.append(std::slice::from_ref(&sequenced)).await?;
        state.window.lock().push(sequenced.clone());
        let _ = self.tail.send(sequenced.clone());

        debug!(
            partition,
            sequence_number,
            tombstone = sequenced.is_tombstone(),
            "Committed record"
        );
        Ok(sequenced)
    }
}
