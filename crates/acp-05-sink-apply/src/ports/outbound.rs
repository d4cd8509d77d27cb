//! Driven Ports (SPI - Outbound Dependencies)

use crate::error::SinkError;
use async_trait::async_trait;
use shared_types::SequencedRecord;

/// Result of one sink apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record changed sink state.
    Applied,
    /// The record was a duplicate or had no effect; safe under replay.
    Skipped,
}

/// A downstream consumer of committed records.
///
/// Implementations must be idempotent by
/// `(IdempotencyKey, sequence_number)`: the coordinator delivers
/// at-least-once and replays after restarts.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Apply one sequenced record (write or tombstone).
    async fn apply(&self, record: &SequencedRecord) -> Result<ApplyOutcome, SinkError>;

    /// The sink's durable apply position: the highest sequence number it
    /// has fully absorbed, per its own persistence.
    fn current_cursor(&self) -> u64;

    /// Stable name for logs and health reporting.
    fn name(&self) -> &str;
}
