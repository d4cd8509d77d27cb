//! Driven Ports (SPI - Outbound Dependencies)

use crate::error::CommitLogResult;
use async_trait::async_trait;
use shared_types::SequencedRecord;

/// Durable append target for sequenced records.
///
/// A commit is acknowledged to the caller only after this port accepted
/// the batch; the in-memory replay window is a cache over whatever the
/// transport persists, never the source of durability.
#[async_trait]
pub trait LogTransport: Send + Sync {
    async fn append(&self, batch: &[SequencedRecord]) -> CommitLogResult<()>;
}
