//! Driving Ports (API - Inbound)

use crate::error::ForkResolutionResult;
use async_trait::async_trait;
use shared_types::{ChangeRecord, SlotStatusUpdate};

/// What happened to one ingested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The block is speculative; the record is buffered.
    Buffered,
    /// The block is already canonical; the record was committed directly.
    Committed,
    /// The block is abandoned; the record was dropped and counted.
    Dropped,
}

/// Summary of one reconcile pass triggered by a watermark update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Blocks newly declared canonical.
    pub blocks_canonicalized: usize,
    /// Blocks abandoned (losing siblings plus aged-out speculatives).
    pub blocks_abandoned: usize,
    /// Records committed downstream.
    pub records_committed: usize,
    /// Records discarded with their abandoned blocks.
    pub records_dropped: usize,
    /// Tombstones emitted for rolled-back keys.
    pub tombstones_emitted: usize,
    /// Whether this pass performed a rollback.
    pub reorg_detected: bool,
}

/// Public API of the Fork Resolver.
#[async_trait]
pub trait ForkResolutionApi: Send + Sync {
    /// Feed one normalized record into the resolver.
    async fn ingest(&self, record: ChangeRecord) -> ForkResolutionResult<IngestOutcome>;

    /// Feed a per-source watermark report; may trigger confirmation,
    /// abandonment, pruning, and rollback.
    async fn on_slot_status(
        &self,
        update: SlotStatusUpdate,
    ) -> ForkResolutionResult<ReconcileSummary>;

    /// Total records dropped on abandoned branches so far.
    fn records_dropped(&self) -> u64;

    /// Total rollbacks observed so far.
    fn reorgs_detected(&self) -> u64;
}
