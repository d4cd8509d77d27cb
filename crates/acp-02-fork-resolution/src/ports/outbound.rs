//! Driven Ports (SPI - Outbound Dependencies)

use crate::error::ForkResolutionResult;
use async_trait::async_trait;
use shared_types::{BankHash, ChangeRecord, IdempotencyKey, Slot};

/// A fork rollback observed by the resolver.
///
/// Conditions that change the meaning of history are surfaced explicitly,
/// never silently reconciled; this event is the forced-resync signal for
/// consumers whose resume tokens are now stale.
#[derive(Debug, Clone)]
pub struct ReorgEvent {
    /// First slot where the old and new branches disagree.
    pub divergence_slot: Slot,
    /// Tip of the branch being rolled back.
    pub abandoned_tip: BankHash,
    /// Tip of the branch taking over.
    pub canonical_tip: BankHash,
    /// How many idempotency keys received tombstones.
    pub keys_rolled_back: usize,
}

/// Downstream consumer of canonical records (the Ordered Commit Log).
#[async_trait]
pub trait CanonicalGateway: Send + Sync {
    /// Commit a canonical record in causal order.
    async fn commit(&self, record: ChangeRecord) -> ForkResolutionResult<()>;

    /// Emit a compensating tombstone for a rolled-back key.
    /// `new_branch` is the bank hash of the branch taking over.
    async fn tombstone(
        &self,
        key: IdempotencyKey,
        new_branch: BankHash,
    ) -> ForkResolutionResult<()>;

    /// Announce a rollback before its tombstones and replays.
    async fn reorg(&self, event: ReorgEvent) -> ForkResolutionResult<()>;
}
