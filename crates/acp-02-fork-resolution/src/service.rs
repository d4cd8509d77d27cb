//! Fork Resolution Service - Core business logic

use crate::domain::buffer::SlotBuffers;
use crate::domain::lineage::LineageArena;
use crate::error::ForkResolutionResult;
use crate::ports::inbound::{ForkResolutionApi, IngestOutcome, ReconcileSummary};
use crate::ports::outbound::{CanonicalGateway, ReorgEvent};
use acp_03_watermarks::WatermarkTracker;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    short_hex, BankHash, BlockState, ChangeRecord, IdempotencyKey, SlotStatusUpdate, Slot,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Fork-resolution configuration.
#[derive(Clone, Copy, Debug)]
pub struct ForkResolutionConfig {
    /// How many slots behind the confirmed tip a speculative block may
    /// linger before it is abandoned, and how far behind the finalized
    /// tip bookkeeping is retained. Tunable; 64 by default.
    pub reorg_buffer_depth: u64,
}

impl Default for ForkResolutionConfig {
    fn default() -> Self {
        Self {
            reorg_buffer_depth: 64,
        }
    }
}

/// Internal linearizable state; one lock, single-threaded transitions.
struct ResolverState {
    arena: LineageArena,
    buffers: SlotBuffers,
    /// Keys committed downstream per slot, kept within the reorg window
    /// so a rollback knows exactly what to tombstone.
    committed_keys: BTreeMap<Slot, Vec<IdempotencyKey>>,
    /// Highest slot reconciliation has advanced through.
    last_confirmed: Slot,
}

impl ResolverState {
    fn new() -> Self {
        Self {
            arena: LineageArena::new(),
            buffers: SlotBuffers::new(),
            committed_keys: BTreeMap::new(),
            last_confirmed: 0,
        }
    }
}

/// What a reconcile pass decided to emit, executed after the state lock
/// is released (gateway calls are async).
enum Action {
    Reorg(ReorgEvent),
    Tombstone(IdempotencyKey, BankHash),
    Commit(ChangeRecord),
}

/// Fork Resolution Service.
///
/// Tracks per-source lineage, buffers speculative records, and on
/// watermark advances decides which blocks are canonical, which are
/// abandoned, and when a previously-canonical branch must be rolled
/// back with compensating tombstones.
pub struct ForkResolutionService<G>
where
    G: CanonicalGateway,
{
    config: ForkResolutionConfig,
    state: Mutex<ResolverState>,
    gateway: Arc<G>,
    watermarks: Arc<WatermarkTracker>,
    records_dropped: AtomicU64,
    reorgs_detected: AtomicU64,
}

impl<G> ForkResolutionService<G>
where
    G: CanonicalGateway,
{
    /// Create a new resolver writing watermarks into `watermarks` and
    /// canonical output into `gateway`.
    pub fn new(
        config: ForkResolutionConfig,
        gateway: Arc<G>,
        watermarks: Arc<WatermarkTracker>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(ResolverState::new()),
            gateway,
            watermarks,
            records_dropped: AtomicU64::new(0),
            reorgs_detected: AtomicU64::new(0),
        }
    }

    /// The watermark tracker this resolver writes to.
    #[must_use]
    pub fn watermarks(&self) -> &Arc<WatermarkTracker> {
        &self.watermarks
    }

    async fn execute(&self, actions: Vec<Action>) -> ForkResolutionResult<()> {
        for action in actions {
            match action {
                Action::Reorg(event) => self.gateway.reorg(event).await?,
                Action::Tombstone(key, new_branch) => {
                    self.gateway.tombstone(key, new_branch).await?;
                }
                Action::Commit(record) => self.gateway.commit(record).await?,
            }
        }
        Ok(())
    }

    /// Advance confirmation through `confirmed_slot`, collecting the
    /// emissions to perform. Runs entirely under the state lock.
    fn reconcile(
        &self,
        state: &mut ResolverState,
        confirmed_slot: Slot,
        finalized_slot: Slot,
    ) -> (Vec<Action>, ReconcileSummary) {
        let mut actions = Vec::new();
        let mut summary = ReconcileSummary::default();

        for slot in state
            .arena
            .tracked_slots(state.last_confirmed, confirmed_slot)
        {
            // A slot that already has a canonical block is only revisited
            // through a discontinuity in a later winner's lineage.
            if state.arena.canonical_at(slot).is_some() {
                continue;
            }
            let Some(winner) = state.arena.select_candidate(slot) else {
                continue;
            };

            let chain = state.arena.chain_to_attachment(winner);
            if let Some(divergence_slot) = state.arena.divergence_slot(&chain) {
                self.rollback(state, divergence_slot, winner, &mut actions, &mut summary);
            }
            self.canonicalize_chain(state, &chain, &mut actions, &mut summary);
        }
        state.last_confirmed = state.last_confirmed.max(confirmed_slot);

        // Speculative blocks that fell out of the reorg window without
        // confirmation are abandoned; their records are dropped, counted.
        let age_cutoff = confirmed_slot.saturating_sub(self.config.reorg_buffer_depth);
        for hash in state.arena.abandon_stale(age_cutoff) {
            summary.blocks_abandoned += 1;
            let dropped = state.buffers.discard_block(&hash);
            summary.records_dropped += dropped;
            self.records_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }

        let prune_cutoff = finalized_slot.saturating_sub(self.config.reorg_buffer_depth);
        state.arena.prune(prune_cutoff);
        state.committed_keys.retain(|slot, _| *slot >= prune_cutoff);

        (actions, summary)
    }

    /// Roll back the previously-canonical branch from `divergence_slot`.
    fn rollback(
        &self,
        state: &mut ResolverState,
        divergence_slot: Slot,
        canonical_tip: BankHash,
        actions: &mut Vec<Action>,
        summary: &mut ReconcileSummary,
    ) {
        let rolled = state.arena.canonical_from(divergence_slot);
        let abandoned_tip = rolled.last().map_or([0u8; 32], |(_, hash)| *hash);

        let doomed_slots: Vec<Slot> = state
            .committed_keys
            .range(divergence_slot..)
            .map(|(slot, _)| *slot)
            .collect();
        let mut keys = Vec::new();
        for slot in doomed_slots {
            if let Some(slot_keys) = state.committed_keys.remove(&slot) {
                keys.extend(slot_keys);
            }
        }

        for (_, hash) in &rolled {
            state.arena.mark_abandoned(hash);
            summary.blocks_abandoned += 1;
        }

        warn!(
            divergence_slot,
            abandoned_tip = %short_hex(&abandoned_tip),
            canonical_tip = %short_hex(&canonical_tip),
            keys = keys.len(),
            "Deep reorg: rolling back previously-canonical branch"
        );
        self.reorgs_detected.fetch_add(1, Ordering::Relaxed);
        summary.reorg_detected = true;

        actions.push(Action::Reorg(ReorgEvent {
            divergence_slot,
            abandoned_tip,
            canonical_tip,
            keys_rolled_back: keys.len(),
        }));
        for key in keys {
            summary.tombstones_emitted += 1;
            actions.push(Action::Tombstone(key, canonical_tip));
        }
    }

    /// Declare every block on `chain` canonical in ascending slot order,
    /// abandoning siblings and flushing buffered records causally.
    fn canonicalize_chain(
        &self,
        state: &mut ResolverState,
        chain: &[BankHash],
        actions: &mut Vec<Action>,
        summary: &mut ReconcileSummary,
    ) {
        for hash in chain {
            let abandoned = state.arena.set_canonical(*hash);
            summary.blocks_canonicalized += 1;
            for sibling in abandoned {
                summary.blocks_abandoned += 1;
                let dropped = state.buffers.discard_block(&sibling);
                summary.records_dropped += dropped;
                self.records_dropped
                    .fetch_add(dropped as u64, Ordering::Relaxed);
            }

            for record in state.buffers.drain_block(hash) {
                state
                    .committed_keys
                    .entry(record.slot)
                    .or_default()
                    .push(record.idempotency_key());
                summary.records_committed += 1;
                actions.push(Action::Commit(record));
            }
        }
    }
}

#[async_trait]
impl<G> ForkResolutionApi for ForkResolutionService<G>
where
    G: CanonicalGateway + 'static,
{
    async fn ingest(&self, record: ChangeRecord) -> ForkResolutionResult<IngestOutcome> {
        let (outcome, direct_commit) = {
            let mut state = self.state.lock();
            state.arena.observe(
                record.bank_hash,
                record.parent_bank_hash,
                record.slot,
                record.source_id,
            );

            match state.arena.state_of(&record.bank_hash) {
                Some(BlockState::Canonical) => {
                    // Late record for an already-canonical block: commit
                    // straight through, preserving the idempotent contract
                    // downstream.
                    state
                        .committed_keys
                        .entry(record.slot)
                        .or_default()
                        .push(record.idempotency_key());
                    (IngestOutcome::Committed, Some(record))
                }
                Some(BlockState::Abandoned) => {
                    self.records_dropped.fetch_add(1, Ordering::Relaxed);
                    (IngestOutcome::Dropped, None)
                }
                Some(BlockState::Speculative) | None => {
                    state.buffers.push(record);
                    (IngestOutcome::Buffered, None)
                }
            }
        };

        if let Some(record) = direct_commit {
            self.gateway.commit(record).await?;
        }
        Ok(outcome)
    }

    async fn on_slot_status(
        &self,
        update: SlotStatusUpdate,
    ) -> ForkResolutionResult<ReconcileSummary> {
        // Single-writer discipline: the resolver is the only component
        // that advances the process-wide watermark state.
        self.watermarks.advance(
            update.source_id,
            update.processed_slot,
            update.confirmed_slot,
            update.finalized_slot,
        )?;
        let snapshot = self.watermarks.snapshot();

        let (actions, summary) = {
            let mut state = self.state.lock();
            self.reconcile(
                &mut state,
                snapshot.confirmed_slot(),
                snapshot.finalized_slot(),
            )
        };

        if summary.blocks_canonicalized > 0 || summary.reorg_detected {
            info!(
                confirmed = snapshot.confirmed_slot(),
                canonicalized = summary.blocks_canonicalized,
                committed = summary.records_committed,
                tombstones = summary.tombstones_emitted,
                reorg = summary.reorg_detected,
                "Reconcile pass complete"
            );
        }
        self.execute(actions).await?;
        Ok(summary)
    }

    fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    fn reorgs_detected(&self) -> u64 {
        self.reorgs_detected.load(Ordering::Relaxed)
    }
}
