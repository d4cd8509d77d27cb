//! # Core Domain Entities
//!
//! Defines the account-mutation entities flowing through the engine.
//!
//! ## Clusters
//!
//! - **Ingest**: `RawAccountUpdate`, `SlotStatusUpdate`
//! - **Canonical**: `ChangeRecord`, `IdempotencyKey`, `OrderingKey`
//! - **Lineage**: `BlockState`, bank-hash aliases

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

// =============================================================================
// CLUSTER A: PRIMITIVES
// =============================================================================

/// A 32-byte account identifier.
pub type Pubkey = [u8; 32];

/// A 32-byte block/state identifier used to detect forks.
pub type BankHash = [u8; 32];

/// A 32-byte integrity digest over an account data blob.
pub type DataHash = [u8; 32];

/// A discrete unit of block production time in the source chain.
pub type Slot = u64;

/// Identifier of an upstream validator feed.
pub type SourceId = u32;

/// Render a 32-byte identifier for logs (first 8 bytes, hex).
#[must_use]
pub fn short_hex(bytes: &[u8; 32]) -> String {
    hex::encode(&bytes[..8])
}

// =============================================================================
// CLUSTER B: INGEST BOUNDARY
// =============================================================================

/// A raw per-source account update as received from a validator feed.
///
/// This is the heterogeneous input shape; the Normalizer turns it into a
/// [`ChangeRecord`] or rejects it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAccountUpdate {
    /// Block height this write happened in.
    pub slot: Slot,
    /// Per-slot monotonic write counter for this account.
    pub write_version: u64,
    /// Intra-slot causal order of the writing transaction.
    pub transaction_index: u32,
    /// The mutated account.
    #[serde_as(as = "Bytes")]
    pub pubkey: Pubkey,
    /// Program owning the account.
    #[serde_as(as = "Bytes")]
    pub owner: Pubkey,
    /// Account balance in base units.
    pub lamports: u64,
    /// Account data blob (may be stored externally; see `data_hash`).
    pub data: Vec<u8>,
    /// Integrity digest of `data`.
    #[serde_as(as = "Bytes")]
    pub data_hash: DataHash,
    /// Rent epoch of the account.
    pub rent_epoch: u64,
    /// Which feed this update arrived from.
    pub source_id: SourceId,
    /// Block this write belongs to.
    #[serde_as(as = "Bytes")]
    pub bank_hash: BankHash,
    /// Lineage pointer to the parent block.
    #[serde_as(as = "Bytes")]
    pub parent_bank_hash: BankHash,
}

/// A periodic per-source watermark report from a validator feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatusUpdate {
    /// Which feed is reporting.
    pub source_id: SourceId,
    /// Highest slot the source has processed.
    pub processed_slot: Slot,
    /// Highest slot the source has confirmed.
    pub confirmed_slot: Slot,
    /// Highest slot the source considers finalized (rooted).
    pub finalized_slot: Slot,
}

// =============================================================================
// CLUSTER C: CANONICAL RECORD
// =============================================================================

/// One normalized account mutation.
///
/// Created by the Normalizer, held in fork-resolution buffers while its
/// block is speculative, and frozen into a
/// [`SequencedRecord`](crate::sequenced::SequencedRecord) once its branch
/// is declared canonical.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Block height this write happened in.
    pub slot: Slot,
    /// Per-slot monotonic write counter for this account.
    pub write_version: u64,
    /// Intra-slot causal order of the writing transaction.
    pub transaction_index: u32,
    /// The mutated account.
    #[serde_as(as = "Bytes")]
    pub pubkey: Pubkey,
    /// Program owning the account.
    #[serde_as(as = "Bytes")]
    pub owner: Pubkey,
    /// Account balance in base units.
    pub lamports: u64,
    /// Account data blob.
    pub data: Vec<u8>,
    /// Integrity digest of `data`.
    #[serde_as(as = "Bytes")]
    pub data_hash: DataHash,
    /// Rent epoch of the account.
    pub rent_epoch: u64,
    /// Which feed this update arrived from.
    pub source_id: SourceId,
    /// Block this write belongs to.
    #[serde_as(as = "Bytes")]
    pub bank_hash: BankHash,
    /// Lineage pointer to the parent block.
    #[serde_as(as = "Bytes")]
    pub parent_bank_hash: BankHash,
}

impl ChangeRecord {
    /// The key that uniquely identifies this mutation within a canonical
    /// history.
    #[must_use]
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey {
            slot: self.slot,
            write_version: self.write_version,
            transaction_index: self.transaction_index,
            pubkey: self.pubkey,
        }
    }

    /// The per-account causal ordering key.
    #[must_use]
    pub fn ordering_key(&self) -> OrderingKey {
        OrderingKey {
            slot: self.slot,
            write_version: self.write_version,
            transaction_index: self.transaction_index,
        }
    }
}

impl From<RawAccountUpdate> for ChangeRecord {
    fn from(raw: RawAccountUpdate) -> Self {
        Self {
            slot: raw.slot,
            write_version: raw.write_version,
            transaction_index: raw.transaction_index,
            pubkey: raw.pubkey,
            owner: raw.owner,
            lamports: raw.lamports,
            data: raw.data,
            data_hash: raw.data_hash,
            rent_epoch: raw.rent_epoch,
            source_id: raw.source_id,
            bank_hash: raw.bank_hash,
            parent_bank_hash: raw.parent_bank_hash,
        }
    }
}

/// The minimal tuple uniquely identifying one account mutation.
///
/// Within a canonical chain this key identifies exactly one
/// [`ChangeRecord`]; duplicate arrivals with the same key are no-ops.
/// Ordering is `(slot, write_version, transaction_index, pubkey)`.
#[serde_as]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IdempotencyKey {
    /// Block height of the write.
    pub slot: Slot,
    /// Per-slot write counter.
    pub write_version: u64,
    /// Intra-slot causal order.
    pub transaction_index: u32,
    /// The mutated account.
    #[serde_as(as = "Bytes")]
    pub pubkey: Pubkey,
}

/// Per-account causal ordering: `(slot, write_version, transaction_index)`.
///
/// Delivery to every sink and subscriber is non-decreasing in this key for
/// any fixed pubkey; a smaller key arriving after a larger one is a stale
/// redelivery and must be a no-op.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OrderingKey {
    /// Block height of the write.
    pub slot: Slot,
    /// Per-slot write counter.
    pub write_version: u64,
    /// Intra-slot causal order.
    pub transaction_index: u32,
}

// =============================================================================
// CLUSTER D: LINEAGE
// =============================================================================

/// Fork-resolution state of one tracked block.
///
/// State progression: Speculative → Canonical | Abandoned. A Canonical
/// block can only be rolled back by an observed deep reorg, which emits
/// compensating tombstones rather than mutating the block in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlockState {
    /// Seen but not yet confirmed; its records are buffered.
    #[default]
    Speculative,
    /// On the branch selected as canonical; records committed downstream.
    Canonical,
    /// On a losing branch or aged out; records dropped and counted.
    Abandoned,
}

/// Increasing confidence that a slot will not be reverted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum CommitmentLevel {
    /// The source has processed the slot.
    #[default]
    Processed,
    /// The slot is confirmed by the cluster.
    Confirmed,
    /// The slot is rooted; reversion would be a protocol violation.
    Finalized,
}
