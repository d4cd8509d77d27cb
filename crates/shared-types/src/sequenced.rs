//! # Sequenced Records & Resume Tokens
//!
//! The canonical event boundary: once fork resolution declares a record
//! canonical, the commit log freezes it into a `SequencedRecord` with a
//! per-partition total order. Subscribers reconnect with `ResumeToken`s.

use crate::entities::{
    BankHash, ChangeRecord, CommitmentLevel, IdempotencyKey, OrderingKey, Pubkey, Slot,
};
use crate::errors::TokenError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use uuid::Uuid;

/// Identifier of a commit-log partition.
pub type PartitionId = u32;

/// Deterministic partition assignment for a pubkey.
///
/// Only within-partition (and within-pubkey) order matters for
/// correctness, so the function just has to be stable and well spread.
/// Uses FNV-1a over the key bytes.
#[must_use]
pub fn partition_for(pubkey: &Pubkey, partitions: u32) -> PartitionId {
    debug_assert!(partitions > 0);
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for byte in pubkey {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    (hash % u64::from(partitions)) as PartitionId
}

/// Payload of a sequenced record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    /// A canonical account mutation.
    Write(ChangeRecord),
    /// A compensating record emitted during fork rollback: sinks revert
    /// the value previously applied for this key or mark it superseded.
    Tombstone(IdempotencyKey),
}

/// A canonical record with its assigned total order.
///
/// Immutable once the sequence number is assigned. Sequence numbers are
/// strictly increasing within a partition; no cross-partition order is
/// promised.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedRecord {
    /// Strictly increasing per-partition sequence number.
    pub sequence_number: u64,
    /// Partition this record was sequenced in.
    pub partition: PartitionId,
    /// Bank hash of the canonical block this record derives from. Binds
    /// the record (and any resume token pointing at it) to one branch of
    /// history.
    #[serde_as(as = "Bytes")]
    pub checkpoint_hash: BankHash,
    /// The record itself.
    pub payload: RecordPayload,
}

impl SequencedRecord {
    /// The idempotency key of the underlying mutation.
    #[must_use]
    pub fn idempotency_key(&self) -> IdempotencyKey {
        match &self.payload {
            RecordPayload::Write(record) => record.idempotency_key(),
            RecordPayload::Tombstone(key) => *key,
        }
    }

    /// The per-account causal ordering key.
    #[must_use]
    pub fn ordering_key(&self) -> OrderingKey {
        let key = self.idempotency_key();
        OrderingKey {
            slot: key.slot,
            write_version: key.write_version,
            transaction_index: key.transaction_index,
        }
    }

    /// The mutated account.
    #[must_use]
    pub fn pubkey(&self) -> &Pubkey {
        match &self.payload {
            RecordPayload::Write(record) => &record.pubkey,
            RecordPayload::Tombstone(key) => &key.pubkey,
        }
    }

    /// Slot of the underlying mutation.
    #[must_use]
    pub fn slot(&self) -> Slot {
        self.idempotency_key().slot
    }

    /// Whether this is a rollback tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self.payload, RecordPayload::Tombstone(_))
    }
}

/// The last record a subscriber has durably observed.
///
/// Opaque to clients: they receive the bincode encoding and hand it back
/// on reconnect. `checkpoint_hash` detects tokens minted on a branch that
/// has since been rolled back.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    /// Slot of the last observed record.
    pub slot: Slot,
    /// Write version of the last observed record.
    pub write_version: u64,
    /// Commitment level the subscriber was reading at.
    pub commitment_level: CommitmentLevel,
    /// Sequence number of the last observed record.
    pub sequence_number: u64,
    /// Partition the subscription was attached to.
    pub partition: PartitionId,
    /// Branch binding; mismatch after a reorg means the token is stale.
    #[serde_as(as = "Bytes")]
    pub checkpoint_hash: BankHash,
    /// Subscription this token was issued to.
    pub subscription_id: Uuid,
}

impl ResumeToken {
    /// Encode into the opaque wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        // bincode of a fixed-shape struct cannot fail
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decode from the opaque wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, TokenError> {
        bincode::deserialize(bytes).map_err(|e| TokenError::Malformed {
            reason: e.to_string(),
        })
    }
}
