//! Error types for the Normalizer/Deduper

use shared_types::{Slot, SourceId};
use thiserror::Error;

/// Rejections of malformed raw updates.
///
/// All of these are absorbed at the component boundary: the update is
/// dropped and counted, the pipeline keeps running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// Account pubkey is the zero value.
    #[error("Zero account pubkey in update from source {source_id} at slot {slot}")]
    ZeroPubkey { source_id: SourceId, slot: Slot },

    /// Bank hash is the zero value.
    #[error("Zero bank hash in update from source {source_id} at slot {slot}")]
    ZeroBankHash { source_id: SourceId, slot: Slot },

    /// A block cannot be its own parent.
    #[error("Self-referential lineage in update from source {source_id} at slot {slot}")]
    SelfParent { source_id: SourceId, slot: Slot },

    /// Inline data blob does not match its integrity digest.
    #[error("Data hash mismatch for account {pubkey_hex} at slot {slot}")]
    DataHashMismatch { pubkey_hex: String, slot: Slot },

    /// Slot is below the finalized floor; no mutation there can still
    /// become canonical.
    #[error(
        "Update from source {source_id} at slot {slot} is below the finalized floor {floor}"
    )]
    SlotBelowFloor {
        source_id: SourceId,
        slot: Slot,
        floor: Slot,
    },
}

/// Result type for normalization operations.
pub type NormalizeResult<T> = Result<T, NormalizeError>;
