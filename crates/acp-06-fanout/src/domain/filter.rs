//! Subscription filters.

use shared_types::{Pubkey, RecordPayload, SequencedRecord, Slot};
use std::collections::HashSet;

/// What a subscriber wants to see. Empty sets mean "everything".
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Deliver only these accounts.
    pub accounts: HashSet<Pubkey>,
    /// Deliver only accounts owned by these programs.
    pub owners: HashSet<Pubkey>,
    /// Deliver only records at or above this slot.
    pub min_slot: Option<Slot>,
}

impl EventFilter {
    /// Match-all filter.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_accounts(accounts: impl IntoIterator<Item = Pubkey>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_owners(owners: impl IntoIterator<Item = Pubkey>) -> Self {
        Self {
            owners: owners.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether `record` should be delivered under this filter.
    ///
    /// Tombstones carry no owner, so the owner test is skipped for them;
    /// a subscriber filtering by owner still receives tombstones for
    /// accounts it selected, and for all accounts when it selected none.
    #[must_use]
    pub fn matches(&self, record: &SequencedRecord) -> bool {
        if self.min_slot.is_some_and(|min| record.slot() < min) {
            return false;
        }
        if !self.accounts.is_empty() && !self.accounts.contains(record.pubkey()) {
            return false;
        }
        if let RecordPayload::Write(change) = &record.payload {
            if !self.owners.is_empty() && !self.owners.contains(&change.owner) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ChangeRecord, IdempotencyKey};

    fn write(slot: Slot, pubkey: Pubkey, owner: Pubkey) -> SequencedRecord {
        SequencedRecord {
            sequence_number: 0,
            partition: 0,
            checkpoint_hash: [1u8; 32],
            payload: RecordPayload::Write(ChangeRecord {
                slot,
                write_version: 1,
                transaction_index: 0,
                pubkey,
                owner,
                lamports: 1,
                data: Vec::new(),
                data_hash: [0u8; 32],
                rent_epoch: 0,
                source_id: 1,
                bank_hash: [1u8; 32],
                parent_bank_hash: [0u8; 32],
            }),
        }
    }

    fn tombstone(slot: Slot, pubkey: Pubkey) -> SequencedRecord {
        SequencedRecord {
            sequence_number: 0,
            partition: 0,
            checkpoint_hash: [1u8; 32],
            payload: RecordPayload::Tombstone(IdempotencyKey {
                slot,
                write_version: 1,
                transaction_index: 0,
                pubkey,
            }),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EventFilter::all();
        assert!(filter.matches(&write(10, [1u8; 32], [2u8; 32])));
        assert!(filter.matches(&tombstone(10, [1u8; 32])));
    }

    #[test]
    fn test_account_filter() {
        let filter = EventFilter::for_accounts([[1u8; 32]]);
        assert!(filter.matches(&write(10, [1u8; 32], [2u8; 32])));
        assert!(!filter.matches(&write(10, [3u8; 32], [2u8; 32])));
        assert!(filter.matches(&tombstone(10, [1u8; 32])));
        assert!(!filter.matches(&tombstone(10, [3u8; 32])));
    }

    #[test]
    fn test_owner_filter_passes_tombstones() {
        let filter = EventFilter::for_owners([[2u8; 32]]);
        assert!(filter.matches(&write(10, [1u8; 32], [2u8; 32])));
        assert!(!filter.matches(&write(10, [1u8; 32], [9u8; 32])));
        assert!(filter.matches(&tombstone(10, [1u8; 32])));
    }

    #[test]
    fn test_min_slot() {
        let filter = EventFilter {
            min_slot: Some(50),
            ..EventFilter::default()
        };
        assert!(!filter.matches(&write(49, [1u8; 32], [2u8; 32])));
        assert!(filter.matches(&write(50, [1u8; 32], [2u8; 32])));
    }
}
