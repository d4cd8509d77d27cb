//! In-memory account state store.
//!
//! Reference sink implementing the full conflict and tombstone
//! contract: duplicates are skipped, stale writes are kept as
//! superseded versions, and tombstones revert an account to its prior
//! surviving version.

use crate::error::SinkError;
use crate::ports::outbound::{ApplyOutcome, Sink};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    BankHash, ChangeRecord, IdempotencyKey, OrderingKey, Pubkey, RecordPayload, SequencedRecord,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// One applied version of an account.
#[derive(Debug, Clone)]
struct AccountVersion {
    ordering_key: OrderingKey,
    idempotency_key: IdempotencyKey,
    lamports: u64,
    owner: Pubkey,
    data: Vec<u8>,
    checkpoint_hash: BankHash,
}

impl AccountVersion {
    fn from_record(record: &ChangeRecord, checkpoint_hash: BankHash) -> Self {
        Self {
            ordering_key: record.ordering_key(),
            idempotency_key: record.idempotency_key(),
            lamports: record.lamports,
            owner: record.owner,
            data: record.data.clone(),
            checkpoint_hash,
        }
    }
}

/// Current account state plus the superseded versions still inside the
/// reorg horizon, kept so a tombstone can revert.
#[derive(Debug, Default)]
struct AccountEntry {
    current: Option<AccountVersion>,
    /// Sorted ascending by ordering key.
    superseded: Vec<AccountVersion>,
}

impl AccountEntry {
    fn keep_superseded(&mut self, version: AccountVersion) {
        let at = self
            .superseded
            .partition_point(|v| v.ordering_key < version.ordering_key);
        self.superseded.insert(at, version);
    }

    fn is_vacant(&self) -> bool {
        self.current.is_none() && self.superseded.is_empty()
    }
}

/// Read-only view of an account for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub slot: u64,
    pub write_version: u64,
    pub checkpoint_hash: BankHash,
}

#[derive(Default)]
struct StoreState {
    accounts: HashMap<Pubkey, AccountEntry>,
    seen: HashSet<(IdempotencyKey, u64)>,
}

/// In-memory `Sink` keyed by account.
#[derive(Default)]
pub struct InMemoryStateStore {
    state: RwLock<StoreState>,
    cursor: AtomicU64,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of one account, if it exists and is not reverted
    /// away.
    pub fn account(&self, pubkey: &Pubkey) -> Option<AccountView> {
        let state = self.state.read();
        let version = state.accounts.get(pubkey)?.current.as_ref()?;
        Some(AccountView {
            lamports: version.lamports,
            owner: version.owner,
            data: version.data.clone(),
            slot: version.ordering_key.slot,
            write_version: version.ordering_key.write_version,
            checkpoint_hash: version.checkpoint_hash,
        })
    }

    /// Number of accounts with a live current version.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .accounts
            .values()
            .filter(|e| e.current.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_write(
        state: &mut StoreState,
        record: &ChangeRecord,
        checkpoint_hash: BankHash,
    ) -> ApplyOutcome {
        let version = AccountVersion::from_record(record, checkpoint_hash);
        let entry = state.accounts.entry(record.pubkey).or_default();

        match &entry.current {
            None => {
                entry.current = Some(version);
                ApplyOutcome::Applied
            }
            Some(current) if version.ordering_key > current.ordering_key => {
                let previous = entry.current.replace(version);
                if let Some(previous) = previous {
                    entry.keep_superseded(previous);
                }
                ApplyOutcome::Applied
            }
            Some(current) if version.ordering_key == current.ordering_key => ApplyOutcome::Skipped,
            Some(_) => {
                // Stale write arriving after a newer one. Not visible,
                // but retained so a tombstone on the newer one can
                // revert to it.
                entry.keep_superseded(version);
                ApplyOutcome::Applied
            }
        }
    }

    fn apply_tombstone(state: &mut StoreState, key: &IdempotencyKey) -> ApplyOutcome {
        let Some(entry) = state.accounts.get_mut(&key.pubkey) else {
            return ApplyOutcome::Skipped;
        };

        let outcome = if entry
            .current
            .as_ref()
            .is_some_and(|c| c.idempotency_key == *key)
        {
            entry.current = entry.superseded.pop();
            ApplyOutcome::Applied
        } else if let Some(at) = entry
            .superseded
            .iter()
            .position(|v| v.idempotency_key == *key)
        {
            entry.superseded.remove(at);
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Skipped
        };

        if entry.is_vacant() {
            state.accounts.remove(&key.pubkey);
        }
        outcome
    }
}

#[async_trait]
impl Sink for InMemoryStateStore {
    async fn apply(&self, record: &SequencedRecord) -> Result<ApplyOutcome, SinkError> {
        let outcome = {
            let mut state = self.state.write();
            let dedup_key = (record.idempotency_key(), record.sequence_number);
            if !state.seen.insert(dedup_key) {
                ApplyOutcome::Skipped
            } else {
                match &record.payload {
                    RecordPayload::Write(change) => {
                        Self::apply_write(&mut state, change, record.checkpoint_hash)
                    }
                    RecordPayload::Tombstone(key) => Self::apply_tombstone(&mut state, key),
                }
            }
        };
        self.cursor
            .fetch_max(record.sequence_number, Ordering::Relaxed);
        Ok(outcome)
    }

    fn current_cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    fn name(&self) -> &str {
        "memory-state-store"
    }
}
