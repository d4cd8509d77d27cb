//! Speculative record buffers
//!
//! Records for blocks that have not been confirmed yet are held here,
//! keyed by the block they belong to and ordered by the per-account
//! causal key so a canonical flush replays them in
//! `(slot, write_version, transaction_index)` order.

use shared_types::{BankHash, ChangeRecord, IdempotencyKey, OrderingKey};
use std::collections::{BTreeMap, HashMap};

/// Per-block buffered records, scoped to the reorg window.
#[derive(Default)]
pub struct SlotBuffers {
    buffered: HashMap<BankHash, BTreeMap<(OrderingKey, IdempotencyKey), ChangeRecord>>,
    buffered_count: usize,
}

impl SlotBuffers {
    /// Create empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a record under its block.
    pub fn push(&mut self, record: ChangeRecord) {
        let key = (record.ordering_key(), record.idempotency_key());
        let slot_map = self.buffered.entry(record.bank_hash).or_default();
        if slot_map.insert(key, record).is_none() {
            self.buffered_count += 1;
        }
    }

    /// Drain all records for a block in causal order.
    #[must_use]
    pub fn drain_block(&mut self, bank_hash: &BankHash) -> Vec<ChangeRecord> {
        match self.buffered.remove(bank_hash) {
            Some(map) => {
                self.buffered_count -= map.len();
                map.into_values().collect()
            }
            None => Vec::new(),
        }
    }

    /// Drop all records for a block (abandoned branch).
    ///
    /// Returns how many records were discarded.
    pub fn discard_block(&mut self, bank_hash: &BankHash) -> usize {
        match self.buffered.remove(bank_hash) {
            Some(map) => {
                self.buffered_count -= map.len();
                map.len()
            }
            None => 0,
        }
    }

    /// Number of records currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffered_count
    }

    /// Whether no records are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffered_count == 0
    }
}
