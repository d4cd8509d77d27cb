//! Bounded per-partition replay window.

use shared_types::{BankHash, SequencedRecord, Slot};
use std::collections::VecDeque;

/// Retained tail of one partition's log, ordered by sequence number.
///
/// Appends normally arrive in order; a commit that lost the race to a
/// later sequence number is inserted at its sorted position. Eviction
/// is by count from the front.
#[derive(Debug)]
pub struct ReplayWindow {
    records: VecDeque<SequencedRecord>,
    capacity: usize,
    /// Closed sequence spans whose records were rolled back by a reorg.
    /// Resume tokens pointing into a span are stale by definition.
    invalidated: Vec<(u64, u64)>,
    /// Lowest sequence number ever evicted plus one, i.e. the oldest
    /// position `replay_from` can still serve.
    oldest_retained: u64,
}

impl ReplayWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            invalidated: Vec::new(),
            oldest_retained: 0,
        }
    }

    /// Insert a sequenced record, evicting from the front past capacity.
    pub fn push(&mut self, record: SequencedRecord) {
        let seq = record.sequence_number;
        if self
            .records
            .back()
            .is_some_and(|last| last.sequence_number > seq)
        {
            let at = self
                .records
                .partition_point(|r| r.sequence_number < seq);
            self.records.insert(at, record);
        } else {
            self.records.push_back(record);
        }

        while self.records.len() > self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                self.oldest_retained = evicted.sequence_number + 1;
            }
        }
        self.drop_aged_spans();
    }

    /// Records strictly after `sequence`, in order.
    pub fn after(&self, sequence: u64) -> Vec<SequencedRecord> {
        let from = self
            .records
            .partition_point(|r| r.sequence_number <= sequence);
        self.records.iter().skip(from).cloned().collect()
    }

    /// Every retained record, in order.
    pub fn all(&self) -> Vec<SequencedRecord> {
        self.records.iter().cloned().collect()
    }

    /// The retained record at exactly `sequence`, if any.
    pub fn get(&self, sequence: u64) -> Option<&SequencedRecord> {
        let at = self
            .records
            .partition_point(|r| r.sequence_number < sequence);
        self.records
            .get(at)
            .filter(|r| r.sequence_number == sequence)
    }

    pub fn oldest_retained(&self) -> u64 {
        self.oldest_retained
    }

    /// Highest sequence number retained, if the window is non-empty.
    pub fn latest(&self) -> Option<u64> {
        self.records.back().map(|r| r.sequence_number)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Mark every currently-retained record at or past `divergence_slot`
    /// as rolled back. Later appends (the replayed branch and its
    /// tombstones) are unaffected.
    pub fn invalidate_from_slot(&mut self, divergence_slot: Slot) {
        let doomed: Vec<u64> = self
            .records
            .iter()
            .filter(|r| r.slot() >= divergence_slot)
            .map(|r| r.sequence_number)
            .collect();
        let (Some(first), Some(last)) = (doomed.first(), doomed.last()) else {
            return;
        };
        self.invalidated.push((*first, *last));
    }

    /// Whether a resume position falls inside a rolled-back span.
    pub fn is_invalidated(&self, sequence: u64) -> bool {
        self.invalidated
            .iter()
            .any(|(start, end)| (*start..=*end).contains(&sequence))
    }

    /// Whether the retained record at `sequence` carries `checkpoint`.
    /// Positions older than the window answer `None`.
    pub fn checkpoint_matches(&self, sequence: u64, checkpoint: &BankHash) -> Option<bool> {
        self.get(sequence).map(|r| r.checkpoint_hash == *checkpoint)
    }

    fn drop_aged_spans(&mut self) {
        let oldest = self.oldest_retained;
        self.invalidated.retain(|(_, end)| *end >= oldest);
    }
}
