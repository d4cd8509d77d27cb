//! # Bounded Duplicate Cache
//!
//! Suppresses exact redeliveries of the same `IdempotencyKey` within a
//! recent window. The window is bounded by entry count (sized for several
//! seconds of peak throughput), not by time: the at-least-once transport
//! redelivers promptly, so insertion-order eviction is sufficient.
//!
//! Sharded by key hash so concurrent ingest tasks take different locks.

use parking_lot::Mutex;
use shared_types::IdempotencyKey;
use std::collections::{HashMap, VecDeque};

/// Configuration for the duplicate cache.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Total keys retained across all shards.
    pub window_size: usize,
    /// Number of shards. Must be a power of two.
    pub shards: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_size: 1 << 20,
            shards: 16,
        }
    }
}

struct Shard {
    seen: HashMap<IdempotencyKey, ()>,
    order: VecDeque<IdempotencyKey>,
    capacity: usize,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a key; returns false if it was already present.
    fn insert(&mut self, key: IdempotencyKey) -> bool {
        if self.seen.contains_key(&key) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key, ());
        self.order.push_back(key);
        true
    }
}

/// Sharded, bounded recent-window duplicate cache.
pub struct DedupCache {
    shards: Vec<Mutex<Shard>>,
    shard_mask: u64,
}

impl DedupCache {
    /// Create a cache from configuration.
    ///
    /// `shards` is rounded up to the next power of two; each shard gets an
    /// equal slice of the window.
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        let shard_count = config.shards.max(1).next_power_of_two();
        let per_shard = (config.window_size / shard_count).max(1);
        let shards = (0..shard_count)
            .map(|_| Mutex::new(Shard::new(per_shard)))
            .collect();
        Self {
            shards,
            shard_mask: (shard_count as u64) - 1,
        }
    }

    /// Record a key sighting.
    ///
    /// Returns `true` if the key is new within the window, `false` if it
    /// is a duplicate.
    pub fn check_and_insert(&self, key: &IdempotencyKey) -> bool {
        let idx = (Self::key_hash(key) & self.shard_mask) as usize;
        self.shards[idx].lock().insert(*key)
    }

    /// Check a key without inserting it.
    #[must_use]
    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        let idx = (Self::key_hash(key) & self.shard_mask) as usize;
        self.shards[idx].lock().seen.contains_key(key)
    }

    /// Current number of retained keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().seen.len()).sum()
    }

    /// Whether the cache holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // FNV-1a over the full key tuple.
    fn key_hash(key: &IdempotencyKey) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        let mut eat = |bytes: &[u8]| {
            for b in bytes {
                hash ^= u64::from(*b);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        };
        eat(&key.slot.to_le_bytes());
        eat(&key.write_version.to_le_bytes());
        eat(&key.transaction_index.to_le_bytes());
        eat(&key.pubkey);
        hash
    }
}
