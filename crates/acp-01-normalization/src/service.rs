//! Normalizer service - validation plus duplicate suppression

use crate::dedup::{DedupCache, DedupConfig};
use crate::error::{NormalizeError, NormalizeResult};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use shared_types::{short_hex, ChangeRecord, RawAccountUpdate, SourceId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Outcome of normalizing one raw update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// A fresh canonical record, ready for fork resolution.
    Record(ChangeRecord),
    /// Exact duplicate within the recent window; dropped as a no-op.
    Duplicate,
}

/// Normalizer/Deduper.
///
/// Accepts raw per-source updates and produces either a canonical
/// [`ChangeRecord`], a duplicate no-op, or a rejection. Rejections and
/// duplicates are counted per source; neither is fatal.
pub struct Normalizer {
    cache: DedupCache,
    duplicates: RwLock<BTreeMap<SourceId, u64>>,
    rejected: AtomicU64,
    accepted: AtomicU64,
    slot_floor: AtomicU64,
}

impl Normalizer {
    /// Create a normalizer with the given dedup window configuration.
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self {
            cache: DedupCache::new(config),
            duplicates: RwLock::new(BTreeMap::new()),
            rejected: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            slot_floor: AtomicU64::new(0),
        }
    }

    /// Raise the finalized floor. Updates at slots strictly below it
    /// are rejected as impossible; the floor never lowers.
    pub fn raise_floor(&self, slot: u64) {
        self.slot_floor.fetch_max(slot, Ordering::Relaxed);
    }

    /// Normalize one raw update.
    ///
    /// # Errors
    ///
    /// Returns a [`NormalizeError`] for malformed input: zero pubkey or
    /// bank hash, self-referential lineage, a slot already below the
    /// finalized floor, or an inline data blob whose digest does not
    /// match `data_hash`. An empty blob with a non-zero digest means
    /// the data is stored externally and is accepted as-is.
    pub fn normalize(&self, raw: RawAccountUpdate) -> NormalizeResult<NormalizeOutcome> {
        self.validate(&raw).inspect_err(|_| {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        })?;

        let record = ChangeRecord::from(raw);
        let key = record.idempotency_key();
        if !self.cache.check_and_insert(&key) {
            let mut dup = self.duplicates.write();
            *dup.entry(record.source_id).or_insert(0) += 1;
            debug!(
                source = record.source_id,
                slot = record.slot,
                pubkey = %short_hex(&record.pubkey),
                "Duplicate update dropped"
            );
            return Ok(NormalizeOutcome::Duplicate);
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(NormalizeOutcome::Record(record))
    }

    /// Duplicate count for one source.
    #[must_use]
    pub fn duplicates_for(&self, source_id: SourceId) -> u64 {
        self.duplicates.read().get(&source_id).copied().unwrap_or(0)
    }

    /// Total duplicates across all sources.
    #[must_use]
    pub fn total_duplicates(&self) -> u64 {
        self.duplicates.read().values().sum()
    }

    /// Total malformed updates rejected.
    #[must_use]
    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Total records accepted.
    #[must_use]
    pub fn total_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    fn validate(&self, raw: &RawAccountUpdate) -> NormalizeResult<()> {
        if raw.pubkey == [0u8; 32] {
            return Err(NormalizeError::ZeroPubkey {
                source_id: raw.source_id,
                slot: raw.slot,
            });
        }
        if raw.bank_hash == [0u8; 32] {
            return Err(NormalizeError::ZeroBankHash {
                source_id: raw.source_id,
                slot: raw.slot,
            });
        }
        if raw.bank_hash == raw.parent_bank_hash {
            return Err(NormalizeError::SelfParent {
                source_id: raw.source_id,
                slot: raw.slot,
            });
        }
        let floor = self.slot_floor.load(Ordering::Relaxed);
        if raw.slot < floor {
            return Err(NormalizeError::SlotBelowFloor {
                source_id: raw.source_id,
                slot: raw.slot,
                floor,
            });
        }
        // Verify the integrity digest only when the blob travels inline.
        if !raw.data.is_empty() {
            let digest: [u8; 32] = Sha256::digest(&raw.data).into();
            if digest != raw.data_hash {
                return Err(NormalizeError::DataHashMismatch {
                    pubkey_hex: short_hex(&raw.pubkey),
                    slot: raw.slot,
                });
            }
        }
        Ok(())
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}
