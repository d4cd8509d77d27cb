//! Cross-subsystem scenarios.

pub mod pipeline;
pub mod reorg;
pub mod resume;

use engine_runtime::{Engine, EngineConfig};
use sha2::{Digest, Sha256};
use shared_types::{BankHash, Pubkey, RawAccountUpdate, Slot, SlotStatusUpdate, SourceId};

/// Single-shard engine with small windows, convenient for scenarios.
pub fn test_engine() -> Engine {
    Engine::new(&test_config()).expect("engine wiring")
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        resolver_shards: 1,
        partitions: 4,
        replay_window: 64,
        ..EngineConfig::default()
    }
}

pub fn hash(n: u8) -> BankHash {
    let mut h = [0u8; 32];
    h[0] = n;
    h
}

pub fn pubkey(n: u8) -> Pubkey {
    let mut k = [0u8; 32];
    k[31] = n;
    k
}

/// A well-formed raw update with an inline blob and a matching digest.
pub fn raw_update(
    slot: Slot,
    write_version: u64,
    key: Pubkey,
    source: SourceId,
    bank: BankHash,
    parent: BankHash,
    lamports: u64,
) -> RawAccountUpdate {
    let data = vec![slot as u8, write_version as u8];
    let data_hash: [u8; 32] = Sha256::digest(&data).into();
    RawAccountUpdate {
        slot,
        write_version,
        transaction_index: 0,
        pubkey: key,
        owner: [0xAAu8; 32],
        lamports,
        data,
        data_hash,
        rent_epoch: 0,
        source_id: source,
        bank_hash: bank,
        parent_bank_hash: parent,
    }
}

/// Poll until `cond` holds; sink pipelines apply asynchronously.
pub async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn slot_status(source: SourceId, confirmed: Slot) -> SlotStatusUpdate {
    SlotStatusUpdate {
        source_id: source,
        processed_slot: confirmed + 2,
        confirmed_slot: confirmed,
        finalized_slot: confirmed.saturating_sub(32),
    }
}
