//! Engine configuration.
//!
//! Loaded from a JSON file, then overridden by `ACP_*` environment
//! variables. Every field has a default so an empty config is valid.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Retry schedule for sink pipelines.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ingest feeds expected to report watermarks.
    pub expected_sources: u32,
    /// Per-source ingest feed queue depth.
    pub source_queue_capacity: usize,
    /// Slots a speculative block may trail the confirmed tip, and the
    /// retention horizon behind the finalized tip.
    pub reorg_buffer_depth: u64,
    /// Entries in the idempotency-key dedup cache.
    pub dedup_window: usize,
    /// Shards of the dedup cache.
    pub dedup_shards: usize,
    /// Fork-resolver shards; accounts are routed by pubkey hash.
    pub resolver_shards: u32,
    /// Commit-log sequencing partitions.
    pub partitions: u32,
    /// Replay records retained per partition.
    pub replay_window: usize,
    /// Per-subscriber fan-out queue depth.
    pub subscriber_queue_capacity: usize,
    /// Per-sink apply queue depth.
    pub sink_queue_capacity: usize,
    /// Seconds a subscriber may stay overflowed before termination.
    pub overflow_grace_secs: u64,
    /// Seconds without a watermark report before a source is unhealthy.
    pub liveness_timeout_secs: u64,
    /// Seconds shutdown waits for sink pipelines to drain.
    pub drain_timeout_secs: u64,
    /// Sink retry schedule.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expected_sources: 1,
            source_queue_capacity: 4_096,
            reorg_buffer_depth: 64,
            dedup_window: 1 << 20,
            dedup_shards: 16,
            resolver_shards: 4,
            partitions: 8,
            replay_window: 65_536,
            subscriber_queue_capacity: 256,
            sink_queue_capacity: 1_024,
            overflow_grace_secs: 5,
            liveness_timeout_secs: 30,
            drain_timeout_secs: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file, then apply environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        env_override("ACP_EXPECTED_SOURCES", &mut self.expected_sources);
        env_override("ACP_SOURCE_QUEUE_CAPACITY", &mut self.source_queue_capacity);
        env_override("ACP_REORG_BUFFER_DEPTH", &mut self.reorg_buffer_depth);
        env_override("ACP_DEDUP_WINDOW", &mut self.dedup_window);
        env_override("ACP_RESOLVER_SHARDS", &mut self.resolver_shards);
        env_override("ACP_PARTITIONS", &mut self.partitions);
        env_override("ACP_REPLAY_WINDOW", &mut self.replay_window);
        env_override(
            "ACP_SUBSCRIBER_QUEUE_CAPACITY",
            &mut self.subscriber_queue_capacity,
        );
        env_override("ACP_OVERFLOW_GRACE_SECS", &mut self.overflow_grace_secs);
        env_override("ACP_LIVENESS_TIMEOUT_SECS", &mut self.liveness_timeout_secs);
        env_override("ACP_DRAIN_TIMEOUT_SECS", &mut self.drain_timeout_secs);
    }

    pub fn overflow_grace(&self) -> Duration {
        Duration::from_secs(self.overflow_grace_secs)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

fn env_override<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *slot = parsed;
        }
    }
}
