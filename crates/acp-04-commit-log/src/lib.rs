//! # acp-04-commit-log
//!
//! Ordered Commit Log: assigns each canonical record a monotonically
//! increasing sequence number within its partition and retains a bounded
//! replay window per partition for resume support.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Per-partition sequencing**: atomic counters, no global lock;
//!   partition is a deterministic hash of the account key
//! - **Durability port**: appends are acknowledged only after the
//!   outbound `LogTransport` accepted them
//! - **Bounded replay**: `replay_from` serves resume requests from the
//!   retained window, rejecting aged-out or rolled-back positions
//! - **Rollback marking**: reorgs invalidate the affected sequence spans
//!   so stale resume tokens are detected instead of silently replayed
//!
//! Ordering is promised within a partition only; consumers that need
//! per-account order get it because an account maps to one partition.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::memory::InMemoryTransport;
pub use error::{CommitLogError, CommitLogResult, ReplayError};
pub use ports::outbound::LogTransport;
pub use service::{CommitLog, CommitLogConfig};
