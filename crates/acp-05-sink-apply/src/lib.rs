//! # acp-05-sink-apply
//!
//! Sink Apply Coordinator: drives committed records into registered
//! sinks, one independent pipeline per sink.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Sink port**: idempotent `apply` keyed by
//!   `(IdempotencyKey, sequence_number)`, last-write-wins by causal
//!   order, tombstones revert or supersede
//! - **Isolation**: each sink has its own bounded queue, cursor, and
//!   task; a slow or failing sink never blocks the others
//! - **Retry**: transient failures back off exponentially with jitter,
//!   the cursor holds its position, and a degraded-health flag is raised
//! - **Bounded drain**: shutdown finishes in-flight applies within a
//!   configured timeout
//!
//! The in-memory account state store adapter implements the full
//! conflict and tombstone contract and backs the runtime's default
//! wiring.

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::state_store::InMemoryStateStore;
pub use domain::retry::RetryPolicy;
pub use error::{SinkApplyError, SinkApplyResult, SinkError};
pub use ports::outbound::{ApplyOutcome, Sink};
pub use service::{SinkApplyConfig, SinkApplyCoordinator, SinkHealth};
