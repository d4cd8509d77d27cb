//! # acp-02-fork-resolution
//!
//! Fork Resolver: decides which buffered updates belong to the canonical
//! chain and rolls back the ones that do not.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Lineage tracking**: an arena of blocks keyed by bank hash, parents
//!   referenced by key lookup (never live references), pruned by age
//! - **State machine**: per-block `Speculative → Canonical | Abandoned`
//! - **Tie-break**: most corroborating sources, then lexicographically
//!   smallest bank hash (deterministic, arrival-order-independent)
//! - **Rollback**: a bank-hash discontinuity at a previously-canonical
//!   slot emits compensating tombstones and replays the winning branch
//!
//! ## Data Flow
//!
//! ```text
//! Normalizer ──ChangeRecord──→ Fork Resolver ──canonical records──→ Commit Log
//!                                   │  ▲
//!                        tombstones │  │ watermark snapshots
//!                                   ▼  │
//!                             Watermark Tracker
//! ```
//!
//! Within one resolver instance the state machine is single-threaded
//! (one lock, linearizable transitions); the runtime shards accounts
//! across a fixed small number of resolver instances.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::buffer::SlotBuffers;
pub use domain::lineage::{ForkLineageNode, LineageArena};
pub use error::{ForkResolutionError, ForkResolutionResult};
pub use ports::inbound::{ForkResolutionApi, IngestOutcome, ReconcileSummary};
pub use ports::outbound::{CanonicalGateway, ReorgEvent};
pub use service::{ForkResolutionConfig, ForkResolutionService};
