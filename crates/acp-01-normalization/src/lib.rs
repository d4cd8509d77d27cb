//! # acp-01-normalization
//!
//! Normalizer/Deduper: the first stage of the propagation pipeline.
//!
//! ## Overview
//!
//! This subsystem provides:
//! - **Normalization**: heterogeneous per-source updates become one
//!   canonical [`ChangeRecord`](shared_types::ChangeRecord) shape
//! - **Validation**: malformed updates are rejected, counted, never fatal
//! - **De-duplication**: exact duplicates (same `IdempotencyKey`) inside a
//!   bounded recent window are dropped as no-ops
//!
//! ## Concurrency
//!
//! Purely a stateless transform plus a bounded cache lookup. The duplicate
//! cache is sharded by key hash so concurrent ingest tasks rarely contend,
//! and nothing here ever blocks on downstream state.

pub mod dedup;
pub mod error;
pub mod service;

pub use dedup::{DedupCache, DedupConfig};
pub use error::{NormalizeError, NormalizeResult};
pub use service::{NormalizeOutcome, Normalizer};
