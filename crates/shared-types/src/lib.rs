//! # Shared Types Crate
//!
//! This crate contains the domain entities that cross subsystem boundaries
//! in the Account Change Propagation Engine.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Immutable Once Sequenced**: A `SequencedRecord` never changes after
//!   its sequence number is assigned.
//! - **Key-Based Identity**: Mutations are identified by `IdempotencyKey`;
//!   duplicate arrivals with the same key are no-ops everywhere.

pub mod entities;
pub mod errors;
pub mod sequenced;
pub mod watermarks;

pub use entities::*;
pub use errors::*;
pub use sequenced::*;
pub use watermarks::*;
