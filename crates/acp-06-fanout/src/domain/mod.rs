//! Fan-out domain model.

pub mod filter;
