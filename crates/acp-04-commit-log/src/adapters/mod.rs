//! Commit-log adapters.

pub mod memory;
