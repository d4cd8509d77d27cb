//! Commit-log ports.

pub mod outbound;
