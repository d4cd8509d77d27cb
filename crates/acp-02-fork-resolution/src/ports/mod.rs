//! Fork-resolution ports.

pub mod inbound;
pub mod outbound;
