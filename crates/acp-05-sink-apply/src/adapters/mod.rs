//! Sink adapters.

pub mod state_store;
