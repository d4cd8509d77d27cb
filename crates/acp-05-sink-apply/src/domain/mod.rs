//! Sink-apply domain model.

pub mod retry;

pub use retry::RetryPolicy;
