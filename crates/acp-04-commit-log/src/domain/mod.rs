//! Commit-log domain model.

pub mod window;

pub use window::ReplayWindow;
