//! Fork-resolution domain: lineage arena, slot buffers, tie-break.

pub mod buffer;
pub mod lineage;

pub use buffer::SlotBuffers;
pub use lineage::{ForkLineageNode, LineageArena};
