mod partition;
mod types;

// Re-exports
pub use {
    partition::{partition, triangle_bones},
    types::{Partition, SubmeshGeometry, TriangleSlot},
};
