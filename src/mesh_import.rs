pub mod iqm_file;
mod types;

// Re-exports
pub use types::{ImportError, SourceMesh, SourceModel, SourceVertex};
