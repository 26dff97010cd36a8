//! Skinned model packing for hardware with a small bone matrix palette
//!
//! Meshes are split into submeshes that each reference at most
//! `SUBMESH_BONES` bones, vertices are quantized into 8 or 16 bit formats,
//! and the result can be relocated into a single block of bytes that uses
//! offsets instead of pointers.
//!
//! ```no_run
//! # fn main() -> Result<(), skelpack::SpError> {
//! let options = skelpack::PackOptions::from_yaml_file("pack.yaml")?;
//! let data = std::fs::read("model.iqm")?;
//! let model = skelpack::load_iqm(&data, &options)?;
//! let block = skelpack::relocate::RelocatableModel::new(&model)?;
//! println!("{} bytes", block.len());
//! # Ok(())
//! # }
//! ```

pub mod bone_list;
pub mod mesh_import;
pub mod model;
pub mod quantize;
pub mod relocate;
pub mod skeleton;
pub mod sp_error;
pub mod submesh;
pub mod types;
pub mod vertex;

// Re-exports
pub use {
    model::{Mesh, SkeletalModel, Submesh},
    sp_error::SpError,
    types::{PackOptions, SUBMESH_BONES, TRI_BONES, TRI_VERTS, VERT_BONES},
};

/// Decodes an IQM file held in memory and builds a packed model from it
///
/// # Errors
/// May return `SpError`
pub fn load_iqm(
    data: &[u8],
    options: &PackOptions,
) -> Result<SkeletalModel, SpError> {
    let source = mesh_import::iqm_file::load(data)?;
    SkeletalModel::build(source, options)
}
