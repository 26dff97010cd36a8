// Fixed size records stored in a relocated block. Every field that refers
// to other data is a byte offset from the start of the block. No record or
// array is ever placed at offset 0 except the model record, so 0 marks an
// absent array.
use crate::types::SUBMESH_BONES;
use bytemuck::{Pod, Zeroable};

/// Sections start on this boundary
pub const ALIGN: usize = 4;

#[must_use]
pub const fn align_up(pos: usize) -> usize {
    (pos + ALIGN - 1) & !(ALIGN - 1)
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
pub struct ModelRecord {
    pub n_meshes: u32,
    pub meshes: u32,
    pub n_bones: u32,
    /// Array of `n_bones` offsets to NUL terminated names
    pub bone_names: u32,
    /// `i16` per bone, -1 for a root
    pub bone_parents: u32,
    pub bone_rest_pos: u32,
    pub bone_rest_rot: u32,
    pub bone_rest_scale: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
pub struct MeshRecord {
    pub name: u32,
    pub n_submeshes: u32,
    pub submeshes: u32,
    pub n_discarded: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct SubmeshRecord {
    pub n_verts: u32,
    pub n_tris: u32,
    pub verts_ofs: [f32; 3],
    pub verts_scale: [f32; 3],
    pub n_skinning_bones: u32,
    pub skinning_bone_idxs: [u8; SUBMESH_BONES],
    pub vert8s: u32,
    pub vert16s: u32,
}
