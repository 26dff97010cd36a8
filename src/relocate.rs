//! Packing a model into one contiguous block
//!
//! The block can be copied, written to disk or moved between caches as raw
//! bytes. Every reference inside it is a `u32` byte offset from the start of
//! the block, so nothing needs fixing up after a move. Sections appear in
//! this order, each starting on a 4 byte boundary:
//!
//! 1. `ModelRecord`
//! 2. `MeshRecord` array
//! 3. per mesh: name, `SubmeshRecord` array, then per submesh its
//!    `Vertex8` and `Vertex16` arrays when present
//! 4. bone name offset array, then the NUL terminated names. Names may not
//!    contain NUL themselves.
//! 5. bone parents (`i16`), rest positions (`[f32; 3]`), rest rotations
//!    (`[f32; 4]` as x, y, z, w) and rest scales (`[f32; 3]`)

mod records;
mod view;

use crate::{
    model::SkeletalModel,
    sp_error::SpError,
    vertex::{Vertex16, Vertex8},
};
use bytemuck::{bytes_of, cast_slice, Pod};
use log::{debug, info};
use std::mem::size_of;

// Re-exports
pub use {
    records::{align_up, MeshRecord, ModelRecord, SubmeshRecord, ALIGN},
    view::RelocatedModel,
};

const fn name_size(name: &str) -> usize {
    name.len() + 1
}

/// Bytes needed to relocate `model`, including alignment padding
#[must_use]
pub fn byte_size(model: &SkeletalModel) -> usize {
    let mut size = size_of::<ModelRecord>();
    size = align_up(size) + model.meshes.len() * size_of::<MeshRecord>();
    for mesh in &model.meshes {
        size = align_up(size) + name_size(&mesh.name);
        size = align_up(size)
            + mesh.submeshes.len() * size_of::<SubmeshRecord>();
        for submesh in &mesh.submeshes {
            if let Some(v) = submesh.vert8s() {
                size = align_up(size) + std::mem::size_of_val(v);
            }
            if let Some(v) = submesh.vert16s() {
                size = align_up(size) + std::mem::size_of_val(v);
            }
        }
    }
    let n_bones = model.bones.len();
    size = align_up(size) + n_bones * size_of::<u32>();
    size += model.bones.iter().map(|b| name_size(&b.name)).sum::<usize>();
    size = align_up(size) + n_bones * size_of::<i16>();
    size = align_up(size) + n_bones * size_of::<[f32; 3]>();
    size = align_up(size) + n_bones * size_of::<[f32; 4]>();
    size = align_up(size) + n_bones * size_of::<[f32; 3]>();
    size
}

/// Sequential writer over the destination block
struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Zero pads to the next section boundary and returns its offset
    fn align(&mut self) -> usize {
        let next = align_up(self.pos);
        self.buf[self.pos..next].fill(0);
        self.pos = next;
        next
    }

    /// Starts a section of `len` bytes to be filled later with `put`
    fn reserve(&mut self, len: usize) -> usize {
        let start = self.align();
        self.pos += len;
        start
    }

    fn put(&mut self, ofs: usize, bytes: &[u8]) {
        self.buf[ofs..ofs + bytes.len()].copy_from_slice(bytes);
    }

    fn put_record<T: Pod>(&mut self, ofs: usize, record: &T) {
        self.put(ofs, bytes_of(record));
    }

    /// Appends an aligned array and returns its offset
    fn push_slice<T: Pod>(&mut self, items: &[T]) -> usize {
        let bytes: &[u8] = cast_slice(items);
        let start = self.reserve(bytes.len());
        self.put(start, bytes);
        start
    }

    /// Appends a NUL terminated string without aligning first
    fn push_str(&mut self, s: &str) -> usize {
        let start = self.pos;
        self.put(start, s.as_bytes());
        self.buf[start + s.len()] = 0;
        self.pos += name_size(s);
        start
    }
}

/// Offsets are only taken after the block size has been checked to fit in
/// a `u32`
#[allow(clippy::cast_possible_truncation)]
const fn ofs32(ofs: usize) -> u32 {
    ofs as u32
}

fn count32(n: usize) -> Result<u32, SpError> {
    u32::try_from(n).map_err(|_| SpError::VertexCountTooLarge)
}

fn write_vertices(
    w: &mut Writer,
    vert8s: Option<&[Vertex8]>,
    vert16s: Option<&[Vertex16]>,
) -> (u32, u32) {
    let v8 = vert8s.map_or(0, |v| ofs32(w.push_slice(v)));
    let v16 = vert16s.map_or(0, |v| ofs32(w.push_slice(v)));
    (v8, v16)
}

/// Writes `model` into the start of `dest` and returns the number of bytes
/// used, which is always `byte_size(model)`
///
/// # Errors
/// Returns `SpError::BufferTooSmall` if `dest` is shorter than
/// `byte_size(model)`, `SpError::DataNotConverted` if the block would be 4 GiB
/// or more, `SpError::IndexTooLarge` if a parent bone index does not fit
/// in an `i16` and `SpError::NameContainsNul` for a mesh or bone name that
/// could not be read back whole
///
/// # Panics
/// Will panic if the sections written do not add up to `byte_size`, which
/// would mean the two functions have gone out of step
pub fn relocate_into(
    dest: &mut [u8],
    model: &SkeletalModel,
) -> Result<usize, SpError> {
    let size = byte_size(model);
    if dest.len() < size {
        return Err(SpError::BufferTooSmall {
            needed: size,
            available: dest.len(),
        });
    }
    u32::try_from(size).map_err(|_| SpError::DataNotConverted)?;
    let parents = model
        .bones
        .iter()
        .map(|b| match b.parent {
            Some(p) => i16::try_from(p).map_err(|_| SpError::IndexTooLarge),
            None => Ok(-1),
        })
        .collect::<Result<Vec<i16>, SpError>>()?;
    let names = model.meshes.iter().map(|m| &m.name);
    if let Some(name) = names
        .chain(model.bones.iter().map(|b| &b.name))
        .find(|name| name.contains('\0'))
    {
        return Err(SpError::NameContainsNul(name.clone()));
    }

    let mut w = Writer::new(&mut dest[..size]);
    let model_ofs = w.reserve(size_of::<ModelRecord>());
    let meshes_ofs =
        w.reserve(model.meshes.len() * size_of::<MeshRecord>());

    for (i, mesh) in model.meshes.iter().enumerate() {
        w.align();
        let name = w.push_str(&mesh.name);
        let submeshes_ofs =
            w.reserve(mesh.submeshes.len() * size_of::<SubmeshRecord>());
        for (j, submesh) in mesh.submeshes.iter().enumerate() {
            let (vert8s, vert16s) =
                write_vertices(&mut w, submesh.vert8s(), submesh.vert16s());
            let record = SubmeshRecord {
                n_verts: count32(submesh.vertex_count())?,
                n_tris: count32(submesh.tri_count)?,
                verts_ofs: submesh.grid.ofs.into(),
                verts_scale: submesh.grid.scale.into(),
                n_skinning_bones: count32(submesh.skinning_bones.len())?,
                skinning_bone_idxs: submesh.skinning_bones.to_array(),
                vert8s,
                vert16s,
            };
            w.put_record(
                submeshes_ofs + j * size_of::<SubmeshRecord>(),
                &record,
            );
        }
        let record = MeshRecord {
            name: ofs32(name),
            n_submeshes: count32(mesh.submeshes.len())?,
            submeshes: if mesh.submeshes.is_empty() {
                0
            } else {
                ofs32(submeshes_ofs)
            },
            n_discarded: count32(mesh.discarded_tris)?,
        };
        w.put_record(meshes_ofs + i * size_of::<MeshRecord>(), &record);
        debug!("mesh {i} relocated, next offset {}", w.pos);
    }

    let names_ofs = w.reserve(model.bones.len() * size_of::<u32>());
    for (i, bone) in model.bones.iter().enumerate() {
        let name = ofs32(w.push_str(&bone.name));
        w.put_record(names_ofs + i * size_of::<u32>(), &name);
    }
    let parents_ofs = w.push_slice(&parents);
    let pos: Vec<[f32; 3]> =
        model.bones.iter().map(|b| b.translation.into()).collect();
    let pos_ofs = w.push_slice(&pos);
    let rot: Vec<[f32; 4]> = model
        .bones
        .iter()
        .map(|b| b.rotation.coords.into())
        .collect();
    let rot_ofs = w.push_slice(&rot);
    let scale: Vec<[f32; 3]> =
        model.bones.iter().map(|b| b.scale.into()).collect();
    let scale_ofs = w.push_slice(&scale);

    // Empty arrays are recorded as absent
    let present = |n: usize, ofs: usize| if n == 0 { 0 } else { ofs32(ofs) };
    let n_bones = model.bones.len();
    let record = ModelRecord {
        n_meshes: count32(model.meshes.len())?,
        meshes: present(model.meshes.len(), meshes_ofs),
        n_bones: count32(n_bones)?,
        bone_names: present(n_bones, names_ofs),
        bone_parents: present(n_bones, parents_ofs),
        bone_rest_pos: present(n_bones, pos_ofs),
        bone_rest_rot: present(n_bones, rot_ofs),
        bone_rest_scale: present(n_bones, scale_ofs),
    };
    w.put_record(model_ofs, &record);

    assert_eq!(w.pos, size, "relocated size differs from byte_size");
    info!(
        "Relocated {} meshes and {} bones into {size} bytes",
        model.meshes.len(),
        n_bones
    );
    Ok(size)
}

/// A model relocated into a block it owns
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelocatableModel {
    block: Vec<u8>,
}

impl RelocatableModel {
    /// Allocates a block of exactly `byte_size(model)` and relocates into it
    ///
    /// # Errors
    /// May return `SpError` from `relocate_into`
    pub fn new(model: &SkeletalModel) -> Result<Self, SpError> {
        let mut block = vec![0u8; byte_size(model)];
        relocate_into(&mut block, model)?;
        Ok(Self { block })
    }

    /// Wraps a block previously produced by `relocate_into`, checking that
    /// its model record can be read
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if the block is too short
    pub fn from_bytes(block: Vec<u8>) -> Result<Self, SpError> {
        RelocatedModel::new(&block)?;
        Ok(Self { block })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.block
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.block.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }

    /// Typed view of the block
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if the block is too short
    pub fn view(&self) -> Result<RelocatedModel<'_>, SpError> {
        RelocatedModel::new(&self.block)
    }

    /// Rebuilds an owned model from the block
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if an offset in the block is invalid
    pub fn to_model(&self) -> Result<SkeletalModel, SpError> {
        self.view()?.to_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Mesh, skeleton::Bone};

    #[test]
    fn empty_model() {
        let model = SkeletalModel::default();
        assert_eq!(byte_size(&model), size_of::<ModelRecord>());
        let r = RelocatableModel::new(&model).unwrap();
        assert_eq!(r.to_model().unwrap(), model);
        // Empty arrays are absent
        assert_eq!(r.view().unwrap().record(), ModelRecord::default());
    }

    #[test]
    fn dest_too_small() {
        let model = SkeletalModel::default();
        let mut dest = [0u8; 8];
        assert!(matches!(
            relocate_into(&mut dest, &model),
            Err(SpError::BufferTooSmall {
                needed: 32,
                available: 8
            })
        ));
    }

    #[test]
    fn nul_in_name_rejected() {
        let mut model = SkeletalModel::default();
        model.meshes.push(Mesh {
            name: "body\0lod1".into(),
            ..Mesh::default()
        });
        assert!(matches!(
            RelocatableModel::new(&model),
            Err(SpError::NameContainsNul(n)) if n == "body\0lod1"
        ));

        model.meshes[0].name = "body".into();
        model.bones.push(Bone {
            name: "root\0".into(),
            ..Bone::default()
        });
        assert!(matches!(
            RelocatableModel::new(&model),
            Err(SpError::NameContainsNul(_))
        ));

        model.bones[0].name = "root".into();
        let r = RelocatableModel::new(&model).unwrap();
        assert_eq!(r.to_model().unwrap(), model);
    }

    #[test]
    fn larger_dest_untouched_past_size() {
        let model = SkeletalModel::default();
        let mut dest = [0xaau8; 40];
        assert_eq!(relocate_into(&mut dest, &model).unwrap(), 32);
        assert!(dest[32..].iter().all(|&b| b == 0xaa));
    }
}
