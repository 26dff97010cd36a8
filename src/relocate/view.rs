use super::records::{MeshRecord, ModelRecord, SubmeshRecord};
use crate::{
    bone_list::SubmeshBones,
    model::{Mesh, SkeletalModel, Submesh},
    quantize::QuantGrid,
    skeleton::Bone,
    sp_error::SpError,
    vertex::{Vertex16, Vertex8},
};
use bytemuck::{pod_read_unaligned, Pod};
use nalgebra_glm as glm;
use std::mem::size_of;

/// Read only view of a relocated block. Records are read by value, so the
/// block does not need any particular alignment in memory.
#[derive(Clone, Copy, Debug)]
pub struct RelocatedModel<'a> {
    block: &'a [u8],
    record: ModelRecord,
}

const fn usize_of(ofs: u32) -> usize {
    ofs as usize
}

impl<'a> RelocatedModel<'a> {
    /// # Errors
    /// Returns `SpError::OutOfBounds` if the block can't hold a model record
    pub fn new(block: &'a [u8]) -> Result<Self, SpError> {
        let record = read::<ModelRecord>(block, 0)?;
        Ok(Self { block, record })
    }

    #[must_use]
    pub const fn record(&self) -> ModelRecord {
        self.record
    }

    #[must_use]
    pub const fn mesh_count(&self) -> usize {
        self.record.n_meshes as usize
    }

    #[must_use]
    pub const fn bone_count(&self) -> usize {
        self.record.n_bones as usize
    }

    /// # Errors
    /// Returns `SpError::OutOfBounds` if `idx` or the record offset is
    /// invalid
    pub fn mesh(&self, idx: usize) -> Result<MeshRecord, SpError> {
        element(self.block, self.record.meshes, self.mesh_count(), idx)
    }

    /// # Errors
    /// Returns `SpError::OutOfBounds` if `idx` or the record offset is
    /// invalid
    pub fn submesh(
        &self,
        mesh: &MeshRecord,
        idx: usize,
    ) -> Result<SubmeshRecord, SpError> {
        element(self.block, mesh.submeshes, usize_of(mesh.n_submeshes), idx)
    }

    /// 8 bit vertices of a submesh, `None` if they were not packed
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if the array is outside the block
    pub fn vert8s(
        &self,
        submesh: &SubmeshRecord,
    ) -> Result<Option<Vec<Vertex8>>, SpError> {
        array(self.block, submesh.vert8s, usize_of(submesh.n_verts))
    }

    /// 16 bit vertices of a submesh, `None` if they were not packed
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if the array is outside the block
    pub fn vert16s(
        &self,
        submesh: &SubmeshRecord,
    ) -> Result<Option<Vec<Vertex16>>, SpError> {
        array(self.block, submesh.vert16s, usize_of(submesh.n_verts))
    }

    /// # Errors
    /// Returns `SpError::OutOfBounds` if the name is not terminated inside
    /// the block
    pub fn mesh_name(&self, mesh: &MeshRecord) -> Result<String, SpError> {
        string(self.block, mesh.name)
    }

    /// # Errors
    /// Returns `SpError::OutOfBounds` if `idx` or the name is invalid
    pub fn bone_name(&self, idx: usize) -> Result<String, SpError> {
        let ofs: u32 = element(
            self.block,
            self.record.bone_names,
            self.bone_count(),
            idx,
        )?;
        string(self.block, ofs)
    }

    /// Parent of a bone, `None` for a root
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if `idx` is invalid
    pub fn bone_parent(&self, idx: usize) -> Result<Option<usize>, SpError> {
        let parent: i16 = element(
            self.block,
            self.record.bone_parents,
            self.bone_count(),
            idx,
        )?;
        Ok(usize::try_from(parent).ok())
    }

    /// Rest pose of a bone
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if `idx` is invalid
    pub fn bone(&self, idx: usize) -> Result<Bone, SpError> {
        let n = self.bone_count();
        let pos: [f32; 3] =
            element(self.block, self.record.bone_rest_pos, n, idx)?;
        let rot: [f32; 4] =
            element(self.block, self.record.bone_rest_rot, n, idx)?;
        let scale: [f32; 3] =
            element(self.block, self.record.bone_rest_scale, n, idx)?;
        Ok(Bone {
            name: self.bone_name(idx)?,
            parent: self.bone_parent(idx)?,
            translation: pos.into(),
            rotation: glm::quat(rot[0], rot[1], rot[2], rot[3]),
            scale: scale.into(),
        })
    }

    /// Rebuilds an owned model with the same field values as the one that
    /// was relocated
    ///
    /// # Errors
    /// Returns `SpError::OutOfBounds` if any offset in the block is invalid
    pub fn to_model(&self) -> Result<SkeletalModel, SpError> {
        let mut meshes = Vec::with_capacity(self.mesh_count());
        for i in 0..self.mesh_count() {
            let record = self.mesh(i)?;
            let mut submeshes =
                Vec::with_capacity(usize_of(record.n_submeshes));
            for j in 0..usize_of(record.n_submeshes) {
                let s = self.submesh(&record, j)?;
                let n_bones = usize_of(s.n_skinning_bones)
                    .min(s.skinning_bone_idxs.len());
                let mut skinning_bones = SubmeshBones::new();
                for &b in &s.skinning_bone_idxs[..n_bones] {
                    skinning_bones.try_push(b)?;
                }
                submeshes.push(Submesh {
                    tri_count: usize_of(s.n_tris),
                    skinning_bones,
                    grid: QuantGrid {
                        ofs: s.verts_ofs.into(),
                        scale: s.verts_scale.into(),
                    },
                    vert8s: self.vert8s(&s)?,
                    vert16s: self.vert16s(&s)?,
                });
            }
            meshes.push(Mesh {
                name: self.mesh_name(&record)?,
                submeshes,
                discarded_tris: usize_of(record.n_discarded),
            });
        }
        let bones = (0..self.bone_count())
            .map(|i| self.bone(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SkeletalModel { meshes, bones })
    }
}

fn range(block: &[u8], ofs: usize, len: usize) -> Result<&[u8], SpError> {
    ofs.checked_add(len)
        .and_then(|end| block.get(ofs..end))
        .ok_or(SpError::OutOfBounds { offset: ofs, len })
}

fn read<T: Pod>(block: &[u8], ofs: usize) -> Result<T, SpError> {
    Ok(pod_read_unaligned(range(block, ofs, size_of::<T>())?))
}

/// Reads entry `idx` of an array of `n` records at `ofs`
fn element<T: Pod>(
    block: &[u8],
    ofs: u32,
    n: usize,
    idx: usize,
) -> Result<T, SpError> {
    if idx >= n {
        return Err(SpError::OutOfBounds {
            offset: usize_of(ofs),
            len: (idx + 1) * size_of::<T>(),
        });
    }
    read(block, usize_of(ofs) + idx * size_of::<T>())
}

fn array<T: Pod>(
    block: &[u8],
    ofs: u32,
    n: usize,
) -> Result<Option<Vec<T>>, SpError> {
    if ofs == 0 {
        return Ok(None);
    }
    let bytes = range(block, usize_of(ofs), n * size_of::<T>())?;
    Ok(Some(
        bytes
            .chunks_exact(size_of::<T>())
            .map(pod_read_unaligned)
            .collect(),
    ))
}

fn string(block: &[u8], ofs: u32) -> Result<String, SpError> {
    let ofs = usize_of(ofs);
    let tail = block
        .get(ofs..)
        .ok_or(SpError::OutOfBounds { offset: ofs, len: 1 })?;
    let end = tail
        .iter()
        .position(|&c| c == 0)
        .ok_or(SpError::OutOfBounds {
            offset: ofs,
            len: tail.len() + 1,
        })?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}
