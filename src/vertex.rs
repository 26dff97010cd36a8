// Packed vertex formats for skinned submeshes. Both are unindexed triangle
// lists with one weight per submesh bone, laid out weights, uv, normal,
// position to match the hardware vertex order.
use crate::{
    quantize::{
        float_to_i16, float_to_i8, i16_to_float, i8_to_float, QuantGrid,
    },
    submesh::SubmeshGeometry,
    types::SUBMESH_BONES,
};
use bytemuck::{Pod, Zeroable};
use nalgebra_glm as glm;

/// 8 bit vertex. Lowest memory use, visibly coarse on large submeshes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
pub struct Vertex8 {
    pub bone_weights: [i8; SUBMESH_BONES],
    pub uv: [i8; 2],
    pub normal: [i8; 3],
    pub position: [i8; 3],
}

/// 16 bit vertex with 8 bit weights
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
pub struct Vertex16 {
    pub bone_weights: [i8; SUBMESH_BONES],
    pub uv: [i16; 2],
    pub normal: [i16; 3],
    pub position: [i16; 3],
}

fn weights_i8(weights: &[f32; SUBMESH_BONES]) -> [i8; SUBMESH_BONES] {
    weights.map(float_to_i8)
}

impl Vertex8 {
    /// Position in model space
    #[must_use]
    pub fn unpack_position(&self, grid: &QuantGrid) -> glm::Vec3 {
        let [x, y, z] = self.position.map(i8_to_float);
        grid.denormalize(&glm::vec3(x, y, z))
    }
}

impl Vertex16 {
    /// Position in model space
    #[must_use]
    pub fn unpack_position(&self, grid: &QuantGrid) -> glm::Vec3 {
        let [x, y, z] = self.position.map(i16_to_float);
        grid.denormalize(&glm::vec3(x, y, z))
    }
}

/// Expands the indexed submesh into 3 `Vertex8` per triangle. Positions are
/// quantized relative to `grid`.
#[must_use]
pub fn pack_vert8s(
    geometry: &SubmeshGeometry,
    grid: &QuantGrid,
) -> Vec<Vertex8> {
    geometry
        .triangles
        .iter()
        .flatten()
        .map(|&i| {
            let p = grid.normalize(&geometry.positions[i]);
            let uv = geometry.uvs[i];
            let n = geometry.normals[i];
            Vertex8 {
                bone_weights: weights_i8(&geometry.skinning_weights[i]),
                uv: [float_to_i8(uv.x), float_to_i8(uv.y)],
                normal: [float_to_i8(n.x), float_to_i8(n.y), float_to_i8(n.z)],
                position: [
                    float_to_i8(p.x),
                    float_to_i8(p.y),
                    float_to_i8(p.z),
                ],
            }
        })
        .collect()
}

/// Expands the indexed submesh into 3 `Vertex16` per triangle
#[must_use]
pub fn pack_vert16s(
    geometry: &SubmeshGeometry,
    grid: &QuantGrid,
) -> Vec<Vertex16> {
    geometry
        .triangles
        .iter()
        .flatten()
        .map(|&i| {
            let p = grid.normalize(&geometry.positions[i]);
            let uv = geometry.uvs[i];
            let n = geometry.normals[i];
            Vertex16 {
                bone_weights: weights_i8(&geometry.skinning_weights[i]),
                uv: [float_to_i16(uv.x), float_to_i16(uv.y)],
                normal: [
                    float_to_i16(n.x),
                    float_to_i16(n.y),
                    float_to_i16(n.z),
                ],
                position: [
                    float_to_i16(p.x),
                    float_to_i16(p.y),
                    float_to_i16(p.z),
                ],
            }
        })
        .collect()
}
