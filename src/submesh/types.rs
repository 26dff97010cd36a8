use crate::{bone_list::SubmeshBones, types::SUBMESH_BONES};
use nalgebra_glm as glm;

/// Where a triangle of the source mesh ended up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangleSlot {
    /// Index into `Partition::submeshes`
    Submesh(usize),
    /// The triangle references more bones than a submesh can hold
    Discarded,
}

/// An indexed submesh with its own compact vertex list. Vertex attributes
/// are still floats; this is consumed by the vertex packers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmeshGeometry {
    /// Index into the source mesh vertex list for each local vertex
    pub source_vertices: Vec<u32>,
    pub positions: Vec<glm::Vec3>,
    pub uvs: Vec<glm::Vec2>,
    pub normals: Vec<glm::Vec3>,
    /// Weight for each entry of `bones`, zero for bones that don't
    /// influence the vertex
    pub skinning_weights: Vec<[f32; SUBMESH_BONES]>,
    /// Indices into the local vertex lists above
    pub triangles: Vec<[usize; 3]>,
    /// Global bone indices in the order the vertices first use them
    pub bones: SubmeshBones,
}

impl SubmeshGeometry {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.source_vertices.len()
    }

    #[must_use]
    pub fn tri_count(&self) -> usize {
        self.triangles.len()
    }
}

/// Result of splitting one mesh into submeshes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Partition {
    pub submeshes: Vec<SubmeshGeometry>,
    /// One entry per source triangle
    pub assignment: Vec<TriangleSlot>,
}

impl Partition {
    /// Number of triangles that could not be placed in any submesh
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.assignment
            .iter()
            .filter(|&&s| s == TriangleSlot::Discarded)
            .count()
    }
}
