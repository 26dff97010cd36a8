use crate::{skeleton::Bone, types::VERT_BONES};
use nalgebra_glm as glm;

/// A vertex as decoded from a model file, before partitioning. A bone slot
/// with a weight of 0 is unused and its index is ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceVertex {
    pub position: glm::Vec3,
    pub uv: glm::Vec2,
    pub normal: glm::Vec3,
    pub bone_idxs: [u8; VERT_BONES],
    pub bone_weights: [f32; VERT_BONES],
}

impl Default for SourceVertex {
    fn default() -> Self {
        Self {
            position: glm::vec3(0.0, 0.0, 0.0),
            uv: glm::vec2(0.0, 0.0),
            normal: glm::vec3(0.0, 0.0, 1.0),
            bone_idxs: [0; VERT_BONES],
            bone_weights: [0.0; VERT_BONES],
        }
    }
}

impl SourceVertex {
    /// Bone slots that actually influence this vertex
    pub fn influences(&self) -> impl Iterator<Item = (u8, f32)> + '_ {
        self.bone_idxs
            .iter()
            .zip(self.bone_weights.iter())
            .filter(|(_, &w)| w > 0.0)
            .map(|(&b, &w)| (b, w))
    }
}

/// A mesh before partitioning. Triangle indices are relative to this mesh's
/// own vertex list.
#[derive(Clone, Debug, Default)]
pub struct SourceMesh {
    pub name: String,
    pub vertices: Vec<SourceVertex>,
    pub triangles: Vec<[u32; 3]>,
}

impl SourceMesh {
    /// Checks that every triangle index refers to a vertex of this mesh
    ///
    /// # Errors
    /// Returns `ImportError::TriangleIndex` for the first bad index
    pub fn validate(&self) -> Result<(), ImportError> {
        let vertex_count = self.vertices.len();
        for (triangle, tri) in self.triangles.iter().enumerate() {
            if let Some(&index) =
                tri.iter().find(|&&i| i as usize >= vertex_count)
            {
                return Err(ImportError::TriangleIndex {
                    triangle,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

/// Everything the packing pipeline needs from a decoded model file
#[derive(Clone, Debug, Default)]
pub struct SourceModel {
    pub meshes: Vec<SourceMesh>,
    pub bones: Vec<Bone>,
}

/// Errors specific to importing data. `SpError` has a `From` trait to
/// handle these.
#[derive(Debug, PartialEq, Eq)]
pub enum ImportError {
    BoneOrder {
        bone: usize,
        parent: usize,
    },
    TriangleIndex {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    VertexWindow {
        mesh: usize,
    },
    BadText(u32),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::BoneOrder { bone, parent } => {
                write!(
                    f,
                    "bone {bone} is located before its parent bone {parent}"
                )
            }
            Self::TriangleIndex {
                triangle,
                index,
                vertex_count,
            } => {
                write!(
                    f,
                    "triangle {triangle} references vertex {index} but the \
                     mesh has {vertex_count} vertices"
                )
            }
            Self::VertexWindow { mesh } => {
                write!(f, "mesh {mesh} vertex range is outside the file")
            }
            Self::BadText(ofs) => {
                write!(f, "text offset {ofs} is not a valid string")
            }
        }
    }
}
