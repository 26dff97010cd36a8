use crate::{
    bone_list::SubmeshBones,
    mesh_import::SourceModel,
    quantize::QuantGrid,
    skeleton::{self, Bone},
    sp_error::SpError,
    submesh::{partition, SubmeshGeometry},
    types::PackOptions,
    vertex::{pack_vert16s, pack_vert8s, Vertex16, Vertex8},
};
use log::{debug, error, info};

/// A drawable piece of a mesh that references at most `SUBMESH_BONES`
/// bones. Vertices are stored as unindexed triangle lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submesh {
    pub tri_count: usize,
    pub skinning_bones: SubmeshBones,
    pub grid: QuantGrid,
    pub vert8s: Option<Vec<Vertex8>>,
    pub vert16s: Option<Vec<Vertex16>>,
}

impl Submesh {
    /// Quantizes and packs the geometry into the streams `options` selects
    #[must_use]
    pub fn pack(geometry: &SubmeshGeometry, options: &PackOptions) -> Self {
        let grid = QuantGrid::from_positions(&geometry.positions);
        Self {
            tri_count: geometry.tri_count(),
            skinning_bones: geometry.bones.clone(),
            grid,
            vert8s: options.vert8.then(|| pack_vert8s(geometry, &grid)),
            vert16s: options.vert16.then(|| pack_vert16s(geometry, &grid)),
        }
    }

    /// Global bone indices in the order of the vertex weights
    #[must_use]
    pub fn skinning_bones(&self) -> &[u8] {
        self.skinning_bones.as_slice()
    }

    #[must_use]
    pub fn vert8s(&self) -> Option<&[Vertex8]> {
        self.vert8s.as_deref()
    }

    #[must_use]
    pub fn vert16s(&self) -> Option<&[Vertex16]> {
        self.vert16s.as_deref()
    }

    /// Vertices in the packed streams, 3 per triangle
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.tri_count * 3
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub submeshes: Vec<Submesh>,
    /// Triangles dropped because they reference too many bones
    pub discarded_tris: usize,
}

/// A skinned model ready for drawing or relocation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletalModel {
    pub meshes: Vec<Mesh>,
    pub bones: Vec<Bone>,
}

impl SkeletalModel {
    /// Validates the skeleton, splits every mesh into submeshes and packs
    /// their vertices
    ///
    /// # Errors
    /// Returns `SpError::ImportError` if the skeleton is out of order or a
    /// mesh has a bad triangle index. May return other `SpError` from
    /// partitioning.
    pub fn build(
        source: SourceModel,
        options: &PackOptions,
    ) -> Result<Self, SpError> {
        skeleton::validate_order(&source.bones)?;

        let mut meshes = Vec::with_capacity(source.meshes.len());
        for (i, mesh) in source.meshes.into_iter().enumerate() {
            let partition = partition(&mesh).map_err(|e| {
                error!("Mesh {i} {:?} rejected: {e}", mesh.name);
                e
            })?;
            let submeshes: Vec<Submesh> = partition
                .submeshes
                .iter()
                .enumerate()
                .map(|(j, g)| {
                    let s = Submesh::pack(g, options);
                    debug!(
                        "mesh {i} submesh {j}: tris={}, grid={:?}",
                        s.tri_count, s.grid
                    );
                    s
                })
                .collect();
            info!(
                "Mesh {i} {:?}: submeshes={}, discarded triangles={}",
                mesh.name,
                submeshes.len(),
                partition.discarded()
            );
            meshes.push(Mesh {
                name: mesh.name,
                submeshes,
                discarded_tris: partition.discarded(),
            });
        }

        Ok(Self {
            meshes,
            bones: source.bones,
        })
    }

    /// Total triangles across all submeshes
    #[must_use]
    pub fn tri_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| m.submeshes.iter())
            .map(|s| s.tri_count)
            .sum()
    }
}
