//! Greedy submesh partitioning
//!
//! Triangles are clustered so that each cluster references at most
//! `SUBMESH_BONES` bones. The heuristic is scan order dependent: the seed is
//! the first triangle with the most bones, and the cluster then grows by the
//! first triangle that adds the fewest new bones. Output for a given mesh is
//! always the same but is not the minimum number of submeshes.

use super::types::{Partition, SubmeshGeometry, TriangleSlot};
use crate::{
    bone_list::{SubmeshBones, TriangleBones},
    mesh_import::SourceMesh,
    sp_error::SpError,
    types::SUBMESH_BONES,
};
use ahash::AHashMap;
use log::{debug, info, trace, warn};

/// Bones with a nonzero weight on any corner of each triangle, in corner
/// then slot order
///
/// # Errors
/// Returns `SpError::ImportError` if a triangle index is outside the mesh
pub fn triangle_bones(
    mesh: &SourceMesh,
) -> Result<Vec<TriangleBones>, SpError> {
    mesh.validate()?;
    let mut out = Vec::with_capacity(mesh.triangles.len());
    for tri in &mesh.triangles {
        let mut bones = TriangleBones::new();
        for &v in tri {
            for (bone, _) in mesh.vertices[v as usize].influences() {
                bones.try_push(bone)?;
            }
        }
        out.push(bones);
    }
    Ok(out)
}

/// Assigns every unassigned triangle whose bones are already all in `bones`
fn sweep(
    bones: &SubmeshBones,
    submesh: usize,
    tri_bones: &[TriangleBones],
    slots: &mut [Option<TriangleSlot>],
) {
    for (tri, slot) in slots.iter_mut().enumerate() {
        if slot.is_none() && tri_bones[tri].is_subset(bones) {
            trace!("triangle {tri} -> submesh {submesh}");
            *slot = Some(TriangleSlot::Submesh(submesh));
        }
    }
}

/// Clusters triangles by bone set. Returns the final slot of every triangle
/// and the number of submeshes opened.
fn cluster(
    tri_bones: &[TriangleBones],
) -> Result<(Vec<TriangleSlot>, usize), SpError> {
    let mut slots: Vec<Option<TriangleSlot>> = vec![None; tri_bones.len()];
    let mut n_submeshes = 0usize;

    loop {
        // Seed with the first triangle that has the most bones
        let mut seed: Option<usize> = None;
        for (tri, bones) in tri_bones.iter().enumerate() {
            if slots[tri].is_some() {
                continue;
            }
            if seed.map_or(true, |s| bones.len() > tri_bones[s].len()) {
                seed = Some(tri);
            }
        }
        let Some(seed) = seed else {
            break;
        };

        if tri_bones[seed].len() > SUBMESH_BONES {
            warn!(
                "Discarding triangle {seed}: it references {} bones but a \
                 submesh can only hold {SUBMESH_BONES}",
                tri_bones[seed].len()
            );
            slots[seed] = Some(TriangleSlot::Discarded);
            continue;
        }

        let submesh = n_submeshes;
        n_submeshes += 1;
        let mut bones = SubmeshBones::try_from_list(&tri_bones[seed])?;
        slots[seed] = Some(TriangleSlot::Submesh(submesh));
        sweep(&bones, submesh, tri_bones, &mut slots);

        // Grow by the triangle that needs the fewest extra bones
        loop {
            let best = (0..tri_bones.len())
                .filter(|&tri| slots[tri].is_none())
                .map(|tri| (tri, tri_bones[tri].missing_count(&bones)))
                .min_by_key(|&(_, missing)| missing);
            let Some((tri, missing)) = best else {
                break;
            };
            if bones.len() + missing > SUBMESH_BONES {
                break;
            }
            bones.union_from(&tri_bones[tri])?;
            slots[tri] = Some(TriangleSlot::Submesh(submesh));
            sweep(&bones, submesh, tri_bones, &mut slots);
        }
        debug!(
            "submesh {submesh}: bones={:?}, assigned={}/{}",
            bones.as_slice(),
            slots.iter().filter(|s| s.is_some()).count(),
            slots.len()
        );
    }

    // Every triangle is either the seed of a cluster, swept into one or
    // discarded by the time no seed remains
    let slots = slots
        .into_iter()
        .map(|s| s.unwrap_or(TriangleSlot::Discarded))
        .collect();
    Ok((slots, n_submeshes))
}

/// Builds the compact indexed geometry of one submesh from its triangles
fn reconstruct(
    mesh: &SourceMesh,
    submesh: usize,
    slots: &[TriangleSlot],
) -> Result<SubmeshGeometry, SpError> {
    let mut geometry = SubmeshGeometry::default();
    let mut local: AHashMap<u32, usize> = AHashMap::new();

    for (tri, _) in slots
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s == TriangleSlot::Submesh(submesh))
    {
        let mut out = [0usize; 3];
        for (corner, &v) in out.iter_mut().zip(mesh.triangles[tri].iter()) {
            *corner = *local.entry(v).or_insert_with(|| {
                geometry.source_vertices.push(v);
                geometry.source_vertices.len() - 1
            });
        }
        geometry.triangles.push(out);
    }

    // The local bone order comes from the vertices, not from the order the
    // clustering found the bones in
    for &v in &geometry.source_vertices {
        let vertex = &mesh.vertices[v as usize];
        geometry.positions.push(vertex.position);
        geometry.uvs.push(vertex.uv);
        geometry.normals.push(vertex.normal);
        let mut weights = [0.0f32; SUBMESH_BONES];
        for (bone, weight) in vertex.influences() {
            let pos = geometry.bones.try_push(bone)?;
            weights[pos] = weight;
        }
        geometry.skinning_weights.push(weights);
    }
    Ok(geometry)
}

/// Splits a mesh into submeshes that each reference at most
/// `SUBMESH_BONES` bones. Triangles that reference more bones than that on
/// their own are discarded and reported as `TriangleSlot::Discarded`.
///
/// # Errors
/// Returns `SpError::ImportError` for a triangle index outside the mesh
pub fn partition(mesh: &SourceMesh) -> Result<Partition, SpError> {
    let tri_bones = triangle_bones(mesh)?;
    let (assignment, n_submeshes) = cluster(&tri_bones)?;

    let mut submeshes = Vec::with_capacity(n_submeshes);
    for submesh in 0..n_submeshes {
        let geometry = reconstruct(mesh, submesh, &assignment)?;
        debug!(
            "submesh {submesh}: vertices={}, triangles={}, bones={:?}",
            geometry.vertex_count(),
            geometry.tri_count(),
            geometry.bones.as_slice()
        );
        submeshes.push(geometry);
    }

    let partition = Partition {
        submeshes,
        assignment,
    };
    info!(
        "{:?}: triangles={}, submeshes={}, discarded={}",
        mesh.name,
        mesh.triangles.len(),
        partition.submeshes.len(),
        partition.discarded()
    );
    Ok(partition)
}
