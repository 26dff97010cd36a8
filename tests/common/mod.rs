//! Helpers shared by the integration tests
#![allow(dead_code)]

use skelpack::mesh_import::{SourceMesh, SourceModel, SourceVertex};
use skelpack::skeleton::Bone;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes logging in a "once per test run" manner. Call at the start of
/// each test that needs logging.
pub fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

/// A vertex weighted evenly to up to 4 bones
pub fn vertex(bones: &[u8]) -> SourceVertex {
    let mut v = SourceVertex::default();
    #[allow(clippy::cast_precision_loss)]
    let w = 1.0 / bones.len() as f32;
    for (slot, &b) in bones.iter().enumerate() {
        v.bone_idxs[slot] = b;
        v.bone_weights[slot] = w;
    }
    v
}

/// A mesh where every triangle has its own three vertices, each given as
/// the list of bones it is weighted to
pub fn mesh(tris: &[[Vec<u8>; 3]]) -> SourceMesh {
    let mut m = SourceMesh {
        name: "test".into(),
        ..SourceMesh::default()
    };
    for corners in tris {
        let base = u32::try_from(m.vertices.len()).unwrap();
        for bones in corners {
            m.vertices.push(vertex(bones));
        }
        m.triangles.push([base, base + 1, base + 2]);
    }
    m
}

/// Small deterministic generator so tests don't need a random crate
pub struct Lcg(u64);

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    pub fn below(&mut self, n: u32) -> u32 {
        self.next() % n
    }

    /// Float in [-1, 1]
    pub fn unit(&mut self) -> f32 {
        (self.below(20_001) as f32).mul_add(0.0001, -1.0)
    }
}

/// A mesh with shared vertices where bones are spread along the vertex list,
/// so it splits into several submeshes. Some triangles join distant vertices
/// and reference too many bones.
pub fn random_mesh(seed: u64, n_verts: usize, n_tris: usize) -> SourceMesh {
    let mut rng = Lcg::new(seed);
    let n_bones = 40u32;
    let mut vertices = Vec::with_capacity(n_verts);
    for i in 0..n_verts {
        let mut v = SourceVertex {
            position: [rng.unit() * 5.0, rng.unit(), rng.unit() + 2.0].into(),
            uv: [rng.unit().abs(), rng.unit().abs()].into(),
            normal: [0.0, 1.0, 0.0].into(),
            ..SourceVertex::default()
        };
        let base = u32::try_from(i * n_bones as usize / n_verts).unwrap();
        let count = 1 + rng.below(4) as usize;
        let mut total = 0.0;
        for slot in 0..count {
            let bone = u8::try_from((base + 2 * slot as u32) % n_bones).unwrap();
            let w = 0.1 + rng.unit().abs();
            v.bone_idxs[slot] = bone;
            v.bone_weights[slot] = w;
            total += w;
        }
        for w in &mut v.bone_weights[..count] {
            *w /= total;
        }
        vertices.push(v);
    }
    let n = u32::try_from(n_verts).unwrap();
    let mut triangles = Vec::with_capacity(n_tris);
    for t in 0..n_tris {
        let a = rng.below(n);
        // Mostly local triangles, every 13th spans the whole mesh
        let tri = if t % 13 == 0 {
            [a, rng.below(n), rng.below(n)]
        } else {
            [a, (a + 1 + rng.below(3)) % n, (a + 2 + rng.below(4)) % n]
        };
        triangles.push(tri);
    }
    SourceMesh {
        name: format!("random{seed}"),
        vertices,
        triangles,
    }
}

/// Root, then a chain of children
pub fn bone_chain(n: usize) -> Vec<Bone> {
    (0..n)
        .map(|i| Bone {
            name: format!("bone{i}"),
            parent: i.checked_sub(1),
            translation: [0.0, 1.0, 0.0].into(),
            rotation: nalgebra_glm::quat(0.0, 0.0, 0.382_683_4, 0.923_879_5),
            scale: [1.0, 1.0, 1.0].into(),
        })
        .collect()
}

pub fn random_model(seed: u64) -> SourceModel {
    SourceModel {
        meshes: vec![
            random_mesh(seed, 120, 200),
            random_mesh(seed + 1, 30, 40),
            SourceMesh {
                name: "empty".into(),
                ..SourceMesh::default()
            },
        ],
        bones: bone_chain(40),
    }
}

/// Writes an IQM version 2 file. Only the parts the loader reads are
/// filled in.
#[derive(Default)]
pub struct IqmBuilder {
    text: Vec<u8>,
    /// name offset, first vertex, vertex count, first triangle, count
    meshes: Vec<[u32; 5]>,
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
    pub blend_idxs: Vec<[u8; 4]>,
    pub blend_weights: Vec<[u8; 4]>,
    pub triangles: Vec<[u32; 3]>,
    joints: Vec<(u32, i32, [f32; 10])>,
    /// Format code written for the position array
    pub position_format: u32,
}

pub const FMT_UBYTE: u32 = 1;
pub const FMT_HALF: u32 = 6;
pub const FMT_FLOAT: u32 = 7;

fn put(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn len32(buf: &[u8]) -> u32 {
    u32::try_from(buf.len()).unwrap()
}

impl IqmBuilder {
    pub fn new() -> Self {
        Self {
            // Offset 0 is the empty string
            text: vec![0],
            position_format: FMT_FLOAT,
            ..Self::default()
        }
    }

    fn add_text(&mut self, s: &str) -> u32 {
        let ofs = len32(&self.text);
        self.text.extend_from_slice(s.as_bytes());
        self.text.push(0);
        ofs
    }

    /// Adds a mesh over the given absolute vertex and triangle ranges
    pub fn mesh(&mut self, name: &str, verts: [u32; 2], tris: [u32; 2]) {
        let name = self.add_text(name);
        self.meshes.push([name, verts[0], verts[1], tris[0], tris[1]]);
    }

    /// Adds a vertex fully weighted to one bone
    pub fn vertex(&mut self, position: [f32; 3], bone: u8) {
        self.positions.push(position);
        self.uvs.push([0.5, 0.25]);
        self.normals.push([0.0, 0.0, 1.0]);
        self.blend_idxs.push([bone, 0, 0, 0]);
        self.blend_weights.push([255, 0, 0, 0]);
    }

    /// Translation, rotation as x, y, z, w and scale
    pub fn joint(&mut self, name: &str, parent: i32, pose: [f32; 10]) {
        let name = self.add_text(name);
        self.joints.push((name, parent, pose));
    }

    #[allow(clippy::too_many_lines)]
    pub fn build(&self) -> Vec<u8> {
        const HEADER: u32 = 124;
        let n_verts = u32::try_from(self.positions.len()).unwrap();

        // Everything after the header, with offsets relative to the file
        let mut body = Vec::new();
        let ofs_text = HEADER;
        body.extend_from_slice(&self.text);
        while body.len() % 4 != 0 {
            body.push(0);
        }

        let ofs_meshes = HEADER + len32(&body);
        for m in &self.meshes {
            put(&mut body, m[0]);
            put(&mut body, 0); // material
            for &v in &m[1..] {
                put(&mut body, v);
            }
        }

        // Five arrays: position, texcoord, normal, blend indexes, weights
        let ofs_vertexarrays = HEADER + len32(&body);
        let position_size = if self.position_format == FMT_HALF { 2 } else { 4 };
        // type, format, components, bytes per vertex
        let arrays = [
            (0u32, self.position_format, 3u32, 3 * position_size),
            (1, FMT_FLOAT, 2, 8),
            (2, FMT_FLOAT, 3, 12),
            (4, FMT_UBYTE, 4, 4),
            (5, FMT_UBYTE, 4, 4),
        ];
        let mut data_ofs = ofs_vertexarrays + 5 * 20;
        for (kind, format, comps, stride) in arrays {
            put(&mut body, kind);
            put(&mut body, 0); // flags
            put(&mut body, format);
            put(&mut body, comps);
            put(&mut body, data_ofs);
            data_ofs += stride * n_verts;
        }
        for p in &self.positions {
            for &c in p {
                if self.position_format == FMT_HALF {
                    body.extend_from_slice(&[0, 0x3c]); // 1.0
                } else {
                    put_f32(&mut body, c);
                }
            }
        }
        for uv in &self.uvs {
            uv.iter().for_each(|&c| put_f32(&mut body, c));
        }
        for n in &self.normals {
            n.iter().for_each(|&c| put_f32(&mut body, c));
        }
        for i in &self.blend_idxs {
            body.extend_from_slice(i);
        }
        for w in &self.blend_weights {
            body.extend_from_slice(w);
        }
        while body.len() % 4 != 0 {
            body.push(0);
        }

        let ofs_triangles = HEADER + len32(&body);
        for t in &self.triangles {
            t.iter().for_each(|&i| put(&mut body, i));
        }

        let ofs_joints = HEADER + len32(&body);
        for (name, parent, pose) in &self.joints {
            put(&mut body, *name);
            body.extend_from_slice(&parent.to_le_bytes());
            pose.iter().for_each(|&f| put_f32(&mut body, f));
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"INTERQUAKEMODEL\0");
        let fields = [
            2, // version
            HEADER + len32(&body),
            0, // flags
            len32(&self.text),
            ofs_text,
            u32::try_from(self.meshes.len()).unwrap(),
            ofs_meshes,
            5,
            n_verts,
            ofs_vertexarrays,
            u32::try_from(self.triangles.len()).unwrap(),
            ofs_triangles,
            0, // adjacency
            u32::try_from(self.joints.len()).unwrap(),
            ofs_joints,
        ];
        for f in fields {
            put(&mut out, f);
        }
        // Poses, anims, frames, bounds, comments and extensions are unused
        while out.len() < HEADER as usize {
            put(&mut out, 0);
        }
        out.extend_from_slice(&body);
        out
    }
}

/// Identity rest pose with a translation
pub fn pose(x: f32, y: f32, z: f32) -> [f32; 10] {
    [x, y, z, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
}
