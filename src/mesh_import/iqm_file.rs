// Reference for the file layout:
// https://github.com/lsalzman/iqm/blob/master/iqm.txt

use super::types::{ImportError, SourceMesh, SourceModel, SourceVertex};
use crate::{skeleton::Bone, sp_error::SpError, types::VERT_BONES};
use itertools::izip;
use log::{debug, info, warn};
use nalgebra_glm as glm;
use std::{fs, path::Path};

pub const MAGIC: &[u8; 16] = b"INTERQUAKEMODEL\0";
pub const VERSION: u32 = 2;
pub const HEADER_SIZE: usize = 124;

const MESH_SIZE: usize = 24;
const VERT_ARRAY_SIZE: usize = 20;
const TRIANGLE_SIZE: usize = 12;
const JOINT_SIZE: usize = 48;

/// Bone indices at or above this are replaced by 0
const MAX_BONES: u32 = 256;

#[derive(Debug)]
struct Header {
    filesize: u32,
    num_text: u32,
    ofs_text: u32,
    num_meshes: u32,
    ofs_meshes: u32,
    num_vertexarrays: u32,
    num_vertexes: u32,
    ofs_vertexarrays: u32,
    num_triangles: u32,
    ofs_triangles: u32,
    num_joints: u32,
    ofs_joints: u32,
}

/// Vertex array types the loader cares about
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ArrayType {
    Position,
    TexCoord,
    Normal,
    BlendIndexes,
    BlendWeights,
    Other(u32),
}

impl From<u32> for ArrayType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Position,
            1 => Self::TexCoord,
            2 => Self::Normal,
            4 => Self::BlendIndexes,
            5 => Self::BlendWeights,
            v => Self::Other(v),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Format {
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Half,
    Float,
    Double,
    Unknown(u32),
}

impl From<u32> for Format {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Byte,
            1 => Self::UByte,
            2 => Self::Short,
            3 => Self::UShort,
            4 => Self::Int,
            5 => Self::UInt,
            6 => Self::Half,
            7 => Self::Float,
            8 => Self::Double,
            v => Self::Unknown(v),
        }
    }
}

impl Format {
    const fn size(self) -> usize {
        match self {
            Self::Byte | Self::UByte | Self::Unknown(_) => 1,
            Self::Short | Self::UShort | Self::Half => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct VertArray {
    kind: ArrayType,
    format: Format,
    size: usize,
    offset: usize,
}

fn bytes(data: &[u8], ofs: usize, len: usize) -> Result<&[u8], SpError> {
    ofs.checked_add(len)
        .and_then(|end| data.get(ofs..end))
        .ok_or(SpError::FileTooShort)
}

fn dword(data: &[u8], ofs: usize) -> Result<u32, SpError> {
    Ok(u32::from_le_bytes(
        bytes(data, ofs, 4)?
            .try_into()
            .map_err(|_| SpError::DataNotConverted)?,
    ))
}

fn float(data: &[u8], ofs: usize) -> Result<f32, SpError> {
    Ok(f32::from_bits(dword(data, ofs)?))
}

/// Checks that `count` records of `record_size` bytes starting at `ofs` lie
/// inside the buffer, so counts from the file can be trusted for allocation
fn section(
    data: &[u8],
    what: &str,
    ofs: usize,
    count: usize,
    record_size: usize,
) -> Result<(), SpError> {
    count
        .checked_mul(record_size)
        .and_then(|len| ofs.checked_add(len))
        .filter(|&end| end <= data.len())
        .map(|_| ())
        .ok_or_else(|| {
            warn!(
                "{what}: {count} x {record_size} bytes at {ofs} is outside \
                 buffer length={}",
                data.len()
            );
            SpError::FileTooShort
        })
}

fn read_header(data: &[u8]) -> Result<Header, SpError> {
    let magic = bytes(data, 0, MAGIC.len()).map_err(|_| SpError::InvalidFile)?;
    if magic != MAGIC {
        return Err(SpError::InvalidFile);
    }
    let version = dword(data, 16)?;
    if version != VERSION {
        return Err(SpError::UnsupportedVersion(version));
    }
    if data.len() < HEADER_SIZE {
        return Err(SpError::FileTooShort);
    }
    let header = Header {
        filesize: dword(data, 20)?,
        num_text: dword(data, 28)?,
        ofs_text: dword(data, 32)?,
        num_meshes: dword(data, 36)?,
        ofs_meshes: dword(data, 40)?,
        num_vertexarrays: dword(data, 44)?,
        num_vertexes: dword(data, 48)?,
        ofs_vertexarrays: dword(data, 52)?,
        num_triangles: dword(data, 56)?,
        ofs_triangles: dword(data, 60)?,
        num_joints: dword(data, 68)?,
        ofs_joints: dword(data, 72)?,
    };
    if header.filesize as usize > data.len() {
        warn!(
            "header filesize={} but buffer length={}",
            header.filesize,
            data.len()
        );
        return Err(SpError::FileTooShort);
    }
    // Every vertex takes at least one byte of the file
    section(data, "vertexes", 0, header.num_vertexes as usize, 1)?;
    section(
        data,
        "vertex arrays",
        header.ofs_vertexarrays as usize,
        header.num_vertexarrays as usize,
        VERT_ARRAY_SIZE,
    )?;
    section(
        data,
        "meshes",
        header.ofs_meshes as usize,
        header.num_meshes as usize,
        MESH_SIZE,
    )?;
    section(
        data,
        "triangles",
        header.ofs_triangles as usize,
        header.num_triangles as usize,
        TRIANGLE_SIZE,
    )?;
    section(
        data,
        "joints",
        header.ofs_joints as usize,
        header.num_joints as usize,
        JOINT_SIZE,
    )?;
    Ok(header)
}

/// Reads a NUL terminated string from the text section
fn text(data: &[u8], header: &Header, ofs: u32) -> Result<String, SpError> {
    if ofs >= header.num_text {
        return Err(ImportError::BadText(ofs).into());
    }
    let section = bytes(
        data,
        header.ofs_text as usize,
        header.num_text as usize,
    )?;
    let tail = &section[ofs as usize..];
    let end = tail
        .iter()
        .position(|&c| c == 0)
        .ok_or(ImportError::BadText(ofs))?;
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

fn read_vert_arrays(
    data: &[u8],
    header: &Header,
) -> Result<Vec<VertArray>, SpError> {
    let mut arrays = Vec::with_capacity(header.num_vertexarrays as usize);
    for i in 0..header.num_vertexarrays as usize {
        let base = header.ofs_vertexarrays as usize + i * VERT_ARRAY_SIZE;
        // Layout is type, flags, format, size, offset
        let array = VertArray {
            kind: dword(data, base)?.into(),
            format: dword(data, base + 8)?.into(),
            size: dword(data, base + 12)? as usize,
            offset: dword(data, base + 16)? as usize,
        };
        if let ArrayType::Other(t) = array.kind {
            warn!(
                "Unrecognized vertex array (idx: {i}, type: {t}, fmt: {:?}, \
                 size: {})",
                array.format, array.size
            );
            continue;
        }
        debug!("vertex array {i}: {array:?}");
        let stride = array
            .size
            .checked_mul(array.format.size())
            .ok_or(SpError::FileTooShort)?;
        section(
            data,
            "vertex array",
            array.offset,
            header.num_vertexes as usize,
            stride,
        )?;
        arrays.push(array);
    }
    Ok(arrays)
}

/// Reads one value of `format` at `ofs` and normalizes integer types by
/// their maximum
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn read_scalar_f32(
    data: &[u8],
    format: Format,
    ofs: usize,
) -> Result<Option<f32>, SpError> {
    let b = bytes(data, ofs, format.size())?;
    let value = match format {
        Format::Byte => f32::from(i8::from_le_bytes([b[0]])) / 127.0,
        Format::UByte => f32::from(b[0]) / 255.0,
        Format::Short => {
            f32::from(i16::from_le_bytes([b[0], b[1]])) / 32767.0
        }
        Format::UShort => {
            f32::from(u16::from_le_bytes([b[0], b[1]])) / 65535.0
        }
        Format::Int => {
            i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32
                / i32::MAX as f32
        }
        Format::UInt => {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32
                / u32::MAX as f32
        }
        Format::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        Format::Double => {
            let mut d = [0u8; 8];
            d.copy_from_slice(b);
            f64::from_le_bytes(d) as f32
        }
        Format::Half | Format::Unknown(_) => return Ok(None),
    };
    Ok(Some(value))
}

/// Reads one integer value of `format` at `ofs`. Float types are not
/// meaningful as indices.
fn read_scalar_u32(
    data: &[u8],
    format: Format,
    ofs: usize,
) -> Result<Option<u32>, SpError> {
    let b = bytes(data, ofs, format.size())?;
    let value = match format {
        Format::Byte | Format::UByte => u32::from(b[0]),
        Format::Short | Format::UShort => {
            u32::from(u16::from_le_bytes([b[0], b[1]]))
        }
        Format::Int | Format::UInt => {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        }
        Format::Half
        | Format::Float
        | Format::Double
        | Format::Unknown(_) => return Ok(None),
    };
    Ok(Some(value))
}

/// Converts a vertex array to `element_len` floats per vertex. Elements the
/// array doesn't provide, or all of them if the array is missing or in an
/// unsupported format, are filled from `default`.
fn parse_float_array(
    data: &[u8],
    array: Option<&VertArray>,
    n_verts: usize,
    default: &[f32],
) -> Result<Vec<f32>, SpError> {
    let element_len = default.len();
    let mut out = Vec::with_capacity(n_verts * element_len);
    let Some(array) = array else {
        for _ in 0..n_verts {
            out.extend_from_slice(default);
        }
        return Ok(out);
    };
    if matches!(array.format, Format::Half | Format::Unknown(_)) {
        warn!(
            "{:?} array in format {:?} is not supported, using defaults",
            array.kind, array.format
        );
        return parse_float_array(data, None, n_verts, default);
    }
    let to_read = array.size.min(element_len);
    let stride = array.size * array.format.size();
    for i in 0..n_verts {
        for j in 0..element_len {
            if j < to_read {
                let ofs =
                    array.offset + i * stride + j * array.format.size();
                let value = read_scalar_f32(data, array.format, ofs)?;
                out.push(value.unwrap_or(default[j]));
            } else {
                out.push(default[j]);
            }
        }
    }
    Ok(out)
}

/// Converts a blend index array to 4 bone indices per vertex. Indices
/// outside the skeleton are replaced with 0.
fn parse_index_array(
    data: &[u8],
    array: Option<&VertArray>,
    n_verts: usize,
    max_value: u32,
) -> Result<Vec<[u8; VERT_BONES]>, SpError> {
    let mut out = vec![[0u8; VERT_BONES]; n_verts];
    let Some(array) = array else {
        return Ok(out);
    };
    let to_read = array.size.min(VERT_BONES);
    let stride = array.size * array.format.size();
    let mut invalid = 0usize;
    for (i, idxs) in out.iter_mut().enumerate() {
        for (j, idx) in idxs.iter_mut().enumerate().take(to_read) {
            let ofs = array.offset + i * stride + j * array.format.size();
            let Some(value) = read_scalar_u32(data, array.format, ofs)? else {
                warn!(
                    "blend indexes in format {:?} are not supported",
                    array.format
                );
                return Ok(vec![[0u8; VERT_BONES]; n_verts]);
            };
            *idx = match u8::try_from(value) {
                Ok(v) if value < max_value => v,
                _ => {
                    invalid += 1;
                    0
                }
            };
        }
    }
    if invalid > 0 {
        warn!("{invalid} blend indexes were out of range and set to 0");
    }
    Ok(out)
}

fn read_joints(data: &[u8], header: &Header) -> Result<Vec<Bone>, SpError> {
    let mut bones = Vec::with_capacity(header.num_joints as usize);
    for i in 0..header.num_joints as usize {
        let base = header.ofs_joints as usize + i * JOINT_SIZE;
        let name = text(data, header, dword(data, base)?)?;
        let parent = i32::from_le_bytes(dword(data, base + 4)?.to_le_bytes());
        let parent = usize::try_from(parent).ok();
        let f = |n: usize| float(data, base + 8 + n * 4);
        let bone = Bone {
            name,
            parent,
            translation: glm::vec3(f(0)?, f(1)?, f(2)?),
            // Stored as x, y, z, w
            rotation: glm::quat(f(3)?, f(4)?, f(5)?, f(6)?),
            scale: glm::vec3(f(7)?, f(8)?, f(9)?),
        };
        debug!(
            "Parsed bone: {i}, {:?}, parent={:?}, pos={:?}",
            bone.name, bone.parent, bone.translation
        );
        bones.push(bone);
    }
    info!("Parsed {} bones", bones.len());
    Ok(bones)
}

/// Decodes an IQM version 2 model held in memory. Only the data needed for
/// skinned meshes is read: positions, texture coordinates, normals, blend
/// indexes and weights, triangles and joints. Animations are ignored.
///
/// # Errors
/// May return `SpError`
#[allow(clippy::too_many_lines)]
pub fn load(data: &[u8]) -> Result<SourceModel, SpError> {
    let header = read_header(data)?;
    info!(
        "IQM meshes={}, vertices={}, triangles={}, joints={}",
        header.num_meshes,
        header.num_vertexes,
        header.num_triangles,
        header.num_joints,
    );

    let arrays = read_vert_arrays(data, &header)?;
    let find = |kind: ArrayType| arrays.iter().find(|a| a.kind == kind);
    let n_verts = header.num_vertexes as usize;

    let positions =
        parse_float_array(data, find(ArrayType::Position), n_verts, &[0.0; 3])?;
    let uvs =
        parse_float_array(data, find(ArrayType::TexCoord), n_verts, &[0.0; 2])?;
    let normals = parse_float_array(
        data,
        find(ArrayType::Normal),
        n_verts,
        &[0.0, 0.0, 1.0],
    )?;
    let weights = parse_float_array(
        data,
        find(ArrayType::BlendWeights),
        n_verts,
        &[0.0; VERT_BONES],
    )?;
    let idxs = parse_index_array(
        data,
        find(ArrayType::BlendIndexes),
        n_verts,
        header.num_joints.min(MAX_BONES),
    )?;

    let vertices: Vec<SourceVertex> = izip!(
        positions.chunks_exact(3),
        uvs.chunks_exact(2),
        normals.chunks_exact(3),
        weights.chunks_exact(VERT_BONES),
        idxs,
    )
    .map(|(p, uv, n, w, bone_idxs)| {
        let mut bone_weights = [0.0f32; VERT_BONES];
        bone_weights.copy_from_slice(w);
        SourceVertex {
            position: glm::vec3(p[0], p[1], p[2]),
            uv: glm::vec2(uv[0], uv[1]),
            normal: glm::vec3(n[0], n[1], n[2]),
            bone_idxs,
            bone_weights,
        }
    })
    .collect();

    let mut meshes = Vec::with_capacity(header.num_meshes as usize);
    for m in 0..header.num_meshes as usize {
        let base = header.ofs_meshes as usize + m * MESH_SIZE;
        let name = text(data, &header, dword(data, base)?)?;
        let first_vert = dword(data, base + 8)?;
        let vert_count = dword(data, base + 12)?;
        let first_tri = dword(data, base + 16)? as usize;
        let tri_count = dword(data, base + 20)? as usize;

        let end = (first_vert as usize)
            .checked_add(vert_count as usize)
            .filter(|&end| end <= n_verts)
            .ok_or(ImportError::VertexWindow { mesh: m })?;
        let window = first_vert as usize..end;
        if first_tri
            .checked_add(tri_count)
            .map_or(true, |end| end > header.num_triangles as usize)
        {
            return Err(SpError::FileTooShort);
        }

        let mut triangles = Vec::with_capacity(tri_count);
        for t in 0..tri_count {
            let ofs = header.ofs_triangles as usize
                + (first_tri + t) * TRIANGLE_SIZE;
            let mut tri = [0u32; 3];
            for (k, v) in tri.iter_mut().enumerate() {
                let raw = dword(data, ofs + k * 4)?;
                *v = raw.checked_sub(first_vert).ok_or(
                    ImportError::TriangleIndex {
                        triangle: t,
                        index: raw,
                        vertex_count: vert_count as usize,
                    },
                )?;
            }
            triangles.push(tri);
        }

        info!(
            "mesh={m}, name={name:?}, vertices={vert_count}, \
             triangles={tri_count}"
        );
        meshes.push(SourceMesh {
            name,
            vertices: vertices[window].to_vec(),
            triangles,
        });
    }

    let bones = read_joints(data, &header)?;
    Ok(SourceModel { meshes, bones })
}

/// Reads an IQM file from disk and decodes it with `load`
///
/// # Errors
/// May return `SpError`
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<SourceModel, SpError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    info!("{:?}, length={}", path, data.len());
    load(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_magic() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..16].copy_from_slice(b"INTERQUAKEMODEX\0");
        assert!(matches!(load(&data), Err(SpError::InvalidFile)));
        assert!(matches!(load(b"IQM"), Err(SpError::InvalidFile)));
    }

    #[test]
    fn bad_version() {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..16].copy_from_slice(MAGIC);
        data[16..20].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(
            load(&data),
            Err(SpError::UnsupportedVersion(1))
        ));
    }

    /// A valid header with every count zero
    fn empty_header() -> Vec<u8> {
        let mut data = vec![0u8; HEADER_SIZE];
        data[..16].copy_from_slice(MAGIC);
        data[16..20].copy_from_slice(&VERSION.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        data[20..24].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        data
    }

    fn set(data: &mut [u8], ofs: usize, value: u32) {
        data[ofs..ofs + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[test]
    fn empty_model() {
        let data = empty_header();
        let model = load(&data).unwrap();
        assert!(model.meshes.is_empty());
        assert!(model.bones.is_empty());
    }

    /// Counts larger than the file are rejected before anything is allocated
    #[test]
    fn huge_counts_rejected() {
        // num_meshes, num_vertexarrays, num_vertexes, num_triangles,
        // num_joints
        for field in [36, 44, 48, 56, 68] {
            let mut data = empty_header();
            set(&mut data, field, u32::MAX);
            assert!(
                matches!(load(&data), Err(SpError::FileTooShort)),
                "field at {field}"
            );
        }
        // A count that fits the file but not from its offset
        let mut data = empty_header();
        set(&mut data, 68, 1);
        set(&mut data, 72, u32::MAX);
        assert!(matches!(load(&data), Err(SpError::FileTooShort)));
    }

    /// A vertex array whose data runs past the end of the file
    #[test]
    fn vertex_array_past_end() {
        let mut data = empty_header();
        set(&mut data, 44, 1);
        set(&mut data, 52, 124);
        // Position, flags, float, 3 per vertex, offset 0
        for v in [0, 0, 7, 3, 0] {
            data.extend_from_slice(&u32::to_le_bytes(v));
        }
        set(&mut data, 48, 12);
        assert_eq!(load(&data).unwrap().meshes.len(), 0);
        set(&mut data, 48, 100);
        assert!(matches!(load(&data), Err(SpError::FileTooShort)));
    }

    #[test]
    fn scalar_formats() {
        let data = [0x80u8, 0xff, 0xff, 0x7f];
        assert_eq!(read_scalar_f32(&data, Format::UByte, 1).unwrap(), Some(1.0));
        assert_eq!(
            read_scalar_f32(&data, Format::Byte, 3).unwrap(),
            Some(1.0)
        );
        assert_eq!(
            read_scalar_f32(&data, Format::Short, 2).unwrap(),
            Some(1.0)
        );
        assert_eq!(read_scalar_f32(&data, Format::Half, 0).unwrap(), None);
        assert_eq!(
            read_scalar_u32(&data, Format::UShort, 0).unwrap(),
            Some(0xff80)
        );
        assert!(read_scalar_u32(&data, Format::UInt, 2).is_err());
    }
}
