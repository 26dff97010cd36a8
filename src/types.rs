use crate::sp_error::SpError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Maximum bones a submesh may reference. This is the size of the skinning
/// matrix palette on the target hardware and can't be changed without also
/// changing the vertex formats in `vertex`.
pub const SUBMESH_BONES: usize = 8;

/// Bone influences stored per source vertex
pub const VERT_BONES: usize = 4;

/// Vertices per triangle
pub const TRI_VERTS: usize = 3;

/// Most bones a single triangle can reference
pub const TRI_BONES: usize = TRI_VERTS * VERT_BONES;

/// Selects which packed vertex streams are written for each submesh.
/// Both are written by default so the choice between memory and precision
/// can be left until draw time.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug)]
#[serde(default)]
pub struct PackOptions {
    pub vert8: bool,
    pub vert16: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            vert8: true,
            vert16: true,
        }
    }
}

impl PackOptions {
    /// Parses options from a YAML document. Missing fields keep their
    /// default values.
    ///
    /// # Errors
    /// May return `SpError`
    pub fn from_yaml(text: &str) -> Result<Self, SpError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads options from a YAML file
    ///
    /// # Errors
    /// May return `SpError`
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SpError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}
