use std::{error, fmt};

/// Unified error type
///
/// Errors found while decoding or validating source data are grouped in
/// `ImportError` and wrapped by the `ImportError` variant. A mismatch between
/// `relocate::byte_size` and the bytes actually written is not reported here
/// because it is a bug in this crate rather than a problem with the input.
#[derive(Debug)]
pub enum SpError {
    InvalidFile,
    UnsupportedVersion(u32),
    FileTooShort,
    DataNotConverted,
    IndexTooLarge,
    NameContainsNul(String),
    VertexCountTooLarge,
    BoneListFull,
    BufferTooSmall { needed: usize, available: usize },
    OutOfBounds { offset: usize, len: usize },
    SerdeYamlError(Box<serde_yaml::Error>),
    StdIoError(std::io::Error),
    ImportError(crate::mesh_import::ImportError),
}

impl error::Error for SpError {}

impl fmt::Display for SpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidFile => write!(f, "invalid file"),
            Self::UnsupportedVersion(v) => {
                write!(f, "file version {v} is not supported")
            }
            Self::FileTooShort => write!(f, "file too short"),
            Self::DataNotConverted => {
                write!(f, "data could not convert to a valid value")
            }
            Self::IndexTooLarge => write!(f, "index does not fit in 16 bits"),
            Self::NameContainsNul(name) => {
                write!(f, "name {name:?} contains a NUL byte")
            }
            Self::VertexCountTooLarge => {
                write!(f, "vertex count does not fit in 32 bits")
            }
            Self::BoneListFull => {
                write!(f, "bone list is already at its capacity")
            }
            Self::BufferTooSmall { needed, available } => {
                write!(
                    f,
                    "destination buffer holds {available} bytes but {needed} \
                     are needed"
                )
            }
            Self::OutOfBounds { offset, len } => {
                write!(
                    f,
                    "range of {len} bytes at offset {offset} is outside the \
                     block"
                )
            }
            Self::SerdeYamlError(e) => {
                write!(f, "serde_yaml::Error: {e}")
            }
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
            Self::ImportError(e) => write!(f, "import error: {e}"),
        }
    }
}

impl From<serde_yaml::Error> for SpError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::SerdeYamlError(Box::new(e))
    }
}

impl From<std::io::Error> for SpError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl From<crate::mesh_import::ImportError> for SpError {
    fn from(e: crate::mesh_import::ImportError) -> Self {
        Self::ImportError(e)
    }
}
