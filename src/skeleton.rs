use crate::mesh_import::ImportError;
use log::error;
use nalgebra_glm as glm;

/// A bone of the skeleton in its rest pose. Parents always come before their
/// children, which `validate_order` enforces.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: None,
            translation: glm::vec3(0.0, 0.0, 0.0),
            rotation: glm::quat(0.0, 0.0, 0.0, 1.0),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }
}

impl Bone {
    /// Rest transform relative to the parent: scale, then rotate, then
    /// translate
    #[must_use]
    pub fn local_transform(&self) -> glm::Mat4 {
        let m = glm::translation(&self.translation);
        let m = m * glm::quat_to_mat4(&self.rotation);
        glm::scale(&m, &self.scale)
    }
}

/// Checks that every bone's parent index is less than its own index. Rest
/// transforms are composed in a single forward pass, so any other order is
/// rejected outright.
///
/// # Errors
/// Returns `ImportError::BoneOrder` for the first bone out of order
pub fn validate_order(bones: &[Bone]) -> Result<(), ImportError> {
    for (bone, b) in bones.iter().enumerate() {
        if let Some(parent) = b.parent {
            if parent >= bone {
                error!(
                    "Bone {} {:?} is located before its parent bone {}",
                    bone, b.name, parent
                );
                return Err(ImportError::BoneOrder { bone, parent });
            }
        }
    }
    Ok(())
}

/// Model space rest transforms for every bone
///
/// # Errors
/// Returns `ImportError::BoneOrder` if the bones are not in topological order
pub fn rest_transforms(bones: &[Bone]) -> Result<Vec<glm::Mat4>, ImportError> {
    validate_order(bones)?;
    let mut out: Vec<glm::Mat4> = Vec::with_capacity(bones.len());
    for b in bones {
        let local = b.local_transform();
        let global = match b.parent {
            Some(parent) => out[parent] * local,
            None => local,
        };
        out.push(global);
    }
    Ok(out)
}

/// Inverses of `rest_transforms`, for moving rest pose vertices into bone
/// space before skinning. A degenerate transform (zero scale) inverts to the
/// identity.
///
/// # Errors
/// Returns `ImportError::BoneOrder` if the bones are not in topological order
pub fn inverse_rest_transforms(
    bones: &[Bone],
) -> Result<Vec<glm::Mat4>, ImportError> {
    Ok(rest_transforms(bones)?
        .iter()
        .map(|m| m.try_inverse().unwrap_or_else(glm::Mat4::identity))
        .collect())
}
