//! Small sets of bone indices
//!
//! Bone lists are tiny (a triangle references at most 12 bones and a submesh
//! at most 8) so a linear scan beats hashing. Insertion order is kept because
//! the position of a bone in a submesh list is also its slot in the skinning
//! weight vector.

use crate::{
    sp_error::SpError,
    types::{SUBMESH_BONES, TRI_BONES},
};
use smallvec::SmallVec;

/// An insertion ordered set of at most `N` bone indices
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoneList<const N: usize> {
    bones: SmallVec<[u8; N]>,
}

/// Bones referenced by one submesh
pub type SubmeshBones = BoneList<SUBMESH_BONES>;

/// Bones referenced by one triangle
pub type TriangleBones = BoneList<TRI_BONES>;

impl<const N: usize> BoneList<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bones: SmallVec::new(),
        }
    }

    /// Copies the bones of another list, failing if they don't fit
    ///
    /// # Errors
    /// Returns `SpError::BoneListFull` if `other` has more than `N` bones
    pub fn try_from_list<const M: usize>(
        other: &BoneList<M>,
    ) -> Result<Self, SpError> {
        let mut list = Self::new();
        list.union_from(other)?;
        Ok(list)
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bones
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bones.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, bone: u8) -> bool {
        self.bones.contains(&bone)
    }

    /// Position of `bone` in this list
    #[must_use]
    pub fn position(&self, bone: u8) -> Option<usize> {
        self.bones.iter().position(|&b| b == bone)
    }

    /// Adds `bone` if it is not already present and returns its position
    ///
    /// # Errors
    /// Returns `SpError::BoneListFull` if the bone is new and the list is full
    pub fn try_push(&mut self, bone: u8) -> Result<usize, SpError> {
        if let Some(pos) = self.position(bone) {
            return Ok(pos);
        }
        if self.bones.len() >= N {
            return Err(SpError::BoneListFull);
        }
        self.bones.push(bone);
        Ok(self.bones.len() - 1)
    }

    /// True if every bone in `self` is also in `other`
    #[must_use]
    pub fn is_subset<const M: usize>(&self, other: &BoneList<M>) -> bool {
        self.iter().all(|b| other.contains(b))
    }

    /// Number of bones in `self` that are not in `other`
    #[must_use]
    pub fn missing_count<const M: usize>(&self, other: &BoneList<M>) -> usize {
        self.iter().filter(|&b| !other.contains(b)).count()
    }

    /// Appends every bone of `other` not already present and returns the new
    /// length. Nothing is added if the result would not fit.
    ///
    /// # Errors
    /// Returns `SpError::BoneListFull` if the union has more than `N` bones
    pub fn union_from<const M: usize>(
        &mut self,
        other: &BoneList<M>,
    ) -> Result<usize, SpError> {
        if self.len() + other.missing_count(self) > N {
            return Err(SpError::BoneListFull);
        }
        for bone in other.iter() {
            self.try_push(bone)?;
        }
        Ok(self.len())
    }

    /// Copies the list into a zero padded array for fixed size storage
    #[must_use]
    pub fn to_array(&self) -> [u8; N] {
        let mut out = [0u8; N];
        out[..self.len()].copy_from_slice(&self.bones);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list<const N: usize>(bones: &[u8]) -> BoneList<N> {
        let mut l = BoneList::new();
        for &b in bones {
            l.try_push(b).unwrap();
        }
        l
    }

    #[test]
    fn push_ignores_duplicates() {
        let mut l: SubmeshBones = BoneList::new();
        assert_eq!(l.try_push(4).unwrap(), 0);
        assert_eq!(l.try_push(9).unwrap(), 1);
        assert_eq!(l.try_push(4).unwrap(), 0);
        assert_eq!(l.as_slice(), &[4, 9]);
    }

    #[test]
    fn push_past_capacity() {
        let mut l: SubmeshBones = list(&[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(matches!(l.try_push(8), Err(SpError::BoneListFull)));
        // Existing bones are still found when full
        assert_eq!(l.try_push(7).unwrap(), 7);
    }

    #[test]
    fn subset_and_missing() {
        let a: TriangleBones = list(&[1, 2]);
        let b: SubmeshBones = list(&[2, 3, 1]);
        let c: TriangleBones = list(&[1, 5, 6]);
        assert!(a.is_subset(&b));
        assert!(!c.is_subset(&b));
        assert_eq!(c.missing_count(&b), 2);
        assert_eq!(a.missing_count(&b), 0);
        // The empty list is a subset of anything
        assert!(TriangleBones::new().is_subset(&SubmeshBones::new()));
    }

    #[test]
    fn union_keeps_order() {
        let mut a: SubmeshBones = list(&[3, 1]);
        let b: TriangleBones = list(&[1, 7, 3, 2]);
        assert_eq!(a.union_from(&b).unwrap(), 4);
        assert_eq!(a.as_slice(), &[3, 1, 7, 2]);
    }

    #[test]
    fn union_overflow_leaves_list_alone() {
        let mut a: SubmeshBones = list(&[0, 1, 2, 3, 4, 5]);
        let b: TriangleBones = list(&[6, 7, 8]);
        assert!(matches!(a.union_from(&b), Err(SpError::BoneListFull)));
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn padded_array() {
        let a: SubmeshBones = list(&[9, 4]);
        assert_eq!(a.to_array(), [9, 4, 0, 0, 0, 0, 0, 0]);
    }
}
