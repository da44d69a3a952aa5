//! Before/after records of voxel edits.

use serde::{Deserialize, Serialize};

use crate::voxel::VoxelState;

/// An immutable record of one change to a partition.
///
/// `old_voxels` holds the full prior state of every affected voxel and
/// `new_voxels` the full state after the change. An empty `old_voxels` means
/// the voxels were added; an empty `new_voxels` means they were deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelDelta {
    old_voxels: Vec<VoxelState>,
    new_voxels: Vec<VoxelState>,
}

impl ModelDelta {
    pub fn new(old_voxels: Vec<VoxelState>, new_voxels: Vec<VoxelState>) -> Self {
        Self {
            old_voxels,
            new_voxels,
        }
    }

    /// A delta recording that `added` voxels came into existence.
    pub fn addition(added: Vec<VoxelState>) -> Self {
        Self::new(Vec::new(), added)
    }

    /// A delta recording that `removed` voxels were deleted.
    pub fn deletion(removed: Vec<VoxelState>) -> Self {
        Self::new(removed, Vec::new())
    }

    pub fn old_voxels(&self) -> &[VoxelState] {
        &self.old_voxels
    }

    pub fn new_voxels(&self) -> &[VoxelState] {
        &self.new_voxels
    }

    pub fn is_addition(&self) -> bool {
        self.old_voxels.is_empty() && !self.new_voxels.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.new_voxels.is_empty() && !self.old_voxels.is_empty()
    }

    /// Number of distinct voxels touched by the change.
    pub fn len(&self) -> usize {
        self.old_voxels.len().max(self.new_voxels.len())
    }

    pub fn is_empty(&self) -> bool {
        self.old_voxels.is_empty() && self.new_voxels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::{Magnetization, MaterialId};
    use magvox_coords::VoxelIndex;

    fn state(material: u16) -> VoxelState {
        VoxelState {
            index: VoxelIndex::ZERO,
            material: MaterialId(material),
            magnetization: Some(Magnetization::ZERO),
        }
    }

    #[test]
    fn test_addition_and_deletion_shapes() {
        let add = ModelDelta::addition(vec![state(1)]);
        assert!(add.is_addition());
        assert!(!add.is_deletion());

        let del = ModelDelta::deletion(vec![state(1)]);
        assert!(del.is_deletion());
        assert!(!del.is_addition());
    }

    #[test]
    fn test_update_is_neither() {
        let d = ModelDelta::new(vec![state(1)], vec![state(3)]);
        assert!(!d.is_addition());
        assert!(!d.is_deletion());
        assert_eq!(d.len(), 1);
        assert_eq!(d.old_voxels()[0].material, MaterialId(1));
        assert_eq!(d.new_voxels()[0].material, MaterialId(3));
    }
}
