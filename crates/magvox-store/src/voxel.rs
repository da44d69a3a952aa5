//! Voxel records, material identifiers, and magnetization descriptors.

use glam::DVec3;
use magvox_coords::VoxelIndex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Compact material category stored with every voxel.
///
/// `MaterialId(1)` is the default "unassigned" material given to freshly
/// voxelized cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// Material assigned to voxels that have not been edited.
    pub const DEFAULT: Self = Self(1);
}

impl Default for MaterialId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Magnetization of one voxel: a magnitude and a direction in spherical angles.
///
/// A voxel either carries all three components or none of them; the
/// `Option<Magnetization>` on [`Voxel`] encodes that, and
/// [`Magnetization::from_components`] is the gate for data arriving as three
/// independent optional values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Magnetization {
    pub magnitude: f64,
    pub polar: f64,
    pub azimuth: f64,
}

impl Magnetization {
    /// Zero magnetization, the default for new voxels.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(magnitude: f64, polar: f64, azimuth: f64) -> Self {
        Self {
            magnitude,
            polar,
            azimuth,
        }
    }

    /// Builds a magnetization from three optional components.
    ///
    /// All present gives `Some`, all absent gives `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PartialMagnetization`] when only some of the
    /// components are present.
    pub fn from_components(
        magnitude: Option<f64>,
        polar: Option<f64>,
        azimuth: Option<f64>,
    ) -> Result<Option<Self>, StoreError> {
        match (magnitude, polar, azimuth) {
            (Some(m), Some(p), Some(a)) => Ok(Some(Self::new(m, p, a))),
            (None, None, None) => Ok(None),
            _ => Err(StoreError::PartialMagnetization { index: None }),
        }
    }

    /// Returns the components as a `[magnitude, polar, azimuth]` array.
    pub fn to_array(self) -> [f64; 3] {
        [self.magnitude, self.polar, self.azimuth]
    }
}

/// One stored voxel row.
#[derive(Clone, Debug, PartialEq)]
pub struct Voxel {
    /// Primary key within a partition.
    pub index: VoxelIndex,
    /// Continuous center, stored alongside the index for fast reads.
    pub center: DVec3,
    pub material: MaterialId,
    pub magnetization: Option<Magnetization>,
}

impl Voxel {
    /// Creates a voxel with the default material and zero magnetization.
    pub fn new(index: VoxelIndex, center: DVec3) -> Self {
        Self {
            index,
            center,
            material: MaterialId::DEFAULT,
            magnetization: Some(Magnetization::ZERO),
        }
    }

    /// Returns the editable state of this voxel (everything but the center).
    pub fn state(&self) -> VoxelState {
        VoxelState {
            index: self.index,
            material: self.material,
            magnetization: self.magnetization,
        }
    }
}

/// The editable state of a voxel: coordinates, material, and magnetization.
///
/// This is the unit recorded in a [`ModelDelta`](crate::ModelDelta). The
/// continuous center is not part of it because it is derived from the
/// partition's grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoxelState {
    pub index: VoxelIndex,
    pub material: MaterialId,
    pub magnetization: Option<Magnetization>,
}

impl VoxelState {
    /// Returns the state as `(ix, iy, iz, material, magnitude, polar, azimuth)`,
    /// with absent magnetization reported as `None` components.
    #[allow(clippy::type_complexity)]
    pub fn as_tuple(&self) -> (i32, i32, i32, u16, Option<f64>, Option<f64>, Option<f64>) {
        let m = self.magnetization;
        (
            self.index.ix,
            self.index.iy,
            self.index.iz,
            self.material.0,
            m.map(|m| m.magnitude),
            m.map(|m| m.polar),
            m.map(|m| m.azimuth),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_voxel_has_defaults() {
        let v = Voxel::new(VoxelIndex::new(1, 2, 3), DVec3::new(0.1, 0.2, 0.3));
        assert_eq!(v.material, MaterialId(1));
        assert_eq!(v.magnetization, Some(Magnetization::ZERO));
    }

    #[test]
    fn test_full_components_accepted() {
        let m = Magnetization::from_components(Some(1.0), Some(0.5), Some(0.25)).unwrap();
        assert_eq!(m, Some(Magnetization::new(1.0, 0.5, 0.25)));
    }

    #[test]
    fn test_absent_components_accepted() {
        assert_eq!(Magnetization::from_components(None, None, None).unwrap(), None);
    }

    #[test]
    fn test_partial_components_rejected() {
        for parts in [
            (Some(1.0), None, None),
            (None, Some(1.0), None),
            (None, None, Some(1.0)),
            (Some(1.0), Some(1.0), None),
            (None, Some(1.0), Some(1.0)),
        ] {
            let result = Magnetization::from_components(parts.0, parts.1, parts.2);
            assert!(
                matches!(result, Err(StoreError::PartialMagnetization { .. })),
                "expected rejection for {parts:?}"
            );
        }
    }

    #[test]
    fn test_state_tuple() {
        let mut v = Voxel::new(VoxelIndex::new(0, 0, 0), DVec3::ZERO);
        v.material = MaterialId(3);
        assert_eq!(
            v.state().as_tuple(),
            (0, 0, 0, 3, Some(0.0), Some(0.0), Some(0.0))
        );
        v.magnetization = None;
        assert_eq!(v.state().as_tuple(), (0, 0, 0, 3, None, None, None));
    }
}
