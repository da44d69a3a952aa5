//! Integer voxel coordinates.

use std::fmt;
use std::ops::{Add, Sub};

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

use crate::Axis;

/// Integer grid coordinates `(ix, iy, iz)` of one voxel.
///
/// Ordering is lexicographic on `(ix, iy, iz)`, which is the canonical
/// iteration order everywhere a deterministic order is needed. Serializes as
/// a `[ix, iy, iz]` array.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct VoxelIndex {
    pub ix: i32,
    pub iy: i32,
    pub iz: i32,
}

/// The six face-adjacent offsets: `±1` on exactly one axis.
pub const FACE_OFFSETS: [VoxelIndex; 6] = [
    VoxelIndex::new(1, 0, 0),
    VoxelIndex::new(-1, 0, 0),
    VoxelIndex::new(0, 1, 0),
    VoxelIndex::new(0, -1, 0),
    VoxelIndex::new(0, 0, 1),
    VoxelIndex::new(0, 0, -1),
];

impl VoxelIndex {
    pub const ZERO: Self = Self::new(0, 0, 0);

    pub const fn new(ix: i32, iy: i32, iz: i32) -> Self {
        Self { ix, iy, iz }
    }

    /// Component-wise sum, or `None` if any component overflows.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self::new(
            self.ix.checked_add(other.ix)?,
            self.iy.checked_add(other.iy)?,
            self.iz.checked_add(other.iz)?,
        ))
    }

    /// The six face-adjacent neighbours, in `+x, -x, +y, -y, +z, -z` order.
    ///
    /// A neighbour past the edge of the `i32` range is `None`.
    pub fn face_neighbors(self) -> [Option<Self>; 6] {
        FACE_OFFSETS.map(|o| self.checked_add(o))
    }

    /// Returns the component along `axis`.
    pub fn along(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.ix,
            Axis::Y => self.iy,
            Axis::Z => self.iz,
        }
    }

    /// Component-wise minimum.
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.ix.min(other.ix),
            self.iy.min(other.iy),
            self.iz.min(other.iz),
        )
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.ix.max(other.ix),
            self.iy.max(other.iy),
            self.iz.max(other.iz),
        )
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.ix, self.iy, self.iz)
    }

    pub fn as_dvec3(self) -> DVec3 {
        DVec3::new(self.ix as f64, self.iy as f64, self.iz as f64)
    }
}

impl Add for VoxelIndex {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.ix + other.ix, self.iy + other.iy, self.iz + other.iz)
    }
}

impl Sub for VoxelIndex {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.ix - other.ix, self.iy - other.iy, self.iz - other.iz)
    }
}

impl From<IVec3> for VoxelIndex {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[i32; 3]> for VoxelIndex {
    fn from([ix, iy, iz]: [i32; 3]) -> Self {
        Self::new(ix, iy, iz)
    }
}

impl From<VoxelIndex> for [i32; 3] {
    fn from(index: VoxelIndex) -> Self {
        [index.ix, index.iy, index.iz]
    }
}

impl fmt::Display for VoxelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.ix, self.iy, self.iz)
    }
}
