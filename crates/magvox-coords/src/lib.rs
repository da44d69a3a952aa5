//! Grid coordinate system for voxelized structures.
//!
//! A structure is described by a continuous origin and a uniform voxel pitch.
//! Every continuous point maps to exactly one integer cell, and every cell has
//! a continuous center:
//!
//! ```rust
//! use glam::DVec3;
//! use magvox_coords::{GridSpec, VoxelIndex};
//!
//! let grid = GridSpec::new(DVec3::new(1.0, 0.0, 0.0), 0.5).unwrap();
//! let index = grid.to_index(DVec3::new(2.0, 0.5, -0.5)).unwrap();
//! assert_eq!(index, VoxelIndex::new(2, 1, -1));
//! assert_eq!(grid.center_of(index), DVec3::new(2.0, 0.5, -0.5));
//! ```
//!
//! # Rounding
//!
//! Points that fall exactly halfway between two cells are rounded half to even
//! (`f64::round_ties_even`). A point at `0.5` pitches lands in cell 0, one at
//! `1.5` pitches in cell 2. The rule is fixed because it decides which
//! partition a boundary voxel belongs to.

mod axis;
mod index;

use glam::DVec3;

pub use axis::Axis;
pub use index::{FACE_OFFSETS, VoxelIndex};

/// Errors raised by coordinate-system configuration and parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordError {
    /// The voxel pitch is zero, negative, or not finite.
    #[error("voxel pitch must be positive and finite, got {0}")]
    InvalidPitch(f64),
    /// One of the origin components is NaN or infinite.
    #[error("grid origin must be finite, got ({0}, {1}, {2})")]
    InvalidOrigin(f64, f64, f64),
    /// An axis name other than `x`, `y`, or `z`.
    #[error("invalid axis {0:?}; axis must be 'x', 'y', or 'z'")]
    InvalidAxis(String),
    /// A point whose cell lies outside the `i32` index range.
    #[error("point ({0}, {1}, {2}) maps outside the voxel index range")]
    PointOutOfRange(f64, f64, f64),
}

/// Origin and pitch of a uniform voxel grid.
///
/// Construction validates the pitch, so every live `GridSpec` converts
/// points without further checks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    origin: DVec3,
    pitch: f64,
}

impl GridSpec {
    /// Creates a grid from an origin and a voxel pitch.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::InvalidPitch`] if `pitch <= 0` or is not finite,
    /// and [`CoordError::InvalidOrigin`] if the origin is not finite.
    pub fn new(origin: DVec3, pitch: f64) -> Result<Self, CoordError> {
        if !pitch.is_finite() || pitch <= 0.0 {
            return Err(CoordError::InvalidPitch(pitch));
        }
        if !origin.is_finite() {
            return Err(CoordError::InvalidOrigin(origin.x, origin.y, origin.z));
        }
        Ok(Self { origin, pitch })
    }

    /// The continuous position of cell `(0, 0, 0)`.
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    /// Edge length of one voxel in model units.
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Maps a continuous point to its nearest cell, rounding half to even.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::PointOutOfRange`] if any component lands outside
    /// the `i32` range or is not finite.
    pub fn to_index(&self, point: DVec3) -> Result<VoxelIndex, CoordError> {
        let scaled = (point - self.origin) / self.pitch;
        let cell = |v: f64| {
            let r = v.round_ties_even();
            (r >= f64::from(i32::MIN) && r <= f64::from(i32::MAX)).then_some(r as i32)
        };
        match (cell(scaled.x), cell(scaled.y), cell(scaled.z)) {
            (Some(ix), Some(iy), Some(iz)) => Ok(VoxelIndex::new(ix, iy, iz)),
            _ => Err(CoordError::PointOutOfRange(point.x, point.y, point.z)),
        }
    }

    /// Returns the continuous center of a cell.
    pub fn center_of(&self, index: VoxelIndex) -> DVec3 {
        self.origin + index.as_dvec3() * self.pitch
    }

    /// Returns the grid whose cell `i` is this grid's cell `i + offset`.
    ///
    /// Used when integer coordinates are shifted so that centers stay put.
    pub fn shifted(&self, offset: VoxelIndex) -> Self {
        Self {
            origin: self.origin + offset.as_dvec3() * self.pitch,
            pitch: self.pitch,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
