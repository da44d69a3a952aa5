//! Binary encoding of partition files.
//!
//! The MVXP (Magvox Partition) format holds one partition: a small metadata
//! table followed by voxel rows keyed by `(ix, iy, iz)`.
//!
//! ## Binary Layout
//!
//! All integers and floats are little-endian.
//!
//! | Field | Size |
//! |-------|------|
//! | Magic bytes `b"MVXP"` | 4 |
//! | Format version (`u8`, currently 1) | 1 |
//! | Metadata entry count (`u16`) | 2 |
//! | Per entry: key length (`u8`), UTF-8 key, value (`f64`) | 1 + K + 8 |
//! | Voxel row count (`u32`) | 4 |
//! | Per row: `ix, iy, iz` (`i32`), `x, y, z` (`f64`), material (`u16`), magnetization mask (`u8`) | 39 |
//! | Per row, for each mask bit set: `magnitude`, `polar`, `azimuth` (`f64`) | 0 or 24 |
//!
//! Metadata keys come in two groups, each either fully present or absent:
//!
//! - grid: `origin_x`, `origin_y`, `origin_z`, `voxel_size`
//! - bounds: `lo_x`, `lo_y`, `lo_z`, `hi_x`, `hi_y`, `hi_z`, the partition's
//!   half-open cube as whole numbers. Every row must lie inside it.
//!
//! The magnetization mask must be `0b000` or `0b111`.

use glam::{DVec3, I64Vec3};
use magvox_coords::{CoordError, GridSpec, VoxelIndex};
use rustc_hash::FxHashSet;

use crate::partition::PartitionBounds;
use crate::voxel::{Magnetization, MaterialId, Voxel};

/// Magic bytes identifying the MVXP format.
const MAGIC: [u8; 4] = *b"MVXP";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

const GRID_KEYS: [&str; 4] = ["origin_x", "origin_y", "origin_z", "voxel_size"];
const BOUNDS_KEYS: [&str; 6] = ["lo_x", "lo_y", "lo_z", "hi_x", "hi_y", "hi_z"];

/// Largest magnitude an `f64` holds every integer up to.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

const MASK_MAGNITUDE: u8 = 0b001;
const MASK_POLAR: u8 = 0b010;
const MASK_AZIMUTH: u8 = 0b100;
const MASK_ALL: u8 = MASK_MAGNITUDE | MASK_POLAR | MASK_AZIMUTH;

/// Fixed bytes per row before the optional magnetization block.
const ROW_FIXED_LEN: usize = 3 * 4 + 3 * 8 + 2 + 1;

/// Errors that can occur while decoding a partition file.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The data does not start with the expected magic bytes.
    #[error("invalid magic bytes")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),
    /// The data is shorter than its headers claim.
    #[error("data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum expected byte count.
        expected: usize,
        /// Actual byte count received.
        actual: usize,
    },
    /// A metadata key is not valid UTF-8.
    #[error("metadata key is not valid UTF-8")]
    InvalidKey,
    /// Only some of the grid metadata keys are present.
    #[error("incomplete grid metadata: missing {0}")]
    IncompleteGrid(&'static str),
    /// The stored origin or pitch is invalid.
    #[error("invalid grid metadata: {0}")]
    InvalidGrid(#[from] CoordError),
    /// Only some of the bounds metadata keys are present.
    #[error("incomplete bounds metadata: missing {0}")]
    IncompleteBounds(&'static str),
    /// The stored bounds are not whole numbers or describe an empty range.
    #[error("invalid bounds metadata")]
    InvalidBounds,
    /// A row lies outside the partition's bounds.
    #[error("voxel {index} lies outside partition bounds {bounds}")]
    OutOfBounds {
        index: VoxelIndex,
        bounds: PartitionBounds,
    },
    /// A row carries some but not all magnetization components.
    #[error("partial magnetization at voxel {0}")]
    PartialMagnetization(VoxelIndex),
    /// Two rows share the same key.
    #[error("duplicate voxel {0}")]
    DuplicateVoxel(VoxelIndex),
    /// Bytes remain after the last row.
    #[error("{0} trailing bytes after last row")]
    TrailingBytes(usize),
}

/// Decoded contents of a partition file.
#[derive(Debug)]
pub struct PartitionData {
    pub grid: Option<GridSpec>,
    pub bounds: Option<PartitionBounds>,
    pub voxels: Vec<Voxel>,
}

/// Encodes a partition. Rows are written in the order given.
pub fn encode<'a>(
    grid: Option<&GridSpec>,
    bounds: Option<&PartitionBounds>,
    voxels: impl ExactSizeIterator<Item = &'a Voxel>,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + voxels.len() * (ROW_FIXED_LEN + 24));

    buf.extend_from_slice(&MAGIC);
    buf.push(FORMAT_VERSION);

    // Metadata table
    let mut entries: Vec<(&str, f64)> = Vec::with_capacity(GRID_KEYS.len() + BOUNDS_KEYS.len());
    if let Some(grid) = grid {
        let origin = grid.origin();
        entries.extend(GRID_KEYS.into_iter().zip([origin.x, origin.y, origin.z, grid.pitch()]));
    }
    if let Some(bounds) = bounds {
        let (lo, hi) = (bounds.lo.as_dvec3(), bounds.hi.as_dvec3());
        entries.extend(BOUNDS_KEYS.into_iter().zip([lo.x, lo.y, lo.z, hi.x, hi.y, hi.z]));
    }
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (key, value) in entries {
        buf.push(key.len() as u8);
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }

    // Voxel rows
    buf.extend_from_slice(&(voxels.len() as u32).to_le_bytes());
    for voxel in voxels {
        buf.extend_from_slice(&voxel.index.ix.to_le_bytes());
        buf.extend_from_slice(&voxel.index.iy.to_le_bytes());
        buf.extend_from_slice(&voxel.index.iz.to_le_bytes());
        buf.extend_from_slice(&voxel.center.x.to_le_bytes());
        buf.extend_from_slice(&voxel.center.y.to_le_bytes());
        buf.extend_from_slice(&voxel.center.z.to_le_bytes());
        buf.extend_from_slice(&voxel.material.0.to_le_bytes());
        match voxel.magnetization {
            Some(m) => {
                buf.push(MASK_ALL);
                for component in m.to_array() {
                    buf.extend_from_slice(&component.to_le_bytes());
                }
            }
            None => buf.push(0),
        }
    }

    buf
}

/// Decodes a partition file, validating every integrity rule in the format.
pub fn decode(data: &[u8]) -> Result<PartitionData, FormatError> {
    if data.len() < 4 || data[0..4] != MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let mut r = Reader::new(data, 4);

    let version = r.u8()?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    // Metadata table
    let entry_count = r.u16()? as usize;
    let mut metadata: Vec<(&str, f64)> = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let key_len = r.u8()? as usize;
        let key = std::str::from_utf8(r.take(key_len)?).map_err(|_| FormatError::InvalidKey)?;
        let value = r.f64()?;
        if !GRID_KEYS.iter().chain(&BOUNDS_KEYS).any(|k| *k == key) {
            tracing::warn!("ignoring unknown partition metadata key {key:?}");
        }
        metadata.push((key, value));
    }
    let grid = match key_group(&metadata, GRID_KEYS, FormatError::IncompleteGrid)? {
        Some([x, y, z, size]) => Some(GridSpec::new(DVec3::new(x, y, z), size)?),
        None => None,
    };
    let bounds = match key_group(&metadata, BOUNDS_KEYS, FormatError::IncompleteBounds)? {
        Some(values) => Some(decode_bounds(values)?),
        None => None,
    };

    // Voxel rows
    let row_count = r.u32()? as usize;
    // Every row needs at least the fixed part; reject absurd counts up front.
    r.require(row_count.saturating_mul(ROW_FIXED_LEN))?;

    let mut voxels = Vec::with_capacity(row_count);
    let mut seen = FxHashSet::default();
    for _ in 0..row_count {
        let index = VoxelIndex::new(r.i32()?, r.i32()?, r.i32()?);
        let center = DVec3::new(r.f64()?, r.f64()?, r.f64()?);
        let material = MaterialId(r.u16()?);
        let mask = r.u8()?;
        let magnetization = match mask {
            0 => None,
            MASK_ALL => Some(Magnetization::new(r.f64()?, r.f64()?, r.f64()?)),
            _ => return Err(FormatError::PartialMagnetization(index)),
        };
        if !seen.insert(index) {
            return Err(FormatError::DuplicateVoxel(index));
        }
        if let Some(bounds) = bounds
            && !bounds.contains(index)
        {
            return Err(FormatError::OutOfBounds { index, bounds });
        }
        voxels.push(Voxel {
            index,
            center,
            material,
            magnetization,
        });
    }

    if r.remaining() > 0 {
        return Err(FormatError::TrailingBytes(r.remaining()));
    }

    Ok(PartitionData {
        grid,
        bounds,
        voxels,
    })
}

/// Values of a group of keys that must appear together, or `None` if none
/// of them do.
fn key_group<const N: usize>(
    metadata: &[(&str, f64)],
    keys: [&'static str; N],
    incomplete: fn(&'static str) -> FormatError,
) -> Result<Option<[f64; N]>, FormatError> {
    let found = keys.map(|key| metadata.iter().find(|(k, _)| *k == key).map(|&(_, v)| v));
    if found.iter().all(Option::is_none) {
        return Ok(None);
    }
    let mut values = [0.0; N];
    for (slot, (value, key)) in values.iter_mut().zip(found.into_iter().zip(keys)) {
        *slot = value.ok_or_else(|| incomplete(key))?;
    }
    Ok(Some(values))
}

fn decode_bounds(values: [f64; 6]) -> Result<PartitionBounds, FormatError> {
    let whole = |v: f64| (v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER).then_some(v as i64);
    let [Some(lx), Some(ly), Some(lz), Some(hx), Some(hy), Some(hz)] = values.map(whole) else {
        return Err(FormatError::InvalidBounds);
    };
    let bounds = PartitionBounds {
        lo: I64Vec3::new(lx, ly, lz),
        hi: I64Vec3::new(hx, hy, hz),
    };
    if !bounds.is_valid() {
        return Err(FormatError::InvalidBounds);
    }
    Ok(bounds)
}

/// Bounds-checked little-endian cursor over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn require(&self, len: usize) -> Result<(), FormatError> {
        if self.remaining() < len {
            return Err(FormatError::Truncated {
                expected: self.pos.saturating_add(len),
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        self.require(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FormatError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, FormatError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, FormatError> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
