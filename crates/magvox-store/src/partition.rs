//! Spatial partitioning of a voxel population into cubes.
//!
//! Partition boundaries sit on the fixed lattice of odd multiples of `L / 2`:
//! cube `k` along an axis covers `[k*L - L/2, k*L + L/2)`. The cube around
//! the origin therefore straddles it, which is what a centered structure
//! wants.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use glam::I64Vec3;
use magvox_coords::VoxelIndex;

use crate::error::StoreError;
use crate::store::{VoxelStore, write_partition};
use crate::voxel::Voxel;

/// File extension of partition files.
pub const PARTITION_EXTENSION: &str = "mvx";

/// Prefix of partition names; the full name is `partition-{index}`.
pub const PARTITION_PREFIX: &str = "partition-";

/// Half-open index range `[lo, hi)` on every axis.
///
/// Held as `i64` so the cube around the top of the `i32` index range keeps
/// an exclusive upper bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionBounds {
    pub lo: I64Vec3,
    pub hi: I64Vec3,
}

impl PartitionBounds {
    pub fn contains(&self, index: VoxelIndex) -> bool {
        let i = I64Vec3::new(index.ix.into(), index.iy.into(), index.iz.into());
        i.cmpge(self.lo).all() && i.cmplt(self.hi).all()
    }

    /// `true` if the range is non-empty on every axis.
    pub fn is_valid(&self) -> bool {
        self.lo.cmplt(self.hi).all()
    }
}

impl fmt::Display for PartitionBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = (self.lo, self.hi);
        write!(f, "[({}, {}, {}), ({}, {}, {}))", lo.x, lo.y, lo.z, hi.x, hi.y, hi.z)
    }
}

/// Summary of one persisted partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Sequential, 1-based, counting only non-empty cubes.
    pub index: usize,
    pub name: String,
    pub bounds: PartitionBounds,
    pub voxel_count: usize,
}

impl PartitionInfo {
    pub fn file_name(&self) -> String {
        partition_file_name(&self.name)
    }
}

/// Name of the partition with the given sequential index.
pub fn partition_name(index: usize) -> String {
    format!("{PARTITION_PREFIX}{index}")
}

pub fn partition_file_name(name: &str) -> String {
    format!("{name}.{PARTITION_EXTENSION}")
}

/// Parses the sequential index out of a partition name.
pub fn partition_number(name: &str) -> Option<usize> {
    name.strip_prefix(PARTITION_PREFIX)?.parse().ok()
}

/// A non-empty cube together with the voxels it keeps.
#[derive(Debug)]
pub struct Partition<'s> {
    pub info: PartitionInfo,
    /// Sorted by key.
    pub voxels: Vec<&'s Voxel>,
}

/// Splits a store into cubes of a fixed, even edge length.
#[derive(Clone, Copy, Debug)]
pub struct Partitioner {
    edge: i32,
}

impl Partitioner {
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEdgeLength`] unless `edge` is even and at
    /// least 2.
    pub fn new(edge: i32) -> Result<Self, StoreError> {
        if edge < 2 || edge % 2 != 0 {
            return Err(StoreError::InvalidEdgeLength(edge));
        }
        Ok(Self { edge })
    }

    pub fn edge(&self) -> i32 {
        self.edge
    }

    fn half(&self) -> i64 {
        i64::from(self.edge / 2)
    }

    /// The cube coordinate `k` that contains index component `i`.
    fn cube_of(&self, i: i32) -> i64 {
        (i64::from(i) + self.half()).div_euclid(i64::from(self.edge))
    }

    fn cube_lo(&self, k: i64) -> i64 {
        k * i64::from(self.edge) - self.half()
    }

    /// Half-open ranges tiling `[min, max]` along one axis.
    ///
    /// The first range starts at the boundary at or below `min`; the last
    /// ends strictly above `max`.
    pub fn cube_ranges(&self, min: i32, max: i32) -> Vec<(i64, i64)> {
        if min > max {
            return Vec::new();
        }
        (self.cube_of(min)..=self.cube_of(max))
            .map(|k| (self.cube_lo(k), self.cube_lo(k + 1)))
            .collect()
    }

    /// Groups the store's voxels by cube, discarding empty cubes.
    ///
    /// Cubes come out in increasing `(x, y, z)` order and are numbered from 1.
    pub fn split<'s>(&self, store: &'s VoxelStore) -> Vec<Partition<'s>> {
        let mut cubes: BTreeMap<(i64, i64, i64), Vec<&'s Voxel>> = BTreeMap::new();
        for voxel in store.iter() {
            let i = voxel.index;
            cubes
                .entry((self.cube_of(i.ix), self.cube_of(i.iy), self.cube_of(i.iz)))
                .or_default()
                .push(voxel);
        }

        cubes
            .into_iter()
            .enumerate()
            .map(|(n, ((kx, ky, kz), mut voxels))| {
                voxels.sort_unstable_by_key(|v| v.index);
                let lo = I64Vec3::new(self.cube_lo(kx), self.cube_lo(ky), self.cube_lo(kz));
                let hi = I64Vec3::new(self.cube_lo(kx + 1), self.cube_lo(ky + 1), self.cube_lo(kz + 1));
                let index = n + 1;
                Partition {
                    info: PartitionInfo {
                        index,
                        name: partition_name(index),
                        bounds: PartitionBounds { lo, hi },
                        voxel_count: voxels.len(),
                    },
                    voxels,
                }
            })
            .collect()
    }

    /// The partitions [`split`](Self::split) would produce, without voxels.
    pub fn plan(&self, store: &VoxelStore) -> Vec<PartitionInfo> {
        self.split(store).into_iter().map(|p| p.info).collect()
    }

    /// Writes one partition file per non-empty cube into `dir`.
    ///
    /// Each file carries the store's grid metadata and its own cube bounds.
    pub fn write_partitions(&self, store: &VoxelStore, dir: &Path) -> Result<Vec<PartitionInfo>, StoreError> {
        let partitions = self.split(store);
        let mut infos = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let path: PathBuf = dir.join(partition.info.file_name());
            write_partition(&path, store.grid(), Some(&partition.info.bounds), partition.voxels)?;
            tracing::debug!(
                "wrote {} with {} voxels in {}",
                partition.info.name,
                partition.info.voxel_count,
                partition.info.bounds
            );
            infos.push(partition.info);
        }
        tracing::info!(
            "split {} voxels into {} partitions (edge {})",
            store.len(),
            infos.len(),
            self.edge
        );
        Ok(infos)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
