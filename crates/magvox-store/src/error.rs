//! Storage error types.

use std::io;
use std::path::PathBuf;

use magvox_coords::{CoordError, VoxelIndex};

use crate::format::FormatError;
use crate::partition::PartitionBounds;

/// Errors raised by voxel stores, the partitioner, and the project catalogue.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A voxel write carried some but not all magnetization components.
    #[error("partial magnetization{}: all three components must be present or all absent", fmt_at(.index))]
    PartialMagnetization { index: Option<VoxelIndex> },

    /// One batch contained two different rows for the same key.
    #[error("conflicting rows for voxel {0} in one batch")]
    DuplicateKey(VoxelIndex),

    /// The store has no origin/pitch metadata yet.
    #[error("partition has no grid metadata (origin and voxel size)")]
    MissingGrid,

    /// Invalid grid configuration.
    #[error(transparent)]
    Grid(#[from] CoordError),

    /// Centering would move an index outside the `i32` range.
    #[error("structure spans {span} cells along one axis and cannot be centered")]
    SpanTooLarge { span: i64 },

    /// A write placed a voxel outside the partition's cube.
    #[error("voxel {index} lies outside partition bounds {bounds}")]
    OutsidePartition {
        index: VoxelIndex,
        bounds: PartitionBounds,
    },

    /// Partition edge lengths must be even and at least 2.
    #[error("invalid partition edge length {0}: must be even and at least 2")]
    InvalidEdgeLength(i32),

    /// A project or partition name that would escape the projects directory.
    #[error("invalid name {0:?}: use letters, digits, '-', '_' or '.'")]
    InvalidName(String),

    /// Voxelization produced no points.
    #[error("voxelization produced no voxels")]
    EmptyVoxelization,

    #[error("project {name:?} not found")]
    ProjectNotFound { name: String, available: Vec<String> },

    #[error("partition {partition:?} not found in project {project:?}")]
    PartitionNotFound {
        project: String,
        partition: String,
        available: Vec<String>,
    },

    /// A partition file failed to decode.
    #[error("corrupt partition file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors that stopped inconsistent data from being
    /// stored or loaded.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::PartialMagnetization { .. } | Self::DuplicateKey(_) | Self::Corrupt { .. }
        )
    }
}

fn fmt_at(index: &Option<VoxelIndex>) -> String {
    match index {
        Some(index) => format!(" at voxel {index}"),
        None => String::new(),
    }
}
