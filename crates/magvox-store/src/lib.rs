//! Persistent sparse voxel storage.
//!
//! Provides the partition-level [`VoxelStore`] with transactional writes, the
//! MVXP partition file format, spatial partitioning, surface extraction,
//! layer queries, and the on-disk project catalogue.

mod delta;
mod error;
pub mod format;
pub mod layers;
pub mod partition;
pub mod project;
mod store;
pub mod surface;
mod voxel;

pub use delta::ModelDelta;
pub use error::StoreError;
pub use format::FormatError;
pub use layers::{LayerEntry, LayerVoxel, layer_directory, layer_voxels};
pub use partition::{PartitionBounds, PartitionInfo, Partitioner};
pub use project::{CSV_HEADER, Project, ProjectCatalog, VoxelizationOutput, validate_name};
pub use store::{Transaction, VoxelStore};
pub use surface::{find_surface, is_surface, surface_points};
pub use voxel::{Magnetization, MaterialId, Voxel, VoxelState};
