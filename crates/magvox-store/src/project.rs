//! Project catalogue: one directory of partition files per project.
//!
//! ```text
//! <projects_dir>/
//!   <project>/
//!     partition-1.mvx
//!     partition-2.mvx
//! ```
//!
//! Projects are created from voxelization output in a hidden staging
//! directory and swapped into place once every partition is written, so a
//! listing never shows a half-built project.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use glam::DVec3;
use magvox_coords::GridSpec;

use crate::error::StoreError;
use crate::partition::{PartitionInfo, Partitioner, partition_file_name, partition_number, PARTITION_EXTENSION};
use crate::store::VoxelStore;

/// CSV header written by [`Project::export_csv`].
pub const CSV_HEADER: &str = "x,y,z,materialID,magnet_magnitude,magnet_polar,magnet_azimuth";

/// Result of voxelizing a surface mesh: voxel centers plus the grid they sit on.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelizationOutput {
    pub points: Vec<DVec3>,
    pub origin: DVec3,
    pub pitch: f64,
}

/// Checks that a project or partition name is a single plain path component.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// The directory holding every project.
#[derive(Clone, Debug)]
pub struct ProjectCatalog {
    root: PathBuf,
}

impl ProjectCatalog {
    /// Opens the catalogue at `root`, creating the directory if needed.
    pub fn open_or_create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all projects, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && validate_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Looks up a project by name.
    ///
    /// # Errors
    ///
    /// [`StoreError::ProjectNotFound`] lists the existing projects.
    pub fn project(&self, name: &str) -> Result<Project, StoreError> {
        validate_name(name)?;
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(StoreError::ProjectNotFound {
                name: name.to_string(),
                available: self.list_projects()?,
            });
        }
        Ok(Project {
            name: name.to_string(),
            dir,
        })
    }

    /// Builds a project from voxelization output.
    ///
    /// Points are snapped to the grid, the structure is centered, and the
    /// result is split into partition files. An existing project with the
    /// same name is replaced.
    pub fn create_project(
        &self,
        name: &str,
        output: &VoxelizationOutput,
        partitioner: &Partitioner,
    ) -> Result<(Project, Vec<PartitionInfo>), StoreError> {
        validate_name(name)?;
        if output.points.is_empty() {
            return Err(StoreError::EmptyVoxelization);
        }
        let grid = GridSpec::new(output.origin, output.pitch)?;

        let mut store = VoxelStore::in_memory();
        {
            let mut tx = store.transaction();
            tx.set_grid(grid.origin(), grid.pitch())?;
            for &point in &output.points {
                let index = grid.to_index(point)?;
                tx.add_voxel(index, grid.center_of(index));
            }
            tx.center_structure()?;
            tx.commit()?;
        }

        let staging = self.root.join(format!(".{name}.staging"));
        remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&staging).map_err(|e| StoreError::io(&staging, e))?;
        let infos = match partitioner.write_partitions(&store, &staging) {
            Ok(infos) => infos,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let dir = self.root.join(name);
        if let Err(e) = swap_in(&staging, &dir, &self.root.join(format!(".{name}.old"))) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        tracing::info!(
            "created project {name:?}: {} voxels in {} partitions",
            store.len(),
            infos.len()
        );
        Ok((
            Project {
                name: name.to_string(),
                dir,
            },
            infos,
        ))
    }
}

/// Moves `staging` to `dir`, replacing whatever is there. The previous
/// directory is parked at `retired` and moved back if the swap fails.
fn swap_in(staging: &Path, dir: &Path, retired: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        return fs::rename(staging, dir).map_err(|e| StoreError::io(dir, e));
    }
    remove_dir_if_exists(retired)?;
    fs::rename(dir, retired).map_err(|e| StoreError::io(dir, e))?;
    if let Err(e) = fs::rename(staging, dir) {
        if let Err(restore) = fs::rename(retired, dir) {
            tracing::error!("could not restore {} from {}: {restore}", dir.display(), retired.display());
        }
        return Err(StoreError::io(dir, e));
    }
    remove_dir_if_exists(retired)
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), StoreError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(dir, e)),
    }
}

/// A named directory of partition files.
#[derive(Clone, Debug)]
pub struct Project {
    name: String,
    dir: PathBuf,
}

impl Project {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Partition names in index order.
    pub fn partition_names(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort_by(|a, b| {
            partition_number(a)
                .cmp(&partition_number(b))
                .then_with(|| a.cmp(b))
        });
        Ok(names)
    }

    /// Path of an existing partition file.
    ///
    /// # Errors
    ///
    /// [`StoreError::PartitionNotFound`] lists the partitions of this project.
    pub fn partition_path(&self, partition: &str) -> Result<PathBuf, StoreError> {
        validate_name(partition)?;
        let path = self.dir.join(partition_file_name(partition));
        if !path.is_file() {
            return Err(StoreError::PartitionNotFound {
                project: self.name.clone(),
                partition: partition.to_string(),
                available: self.partition_names()?,
            });
        }
        Ok(path)
    }

    pub fn open_partition(&self, partition: &str) -> Result<VoxelStore, StoreError> {
        VoxelStore::open(self.partition_path(partition)?)
    }

    /// Writes every voxel of every partition as CSV.
    ///
    /// Partitions are written in index order and voxels in key order.
    /// Absent magnetization components are left empty. Returns the number of
    /// rows written.
    pub fn export_csv<W: Write>(&self, mut writer: W) -> Result<usize, StoreError> {
        let io_err = |e| StoreError::io(&self.dir, e);
        writeln!(writer, "{CSV_HEADER}").map_err(io_err)?;

        let mut rows = 0;
        for name in self.partition_names()? {
            let store = self.open_partition(&name)?;
            for voxel in store.sorted_voxels() {
                let c = voxel.center;
                let [mag, polar, azimuth] = match voxel.magnetization {
                    Some(m) => m.to_array().map(|v| v.to_string()),
                    None => Default::default(),
                };
                writeln!(
                    writer,
                    "{},{},{},{},{mag},{polar},{azimuth}",
                    c.x, c.y, c.z, voxel.material.0
                )
                .map_err(io_err)?;
                rows += 1;
            }
        }
        writer.flush().map_err(io_err)?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
