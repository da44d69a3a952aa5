//! Read-only queries over stored partitions.
//!
//! These never touch edit history, so callers can run them without holding
//! the workspace.

use glam::DVec3;
use magvox_coords::Axis;
use magvox_store::{LayerEntry, LayerVoxel, ProjectCatalog, VoxelStore};

use crate::error::EditError;
use crate::model::PartitionRef;

/// Opens a partition for reading.
pub fn open_partition(catalog: &ProjectCatalog, target: &PartitionRef) -> Result<VoxelStore, EditError> {
    Ok(catalog
        .project(&target.project)?
        .open_partition(&target.partition)?)
}

/// Partition names of a project, in index order.
pub fn partition_names(catalog: &ProjectCatalog, project: &str) -> Result<Vec<String>, EditError> {
    Ok(catalog.project(project)?.partition_names()?)
}

/// Centers of every surface voxel of a partition.
pub fn surface(catalog: &ProjectCatalog, target: &PartitionRef) -> Result<Vec<DVec3>, EditError> {
    let store = open_partition(catalog, target)?;
    Ok(magvox_store::surface_points(&store))
}

/// Parses an axis name, mapping failure to an invalid request.
pub fn parse_axis(axis: &str) -> Result<Axis, EditError> {
    Ok(axis.parse::<Axis>()?)
}

/// Sorted layer indices along `axis`.
pub fn layers(catalog: &ProjectCatalog, target: &PartitionRef, axis: Axis) -> Result<Vec<LayerEntry>, EditError> {
    let store = open_partition(catalog, target)?;
    Ok(magvox_store::layer_directory(&store, axis))
}

/// Every voxel in one layer.
///
/// An empty layer is reported as [`EditError::NotFound`], listing the
/// layers that do exist.
pub fn layer(
    catalog: &ProjectCatalog,
    target: &PartitionRef,
    axis: Axis,
    index: i32,
) -> Result<Vec<LayerVoxel>, EditError> {
    let store = open_partition(catalog, target)?;
    let voxels = magvox_store::layer_voxels(&store, axis, index);
    if voxels.is_empty() {
        return Err(EditError::NotFound {
            what: format!("layer {}={index} in {target}", axis.as_str().to_uppercase()),
            available: magvox_store::layer_directory(&store, axis)
                .iter()
                .map(|e| e.index.to_string())
                .collect(),
        });
    }
    Ok(voxels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use magvox_store::{Partitioner, VoxelizationOutput};

    fn catalog() -> (tempfile::TempDir, ProjectCatalog, PartitionRef) {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = ProjectCatalog::open_or_create(tmp.path()).unwrap();
        let mut points = Vec::new();
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    points.push(DVec3::new(f64::from(x), f64::from(y), f64::from(z)));
                }
            }
        }
        let output = VoxelizationOutput {
            points,
            origin: DVec3::ZERO,
            pitch: 1.0,
        };
        catalog
            .create_project("cube", &output, &Partitioner::new(4).unwrap())
            .unwrap();
        (tmp, catalog, PartitionRef::new("cube", "partition-1"))
    }

    #[test]
    fn test_surface_excludes_interior() {
        let (_tmp, catalog, target) = catalog();
        let points = surface(&catalog, &target).unwrap();
        assert_eq!(points.len(), 26);
        assert!(!points.contains(&DVec3::ONE));
    }

    #[test]
    fn test_layers_and_layer() {
        let (_tmp, catalog, target) = catalog();
        let axis = parse_axis("Z").unwrap();
        let dir = layers(&catalog, &target, axis).unwrap();
        let indices: Vec<i32> = dir.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![-1, 0, 1]);

        let voxels = layer(&catalog, &target, axis, 0).unwrap();
        assert_eq!(voxels.len(), 9);
        assert!(voxels.iter().all(|v| v.iz == 0));
    }

    #[test]
    fn test_missing_layer_and_bad_axis() {
        let (_tmp, catalog, target) = catalog();
        let err = layer(&catalog, &target, Axis::X, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.available(), ["-1".to_string(), "0".to_string(), "1".to_string()]);

        assert_eq!(parse_axis("w").unwrap_err().kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_partition_listing() {
        let (_tmp, catalog, _) = catalog();
        assert_eq!(
            partition_names(&catalog, "cube").unwrap(),
            vec!["partition-1".to_string()]
        );
        assert_eq!(
            partition_names(&catalog, "nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
