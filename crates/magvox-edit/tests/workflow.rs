//! End-to-end: voxelize, partition, edit, undo, redo, export.

use glam::DVec3;
use magvox_coords::VoxelIndex;
use magvox_edit::{EditValue, ErrorKind, PartitionRef, Workspace, query};
use magvox_history::HistoryAction;
use magvox_store::{MaterialId, ProjectCatalog, VoxelizationOutput};

fn slab(nx: i32, ny: i32) -> VoxelizationOutput {
    let pitch = 0.25;
    let origin = DVec3::new(-3.0, 1.0, 0.5);
    let mut points = Vec::new();
    for x in 0..nx {
        for y in 0..ny {
            points.push(origin + DVec3::new(f64::from(x), f64::from(y), 0.0) * pitch);
        }
    }
    VoxelizationOutput {
        points,
        origin,
        pitch,
    }
}

#[test]
fn test_full_edit_workflow() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog = ProjectCatalog::open_or_create(tmp.path().join("projects")).unwrap();
    let mut ws = Workspace::new(catalog.clone(), 3, 4);

    // 8x2 slab: x indices 0..=7 centered by 3 -> -3..=4, cubes [-6,-2), [-2,2), [2,6).
    let (project, infos) = ws.create_project("slab", &slab(8, 2), None).unwrap();
    assert_eq!(infos.len(), 3);
    assert_eq!(infos.iter().map(|i| i.voxel_count).sum::<usize>(), 16);
    assert_eq!(
        query::partition_names(&catalog, project.name()).unwrap(),
        vec!["partition-1", "partition-2", "partition-3"]
    );

    let target = PartitionRef::new("slab", "partition-2");
    let layer = query::layer(&catalog, &target, query::parse_axis("z").unwrap(), 0).unwrap();
    let targets: Vec<VoxelIndex> = layer.iter().map(|v| VoxelIndex::new(v.ix, v.iy, v.iz)).collect();
    assert_eq!(targets.len(), 8);

    // Four edits into a history of depth three.
    for material in 2..=5 {
        ws.update_voxels(&target, &targets, EditValue::Material(MaterialId(material)))
            .unwrap();
    }
    assert_eq!(ws.history().depth(), 3);

    for _ in 0..3 {
        ws.apply_history(&target, HistoryAction::Undo).unwrap();
    }
    let err = ws.apply_history(&target, HistoryAction::Undo).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyHistory);

    // The oldest edit (material 2) was evicted, so undo stops there.
    let store = query::open_partition(&catalog, &target).unwrap();
    assert!(targets.iter().all(|i| store.get(*i).unwrap().material == MaterialId(2)));

    let outcome = ws.redo(&target).unwrap();
    assert_eq!(outcome.affected, 8);
    assert!(!outcome.redo_empty);
    let store = query::open_partition(&catalog, &target).unwrap();
    assert!(targets.iter().all(|i| store.get(*i).unwrap().material == MaterialId(3)));

    let mut csv = Vec::new();
    let rows = project.export_csv(&mut csv).unwrap();
    assert_eq!(rows, 16);
    let text = String::from_utf8(csv).unwrap();
    assert_eq!(text.lines().filter(|l| l.contains(",3,0,0,0")).count(), 8);
}

#[test]
fn test_cleared_magnetization_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let catalog = ProjectCatalog::open_or_create(tmp.path()).unwrap();
    let mut ws = Workspace::new(catalog.clone(), 10, 12);
    ws.create_project("s", &slab(2, 2), None).unwrap();
    let target = PartitionRef::new("s", "partition-1");

    let value = EditValue::from_parts(None, Some([None, None, None])).unwrap();
    ws.update_voxels(&target, &[VoxelIndex::ZERO], value).unwrap();
    let store = query::open_partition(&catalog, &target).unwrap();
    assert_eq!(store.get_properties(VoxelIndex::ZERO), Some((MaterialId(1), None)));

    ws.undo(&target).unwrap();
    let store = query::open_partition(&catalog, &target).unwrap();
    assert!(store.get(VoxelIndex::ZERO).unwrap().magnetization.is_some());
}
