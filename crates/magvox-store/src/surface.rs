//! Boundary voxel extraction.

use glam::DVec3;
use magvox_coords::VoxelIndex;

use crate::store::VoxelStore;
use crate::voxel::Voxel;

/// Returns `true` if `index` is occupied and at least one of its six face
/// neighbours is empty.
pub fn is_surface(store: &VoxelStore, index: VoxelIndex) -> bool {
    store.contains(index) && has_open_face(store, index)
}

/// Every voxel with an exposed face, sorted by key.
pub fn find_surface(store: &VoxelStore) -> Vec<&Voxel> {
    let mut surface: Vec<&Voxel> = store
        .iter()
        .filter(|v| has_open_face(store, v.index))
        .collect();
    surface.sort_unstable_by_key(|v| v.index);
    surface
}

/// Cells past the edge of the index range count as empty.
fn has_open_face(store: &VoxelStore, index: VoxelIndex) -> bool {
    index
        .face_neighbors()
        .into_iter()
        .any(|n| n.is_none_or(|n| !store.contains(n)))
}

/// Centers of the surface voxels, in key order.
pub fn surface_points(store: &VoxelStore) -> Vec<DVec3> {
    find_surface(store).into_iter().map(|v| v.center).collect()
}
