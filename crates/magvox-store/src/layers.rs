//! Axis-aligned layer queries.
//!
//! A layer is every voxel sharing one integer coordinate along an axis.
//! Nothing is cached; each query scans the store.

use std::collections::BTreeMap;

use magvox_coords::Axis;
use serde::Serialize;

use crate::store::VoxelStore;
use crate::voxel::Voxel;

/// One entry of a layer directory.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LayerEntry {
    /// Integer coordinate along the axis.
    pub index: i32,
    /// Smallest continuous coordinate seen at that index.
    pub coordinate: f64,
}

/// Flat view of a voxel as returned by layer queries.
///
/// Magnetization fields are `None` when the voxel carries no magnetization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LayerVoxel {
    pub ix: i32,
    pub iy: i32,
    pub iz: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub material: u16,
    pub magnitude: Option<f64>,
    pub polar: Option<f64>,
    pub azimuth: Option<f64>,
}

impl From<&Voxel> for LayerVoxel {
    fn from(v: &Voxel) -> Self {
        let m = v.magnetization;
        Self {
            ix: v.index.ix,
            iy: v.index.iy,
            iz: v.index.iz,
            x: v.center.x,
            y: v.center.y,
            z: v.center.z,
            material: v.material.0,
            magnitude: m.map(|m| m.magnitude),
            polar: m.map(|m| m.polar),
            azimuth: m.map(|m| m.azimuth),
        }
    }
}

/// Sorted distinct indices along `axis`, each with its minimum coordinate.
pub fn layer_directory(store: &VoxelStore, axis: Axis) -> Vec<LayerEntry> {
    let mut layers: BTreeMap<i32, f64> = BTreeMap::new();
    for voxel in store.iter() {
        let coordinate = axis.component(voxel.center);
        layers
            .entry(voxel.index.along(axis))
            .and_modify(|c| *c = c.min(coordinate))
            .or_insert(coordinate);
    }
    layers
        .into_iter()
        .map(|(index, coordinate)| LayerEntry { index, coordinate })
        .collect()
}

/// Voxels whose `axis` coordinate equals `index`, sorted by key.
///
/// An empty result means the layer does not exist.
pub fn layer_voxels(store: &VoxelStore, axis: Axis, index: i32) -> Vec<LayerVoxel> {
    let mut voxels: Vec<&Voxel> = store.iter().filter(|v| v.index.along(axis) == index).collect();
    voxels.sort_unstable_by_key(|v| v.index);
    voxels.into_iter().map(LayerVoxel::from).collect()
}
