//! Sparse voxel store backed by one partition file.
//!
//! A [`VoxelStore`] keeps its rows in a hash map keyed by [`VoxelIndex`] and
//! mirrors them to an MVXP file. Reads go straight to the map. Writes go
//! through a [`Transaction`], which journals every change so it can be undone
//! when the guard is dropped without [`Transaction::commit`].

use std::fs;
use std::io::Write;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use glam::DVec3;
use magvox_coords::{GridSpec, VoxelIndex};
use rustc_hash::FxHashMap;

use crate::error::StoreError;
use crate::format;
use crate::partition::PartitionBounds;
use crate::voxel::{Magnetization, MaterialId, Voxel, VoxelState};

/// A keyed collection of voxels for one partition.
#[derive(Debug, Default)]
pub struct VoxelStore {
    path: Option<PathBuf>,
    grid: Option<GridSpec>,
    partition_bounds: Option<PartitionBounds>,
    voxels: FxHashMap<VoxelIndex, Voxel>,
}

impl VoxelStore {
    /// Creates an empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens an existing partition file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read and
    /// [`StoreError::Corrupt`] if it fails validation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let data = format::decode(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        let mut voxels = FxHashMap::default();
        voxels.reserve(data.voxels.len());
        for voxel in data.voxels {
            voxels.insert(voxel.index, voxel);
        }
        tracing::debug!("opened {} ({} voxels)", path.display(), voxels.len());

        Ok(Self {
            path: Some(path.to_path_buf()),
            grid: data.grid,
            partition_bounds: data.bounds,
            voxels,
        })
    }

    /// Opens `path`, or creates an empty partition file there if none exists.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::open(path);
        }
        let store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        store.write_to(path)?;
        Ok(store)
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    pub fn contains(&self, index: VoxelIndex) -> bool {
        self.voxels.contains_key(&index)
    }

    pub fn get(&self, index: VoxelIndex) -> Option<&Voxel> {
        self.voxels.get(&index)
    }

    /// Returns `(material, magnetization)` for a voxel, or `None` if absent.
    pub fn get_properties(&self, index: VoxelIndex) -> Option<(MaterialId, Option<Magnetization>)> {
        self.voxels.get(&index).map(|v| (v.material, v.magnetization))
    }

    /// Iterates over all voxels in unspecified order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Voxel> {
        self.voxels.values()
    }

    /// Returns all voxels sorted by `(ix, iy, iz)`.
    pub fn sorted_voxels(&self) -> Vec<&Voxel> {
        let mut voxels: Vec<&Voxel> = self.voxels.values().collect();
        voxels.sort_unstable_by_key(|v| v.index);
        voxels
    }

    /// Component-wise minimum and maximum index, or `None` when empty.
    pub fn bounds(&self) -> Option<(VoxelIndex, VoxelIndex)> {
        let mut keys = self.voxels.keys();
        let first = *keys.next()?;
        Some(keys.fold((first, first), |(lo, hi), &i| (lo.min(i), hi.max(i))))
    }

    /// The partition's origin and pitch, if they have been set.
    pub fn grid(&self) -> Option<&GridSpec> {
        self.grid.as_ref()
    }

    /// The cube this partition covers, if it was written by a partitioner.
    pub fn partition_bounds(&self) -> Option<&PartitionBounds> {
        self.partition_bounds.as_ref()
    }

    /// `true` if `index` may be stored here. Stores without bounds accept
    /// every index.
    pub fn accepts(&self, index: VoxelIndex) -> bool {
        self.partition_bounds.is_none_or(|b| b.contains(index))
    }

    /// Converts a continuous point to an index using the stored grid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingGrid`] if no grid metadata is stored and
    /// [`StoreError::Grid`] if the point lies outside the index range.
    pub fn grid_conversion(&self, point: DVec3) -> Result<VoxelIndex, StoreError> {
        let grid = self.grid.as_ref().ok_or(StoreError::MissingGrid)?;
        Ok(grid.to_index(point)?)
    }

    /// Starts a write transaction.
    pub fn transaction(&mut self) -> Transaction<'_> {
        Transaction {
            store: self,
            journal: Vec::new(),
            grid_before: None,
            committed: false,
        }
    }

    /// Writes the current contents to `path` atomically.
    ///
    /// The data goes to a sibling temp file which is synced and then renamed
    /// over `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        write_partition(
            path.as_ref(),
            self.grid.as_ref(),
            self.partition_bounds.as_ref(),
            self.sorted_voxels(),
        )
    }
}

/// Encodes `voxels` and atomically replaces `path` with the result.
pub(crate) fn write_partition(
    path: &Path,
    grid: Option<&GridSpec>,
    bounds: Option<&PartitionBounds>,
    voxels: Vec<&Voxel>,
) -> Result<(), StoreError> {
    let bytes = format::encode(grid, bounds, voxels.into_iter());

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let written = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(&tmp, e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::io(path, e)
    })
}

/// Prior value of one key, recorded before the first change to it.
#[derive(Debug)]
struct JournalEntry {
    index: VoxelIndex,
    previous: Option<Voxel>,
}

/// Scoped write access to a [`VoxelStore`].
///
/// Every change is applied to the store immediately and journaled. Calling
/// [`commit`](Self::commit) persists the store; dropping the guard any other
/// way replays the journal backwards and restores the prior state.
///
/// The guard dereferences to the store, so reads inside a transaction see its
/// own uncommitted writes.
#[derive(Debug)]
pub struct Transaction<'a> {
    store: &'a mut VoxelStore,
    journal: Vec<JournalEntry>,
    grid_before: Option<Option<GridSpec>>,
    committed: bool,
}

impl Transaction<'_> {
    fn put(&mut self, voxel: Voxel) {
        let index = voxel.index;
        let previous = self.store.voxels.insert(index, voxel);
        self.journal.push(JournalEntry { index, previous });
    }

    fn take(&mut self, index: VoxelIndex) -> Option<Voxel> {
        let previous = self.store.voxels.remove(&index)?;
        self.journal.push(JournalEntry {
            index,
            previous: Some(previous.clone()),
        });
        Some(previous)
    }

    fn modify(&mut self, index: VoxelIndex, f: impl FnOnce(&mut Voxel)) -> usize {
        let Some(voxel) = self.store.voxels.get_mut(&index) else {
            return 0;
        };
        self.journal.push(JournalEntry {
            index,
            previous: Some(voxel.clone()),
        });
        f(voxel);
        1
    }

    /// Inserts or replaces every row in `rows`.
    ///
    /// The batch is validated before anything is written: two rows with the
    /// same key but different contents fail the whole batch with
    /// [`StoreError::DuplicateKey`]. Identical repeats are accepted, so the
    /// operation is idempotent. Returns the number of distinct keys written.
    pub fn upsert_many(&mut self, rows: impl IntoIterator<Item = Voxel>) -> Result<usize, StoreError> {
        let mut batch: FxHashMap<VoxelIndex, Voxel> = FxHashMap::default();
        for row in rows {
            if let Some(existing) = batch.get(&row.index) {
                if *existing != row {
                    tracing::warn!("rejected batch: conflicting rows for voxel {}", row.index);
                    return Err(StoreError::DuplicateKey(row.index));
                }
                continue;
            }
            batch.insert(row.index, row);
        }

        let count = batch.len();
        for (_, voxel) in batch {
            self.put(voxel);
        }
        Ok(count)
    }

    /// Inserts a voxel with default material and zero magnetization,
    /// replacing any existing row at `index`.
    pub fn add_voxel(&mut self, index: VoxelIndex, center: DVec3) {
        self.put(Voxel::new(index, center));
    }

    /// Removes a voxel. Returns `false` if it was not present.
    pub fn delete_voxel(&mut self, index: VoxelIndex) -> bool {
        self.take(index).is_some()
    }

    /// Sets the material of one voxel. Returns the affected row count.
    pub fn set_material(&mut self, index: VoxelIndex, material: MaterialId) -> usize {
        self.modify(index, |v| v.material = material)
    }

    /// Sets or clears the magnetization of one voxel. Returns the affected
    /// row count.
    pub fn set_magnetization(&mut self, index: VoxelIndex, magnetization: Option<Magnetization>) -> usize {
        self.modify(index, |v| v.magnetization = magnetization)
    }

    /// Sets material and magnetization together. Returns the affected row
    /// count.
    pub fn set_properties(
        &mut self,
        index: VoxelIndex,
        material: MaterialId,
        magnetization: Option<Magnetization>,
    ) -> usize {
        self.modify(index, |v| {
            v.material = material;
            v.magnetization = magnetization;
        })
    }

    /// Writes a full voxel state, creating the voxel if needed.
    ///
    /// An existing voxel keeps its stored center; a new one gets its center
    /// from the grid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingGrid`] when the voxel is new and the
    /// store has no grid to derive its center from.
    pub fn write_state(&mut self, state: &VoxelState) -> Result<(), StoreError> {
        let center = match (self.store.voxels.get(&state.index), self.store.grid.as_ref()) {
            (Some(existing), _) => existing.center,
            (None, Some(grid)) => grid.center_of(state.index),
            (None, None) => return Err(StoreError::MissingGrid),
        };
        self.put(Voxel {
            index: state.index,
            center,
            material: state.material,
            magnetization: state.magnetization,
        });
        Ok(())
    }

    /// Stores the partition's origin and pitch.
    pub fn set_grid(&mut self, origin: DVec3, pitch: f64) -> Result<(), StoreError> {
        let grid = GridSpec::new(origin, pitch)?;
        self.replace_grid(Some(grid));
        Ok(())
    }

    fn replace_grid(&mut self, grid: Option<GridSpec>) {
        let previous = std::mem::replace(&mut self.store.grid, grid);
        self.grid_before.get_or_insert(previous);
    }

    /// Shifts integer coordinates so the structure is centered on the origin.
    ///
    /// Per axis the offset is `floor((min + max) / 2)` and each index moves
    /// by `-offset`. The midpoint rounds toward negative infinity, not toward
    /// zero, so a span of `[-3, 0]` gets offset `-2`. The grid origin moves by
    /// `offset * pitch`, so stored centers stay equal to
    /// `origin + index * pitch`. Returns the applied offset; an empty store is
    /// left alone and yields zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SpanTooLarge`] if a centered index would leave
    /// the `i32` range. Nothing is moved in that case.
    pub fn center_structure(&mut self) -> Result<VoxelIndex, StoreError> {
        let Some((lo, hi)) = self.store.bounds() else {
            return Ok(VoxelIndex::ZERO);
        };
        let axis = |a: i32, b: i32| -> Result<i32, StoreError> {
            let (a, b) = (i64::from(a), i64::from(b));
            let mid = (a + b).div_euclid(2);
            let fits = |v: i64| i32::try_from(v).is_ok();
            if !(fits(a - mid) && fits(b - mid)) {
                return Err(StoreError::SpanTooLarge { span: b - a + 1 });
            }
            // Lies between a and b, so it fits.
            Ok(mid as i32)
        };
        let offset = VoxelIndex::new(axis(lo.ix, hi.ix)?, axis(lo.iy, hi.iy)?, axis(lo.iz, hi.iz)?);
        if offset == VoxelIndex::ZERO {
            return Ok(offset);
        }

        let shift = |c: i32, o: i32| (i64::from(c) - i64::from(o)) as i32;
        let mut keys: Vec<VoxelIndex> = self.store.voxels.keys().copied().collect();
        keys.sort_unstable();
        let moved: Vec<Voxel> = keys.into_iter().filter_map(|k| self.take(k)).collect();
        for mut voxel in moved {
            let i = voxel.index;
            voxel.index = VoxelIndex::new(
                shift(i.ix, offset.ix),
                shift(i.iy, offset.iy),
                shift(i.iz, offset.iz),
            );
            self.put(voxel);
        }

        if let Some(grid) = self.store.grid {
            self.replace_grid(Some(grid.shifted(offset)));
        }
        tracing::debug!("centered structure by offset {offset}");
        Ok(offset)
    }

    /// Number of journaled changes so far.
    pub fn pending_changes(&self) -> usize {
        self.journal.len() + usize::from(self.grid_before.is_some())
    }

    /// Makes the changes durable.
    ///
    /// For a file-backed store the whole partition is rewritten atomically.
    /// If that write fails the in-memory changes are rolled back as well.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutsidePartition`] if a written voxel lies
    /// outside the store's partition bounds; the transaction is rolled back.
    pub fn commit(mut self) -> Result<(), StoreError> {
        if let Some(bounds) = self.store.partition_bounds
            && let Some(entry) = self
                .journal
                .iter()
                .find(|e| !bounds.contains(e.index) && self.store.voxels.contains_key(&e.index))
        {
            return Err(StoreError::OutsidePartition {
                index: entry.index,
                bounds,
            });
        }
        if let Some(path) = self.store.path.clone() {
            self.store.write_to(&path)?;
            tracing::debug!(
                "committed {} changes to {}",
                self.pending_changes(),
                path.display()
            );
        }
        self.committed = true;
        Ok(())
    }

    /// Discards every change made through this transaction.
    pub fn rollback(self) {
        // Drop does the work.
    }

    fn undo_journal(&mut self) {
        while let Some(entry) = self.journal.pop() {
            match entry.previous {
                Some(voxel) => {
                    self.store.voxels.insert(entry.index, voxel);
                }
                None => {
                    self.store.voxels.remove(&entry.index);
                }
            }
        }
        if let Some(grid) = self.grid_before.take() {
            self.store.grid = grid;
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = VoxelStore;

    fn deref(&self) -> &VoxelStore {
        self.store
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && self.pending_changes() > 0 {
            tracing::debug!("rolling back {} uncommitted changes", self.pending_changes());
            self.undo_journal();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(DVec3::ZERO, 1.0).unwrap()
    }

    fn voxel(x: i32, y: i32, z: i32) -> Voxel {
        let index = VoxelIndex::new(x, y, z);
        Voxel::new(index, grid().center_of(index))
    }

    #[test]
    fn test_upsert_then_read_back() {
        let mut store = VoxelStore::in_memory();
        let batch = vec![voxel(0, 0, 0), voxel(1, 0, 0), voxel(0, 2, -1)];
        {
            let mut tx = store.transaction();
            assert_eq!(tx.upsert_many(batch.clone()).unwrap(), 3);
            tx.commit().unwrap();
        }
        assert_eq!(store.len(), 3);
        let stored: Vec<Voxel> = store.sorted_voxels().into_iter().cloned().collect();
        let mut expected = batch;
        expected.sort_by_key(|v| v.index);
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = VoxelStore::in_memory();
        for _ in 0..2 {
            let mut tx = store.transaction();
            tx.upsert_many([voxel(0, 0, 0), voxel(0, 0, 0)]).unwrap();
            tx.commit().unwrap();
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_conflicting_batch_rejected_whole() {
        let mut store = VoxelStore::in_memory();
        let mut other = voxel(0, 0, 0);
        other.material = MaterialId(5);
        let mut tx = store.transaction();
        let result = tx.upsert_many([voxel(1, 1, 1), voxel(0, 0, 0), other]);
        assert!(matches!(result, Err(StoreError::DuplicateKey(_))));
        assert!(tx.is_empty(), "nothing from a rejected batch may be written");
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        tx.add_voxel(VoxelIndex::ZERO, DVec3::ZERO);
        assert!(!tx.delete_voxel(VoxelIndex::new(9, 9, 9)));
        assert!(tx.delete_voxel(VoxelIndex::ZERO));
        assert!(!tx.delete_voxel(VoxelIndex::ZERO));
        tx.commit().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_setters_report_affected_rows() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        tx.add_voxel(VoxelIndex::ZERO, DVec3::ZERO);
        assert_eq!(tx.set_material(VoxelIndex::ZERO, MaterialId(3)), 1);
        assert_eq!(tx.set_material(VoxelIndex::new(1, 0, 0), MaterialId(3)), 0);
        let m = Magnetization::new(1.0, 0.5, 0.25);
        assert_eq!(tx.set_magnetization(VoxelIndex::ZERO, Some(m)), 1);
        assert_eq!(tx.set_properties(VoxelIndex::new(2, 0, 0), MaterialId(1), None), 0);
        tx.commit().unwrap();
        assert_eq!(
            store.get_properties(VoxelIndex::ZERO),
            Some((MaterialId(3), Some(m)))
        );
        assert_eq!(store.get_properties(VoxelIndex::new(1, 0, 0)), None);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let mut store = VoxelStore::in_memory();
        {
            let mut tx = store.transaction();
            tx.upsert_many([voxel(0, 0, 0), voxel(1, 0, 0)]).unwrap();
            tx.set_grid(DVec3::ZERO, 1.0).unwrap();
            tx.commit().unwrap();
        }
        {
            let mut tx = store.transaction();
            tx.set_material(VoxelIndex::ZERO, MaterialId(7));
            tx.delete_voxel(VoxelIndex::new(1, 0, 0));
            tx.add_voxel(VoxelIndex::new(5, 5, 5), DVec3::splat(5.0));
            tx.set_grid(DVec3::ONE, 2.0).unwrap();
            // dropped without commit
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(VoxelIndex::ZERO).unwrap().material, MaterialId(1));
        assert!(store.contains(VoxelIndex::new(1, 0, 0)));
        assert!(!store.contains(VoxelIndex::new(5, 5, 5)));
        assert_eq!(store.grid(), Some(&grid()));
    }

    #[test]
    fn test_write_state_needs_grid_for_new_voxels() {
        let mut store = VoxelStore::in_memory();
        let state = VoxelState {
            index: VoxelIndex::new(2, 0, 0),
            material: MaterialId(4),
            magnetization: None,
        };
        let mut tx = store.transaction();
        assert!(matches!(tx.write_state(&state), Err(StoreError::MissingGrid)));
        tx.set_grid(DVec3::new(1.0, 0.0, 0.0), 0.5).unwrap();
        tx.write_state(&state).unwrap();
        assert_eq!(tx.get(state.index).unwrap().center, DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(tx.get(state.index).unwrap().state(), state);
    }

    #[test]
    fn test_center_structure_moves_indices_not_centers() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        tx.set_grid(DVec3::ZERO, 1.0).unwrap();
        tx.upsert_many([voxel(10, 3, -4), voxel(14, 8, -1)]).unwrap();
        let before: Vec<DVec3> = tx.sorted_voxels().iter().map(|v| v.center).collect();

        // floor((10+14)/2)=12, floor((3+8)/2)=5, floor((-4-1)/2)=-3
        let offset = tx.center_structure().unwrap();
        assert_eq!(offset, VoxelIndex::new(12, 5, -3));

        let (lo, hi) = tx.bounds().unwrap();
        assert_eq!(lo, VoxelIndex::new(-2, -2, -1));
        assert_eq!(hi, VoxelIndex::new(2, 3, 2));

        let after: Vec<DVec3> = tx.sorted_voxels().iter().map(|v| v.center).collect();
        assert_eq!(before, after);
        let grid = *tx.grid().unwrap();
        for v in tx.iter() {
            assert_eq!(grid.center_of(v.index), v.center);
        }
    }

    #[test]
    fn test_center_structure_empty_store() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        assert_eq!(tx.center_structure().unwrap(), VoxelIndex::ZERO);
        assert_eq!(tx.pending_changes(), 0);
    }

    #[test]
    fn test_center_structure_rounds_midpoint_down() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        tx.upsert_many([voxel(-3, 0, 0), voxel(0, 0, 0)]).unwrap();
        assert_eq!(tx.center_structure().unwrap(), VoxelIndex::new(-2, 0, 0));
        assert_eq!(
            tx.bounds(),
            Some((VoxelIndex::new(-1, 0, 0), VoxelIndex::new(2, 0, 0)))
        );
    }

    #[test]
    fn test_center_structure_at_index_range_edges() {
        let mut store = VoxelStore::in_memory();
        let mut tx = store.transaction();
        tx.add_voxel(VoxelIndex::new(i32::MAX - 1, 0, 0), DVec3::ZERO);
        tx.add_voxel(VoxelIndex::new(i32::MAX, 0, 0), DVec3::ZERO);
        assert_eq!(
            tx.center_structure().unwrap(),
            VoxelIndex::new(i32::MAX - 1, 0, 0)
        );
        assert!(tx.contains(VoxelIndex::new(1, 0, 0)));

        tx.add_voxel(VoxelIndex::new(i32::MIN, 0, 0), DVec3::ZERO);
        tx.add_voxel(VoxelIndex::new(i32::MAX, 0, 0), DVec3::ZERO);
        let changes = tx.pending_changes();
        let err = tx.center_structure().unwrap_err();
        assert!(matches!(err, StoreError::SpanTooLarge { span: 4_294_967_296 }));
        assert_eq!(tx.pending_changes(), changes, "nothing moves on failure");
    }

    #[test]
    fn test_grid_conversion_requires_grid() {
        let mut store = VoxelStore::in_memory();
        assert!(matches!(
            store.grid_conversion(DVec3::ZERO),
            Err(StoreError::MissingGrid)
        ));
        let mut tx = store.transaction();
        tx.set_grid(DVec3::ZERO, 0.5).unwrap();
        tx.commit().unwrap();
        assert_eq!(
            store.grid_conversion(DVec3::new(1.0, -1.0, 0.2)).unwrap(),
            VoxelIndex::new(2, -2, 0)
        );
    }

    #[test]
    fn test_file_backed_commit_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition-1.mvx");
        {
            let mut store = VoxelStore::open_or_create(&path).unwrap();
            assert!(path.exists());
            let mut tx = store.transaction();
            tx.set_grid(DVec3::ZERO, 1.0).unwrap();
            tx.upsert_many([voxel(0, 0, 0), voxel(0, 0, 1)]).unwrap();
            tx.set_magnetization(VoxelIndex::new(0, 0, 1), None);
            tx.commit().unwrap();
        }
        let store = VoxelStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.grid(), Some(&grid()));
        assert_eq!(
            store.get_properties(VoxelIndex::new(0, 0, 1)),
            Some((MaterialId(1), None))
        );
        assert!(!dir.path().join("partition-1.mvx.tmp").exists());
    }

    #[test]
    fn test_commit_rejects_voxels_outside_partition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition-1.mvx");
        let bounds = PartitionBounds {
            lo: glam::I64Vec3::splat(-2),
            hi: glam::I64Vec3::splat(2),
        };
        write_partition(&path, Some(&grid()), Some(&bounds), vec![&voxel(0, 0, 0)]).unwrap();

        let mut store = VoxelStore::open(&path).unwrap();
        assert_eq!(store.partition_bounds(), Some(&bounds));
        assert!(store.accepts(VoxelIndex::new(1, -2, 1)));
        assert!(!store.accepts(VoxelIndex::new(2, 0, 0)));

        let mut tx = store.transaction();
        tx.add_voxel(VoxelIndex::new(1, 1, 1), DVec3::ONE);
        tx.add_voxel(VoxelIndex::new(2, 0, 0), DVec3::X * 2.0);
        let err = tx.commit().unwrap_err();
        assert!(matches!(err, StoreError::OutsidePartition { index, .. } if index == VoxelIndex::new(2, 0, 0)));
        assert_eq!(store.len(), 1);
        assert_eq!(VoxelStore::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_uncommitted_changes_never_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.mvx");
        let mut store = VoxelStore::open_or_create(&path).unwrap();
        {
            let mut tx = store.transaction();
            tx.add_voxel(VoxelIndex::ZERO, DVec3::ZERO);
        }
        assert!(VoxelStore::open(&path).unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mvx");
        fs::write(&path, b"not a partition").unwrap();
        let err = VoxelStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.is_integrity_violation());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VoxelStore::open(dir.path().join("none.mvx")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
