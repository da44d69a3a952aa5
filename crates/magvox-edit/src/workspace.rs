//! The edit workspace: one history context bound to the active partition.

use magvox_coords::VoxelIndex;
use magvox_history::{HistoryAction, HistoryManager};
use magvox_store::{
    ModelDelta, PartitionInfo, Partitioner, Project, ProjectCatalog, StoreError, VoxelStore,
    VoxelizationOutput,
};
use rustc_hash::FxHashSet;

use crate::error::EditError;
use crate::model::{EditOutcome, EditValue, PartitionRef};

/// Applies edits to partitions and keeps their undo/redo history.
///
/// History belongs to whichever partition was edited last. Touching a
/// different partition clears it, so a delta is never replayed against a
/// partition it was not recorded on.
#[derive(Debug)]
pub struct Workspace {
    catalog: ProjectCatalog,
    history: HistoryManager<ModelDelta>,
    active: Option<PartitionRef>,
    partition_edge: i32,
}

impl Workspace {
    pub fn new(catalog: ProjectCatalog, history_depth: usize, partition_edge: i32) -> Self {
        Self {
            catalog,
            history: HistoryManager::new(history_depth),
            active: None,
            partition_edge,
        }
    }

    pub fn catalog(&self) -> &ProjectCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &HistoryManager<ModelDelta> {
        &self.history
    }

    /// The partition the current history belongs to.
    pub fn active(&self) -> Option<&PartitionRef> {
        self.active.as_ref()
    }

    /// Opens `target` and makes it the active partition.
    fn activate(&mut self, target: &PartitionRef) -> Result<VoxelStore, EditError> {
        let store = self
            .catalog
            .project(&target.project)?
            .open_partition(&target.partition)?;
        if self.active.as_ref() != Some(target) {
            if !self.history.is_undo_empty() || !self.history.is_redo_empty() {
                tracing::info!("switched to {target}, clearing edit history");
            }
            self.history.clear();
            self.active = Some(target.clone());
        }
        Ok(store)
    }

    fn outcome(&self, affected: usize) -> EditOutcome {
        EditOutcome {
            affected,
            undo_empty: self.history.is_undo_empty(),
            redo_empty: self.history.is_redo_empty(),
        }
    }

    fn record(&mut self, delta: ModelDelta) -> EditOutcome {
        let affected = delta.len();
        if !delta.is_empty() {
            self.history.record_change(delta);
        }
        self.outcome(affected)
    }

    /// Sets one property on every target voxel and records the change.
    ///
    /// Fails with [`EditError::NotFound`] if any target is missing, in which
    /// case nothing is written.
    pub fn update_voxels(
        &mut self,
        target: &PartitionRef,
        voxels: &[VoxelIndex],
        value: EditValue,
    ) -> Result<EditOutcome, EditError> {
        let voxels = dedup_targets(voxels)?;
        let mut store = self.activate(target)?;

        let mut tx = store.transaction();
        let mut old_voxels = Vec::with_capacity(voxels.len());
        let mut new_voxels = Vec::with_capacity(voxels.len());
        for index in voxels {
            let before = tx.get(index).map(|v| v.state());
            let affected = match value {
                EditValue::Material(material) => tx.set_material(index, material),
                EditValue::Magnetization(m) => tx.set_magnetization(index, m),
            };
            let Some(before) = before.filter(|_| affected > 0) else {
                return Err(EditError::not_found(format!("voxel {index} in {target}")));
            };
            let after = tx.get(index).map_or(before, |v| v.state());
            old_voxels.push(before);
            new_voxels.push(after);
        }
        tx.commit()?;

        Ok(self.record(ModelDelta::new(old_voxels, new_voxels)))
    }

    /// Adds default voxels at every target that is not already occupied.
    ///
    /// Every target must lie inside the partition's cube; otherwise the
    /// request is rejected as a whole with [`EditError::InvalidRequest`].
    pub fn add_voxels(&mut self, target: &PartitionRef, voxels: &[VoxelIndex]) -> Result<EditOutcome, EditError> {
        let voxels = dedup_targets(voxels)?;
        let mut store = self.activate(target)?;
        let grid = *store.grid().ok_or(StoreError::MissingGrid)?;
        if let Some(outside) = voxels.iter().find(|&&i| !store.accepts(i)) {
            let range = store
                .partition_bounds()
                .map(|b| b.to_string())
                .unwrap_or_default();
            return Err(EditError::invalid(format!(
                "voxel {outside} lies outside {target} {range}"
            )));
        }

        let mut tx = store.transaction();
        let mut added = Vec::new();
        for index in voxels {
            if tx.contains(index) {
                continue;
            }
            tx.add_voxel(index, grid.center_of(index));
            if let Some(voxel) = tx.get(index) {
                added.push(voxel.state());
            }
        }
        tx.commit()?;

        Ok(self.record(ModelDelta::addition(added)))
    }

    /// Deletes every target voxel that exists.
    pub fn delete_voxels(&mut self, target: &PartitionRef, voxels: &[VoxelIndex]) -> Result<EditOutcome, EditError> {
        let voxels = dedup_targets(voxels)?;
        let mut store = self.activate(target)?;

        let mut tx = store.transaction();
        let mut removed = Vec::new();
        for index in voxels {
            let Some(state) = tx.get(index).map(|v| v.state()) else {
                continue;
            };
            tx.delete_voxel(index);
            removed.push(state);
        }
        tx.commit()?;

        Ok(self.record(ModelDelta::deletion(removed)))
    }

    /// Reverts the most recent change to `target`.
    pub fn undo(&mut self, target: &PartitionRef) -> Result<EditOutcome, EditError> {
        self.apply_history(target, HistoryAction::Undo)
    }

    /// Re-applies the most recently undone change to `target`.
    pub fn redo(&mut self, target: &PartitionRef) -> Result<EditOutcome, EditError> {
        self.apply_history(target, HistoryAction::Redo)
    }

    /// Steps the history in `action`'s direction and writes the result to
    /// storage.
    ///
    /// Storage is written before the stacks move, so a failed write leaves
    /// the history exactly as it was.
    pub fn apply_history(&mut self, target: &PartitionRef, action: HistoryAction) -> Result<EditOutcome, EditError> {
        let mut store = self.activate(target)?;
        let delta = self.history.peek(action)?;
        let (from, to) = match action {
            HistoryAction::Undo => (delta.new_voxels(), delta.old_voxels()),
            HistoryAction::Redo => (delta.old_voxels(), delta.new_voxels()),
        };

        let kept: FxHashSet<VoxelIndex> = to.iter().map(|s| s.index).collect();
        let mut tx = store.transaction();
        for state in from {
            if !kept.contains(&state.index) {
                tx.delete_voxel(state.index);
            }
        }
        for state in to {
            tx.write_state(state)?;
        }
        tx.commit()?;

        let affected = self.history.step(action)?.len();
        tracing::debug!("{action} on {target}: {affected} voxels");
        Ok(self.outcome(affected))
    }

    /// Creates (or replaces) a project from voxelization output.
    ///
    /// `partition_edge` overrides the workspace default. Replacing the
    /// active project drops its history.
    pub fn create_project(
        &mut self,
        name: &str,
        output: &VoxelizationOutput,
        partition_edge: Option<i32>,
    ) -> Result<(Project, Vec<PartitionInfo>), EditError> {
        let partitioner = Partitioner::new(partition_edge.unwrap_or(self.partition_edge))?;
        let created = self.catalog.create_project(name, output, &partitioner)?;
        if self.active.as_ref().is_some_and(|a| a.project == name) {
            self.history.clear();
            self.active = None;
        }
        Ok(created)
    }
}

/// Sorted, duplicate-free targets.
fn dedup_targets(voxels: &[VoxelIndex]) -> Result<Vec<VoxelIndex>, EditError> {
    if voxels.is_empty() {
        return Err(EditError::invalid("no target voxels given"));
    }
    let mut voxels = voxels.to_vec();
    voxels.sort_unstable();
    voxels.dedup();
    Ok(voxels)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use glam::DVec3;
    use magvox_store::{Magnetization, MaterialId};

    /// A 3x1x1 rod with indices -1..=1 in a single partition.
    fn setup() -> (tempfile::TempDir, Workspace, PartitionRef) {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = ProjectCatalog::open_or_create(tmp.path()).unwrap();
        let mut ws = Workspace::new(catalog, 10, 4);
        let output = VoxelizationOutput {
            points: vec![DVec3::ZERO, DVec3::X, DVec3::new(2.0, 0.0, 0.0)],
            origin: DVec3::ZERO,
            pitch: 1.0,
        };
        ws.create_project("rod", &output, None).unwrap();
        (tmp, ws, PartitionRef::new("rod", "partition-1"))
    }

    fn open(ws: &Workspace, target: &PartitionRef) -> VoxelStore {
        ws.catalog()
            .project(&target.project)
            .unwrap()
            .open_partition(&target.partition)
            .unwrap()
    }

    const ORIGIN: VoxelIndex = VoxelIndex::new(0, 0, 0);

    #[test]
    fn test_update_records_full_states() {
        let (_tmp, mut ws, target) = setup();
        let outcome = ws
            .update_voxels(&target, &[ORIGIN], EditValue::Material(MaterialId(3)))
            .unwrap();
        assert_eq!(outcome.affected, 1);
        assert!(!outcome.undo_empty);
        assert!(outcome.redo_empty);

        let delta = ws.history().peek_undo().unwrap();
        assert_eq!(
            delta.old_voxels()[0].as_tuple(),
            (0, 0, 0, 1, Some(0.0), Some(0.0), Some(0.0))
        );
        assert_eq!(
            delta.new_voxels()[0].as_tuple(),
            (0, 0, 0, 3, Some(0.0), Some(0.0), Some(0.0))
        );
    }

    #[test]
    fn test_undo_and_redo_round_trip_storage() {
        let (_tmp, mut ws, target) = setup();
        let m = Magnetization::new(2.0, 0.5, 1.0);
        ws.update_voxels(&target, &[ORIGIN, VoxelIndex::new(1, 0, 0)], EditValue::Magnetization(Some(m)))
            .unwrap();
        assert_eq!(open(&ws, &target).get_properties(ORIGIN), Some((MaterialId(1), Some(m))));

        let outcome = ws.undo(&target).unwrap();
        assert_eq!(outcome.affected, 2);
        assert!(outcome.undo_empty);
        assert!(!outcome.redo_empty);
        assert_eq!(
            open(&ws, &target).get_properties(ORIGIN),
            Some((MaterialId(1), Some(Magnetization::ZERO)))
        );

        ws.redo(&target).unwrap();
        assert_eq!(open(&ws, &target).get_properties(ORIGIN), Some((MaterialId(1), Some(m))));
    }

    #[test]
    fn test_missing_target_writes_nothing() {
        let (_tmp, mut ws, target) = setup();
        let err = ws
            .update_voxels(
                &target,
                &[ORIGIN, VoxelIndex::new(9, 9, 9)],
                EditValue::Material(MaterialId(5)),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(open(&ws, &target).get(ORIGIN).unwrap().material, MaterialId(1));
        assert!(ws.history().is_undo_empty());
    }

    #[test]
    fn test_empty_targets_rejected() {
        let (_tmp, mut ws, target) = setup();
        let err = ws.add_voxels(&target, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_add_and_delete_are_reversible() {
        let (_tmp, mut ws, target) = setup();
        let new = VoxelIndex::new(0, 1, 0);

        let outcome = ws.add_voxels(&target, &[new, ORIGIN]).unwrap();
        assert_eq!(outcome.affected, 1, "existing voxels are skipped");
        assert!(ws.history().peek_undo().unwrap().is_addition());
        let store = open(&ws, &target);
        assert_eq!(store.len(), 4);
        assert_eq!(store.get(new).unwrap().center, store.grid().unwrap().center_of(new));

        ws.undo(&target).unwrap();
        assert!(!open(&ws, &target).contains(new));
        ws.redo(&target).unwrap();
        assert!(open(&ws, &target).contains(new));

        ws.delete_voxels(&target, &[new, VoxelIndex::new(7, 7, 7)]).unwrap();
        assert!(ws.history().peek_undo().unwrap().is_deletion());
        assert!(!open(&ws, &target).contains(new));
        ws.undo(&target).unwrap();
        assert!(open(&ws, &target).contains(new));
    }

    #[test]
    fn test_add_outside_partition_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = ProjectCatalog::open_or_create(tmp.path()).unwrap();
        let mut ws = Workspace::new(catalog, 10, 4);
        // Six cells centered to -2..=3: partition-1 is [-2, 2), partition-2 is [2, 6).
        let output = VoxelizationOutput {
            points: (0..6).map(|i| DVec3::new(f64::from(i), 0.0, 0.0)).collect(),
            origin: DVec3::ZERO,
            pitch: 1.0,
        };
        ws.create_project("rod", &output, None).unwrap();
        let first = PartitionRef::new("rod", "partition-1");

        for stray in [VoxelIndex::new(3, 0, 0), VoxelIndex::new(500, 0, 0)] {
            let err = ws.add_voxels(&first, &[VoxelIndex::new(0, 1, 0), stray]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{stray}");
        }
        assert!(ws.history().is_undo_empty());
        assert_eq!(open(&ws, &first).len(), 4);

        let outcome = ws.add_voxels(&first, &[VoxelIndex::new(1, 1, -2)]).unwrap();
        assert_eq!(outcome.affected, 1);

        let project = ws.catalog().project("rod").unwrap();
        let mut csv = Vec::new();
        assert_eq!(project.export_csv(&mut csv).unwrap(), 7);
    }

    #[test]
    fn test_empty_history_is_reported() {
        let (_tmp, mut ws, target) = setup();
        assert_eq!(ws.undo(&target).unwrap_err().kind(), ErrorKind::EmptyHistory);
        assert_eq!(ws.redo(&target).unwrap_err().kind(), ErrorKind::EmptyHistory);
    }

    #[test]
    fn test_switching_partition_clears_history() {
        let (_tmp, mut ws, target) = setup();
        let output = VoxelizationOutput {
            points: vec![DVec3::ZERO],
            origin: DVec3::ZERO,
            pitch: 1.0,
        };
        ws.create_project("dot", &output, None).unwrap();
        let other = PartitionRef::new("dot", "partition-1");

        ws.update_voxels(&target, &[ORIGIN], EditValue::Material(MaterialId(2)))
            .unwrap();
        assert_eq!(ws.history().depth(), 1);
        ws.update_voxels(&other, &[ORIGIN], EditValue::Material(MaterialId(2)))
            .unwrap();
        assert_eq!(ws.history().depth(), 1);
        assert_eq!(ws.active(), Some(&other));

        ws.undo(&other).unwrap();
        assert_eq!(ws.undo(&target).unwrap_err().kind(), ErrorKind::EmptyHistory);
    }

    #[test]
    fn test_unknown_partition_lists_alternatives() {
        let (_tmp, mut ws, _) = setup();
        let err = ws
            .undo(&PartitionRef::new("rod", "partition-7"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.available(), ["partition-1".to_string()]);
    }

    #[test]
    fn test_invalid_partition_edge_rejected() {
        let (_tmp, mut ws, _) = setup();
        let output = VoxelizationOutput {
            points: vec![DVec3::ZERO],
            origin: DVec3::ZERO,
            pitch: 1.0,
        };
        let err = ws.create_project("odd", &output, Some(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
