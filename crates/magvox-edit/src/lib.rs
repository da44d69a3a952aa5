//! Voxel editing with undo/redo.
//!
//! [`Workspace`] ties a [`HistoryManager`](magvox_history::HistoryManager)
//! to the partition being edited. Each edit captures the full before and
//! after state of the voxels it touches as a
//! [`ModelDelta`](magvox_store::ModelDelta); undo and redo write those states
//! back to the partition file.
//!
//! Read-only queries (surface, layers, listings) live in [`query`] and do not
//! need the workspace.

mod error;
mod model;
pub mod query;
mod workspace;

pub use error::{EditError, ErrorKind};
pub use model::{EditOutcome, EditValue, PartitionRef};
pub use workspace::Workspace;
