//! Edit inputs and results.

use std::fmt;

use magvox_store::{Magnetization, MaterialId};
use serde::{Deserialize, Serialize};

use crate::error::EditError;

/// Identifies one partition of one project.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionRef {
    pub project: String,
    pub partition: String,
}

impl PartitionRef {
    pub fn new(project: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            partition: partition.into(),
        }
    }
}

impl fmt::Display for PartitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.partition)
    }
}

/// The single property an update sets on every target voxel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditValue {
    Material(MaterialId),
    /// `None` clears the magnetization.
    Magnetization(Option<Magnetization>),
}

impl EditValue {
    /// Builds the edit from the optional request fields.
    ///
    /// Exactly one of `material` and `magnetization` must be given. The
    /// magnetization components must be all present or all absent.
    pub fn from_parts(
        material: Option<u16>,
        magnetization: Option<[Option<f64>; 3]>,
    ) -> Result<Self, EditError> {
        match (material, magnetization) {
            (Some(id), None) => Ok(Self::Material(MaterialId(id))),
            (None, Some([m, p, a])) => Magnetization::from_components(m, p, a)
                .map(Self::Magnetization)
                .map_err(EditError::from),
            (Some(_), Some(_)) => Err(EditError::invalid(
                "both a material id and a magnetization were given; update one at a time",
            )),
            (None, None) => Err(EditError::invalid(
                "neither a material id nor a magnetization was given",
            )),
        }
    }
}

/// Result of an edit or history step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Number of voxels whose state changed.
    pub affected: usize,
    pub undo_empty: bool,
    pub redo_empty: bool,
}
