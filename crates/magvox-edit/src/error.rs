//! Error taxonomy shared by every edit-facing operation.

use magvox_coords::CoordError;
use magvox_history::HistoryError;
use magvox_store::StoreError;

/// Coarse error category, used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidRequest,
    EmptyHistory,
    StorageIntegrity,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidRequest => "invalid_request",
            Self::EmptyHistory => "empty_history",
            Self::StorageIntegrity => "storage_integrity_violation",
            Self::Storage => "storage",
        }
    }
}

/// Errors returned by the edit workspace and queries.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// An unknown project, partition, layer, or edit target.
    #[error("{what} not found")]
    NotFound {
        what: String,
        /// Valid alternatives, sorted. Empty when listing them is not cheap.
        available: Vec<String>,
    },

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Undo or redo with nothing to act on.
    #[error(transparent)]
    EmptyHistory(HistoryError),

    /// The write would have stored inconsistent data, or stored data is
    /// inconsistent.
    #[error("storage integrity violation: {0}")]
    StorageIntegrity(#[source] StoreError),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl EditError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            available: Vec::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::EmptyHistory(_) => ErrorKind::EmptyHistory,
            Self::StorageIntegrity(_) => ErrorKind::StorageIntegrity,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Valid alternatives for a [`EditError::NotFound`], empty otherwise.
    pub fn available(&self) -> &[String] {
        match self {
            Self::NotFound { available, .. } => available,
            _ => &[],
        }
    }
}

impl From<StoreError> for EditError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProjectNotFound { name, available } => Self::NotFound {
                what: format!("project {name:?}"),
                available,
            },
            StoreError::PartitionNotFound {
                project,
                partition,
                available,
            } => Self::NotFound {
                what: format!("partition {partition:?} in project {project:?}"),
                available,
            },
            StoreError::InvalidEdgeLength(_)
            | StoreError::InvalidName(_)
            | StoreError::Grid(_)
            | StoreError::SpanTooLarge { .. }
            | StoreError::OutsidePartition { .. }
            | StoreError::EmptyVoxelization => Self::InvalidRequest(err.to_string()),
            err if err.is_integrity_violation() => Self::StorageIntegrity(err),
            err => Self::Storage(err),
        }
    }
}

impl From<HistoryError> for EditError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::InvalidAction(_) => Self::InvalidRequest(err.to_string()),
            err => Self::EmptyHistory(err),
        }
    }
}

impl From<CoordError> for EditError {
    fn from(err: CoordError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
