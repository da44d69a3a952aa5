//! Bounded undo/redo history.
//!
//! [`HistoryManager`] keeps two stacks of recorded changes. It knows nothing
//! about what a change contains; callers apply the change to their own state
//! and use the manager only to decide which change comes next.
//!
//! ```rust
//! use magvox_history::HistoryManager;
//!
//! let mut history = HistoryManager::new(2);
//! history.record_change("a");
//! history.record_change("b");
//! history.record_change("c"); // evicts "a"
//!
//! assert_eq!(history.undo(), Ok(&"c"));
//! assert_eq!(history.undo(), Ok(&"b"));
//! assert!(history.undo().is_err());
//! assert_eq!(history.redo(), Ok(&"b"));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// History depth used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Errors raised by history operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// Undo was requested with an empty history stack.
    #[error("nothing to undo")]
    NothingToUndo,
    /// Redo was requested with an empty redo stack.
    #[error("nothing to redo")]
    NothingToRedo,
    /// A history action other than `undo` or `redo`.
    #[error("invalid history action {0:?}; expected 'undo' or 'redo'")]
    InvalidAction(String),
}

/// Direction of a history step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Undo,
    Redo,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undo => "undo",
            Self::Redo => "redo",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = HistoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "undo" => Ok(Self::Undo),
            "redo" => Ok(Self::Redo),
            _ => Err(HistoryError::InvalidAction(s.to_string())),
        }
    }
}

/// Bounded undo and redo stacks.
///
/// Every recorded change lives in exactly one stack. Only
/// [`record_change`](Self::record_change) discards changes: it evicts the
/// oldest entry once the history is full and empties the redo stack.
#[derive(Debug, Clone)]
pub struct HistoryManager<D> {
    /// Oldest at the front, newest at the back.
    history: VecDeque<D>,
    redo: Vec<D>,
    max_depth: usize,
}

impl<D> Default for HistoryManager<D> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl<D> HistoryManager<D> {
    /// Creates an empty manager holding at most `max_depth` undo entries.
    ///
    /// A depth of zero is raised to one.
    pub fn new(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            history: VecDeque::with_capacity(max_depth.min(DEFAULT_MAX_DEPTH)),
            redo: Vec::new(),
            max_depth,
        }
    }

    /// Records a new change.
    pub fn record_change(&mut self, delta: D) {
        self.history.push_back(delta);
        while self.history.len() > self.max_depth {
            self.history.pop_front();
            tracing::trace!("history full, evicted oldest change");
        }
        self.redo.clear();
    }

    /// The change [`undo`](Self::undo) would return.
    pub fn peek_undo(&self) -> Result<&D, HistoryError> {
        self.history.back().ok_or(HistoryError::NothingToUndo)
    }

    /// The change [`redo`](Self::redo) would return.
    pub fn peek_redo(&self) -> Result<&D, HistoryError> {
        self.redo.last().ok_or(HistoryError::NothingToRedo)
    }

    /// Moves the newest change onto the redo stack and returns it.
    ///
    /// On error both stacks are left unchanged.
    pub fn undo(&mut self) -> Result<&D, HistoryError> {
        let delta = self.history.pop_back().ok_or(HistoryError::NothingToUndo)?;
        self.redo.push(delta);
        self.peek_redo()
    }

    /// Moves the newest undone change back onto the history and returns it.
    ///
    /// On error both stacks are left unchanged.
    pub fn redo(&mut self) -> Result<&D, HistoryError> {
        let delta = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        self.history.push_back(delta);
        self.peek_undo()
    }

    /// Peeks in the given direction.
    pub fn peek(&self, action: HistoryAction) -> Result<&D, HistoryError> {
        match action {
            HistoryAction::Undo => self.peek_undo(),
            HistoryAction::Redo => self.peek_redo(),
        }
    }

    /// Steps in the given direction.
    pub fn step(&mut self, action: HistoryAction) -> Result<&D, HistoryError> {
        match action {
            HistoryAction::Undo => self.undo(),
            HistoryAction::Redo => self.redo(),
        }
    }

    /// Empties both stacks.
    pub fn clear(&mut self) {
        self.history.clear();
        self.redo.clear();
    }

    pub fn is_undo_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn is_redo_empty(&self) -> bool {
        self.redo.is_empty()
    }

    /// Number of undoable changes.
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// Number of redoable changes.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Maximum number of undoable changes.
    pub fn capacity(&self) -> usize {
        self.max_depth
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
