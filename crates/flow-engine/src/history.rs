//! Undo/redo history using owned snapshots
//!
//! The history stores full clones of the edited state rather than inverse
//! operations, so it works with any mutation of any `Clone + PartialEq` value.
//! Snapshots never alias caller state: values are cloned on the way in and on
//! the way out.

use std::collections::VecDeque;

use crate::config::defaults;

/// Undo/redo stack of state snapshots
#[derive(Debug, Clone)]
pub struct History<T> {
    /// Saved states, oldest first
    snapshots: VecDeque<T>,
    /// Index of the active snapshot
    cursor: usize,
    /// Maximum number of snapshots to keep
    max_snapshots: usize,
}

impl<T: Clone + PartialEq> History<T> {
    /// Create a new history with the specified maximum size
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cursor: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Reset the history to a single snapshot of `state`
    pub fn init(&mut self, state: &T) {
        self.snapshots.clear();
        self.snapshots.push_back(state.clone());
        self.cursor = 0;
    }

    /// Record a new snapshot
    ///
    /// Returns `false` when `state` equals the active snapshot (nothing
    /// recorded). Otherwise any redo history after the cursor is discarded.
    pub fn push(&mut self, state: &T) -> bool {
        if self.snapshots.get(self.cursor) == Some(state) {
            return false;
        }

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(state.clone());
        self.cursor = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }

        true
    }

    /// Undo: move back one snapshot
    ///
    /// Returns the previous state, or None if at the beginning.
    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor).cloned()
    }

    /// Redo: move forward one snapshot
    ///
    /// Returns the next state, or None if at the end.
    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor).cloned()
    }

    /// The active snapshot, if the history has been initialized
    pub fn current(&self) -> Option<&T> {
        self.snapshots.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Index of the active snapshot
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Clear all snapshots
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }
}

impl<T: Clone + PartialEq> Default for History<T> {
    fn default() -> Self {
        Self::new(defaults::HISTORY_LIMIT)
    }
}
