//! # Undo Stack
//!
//! Cursor over the undoable, completed entries of the ledger.
//!
//! ## Design
//!
//! - Holds entry ids only; the ledger owns the entries
//! - `undo_idx` partitions undoable (left) from redoable (right)
//! - Pushing while redo entries exist truncates them first: linear
//!   history, no branching
//! - The cursor moves only via `commit_undo`/`commit_redo`, called by
//!   the replay engine after every affected tree acknowledged "finish"

use arbor_patch::EntryId;

#[derive(Debug, Default)]
pub struct UndoStack {
    entries: Vec<EntryId>,
    /// Invariant: `0 <= undo_idx <= entries.len()`.
    undo_idx: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly completed undoable entry. Discards the redo
    /// branch when the cursor is not at the end.
    pub fn push(&mut self, entry: EntryId) {
        self.entries.truncate(self.undo_idx);
        self.entries.push(entry);
        self.undo_idx = self.entries.len();
    }

    /// The entry an `undo()` would replay, without moving the cursor.
    pub fn peek_undo(&self) -> Option<&EntryId> {
        self.undo_idx.checked_sub(1).map(|i| &self.entries[i])
    }

    /// The entry a `redo()` would replay, without moving the cursor.
    pub fn peek_redo(&self) -> Option<&EntryId> {
        self.entries.get(self.undo_idx)
    }

    /// Move the cursor left after a fully acknowledged undo replay.
    pub fn commit_undo(&mut self) {
        debug_assert!(self.undo_idx > 0, "commit_undo with nothing undone");
        self.undo_idx = self.undo_idx.saturating_sub(1);
    }

    /// Move the cursor right after a fully acknowledged redo replay.
    pub fn commit_redo(&mut self) {
        debug_assert!(self.undo_idx < self.entries.len(), "commit_redo past end");
        self.undo_idx = (self.undo_idx + 1).min(self.entries.len());
    }

    pub fn can_undo(&self) -> bool {
        self.undo_idx > 0
    }

    pub fn can_redo(&self) -> bool {
        self.undo_idx < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn undo_idx(&self) -> usize {
        self.undo_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> EntryId {
        EntryId::new(format!("e-{n}"))
    }

    #[test]
    fn test_push_advances_cursor() {
        let mut stack = UndoStack::new();
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());

        stack.push(id(1));
        stack.push(id(2));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.undo_idx(), 2);
        assert_eq!(stack.peek_undo(), Some(&id(2)));
        assert_eq!(stack.peek_redo(), None);
    }

    #[test]
    fn test_undo_redo_cursor_moves() {
        let mut stack = UndoStack::new();
        stack.push(id(1));
        stack.push(id(2));

        stack.commit_undo();
        assert_eq!(stack.peek_undo(), Some(&id(1)));
        assert_eq!(stack.peek_redo(), Some(&id(2)));
        assert!(stack.can_redo());

        stack.commit_redo();
        assert_eq!(stack.peek_undo(), Some(&id(2)));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_push_mid_history_truncates_redo_branch() {
        let mut stack = UndoStack::new();
        stack.push(id(1));
        stack.push(id(2));
        stack.push(id(3));

        stack.commit_undo();
        stack.commit_undo();
        assert_eq!(stack.undo_idx(), 1);
        assert_eq!(stack.len(), 3);

        stack.push(id(4));
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.undo_idx(), 2);
        assert_eq!(stack.peek_undo(), Some(&id(4)));
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut stack = UndoStack::new();
        stack.push(id(1));
        stack.commit_undo();
        assert_eq!(stack.undo_idx(), 0);
        assert!(stack.undo_idx() <= stack.len());
        stack.commit_redo();
        assert_eq!(stack.undo_idx(), 1);
        assert!(stack.undo_idx() <= stack.len());
    }
}
