//! Snapshot-based undo/redo.
//!
//! Undo and redo swap the entire item collection. Peers do not share the stacks, so every
//! swap yields a [`Reconciliation`] describing the adds, updates and deletes needed to bring
//! them to the same state.

use std::collections::HashMap;

use crate::items::{Item, ItemId};
use crate::store::ItemStore;

/// Default maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Difference between two item collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Items present after but not before.
    pub added: Vec<Item>,
    /// Items present in both whose content differs, in their after state.
    pub updated: Vec<Item>,
    /// Ids present before but not after.
    pub deleted: Vec<ItemId>,
}

impl Reconciliation {
    /// Diff `before` against `after`, preserving the order of each collection.
    pub fn diff(before: &[Item], after: &[Item]) -> Self {
        let before_map: HashMap<ItemId, &Item> = before.iter().map(|i| (i.id, i)).collect();
        let after_map: HashMap<ItemId, &Item> = after.iter().map(|i| (i.id, i)).collect();

        let mut out = Reconciliation::default();
        for item in after {
            match before_map.get(&item.id) {
                None => out.added.push(item.clone()),
                Some(prev) if *prev != item => out.updated.push(item.clone()),
                Some(_) => {}
            }
        }
        out.deleted = before
            .iter()
            .filter(|i| !after_map.contains_key(&i.id))
            .map(|i| i.id)
            .collect();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Undo and redo stacks of full snapshots.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    undo_stack: Vec<Vec<Item>>,
    redo_stack: Vec<Vec<Item>>,
    limit: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Snapshot the store before a local mutation. Clears the redo stack.
    pub fn push(&mut self, store: &ItemStore) {
        self.push_snapshot(store.snapshot());
    }

    pub fn push_snapshot(&mut self, snapshot: Vec<Item>) {
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
    }

    /// Drop the most recent snapshot without restoring it, for operations that turned out
    /// to change nothing.
    pub fn discard_last(&mut self) -> Option<Vec<Item>> {
        self.undo_stack.pop()
    }

    /// Restore the previous snapshot. Returns what peers need to converge, or `None` if
    /// there is nothing to undo.
    pub fn undo(&mut self, store: &mut ItemStore) -> Option<Reconciliation> {
        let snapshot = self.undo_stack.pop()?;
        let current = store.snapshot();
        let diff = Reconciliation::diff(&current, &snapshot);
        self.redo_stack.push(current);
        store.replace_all(snapshot);
        Some(diff)
    }

    pub fn redo(&mut self, store: &mut ItemStore) -> Option<Reconciliation> {
        let snapshot = self.redo_stack.pop()?;
        let current = store.snapshot();
        let diff = Reconciliation::diff(&current, &snapshot);
        self.undo_stack.push(current);
        store.replace_all(snapshot);
        Some(diff)
    }

    /// The snapshot the next undo would restore.
    pub fn last_snapshot(&self) -> Option<&[Item]> {
        self.undo_stack.last().map(Vec::as_slice)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
