//! Cursors over a parent's children, and the registry a provider keeps of
//! the cursors it has handed out.

use super::change::ChildChanges;
use super::child::ModelChild;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct CursorState {
    parent_id: String,
    children: Vec<ModelChild>,
    position: usize,
    released: bool,
}

/// A forward-only iterator over a snapshot of a parent's children.
///
/// Cursors are not restartable. A cursor handed out by a provider is kept up
/// to date with appends and removals under its parent until it is released.
/// Clones share position.
#[derive(Clone)]
pub struct ModelCursor {
    state: Arc<Mutex<CursorState>>,
}

impl ModelCursor {
    pub(crate) fn new(parent_id: impl Into<String>, children: Vec<ModelChild>) -> Self {
        Self {
            state: Arc::new(Mutex::new(CursorState {
                parent_id: parent_id.into(),
                children,
                position: 0,
                released: false,
            })),
        }
    }

    pub(crate) fn empty(parent_id: &str) -> Self {
        Self::new(parent_id, Vec::new())
    }

    /// Returns the next child, or `None` at the end or once released.
    pub fn next_item(&self) -> Option<ModelChild> {
        let mut state = self.state.lock();
        if state.released {
            return None;
        }
        let child = state.children.get(state.position).cloned()?;
        state.position += 1;
        Some(child)
    }

    pub fn is_at_end(&self) -> bool {
        let state = self.state.lock();
        state.released || state.position >= state.children.len()
    }

    pub fn parent_content_id(&self) -> String {
        self.state.lock().parent_id.clone()
    }

    /// Children not yet returned.
    pub fn remaining(&self) -> usize {
        let state = self.state.lock();
        if state.released {
            return 0;
        }
        state.children.len().saturating_sub(state.position)
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Stops the cursor. Later calls to [`ModelCursor::next_item`] return `None`.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.children.clear();
        state.position = 0;
    }

    /// Applies removals and appends under this cursor's parent.
    pub(crate) fn update(&self, changes: &ChildChanges) {
        let mut state = self.state.lock();
        if state.released {
            return;
        }
        if !changes.removed.is_empty() {
            let position = state.position;
            let mut removed_before = 0;
            let mut kept = Vec::with_capacity(state.children.len());
            for (i, child) in state.children.drain(..).enumerate() {
                if changes.removed.iter().any(|r| r.same_node(&child)) {
                    if i < position {
                        removed_before += 1;
                    }
                } else {
                    kept.push(child);
                }
            }
            state.children = kept;
            state.position = position - removed_before;
        }
        state.children.extend(changes.appended.iter().cloned());
    }

    fn only_owner(&self) -> bool {
        Arc::strong_count(&self.state) == 1
    }
}

impl Iterator for ModelCursor {
    type Item = ModelChild;

    fn next(&mut self) -> Option<ModelChild> {
        self.next_item()
    }
}

impl fmt::Debug for ModelCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ModelCursor")
            .field("parent_id", &state.parent_id)
            .field("position", &state.position)
            .field("len", &state.children.len())
            .field("released", &state.released)
            .finish()
    }
}

/// Cursors handed out by one provider, keyed by registration id.
///
/// The registry holds a clone of each cursor. When that clone is the only
/// remaining handle, nobody can read the cursor any more and it is reclaimed.
#[derive(Debug, Default)]
pub(crate) struct CursorRegistry {
    next_id: u64,
    cursors: HashMap<u64, ModelCursor>,
    reclaimed: usize,
}

impl CursorRegistry {
    pub(crate) fn register(&mut self, cursor: &ModelCursor) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.cursors.insert(id, cursor.clone());
        id
    }

    /// Drops cursors no caller holds any more. Returns how many were dropped.
    pub(crate) fn reclaim(&mut self) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|_, cursor| !cursor.only_owner());
        let dropped = before - self.cursors.len();
        self.reclaimed += dropped;
        dropped
    }

    /// Live cursors over `parent_id`'s children.
    pub(crate) fn for_parent(&self, parent_id: &str) -> Vec<ModelCursor> {
        self.cursors
            .values()
            .filter(|c| c.state.lock().parent_id == parent_id)
            .cloned()
            .collect()
    }

    pub(crate) fn release_all(&mut self) {
        for cursor in self.cursors.values() {
            cursor.release();
        }
        self.cursors.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.cursors.len()
    }

    pub(crate) fn reclaimed(&self) -> usize {
        self.reclaimed
    }

    pub(crate) fn at_end(&self) -> usize {
        self.cursors.values().filter(|c| c.is_at_end()).count()
    }
}
