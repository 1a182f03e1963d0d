//! Which content ids a session holds.

use crate::proto::{Operation, StreamStructure};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Membership of content in one session, maintained from the structural
/// operations applied to it.
#[derive(Debug, Clone, Default)]
pub struct SessionContentTracker {
    supports_clear_all: bool,
    content_ids: HashSet<String>,
}

impl SessionContentTracker {
    /// `supports_clear_all` is only set for head: regular sessions never see
    /// their content wiped by a `CLEAR_ALL`.
    pub fn new(supports_clear_all: bool) -> Self {
        Self {
            supports_clear_all,
            content_ids: HashSet::new(),
        }
    }

    pub fn update(&mut self, structure: &StreamStructure) {
        let content_id = &structure.content_id;
        match structure.operation {
            Operation::UpdateOrAppend | Operation::RequiredContent => {
                self.content_ids.insert(content_id.clone());
            }
            Operation::Remove => {
                self.content_ids.remove(content_id);
            }
            Operation::ClearAll => {
                if self.supports_clear_all {
                    debug!(count = self.content_ids.len(), "clearing tracked content");
                    self.content_ids.clear();
                } else {
                    warn!("CLEAR_ALL is not supported by this session, ignoring");
                }
            }
        }
    }

    pub fn update_all(&mut self, structures: &[StreamStructure]) {
        for structure in structures {
            self.update(structure);
        }
    }

    pub fn contains(&self, content_id: &str) -> bool {
        self.content_ids.contains(content_id)
    }

    /// A copy of the tracked ids.
    pub fn content_ids(&self) -> HashSet<String> {
        self.content_ids.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.content_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content_ids.len()
    }

    pub fn clear(&mut self) {
        self.content_ids.clear();
    }
}
