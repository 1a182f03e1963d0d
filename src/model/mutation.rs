//! Batched edits to a model provider.

use crate::proto::{MutationContext, StreamStructure};
use std::sync::Weak;
use tracing::warn;

/// Everything one [`ModelMutation`] accumulated.
#[derive(Debug, Clone, Default)]
pub struct Change {
    /// Appends and removes, in the order they were added.
    pub structure_changes: Vec<StreamStructure>,
    /// Existing children whose payload should be rebound.
    pub update_changes: Vec<StreamStructure>,
    pub mutation_context: Option<MutationContext>,
    pub session_id: Option<String>,
    pub schema_version: i32,
}

/// Applies a [`Change`]. Implemented by the provider.
pub(crate) trait ModelCommitter: Send + Sync {
    fn commit(&self, change: Change);
}

/// Builder for one atomic edit. Nothing is applied until [`ModelMutation::commit`].
pub struct ModelMutation {
    change: Change,
    committer: Weak<dyn ModelCommitter>,
}

impl ModelMutation {
    pub(crate) fn new(committer: Weak<dyn ModelCommitter>) -> Self {
        Self {
            change: Change::default(),
            committer,
        }
    }

    pub fn add_child(&mut self, structure: StreamStructure) -> &mut Self {
        self.change.structure_changes.push(structure);
        self
    }

    pub fn remove_child(&mut self, structure: StreamStructure) -> &mut Self {
        self.change.structure_changes.push(structure);
        self
    }

    pub fn update_child(&mut self, structure: StreamStructure) -> &mut Self {
        self.change.update_changes.push(structure);
        self
    }

    pub fn set_mutation_context(&mut self, context: MutationContext) -> &mut Self {
        self.change.mutation_context = Some(context);
        self
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>) -> &mut Self {
        self.change.session_id = Some(session_id.into());
        self
    }

    pub fn set_schema_version(&mut self, schema_version: i32) -> &mut Self {
        self.change.schema_version = schema_version;
        self
    }

    pub fn has_changes(&self) -> bool {
        !self.change.structure_changes.is_empty() || !self.change.update_changes.is_empty()
    }

    pub fn change(&self) -> &Change {
        &self.change
    }

    /// Hands the accumulated change to the provider.
    pub fn commit(self) {
        match self.committer.upgrade() {
            Some(committer) => committer.commit(self.change),
            None => warn!("model provider dropped before mutation commit"),
        }
    }
}
