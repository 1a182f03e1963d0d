//! The three ways a commit can be applied.
//!
//! The first commit initializes the model. A commit carrying a continuation
//! token splices a page in behind that token. Every other commit is an
//! update that reports per-feature changes.

use super::tree::{ModelTree, TokenTracking};
use super::ProviderState;
use crate::model::change::FeatureChange;
use crate::model::child::{ModelChild, ModelToken};
use crate::model::cursor::ModelCursor;
use crate::model::mutation::Change;
use crate::model::observer::TokenCompleted;
use crate::proto::{StreamStructure, StreamToken, UiContext};
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

/// What to tell observers once a commit has been applied and bound.
pub(super) enum Notification {
    None,
    SessionStart(UiContext),
    TokenCompleted {
        token: ModelToken,
        completed: TokenCompleted,
    },
    FeatureChanges(Vec<FeatureChange>),
}

pub(super) enum MutationHandler {
    Initialize { ui_context: UiContext },
    TokenSourced(TokenSourced),
    Update(UpdateHandler),
}

pub(super) struct TokenSourced {
    source: StreamToken,
    tracking: Option<TokenTracking>,
    new_cursor_start: usize,
}

pub(super) struct UpdateHandler {
    updates: Vec<StreamStructure>,
    changes: Vec<FeatureChange>,
    index: HashMap<String, usize>,
    new_parents: HashSet<String>,
}

impl MutationHandler {
    /// Picks the handler for `change` given the current state.
    pub(super) fn select(tree: &mut ModelTree, change: &Change) -> Self {
        let context = change.mutation_context.as_ref();
        let source_token = context.and_then(|c| c.continuation_token.clone());
        if tree.state == ProviderState::Initializing {
            if source_token.is_some() {
                error!("initializing the model provider from a continuation token");
            }
            let ui_context = context.map(|c| c.ui_context.clone()).unwrap_or_default();
            return MutationHandler::Initialize { ui_context };
        }
        match source_token {
            Some(source) => {
                tree.stats.token_commits += 1;
                MutationHandler::TokenSourced(TokenSourced {
                    source,
                    tracking: None,
                    new_cursor_start: 0,
                })
            }
            None => {
                tree.stats.update_commits += 1;
                MutationHandler::Update(UpdateHandler {
                    updates: change.update_changes.clone(),
                    changes: Vec::new(),
                    index: HashMap::new(),
                    new_parents: HashSet::new(),
                })
            }
        }
    }

    pub(super) fn label(&self) -> &'static str {
        match self {
            MutationHandler::Initialize { .. } => "initialize",
            MutationHandler::TokenSourced(_) => "token",
            MutationHandler::Update(_) => "update",
        }
    }

    /// Runs before any structure is applied.
    pub(super) fn pre_mutation(&mut self, tree: &mut ModelTree) {
        match self {
            MutationHandler::Initialize { .. } => {}
            MutationHandler::TokenSourced(handler) => {
                handler.tracking = tree.tokens.remove(&handler.source.next_page_token);
                match &handler.tracking {
                    // The token itself is removed by this mutation, so the
                    // new page starts where it sat.
                    Some(tracking) => {
                        let len = tree
                            .containers
                            .get(&tracking.parent_id)
                            .map(Vec::len)
                            .unwrap_or(0);
                        handler.new_cursor_start = len.saturating_sub(1);
                    }
                    None => error!("token was not found, positioning to end of list"),
                }
            }
            MutationHandler::Update(handler) => {
                info!(count = handler.updates.len(), "updating items");
                let updates = std::mem::take(&mut handler.updates);
                for update in &updates {
                    if let Some(change) = handler.change_for(&update.content_id, tree) {
                        change.set_feature_changed();
                    }
                }
                handler.updates = updates;
            }
        }
    }

    pub(super) fn append_child(&mut self, parent_id: &str, child: &ModelChild, tree: &ModelTree) {
        let MutationHandler::Update(handler) = self else {
            return;
        };
        let child_id = child.content_id().to_string();
        // Only existing features report changes. Children of a node added in
        // this mutation are part of that node's own append.
        if handler.new_parents.contains(parent_id) {
            handler.new_parents.insert(child_id);
            return;
        }
        handler.new_parents.insert(child_id);
        if let Some(change) = handler.change_for(parent_id, tree) {
            change.append_child(child.clone());
        }
    }

    pub(super) fn remove_child(&mut self, parent_id: &str, child: &ModelChild, tree: &ModelTree) {
        let MutationHandler::Update(handler) = self else {
            return;
        };
        if let Some(change) = handler.change_for(parent_id, tree) {
            change.remove_child(child.clone());
        }
    }

    /// Runs after the structure is applied and bound.
    pub(super) fn post_mutation(self, tree: &mut ModelTree) -> Notification {
        match self {
            MutationHandler::Initialize { ui_context } => {
                info!(session_id = ?tree.session_id, "moving model provider to READY");
                tree.state = ProviderState::Ready;
                tree.ui_context = ui_context.clone();
                Notification::SessionStart(ui_context)
            }
            MutationHandler::TokenSourced(handler) => {
                let Some(tracking) = handler.tracking else {
                    error!("token was not found, mutation is being ignored");
                    return Notification::None;
                };
                let children = tree
                    .containers
                    .get(&tracking.parent_id)
                    .map(|list| list[handler.new_cursor_start.min(list.len())..].to_vec())
                    .unwrap_or_default();
                let cursor = ModelCursor::new(tracking.parent_id.clone(), children);
                Notification::TokenCompleted {
                    token: tracking.token,
                    completed: TokenCompleted::new(cursor),
                }
            }
            MutationHandler::Update(handler) => {
                tree.cursors.reclaim();
                for change in &handler.changes {
                    if change.child_changes().is_empty() {
                        continue;
                    }
                    for cursor in tree.cursors.for_parent(change.content_id()) {
                        cursor.update(change.child_changes());
                    }
                }
                Notification::FeatureChanges(handler.changes)
            }
        }
    }
}

impl UpdateHandler {
    fn change_for(&mut self, content_id: &str, tree: &ModelTree) -> Option<&mut FeatureChange> {
        if let Some(&i) = self.index.get(content_id) {
            return self.changes.get_mut(i);
        }
        let Some(child) = tree.contents.get(content_id) else {
            error!(content_id, "didn't find content for change");
            return None;
        };
        let Some(feature) = child.feature() else {
            warn!(content_id, "change target is not a bound feature, ignoring");
            return None;
        };
        self.index.insert(content_id.to_string(), self.changes.len());
        self.changes.push(FeatureChange::new(content_id, feature));
        self.changes.last_mut()
    }
}
