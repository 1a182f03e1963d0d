//! The state guarded by a provider's lock.

use super::synthetic::SyntheticTokenTracker;
use super::ProviderState;
use crate::model::child::{ModelChild, ModelToken};
use crate::model::cursor::CursorRegistry;
use crate::proto::{StreamFeature, UiContext};
use crate::RequestReason;
use std::collections::{HashMap, HashSet};

/// Where a server continuation token sits, so its page can be spliced back
/// under the same parent.
#[derive(Debug, Clone)]
pub(super) struct TokenTracking {
    pub(super) token: ModelToken,
    pub(super) parent_id: String,
}

/// Counters reported by `dump()`.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct CommitStats {
    pub(super) commits: usize,
    pub(super) token_commits: usize,
    pub(super) update_commits: usize,
    pub(super) removed_children: usize,
    pub(super) remove_scans: usize,
}

pub(super) struct ModelTree {
    pub(super) root: Option<ModelChild>,
    /// Every child in the tree, by content id.
    pub(super) contents: HashMap<String, ModelChild>,
    /// Ordered children, by parent content id. Created lazily.
    pub(super) containers: HashMap<String, Vec<ModelChild>>,
    /// Server tokens, by `next_page_token`.
    pub(super) tokens: HashMap<String, TokenTracking>,
    /// Synthetic tokens, by content id.
    pub(super) synthetic_tokens: HashMap<String, SyntheticTokenTracker>,
    pub(super) cursors: CursorRegistry,
    pub(super) state: ProviderState,
    pub(super) ui_context: UiContext,
    pub(super) session_id: Option<String>,
    pub(super) delayed_refresh: Option<RequestReason>,
    pub(super) stats: CommitStats,
}

impl ModelTree {
    pub(super) fn new() -> Self {
        Self {
            root: None,
            contents: HashMap::new(),
            containers: HashMap::new(),
            tokens: HashMap::new(),
            synthetic_tokens: HashMap::new(),
            cursors: CursorRegistry::default(),
            state: ProviderState::Initializing,
            ui_context: UiContext::default(),
            session_id: None,
            delayed_refresh: None,
            stats: CommitStats::default(),
        }
    }

    pub(super) fn root_id(&self) -> Option<String> {
        self.root.as_ref().map(|r| r.content_id().to_string())
    }

    pub(super) fn root_children(&self) -> Vec<ModelChild> {
        self.root
            .as_ref()
            .and_then(|r| self.containers.get(r.content_id()))
            .cloned()
            .unwrap_or_default()
    }

    pub(super) fn child_list(&mut self, parent_id: &str) -> &mut Vec<ModelChild> {
        self.containers.entry(parent_id.to_string()).or_default()
    }

    /// Moves to `Invalidated`, dropping everything below the root. Returns
    /// `false` if already invalidated.
    pub(super) fn move_to_invalidated(&mut self, ui_context: UiContext) -> bool {
        if self.state == ProviderState::Invalidated {
            return false;
        }
        self.state = ProviderState::Invalidated;
        self.ui_context = ui_context;
        self.cursors.release_all();
        self.tokens.clear();
        self.synthetic_tokens.clear();
        self.containers.clear();
        let root_id = self.root_id();
        self.contents
            .retain(|id, _| root_id.as_deref() == Some(id.as_str()));
        true
    }

    /// Index of the first unbound root child. When none of the children
    /// before the last are unbound this is the last index.
    pub(super) fn first_unbound_root_child(&self) -> usize {
        let Some(children) = self
            .root
            .as_ref()
            .and_then(|r| self.containers.get(r.content_id()))
        else {
            return 0;
        };
        let last = children.len().saturating_sub(1);
        children[..last]
            .iter()
            .position(ModelChild::is_unbound)
            .unwrap_or(last)
    }

    /// Appends the stream feature of `node` and of every feature below it.
    pub(super) fn collect_features(&self, node: &ModelChild, out: &mut Vec<StreamFeature>) {
        let Some(feature) = node.feature() else {
            return;
        };
        out.push(feature.stream_feature());
        if let Some(children) = self.containers.get(node.content_id()) {
            for child in children {
                self.collect_features(child, out);
            }
        }
    }

    /// The root-level ancestor of `content_id`, or `None` if it does not
    /// descend from the root.
    pub(super) fn view_depth(&self, content_id: &str) -> Option<String> {
        let root_id = self.root_id()?;
        let mut current = self.contents.get(content_id)?;
        let mut visited = HashSet::new();
        loop {
            let parent = current.parent_id()?;
            if parent == root_id {
                return Some(current.content_id().to_string());
            }
            if !visited.insert(parent.to_string()) {
                return None;
            }
            current = self.contents.get(parent)?;
        }
    }

    /// Checks that `contents` and `containers` agree.
    #[cfg(test)]
    pub(super) fn check_invariants(&self) -> Result<(), String> {
        let mut listed: HashSet<&str> = HashSet::new();
        for (parent, children) in &self.containers {
            for child in children {
                if child.parent_id() != Some(parent.as_str()) {
                    return Err(format!(
                        "{} is listed under {} but has parent {:?}",
                        child.content_id(),
                        parent,
                        child.parent_id()
                    ));
                }
                if !listed.insert(child.content_id()) {
                    return Err(format!("{} is listed twice", child.content_id()));
                }
                match self.contents.get(child.content_id()) {
                    Some(c) if c.same_node(child) => {}
                    _ => return Err(format!("{} is listed but not in contents", child.content_id())),
                }
            }
        }
        if let Some(root) = &self.root {
            listed.insert(root.content_id());
        }
        for id in self.contents.keys() {
            if !listed.contains(id.as_str()) {
                return Err(format!("{} is in contents but not in the tree", id));
            }
        }
        let root_children = self.root_children();
        for (id, tracker) in &self.synthetic_tokens {
            let present = tracker
                .token_child()
                .map(|t| root_children.iter().any(|c| c.same_node(t)))
                .unwrap_or(false);
            if !present {
                return Err(format!("synthetic token {} is not under the root", id));
            }
        }
        Ok(())
    }
}
