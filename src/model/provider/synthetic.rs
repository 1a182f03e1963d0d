//! Synthetic tokens page through root children that are already loaded.
//!
//! Only a window `[start, end)` of the root's children is bound. When more
//! children follow, a locally generated token is inserted at `end`;
//! handling it binds the next window.

use super::tree::ModelTree;
use crate::model::child::ModelChild;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub(super) struct SyntheticTokenTracker {
    paging_child: ModelChild,
    start: usize,
    end: usize,
    insert_token: bool,
    token_child: Option<ModelChild>,
}

impl SyntheticTokenTracker {
    /// Computes the window over `paging_child`'s children starting at
    /// `start`. The window is extended to the end when fewer than
    /// `min_page_size` children would be left behind it.
    pub(super) fn new(
        tree: &ModelTree,
        paging_child: &ModelChild,
        start: usize,
        page_size: usize,
        min_page_size: usize,
    ) -> Self {
        let Some(children) = tree.containers.get(paging_child.content_id()) else {
            debug!(content_id = %paging_child.content_id(), "paging child has no children");
            return Self {
                paging_child: paging_child.clone(),
                start: 0,
                end: 0,
                insert_token: false,
                token_child: None,
            };
        };
        let len = children.len();
        let (start, end) = if len <= start {
            if len > 0 {
                error!(start, len, "synthetic window starts beyond the child count");
            }
            (0, len)
        } else if start + page_size > len || start + page_size + min_page_size > len {
            (start, len)
        } else {
            (start, start + page_size)
        };
        let insert_token = end < len;
        info!(start, end, len, insert_token, "synthetic token window");
        Self {
            paging_child: paging_child.clone(),
            start,
            end,
            insert_token,
            token_child: None,
        }
    }

    #[cfg(test)]
    pub(super) fn window(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub(super) fn token_child(&self) -> Option<&ModelChild> {
        self.token_child.as_ref()
    }

    /// Collects the unbound nodes inside the window and, when needed, inserts
    /// the token built by `make_token` at `end`. Returns the nodes to bind.
    pub(super) fn insert_token(
        mut self,
        tree: &mut ModelTree,
        make_token: impl FnOnce(&str) -> ModelChild,
    ) -> Vec<ModelChild> {
        let mut to_bind = Vec::new();
        traverse(tree, &self.paging_child, self.start, self.end, &mut to_bind);
        if !self.insert_token {
            return to_bind;
        }
        let parent_id = self.paging_child.content_id().to_string();
        let Some(children) = tree.containers.get_mut(&parent_id) else {
            error!(parent_id = %parent_id, "unable to find the paging child's children");
            return to_bind;
        };
        let token = make_token(&parent_id);
        let at = self.end.min(children.len());
        children.insert(at, token.clone());
        info!(content_id = %token.content_id(), position = at, "inserted synthetic token");
        tree.contents
            .insert(token.content_id().to_string(), token.clone());
        let token_id = token.content_id().to_string();
        self.token_child = Some(token);
        tree.synthetic_tokens.insert(token_id, self);
        to_bind
    }
}

fn traverse(tree: &ModelTree, node: &ModelChild, start: usize, end: usize, out: &mut Vec<ModelChild>) {
    if node.is_unbound() {
        out.push(node.clone());
    }
    let Some(children) = tree.containers.get(node.content_id()) else {
        return;
    };
    let end = end.min(children.len());
    if start >= end {
        return;
    }
    for child in &children[start..end] {
        traverse(tree, child, 0, usize::MAX, out);
    }
}
