//! Sessions and the machinery that keeps them in sync with the store.
//!
//! Head is the canonical session: every response lands in it. Other
//! sessions are snapshots of head taken when the UI opened a stream, each
//! optionally bound to the [`ModelProvider`] showing it. A session that is
//! not bound is still kept current on disk, so it can be reopened later.
//!
//! [`FeedSessionManager`] ties the pieces together: [`SessionCache`] owns the
//! sessions and their metadata, [`SessionManagerMutation`] fans a response
//! out to all of them.

mod cache;
mod factory;
mod manager;
mod mutation;
mod session_impl;
mod tracker;

#[cfg(test)]
mod tests;

pub use cache::SessionCache;
pub use factory::SessionFactory;
pub use manager::{FeedSessionManager, RequestManager, SessionManagerDeps};
pub use mutation::{should_invalidate_session, ModelConsumer, SessionManagerMutation};
pub use session_impl::{HeadSessionImpl, SessionImpl};
pub use tracker::SessionContentTracker;

use crate::model::ModelProvider;
use crate::proto::{MutationContext, StreamStructure, UiContext};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Session settings shared by the cache and every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a non-head session stays alive after it was created.
    pub lifetime: Duration,
    /// Apply a page response only to the session that requested it.
    pub limit_paging_updates: bool,
    /// Schema version written into new session metadata.
    pub schema_version: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(60 * 60),
            limit_paging_updates: true,
            schema_version: 2,
        }
    }
}

impl SessionConfig {
    pub(crate) fn lifetime_millis(&self) -> i64 {
        i64::try_from(self.lifetime.as_millis()).unwrap_or(i64::MAX)
    }
}

/// One session: a set of content plus, optionally, the provider showing it.
pub trait Session: Send + Sync {
    fn session_id(&self) -> &str;

    fn is_head(&self) -> bool {
        false
    }

    fn model_provider(&self) -> Option<Arc<dyn ModelProvider>>;

    /// Binds (or with `None`, unbinds) the provider showing this session.
    fn bind_model_provider(&self, provider: Option<Arc<dyn ModelProvider>>);

    fn content_in_session(&self) -> HashSet<String>;

    /// Whether a head reset may invalidate this session's provider.
    fn invalidate_on_reset_head(&self) -> bool;

    /// Whether a `CLEAR_ALL` in the response described by `context` should
    /// invalidate this session's provider.
    fn should_invalidate_model_provider(&self, context: Option<&MutationContext>) -> bool;

    /// Applies a response to this session, its provider and its journal.
    fn update_session(
        &self,
        clear_head: bool,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    );

    /// Seeds the session (and its provider, if bound) from persisted
    /// structures in one commit.
    fn populate_model_provider(&self, structures: &[StreamStructure], ui_context: UiContext);
}
