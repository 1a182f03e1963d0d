//! [`SessionCache`]: head, the attached sessions, and their metadata.

use super::factory::SessionFactory;
use super::session_impl::{HeadSessionImpl, SessionImpl};
use super::{Session, SessionConfig};
use crate::concurrent::Clock;
use crate::error::{InternalErrorReporter, InternalFeedError};
use crate::proto::{SessionMetadata, UiContext, HEAD_SESSION_ID};
use crate::store::Store;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct CacheState {
    attached: HashMap<String, Arc<SessionImpl>>,
    metadata: HashMap<String, SessionMetadata>,
    initialized: bool,
}

/// Owns head and every session bound to a provider. Sessions that exist
/// only on disk are tracked through their metadata and rebuilt on demand.
pub struct SessionCache {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    error_reporter: Arc<dyn InternalErrorReporter>,
    factory: SessionFactory,
    config: SessionConfig,
    head: Arc<HeadSessionImpl>,
    state: Mutex<CacheState>,
}

impl SessionCache {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        error_reporter: Arc<dyn InternalErrorReporter>,
        factory: SessionFactory,
        config: SessionConfig,
    ) -> Self {
        let head = Arc::new(factory.create_head());
        Self {
            store,
            clock,
            error_reporter,
            factory,
            config,
            head,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Loads head and the session metadata from the store. Expired sessions
    /// are dropped from the metadata. Returns `false` if the store could not
    /// be read.
    pub fn initialize(&self) -> bool {
        let metadata = match self.store.read_session_metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(error = %e, "unable to read session metadata");
                return false;
            }
        };
        let head_structures = match self.store.get_stream_structures(HEAD_SESSION_ID) {
            Ok(structures) => structures,
            Err(e) => {
                error!(error = %e, "unable to read the head session");
                return false;
            }
        };
        self.head.initialize(&head_structures);

        let now = self.clock.current_time_millis();
        let snapshot = {
            let mut state = self.state.lock();
            state.metadata = metadata;
            state
                .metadata
                .entry(HEAD_SESSION_ID.to_string())
                .or_insert_with(|| SessionMetadata::new(now, self.config.schema_version));
            let expired: Vec<String> = state
                .metadata
                .iter()
                .filter(|(id, metadata)| !self.is_session_alive(id, metadata))
                .map(|(id, _)| id.clone())
                .collect();
            for session_id in expired {
                info!(session_id = %session_id, "dropping expired session");
                state.metadata.remove(&session_id);
            }
            state.initialized = true;
            state.metadata.clone()
        };
        self.persist_metadata(&snapshot);
        info!(
            head_content = head_structures.len(),
            sessions = snapshot.len() - 1,
            "session cache initialized"
        );
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn head(&self) -> Arc<HeadSessionImpl> {
        Arc::clone(&self.head)
    }

    /// Head is always alive; other sessions live for the configured lifetime.
    pub fn is_session_alive(&self, session_id: &str, metadata: &SessionMetadata) -> bool {
        if session_id == HEAD_SESSION_ID {
            return true;
        }
        let expires = metadata
            .creation_time_millis
            .saturating_add(self.config.lifetime_millis());
        expires > self.clock.current_time_millis()
    }

    pub fn get_attached(&self, session_id: &str) -> Option<Arc<SessionImpl>> {
        self.state.lock().attached.get(session_id).cloned()
    }

    /// Attached sessions ordered by id.
    pub fn get_attached_sessions(&self) -> Vec<Arc<SessionImpl>> {
        let mut sessions: Vec<Arc<SessionImpl>> =
            self.state.lock().attached.values().cloned().collect();
        sessions.sort_by(|a, b| a.session_id().cmp(b.session_id()));
        sessions
    }

    /// Head, then every other live session ordered by id. Sessions that are
    /// not attached are rebuilt unbound from their journals.
    pub fn get_all_sessions(&self) -> Vec<Arc<dyn Session>> {
        let (attached, unbound_ids) = {
            let state = self.state.lock();
            let unbound: Vec<String> = state
                .metadata
                .iter()
                .filter(|(id, metadata)| {
                    id.as_str() != HEAD_SESSION_ID
                        && !state.attached.contains_key(id.as_str())
                        && self.is_session_alive(id, metadata)
                })
                .map(|(id, _)| id.clone())
                .collect();
            let attached: Vec<Arc<SessionImpl>> = state.attached.values().cloned().collect();
            (attached, unbound)
        };

        let mut others: Vec<Arc<dyn Session>> = attached
            .into_iter()
            .map(|s| s as Arc<dyn Session>)
            .collect();
        for session_id in unbound_ids {
            match self.store.get_stream_structures(&session_id) {
                Ok(structures) => {
                    let session = self.factory.create_session(&session_id);
                    session.populate_model_provider(&structures, UiContext::default());
                    others.push(Arc::new(session));
                }
                Err(e) => warn!(session_id = %session_id, error = %e, "unable to rebuild session"),
            }
        }
        others.sort_by(|a, b| a.session_id().cmp(b.session_id()));

        let mut sessions: Vec<Arc<dyn Session>> = Vec::with_capacity(others.len() + 1);
        sessions.push(Arc::clone(&self.head) as Arc<dyn Session>);
        sessions.extend(others);
        sessions
    }

    pub fn put_attached(&self, session: Arc<SessionImpl>, metadata: SessionMetadata) {
        let snapshot = {
            let mut state = self.state.lock();
            let session_id = session.session_id().to_string();
            state.metadata.insert(session_id.clone(), metadata);
            state.attached.insert(session_id, session);
            state.metadata.clone()
        };
        self.persist_metadata(&snapshot);
    }

    /// Forgets a session entirely. Its journal is deleted by the next
    /// journal cleanup.
    pub fn remove_attached(&self, session_id: &str) -> Option<Arc<SessionImpl>> {
        let (removed, snapshot) = {
            let mut state = self.state.lock();
            let removed = state.attached.remove(session_id);
            let had_metadata = state.metadata.remove(session_id).is_some();
            let snapshot = had_metadata.then(|| state.metadata.clone());
            (removed, snapshot)
        };
        if let Some(snapshot) = snapshot {
            debug!(session_id, "removed session");
            self.persist_metadata(&snapshot);
        }
        removed
    }

    /// Unbinds the session's provider. The session stays on disk and can be
    /// reopened while it is alive.
    pub fn detach_model_provider(&self, session_id: &str) {
        let detached = self.state.lock().attached.remove(session_id);
        match detached {
            Some(session) => {
                session.bind_model_provider(None);
                debug!(session_id, "detached session");
            }
            None => warn!(session_id, "detaching a session that is not attached"),
        }
    }

    pub fn metadata(&self, session_id: &str) -> Option<SessionMetadata> {
        self.state.lock().metadata.get(session_id).copied()
    }

    pub fn head_metadata(&self) -> Option<SessionMetadata> {
        self.metadata(HEAD_SESSION_ID)
    }

    /// Records that head received content at `now`.
    pub fn update_head_metadata(&self, now: i64, schema_version: i32) {
        let snapshot = {
            let mut state = self.state.lock();
            let head = state
                .metadata
                .entry(HEAD_SESSION_ID.to_string())
                .or_insert_with(|| SessionMetadata::new(now, schema_version));
            head.last_added_time_millis = now;
            head.schema_version = schema_version;
            state.metadata.clone()
        };
        self.persist_metadata(&snapshot);
    }

    /// Content held by head and every live session, attached or not.
    pub fn reserved_content_ids(&self) -> HashSet<String> {
        let mut reserved = HashSet::new();
        for session in self.get_all_sessions() {
            reserved.extend(session.content_in_session());
        }
        reserved
    }

    /// Content held by head and the attached sessions.
    pub fn accessible_content_ids(&self) -> HashSet<String> {
        let mut accessible = self.head.content_in_session();
        for session in self.get_attached_sessions() {
            accessible.extend(session.content_in_session());
        }
        accessible
    }

    /// Deletes journals of sessions that are gone or expired.
    pub fn cleanup_session_journals(&self) {
        let stored = match self.store.get_all_sessions() {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "unable to list session journals");
                return;
            }
        };
        let (live, snapshot) = {
            let mut state = self.state.lock();
            let expired: Vec<String> = state
                .metadata
                .iter()
                .filter(|(id, metadata)| {
                    !state.attached.contains_key(id.as_str()) && !self.is_session_alive(id, metadata)
                })
                .map(|(id, _)| id.clone())
                .collect();
            let changed = !expired.is_empty();
            for session_id in expired {
                state.metadata.remove(&session_id);
            }
            let live: HashSet<String> = state.metadata.keys().cloned().collect();
            (live, changed.then(|| state.metadata.clone()))
        };
        if let Some(snapshot) = snapshot {
            self.persist_metadata(&snapshot);
        }
        let mut removed = 0;
        for session_id in stored.iter().filter(|id| !live.contains(id.as_str())) {
            match self.store.remove_session(session_id) {
                Ok(()) => removed += 1,
                Err(e) => warn!(session_id = %session_id, error = %e, "unable to remove session journal"),
            }
        }
        info!(removed, remaining = stored.len() - removed, "cleaned up session journals");
    }

    /// Empties head, its journal and its metadata. Attached sessions are
    /// left alone.
    pub fn reset_head(&self) {
        self.head.reset();
        self.store.clear_head();
        let now = self.clock.current_time_millis();
        let snapshot = {
            let mut state = self.state.lock();
            state.metadata.insert(
                HEAD_SESSION_ID.to_string(),
                SessionMetadata::new(now, self.config.schema_version),
            );
            state.metadata.clone()
        };
        self.persist_metadata(&snapshot);
    }

    /// Drops every session. Attached providers are invalidated after the
    /// cache is cleared.
    pub fn reset(&self) {
        let attached: Vec<Arc<SessionImpl>> = {
            let mut state = self.state.lock();
            state.metadata.clear();
            state.attached.drain().map(|(_, session)| session).collect()
        };
        self.reset_head();
        for session in attached {
            if let Some(provider) = session.model_provider() {
                provider.invalidate(UiContext::default());
            }
        }
        info!("session cache reset");
    }

    fn persist_metadata(&self, metadata: &HashMap<String, SessionMetadata>) {
        if !self.store.write_session_metadata(metadata).is_success() {
            error!("failed to persist session metadata");
            self.error_reporter
                .on_internal_error(InternalFeedError::SessionMetadataCommitFailure);
        }
    }
}
