//! [`SessionImpl`] for regular sessions and [`HeadSessionImpl`] for head.

use super::tracker::SessionContentTracker;
use super::Session;
use crate::concurrent::{Task, TaskQueue, TaskType};
use crate::error::{InternalErrorReporter, InternalFeedError};
use crate::model::{ModelMutation, ModelProvider};
use crate::proto::{MutationContext, Operation, StreamStructure, UiContext, HEAD_SESSION_ID};
use crate::store::{Store, StoreExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

struct SessionState {
    tracker: SessionContentTracker,
    model_provider: Option<Arc<dyn ModelProvider>>,
}

/// A session derived from head.
pub struct SessionImpl {
    session_id: String,
    store: Arc<dyn Store>,
    task_queue: Arc<dyn TaskQueue>,
    error_reporter: Arc<dyn InternalErrorReporter>,
    limit_paging_updates: bool,
    state: Mutex<SessionState>,
}

impl SessionImpl {
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<dyn Store>,
        task_queue: Arc<dyn TaskQueue>,
        error_reporter: Arc<dyn InternalErrorReporter>,
        limit_paging_updates: bool,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            task_queue,
            error_reporter,
            limit_paging_updates,
            state: Mutex::new(SessionState {
                tracker: SessionContentTracker::new(false),
                model_provider: None,
            }),
        }
    }

    /// Whether a response described by `context` is meant for this session.
    fn accepts(&self, tracker: &SessionContentTracker, context: Option<&MutationContext>) -> bool {
        let Some(context) = context else {
            return true;
        };
        let Some(token) = &context.continuation_token else {
            return true;
        };
        if !tracker.contains(&token.content_id) {
            debug!(
                session_id = %self.session_id,
                content_id = %token.content_id,
                "token is not in this session, ignoring page"
            );
            return false;
        }
        if self.limit_paging_updates
            && context.requesting_session_id.as_deref() != Some(self.session_id.as_str())
        {
            debug!(session_id = %self.session_id, "page was requested by another session, ignoring");
            return false;
        }
        true
    }

    fn persist(&self, structures: Vec<StreamStructure>) {
        if structures.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        let reporter = Arc::clone(&self.error_reporter);
        let session_id = self.session_id.clone();
        self.task_queue.execute(
            Task::PersistSessionMutation,
            TaskType::Background,
            Box::new(move || {
                let mut mutation = store.edit_session(&session_id);
                for structure in structures {
                    mutation.add(structure);
                }
                if !mutation.commit().is_success() {
                    error!(session_id = %session_id, "failed to persist session mutation");
                    reporter.on_internal_error(InternalFeedError::SessionStorageCommitFailure);
                }
            }),
        );
    }
}

impl Session for SessionImpl {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn model_provider(&self) -> Option<Arc<dyn ModelProvider>> {
        self.state.lock().model_provider.clone()
    }

    fn bind_model_provider(&self, provider: Option<Arc<dyn ModelProvider>>) {
        self.state.lock().model_provider = provider;
    }

    fn content_in_session(&self) -> HashSet<String> {
        self.state.lock().tracker.content_ids()
    }

    fn invalidate_on_reset_head(&self) -> bool {
        true
    }

    fn should_invalidate_model_provider(&self, context: Option<&MutationContext>) -> bool {
        context
            .and_then(|c| c.requesting_session_id.as_deref())
            .is_some_and(|id| id == self.session_id)
    }

    fn update_session(
        &self,
        clear_head: bool,
        structures: &[StreamStructure],
        schema_version: i32,
        mutation_context: Option<&MutationContext>,
    ) {
        if clear_head {
            if self.should_invalidate_model_provider(mutation_context) {
                if let Some(provider) = self.model_provider() {
                    info!(session_id = %self.session_id, "invalidating model provider after clear head");
                    let ui_context = mutation_context
                        .map(|c| c.ui_context.clone())
                        .unwrap_or_default();
                    provider.invalidate(ui_context);
                }
            } else {
                debug!(session_id = %self.session_id, "head was cleared, keeping session content");
            }
            return;
        }

        let (mutation, journal) = {
            let mut state = self.state.lock();
            if !self.accepts(&state.tracker, mutation_context) {
                return;
            }
            let mut mutation = state.model_provider.as_ref().map(|p| p.edit());
            let mut journal = Vec::new();
            for structure in structures {
                match structure.operation {
                    Operation::UpdateOrAppend => {
                        if state.tracker.contains(&structure.content_id) {
                            if let Some(m) = mutation.as_mut() {
                                m.update_child(structure.clone());
                            }
                        } else {
                            if let Some(m) = mutation.as_mut() {
                                m.add_child(structure.clone());
                            }
                            journal.push(structure.clone());
                        }
                    }
                    Operation::Remove => {
                        if let Some(m) = mutation.as_mut() {
                            m.remove_child(structure.clone());
                        }
                        journal.push(structure.clone());
                    }
                    Operation::ClearAll => {
                        warn!(session_id = %self.session_id, "CLEAR_ALL is not supported on a session");
                        continue;
                    }
                    Operation::RequiredContent => {
                        if !state.tracker.contains(&structure.content_id) {
                            journal.push(structure.clone());
                        }
                    }
                }
                state.tracker.update(structure);
            }
            (mutation, journal)
        };

        self.persist(journal);
        if let Some(mut mutation) = mutation {
            if !mutation.has_changes() {
                return;
            }
            mutation
                .set_session_id(self.session_id.clone())
                .set_schema_version(schema_version);
            if let Some(context) = mutation_context {
                mutation.set_mutation_context(context.clone());
            }
            mutation.commit();
        }
    }

    fn populate_model_provider(&self, structures: &[StreamStructure], ui_context: UiContext) {
        let mutation: Option<ModelMutation> = {
            let mut state = self.state.lock();
            let mut mutation = state.model_provider.as_ref().map(|p| p.edit());
            for structure in structures {
                match structure.operation {
                    Operation::UpdateOrAppend => {
                        if let Some(m) = mutation.as_mut() {
                            m.add_child(structure.clone());
                        }
                    }
                    Operation::Remove => {
                        if let Some(m) = mutation.as_mut() {
                            m.remove_child(structure.clone());
                        }
                    }
                    Operation::ClearAll => {
                        warn!(session_id = %self.session_id, "CLEAR_ALL found in a session journal");
                        continue;
                    }
                    Operation::RequiredContent => {}
                }
                state.tracker.update(structure);
            }
            mutation
        };
        if let Some(mut mutation) = mutation {
            mutation
                .set_session_id(self.session_id.clone())
                .set_mutation_context(MutationContext::with_ui_context(ui_context));
            mutation.commit();
        }
    }
}

/// The canonical session. It is never bound to a provider and journals
/// every structural change it receives.
pub struct HeadSessionImpl {
    store: Arc<dyn Store>,
    error_reporter: Arc<dyn InternalErrorReporter>,
    tracker: Mutex<SessionContentTracker>,
}

impl HeadSessionImpl {
    pub fn new(store: Arc<dyn Store>, error_reporter: Arc<dyn InternalErrorReporter>) -> Self {
        Self {
            store,
            error_reporter,
            tracker: Mutex::new(SessionContentTracker::new(true)),
        }
    }

    /// Loads the persisted head journal into the tracker.
    pub fn initialize(&self, structures: &[StreamStructure]) {
        self.tracker.lock().update_all(structures);
    }

    pub fn reset(&self) {
        self.tracker.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.lock().is_empty()
    }
}

impl Session for HeadSessionImpl {
    fn session_id(&self) -> &str {
        HEAD_SESSION_ID
    }

    fn is_head(&self) -> bool {
        true
    }

    fn model_provider(&self) -> Option<Arc<dyn ModelProvider>> {
        None
    }

    fn bind_model_provider(&self, _provider: Option<Arc<dyn ModelProvider>>) {
        warn!("head session cannot be bound to a model provider");
    }

    fn content_in_session(&self) -> HashSet<String> {
        self.tracker.lock().content_ids()
    }

    fn invalidate_on_reset_head(&self) -> bool {
        false
    }

    fn should_invalidate_model_provider(&self, _context: Option<&MutationContext>) -> bool {
        true
    }

    fn update_session(
        &self,
        clear_head: bool,
        structures: &[StreamStructure],
        _schema_version: i32,
        _mutation_context: Option<&MutationContext>,
    ) {
        if clear_head {
            debug!("updating head after a reset");
        }
        let mut mutation = self.store.edit_session(HEAD_SESSION_ID);
        {
            let mut tracker = self.tracker.lock();
            for structure in structures {
                let journaled = match structure.operation {
                    // The store journal was already cleared by the reset.
                    Operation::ClearAll => false,
                    Operation::UpdateOrAppend | Operation::RequiredContent => {
                        !tracker.contains(&structure.content_id)
                    }
                    Operation::Remove => true,
                };
                if journaled {
                    mutation.add(structure.clone());
                }
                tracker.update(structure);
            }
        }
        if !mutation.commit().is_success() {
            error!("failed to persist head session mutation");
            self.error_reporter
                .on_internal_error(InternalFeedError::SessionStorageCommitFailure);
        }
    }

    fn populate_model_provider(&self, structures: &[StreamStructure], _ui_context: UiContext) {
        self.initialize(structures);
    }
}
