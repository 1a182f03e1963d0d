//! [`SessionManagerMutation`]: applies one response to the store and to
//! every session.

use super::cache::SessionCache;
use super::Session;
use crate::concurrent::{Clock, MainThreadRunner, Task, TaskQueue, TaskType};
use crate::error::{InternalErrorReporter, InternalFeedError, RequestError};
use crate::model::{ContentChangedListener, ModelError, ModelProvider, ProviderState};
use crate::observable::Observable;
use crate::proto::{Model, MutationContext, Operation, PayloadWithId, StreamPayload};
use crate::store::{Store, StoreExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives the outcome of a request.
pub type ModelConsumer = Box<dyn FnOnce(Result<Model, RequestError>) + Send + 'static>;

/// Whether resetting head should invalidate `provider`.
///
/// Only ready providers are touched. A reset nobody asked for invalidates
/// all of them; otherwise only the requesting session's provider and
/// providers that have no session yet.
pub fn should_invalidate_session(requesting_session_id: Option<&str>, provider: &dyn ModelProvider) -> bool {
    if provider.current_state() != ProviderState::Ready {
        return false;
    }
    match requesting_session_id {
        None => true,
        Some(requesting) => match provider.session_id() {
            Some(session_id) => session_id == requesting,
            None => true,
        },
    }
}

#[derive(Clone)]
pub struct SessionManagerMutation {
    store: Arc<dyn Store>,
    cache: Arc<SessionCache>,
    task_queue: Arc<dyn TaskQueue>,
    main_runner: Arc<dyn MainThreadRunner>,
    clock: Arc<dyn Clock>,
    error_reporter: Arc<dyn InternalErrorReporter>,
    listeners: Arc<Observable<dyn ContentChangedListener>>,
}

impl SessionManagerMutation {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<SessionCache>,
        task_queue: Arc<dyn TaskQueue>,
        main_runner: Arc<dyn MainThreadRunner>,
        clock: Arc<dyn Clock>,
        error_reporter: Arc<dyn InternalErrorReporter>,
        listeners: Arc<Observable<dyn ContentChangedListener>>,
    ) -> Self {
        Self {
            store,
            cache,
            task_queue,
            main_runner,
            clock,
            error_reporter,
            listeners,
        }
    }

    /// A one-shot consumer that queues the mutation for `result` on the
    /// immediate queue. `task` names the request in the logs.
    pub fn create_committer(&self, task: &'static str, mutation_context: MutationContext) -> ModelConsumer {
        let this = self.clone();
        Box::new(move |result| {
            let queue = Arc::clone(&this.task_queue);
            queue.execute(
                Task::SessionManagerMutation,
                TaskType::Immediate,
                Box::new(move || this.commit(task, &mutation_context, result)),
            );
        })
    }

    fn commit(&self, task: &str, context: &MutationContext, result: Result<Model, RequestError>) {
        match result {
            Ok(model) => self.commit_model(task, context, model),
            Err(e) => {
                warn!(task, error = %e, "request failed");
                self.handle_failure(context);
            }
        }
    }

    fn handle_failure(&self, context: &MutationContext) {
        if let Some(token) = &context.continuation_token {
            let provider = context
                .requesting_session_id
                .as_deref()
                .and_then(|id| self.cache.get_attached(id))
                .and_then(|session| session.model_provider());
            match provider {
                Some(provider) => {
                    provider.raise_error(ModelError::pagination(token.next_page_token.clone()))
                }
                None => warn!("no session to report the pagination error to"),
            }
            return;
        }

        let sessions = match context.requesting_session_id.as_deref() {
            Some(id) => self.cache.get_attached(id).into_iter().collect(),
            None => self.cache.get_attached_sessions(),
        };
        for session in sessions {
            if let Some(provider) = session.model_provider() {
                provider.raise_error(ModelError::no_cards());
            }
        }
        self.task_queue.execute(
            Task::RequestFailure,
            TaskType::HeadReset,
            Box::new(|| info!("request failure recorded on the head reset queue")),
        );
    }

    fn commit_model(&self, task: &str, context: &MutationContext, model: Model) {
        let schema_version = model.schema_version;
        let mut content = self.store.edit_content();
        let mut shared_states = self.store.edit_content();
        let mut semantic_properties = self.store.edit_semantic_properties();
        let mut structures = Vec::with_capacity(model.operations.len());
        let mut clear_head = false;

        for operation in model.operations {
            let structure = operation.structure;
            if structure.operation == Operation::ClearAll {
                info!(task, "CLEAR_ALL received, resetting head");
                clear_head = true;
                self.reset_head(context);
                structures.push(structure);
                continue;
            }
            match operation.payload {
                Some(StreamPayload::SemanticProperties { content_id, data }) => {
                    semantic_properties.add(content_id, data);
                }
                Some(payload @ StreamPayload::SharedState(_)) => {
                    shared_states.add(PayloadWithId {
                        content_id: structure.content_id.clone(),
                        payload,
                    });
                }
                Some(payload) => {
                    content.add(PayloadWithId {
                        content_id: structure.content_id.clone(),
                        payload,
                    });
                }
                None => {}
            }
            structures.push(structure);
        }

        // Payloads first: sessions bind children straight from the store.
        if !content.is_empty() && !content.commit().is_success() {
            error!(task, "failed to commit content");
            self.error_reporter
                .on_internal_error(InternalFeedError::ContentStorageCommitFailure);
        }
        if !shared_states.is_empty() && !shared_states.commit().is_success() {
            error!(task, "failed to commit shared states");
            self.error_reporter
                .on_internal_error(InternalFeedError::ContentStorageCommitFailure);
        }
        if !semantic_properties.is_empty() && !semantic_properties.commit().is_success() {
            error!(task, "failed to commit semantic properties");
            self.error_reporter
                .on_internal_error(InternalFeedError::SemanticPropertiesCommitFailure);
        }

        let now = self.clock.current_time_millis();
        let mut updated = 0;
        for session in self.cache.get_all_sessions() {
            if let Some(provider) = session.model_provider() {
                if provider.current_state() == ProviderState::Invalidated {
                    debug!(session_id = session.session_id(), "removing invalidated session");
                    self.cache.remove_attached(session.session_id());
                    continue;
                }
            }
            if session.is_head() {
                self.cache.update_head_metadata(now, schema_version);
                self.notify_content_changed();
            }
            session.update_session(clear_head, &structures, schema_version, Some(context));
            updated += 1;
        }
        info!(
            task,
            structures = structures.len(),
            sessions = updated,
            clear_head,
            "session manager mutation committed"
        );
    }

    /// Invalidates the attached sessions a head reset affects, then empties head.
    pub fn reset_head(&self, context: &MutationContext) {
        let requesting = context.requesting_session_id.as_deref();
        for session in self.cache.get_attached_sessions() {
            if !session.invalidate_on_reset_head() {
                continue;
            }
            if let Some(provider) = session.model_provider() {
                if should_invalidate_session(requesting, provider.as_ref()) {
                    info!(session_id = session.session_id(), "invalidating session on head reset");
                    provider.invalidate(context.ui_context.clone());
                }
            }
        }
        self.cache.reset_head();
    }

    fn notify_content_changed(&self) {
        let listeners = self.listeners.observers_to_notify();
        if listeners.is_empty() {
            return;
        }
        self.main_runner.execute(
            "onContentChanged",
            Box::new(move || {
                for listener in listeners {
                    listener.on_content_changed();
                }
            }),
        );
    }
}
