//! [`FeedSessionManager`]: the entry point hosts and providers talk to.

use super::cache::SessionCache;
use super::factory::SessionFactory;
use super::mutation::{ModelConsumer, SessionManagerMutation};
use super::{Session, SessionConfig};
use crate::concurrent::{Clock, MainThreadRunner, Task, TaskQueue, TaskType};
use crate::error::{InternalErrorReporter, InternalFeedError};
use crate::model::{
    ContentChangedListener, FeedModelProvider, FeedModelProviderFactory, ModelError,
    ModelProvider, PagingConfig, ProviderDeps, ProviderState, SessionManagerApi, StoreChildBinder,
    StructureFilter,
};
use crate::observable::Observable;
use crate::proto::{
    MutationContext, SessionMetadata, StreamSharedState, StreamToken, UiContext, HEAD_SESSION_ID,
};
use crate::store::{Store, StoreExt};
use crate::RequestReason;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Issues requests to the server. The consumer is called exactly once.
pub trait RequestManager: Send + Sync {
    /// Requests the page behind `token`.
    fn load_more(&self, token: StreamToken, consumer: ModelConsumer);

    fn trigger_refresh(&self, reason: RequestReason, consumer: ModelConsumer);
}

/// Collaborators of a [`FeedSessionManager`].
#[derive(Clone)]
pub struct SessionManagerDeps {
    pub store: Arc<dyn Store>,
    pub task_queue: Arc<dyn TaskQueue>,
    pub main_runner: Arc<dyn MainThreadRunner>,
    pub clock: Arc<dyn Clock>,
    pub request_manager: Arc<dyn RequestManager>,
    pub error_reporter: Arc<dyn InternalErrorReporter>,
}

pub struct FeedSessionManager {
    self_ref: Weak<FeedSessionManager>,
    deps: SessionManagerDeps,
    config: SessionConfig,
    cache: Arc<SessionCache>,
    mutation: SessionManagerMutation,
    session_factory: SessionFactory,
    provider_factory: FeedModelProviderFactory,
    listeners: Arc<Observable<dyn ContentChangedListener>>,
}

impl FeedSessionManager {
    pub fn new(deps: SessionManagerDeps, config: SessionConfig, paging: PagingConfig) -> Arc<Self> {
        let session_factory = SessionFactory::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.task_queue),
            Arc::clone(&deps.error_reporter),
            config.limit_paging_updates,
        );
        let cache = Arc::new(SessionCache::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.clock),
            Arc::clone(&deps.error_reporter),
            session_factory.clone(),
            config,
        ));
        let listeners: Arc<Observable<dyn ContentChangedListener>> = Arc::new(Observable::new());
        let mutation = SessionManagerMutation::new(
            Arc::clone(&deps.store),
            Arc::clone(&cache),
            Arc::clone(&deps.task_queue),
            Arc::clone(&deps.main_runner),
            Arc::clone(&deps.clock),
            Arc::clone(&deps.error_reporter),
            Arc::clone(&listeners),
        );
        let provider_factory = FeedModelProviderFactory::new(
            ProviderDeps {
                task_queue: Arc::clone(&deps.task_queue),
                main_runner: Arc::clone(&deps.main_runner),
                binder: Arc::new(StoreChildBinder::new(
                    Arc::clone(&deps.store),
                    Arc::clone(&deps.error_reporter),
                )),
                error_reporter: Arc::clone(&deps.error_reporter),
            },
            paging,
        );
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            deps,
            config,
            cache,
            mutation,
            session_factory,
            provider_factory,
            listeners,
        })
    }

    /// Loads the session cache and queues a journal cleanup. Returns `false`
    /// if the store could not be read.
    pub fn initialize(&self) -> bool {
        if !self.cache.initialize() {
            return false;
        }
        let manager = self.self_ref.clone();
        self.deps.task_queue.execute(
            Task::CleanUpSessionJournals,
            TaskType::Background,
            Box::new(move || {
                if let Some(manager) = manager.upgrade() {
                    manager.cache.cleanup_session_journals();
                }
            }),
        );
        true
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    fn api(&self) -> Weak<dyn SessionManagerApi> {
        self.self_ref.clone()
    }

    /// Opens a new session on the current head. The provider is returned
    /// right away and populated by a queued task.
    pub fn get_new_session(
        &self,
        ui_context: UiContext,
        filter: Option<StructureFilter>,
    ) -> Arc<FeedModelProvider> {
        let provider = self.provider_factory.create(self.api(), filter);
        let bound: Arc<dyn ModelProvider> = provider.clone();
        let manager = self.self_ref.clone();
        self.deps.task_queue.execute(
            Task::GetNewSession,
            TaskType::Immediate,
            Box::new(move || {
                if let Some(manager) = manager.upgrade() {
                    manager.create_session(bound, ui_context);
                }
            }),
        );
        provider
    }

    fn create_session(&self, provider: Arc<dyn ModelProvider>, ui_context: UiContext) {
        let head_structures = match self.deps.store.get_stream_structures(HEAD_SESSION_ID) {
            Ok(structures) => structures,
            Err(e) => {
                error!(error = %e, "unable to read head for a new session");
                provider.raise_error(ModelError::no_cards());
                return;
            }
        };
        let session_id = SessionFactory::new_session_id();
        let mut journal = self.deps.store.edit_session(&session_id);
        for structure in &head_structures {
            journal.add(structure.clone());
        }
        if !journal.commit().is_success() {
            error!(session_id = %session_id, "failed to write the new session journal");
            self.deps
                .error_reporter
                .on_internal_error(InternalFeedError::SessionStorageCommitFailure);
        }

        let session = Arc::new(self.session_factory.create_session(&session_id));
        let metadata = SessionMetadata::new(
            self.deps.clock.current_time_millis(),
            self.config.schema_version,
        );
        self.cache.put_attached(Arc::clone(&session), metadata);
        session.bind_model_provider(Some(Arc::clone(&provider)));
        session.populate_model_provider(&head_structures, ui_context.clone());
        info!(session_id = %session_id, structures = head_structures.len(), "created session");

        if self.cache.head().is_empty() {
            provider.trigger_refresh(RequestReason::OpenWithoutContent, ui_context);
        }
    }

    /// Reopens a persisted session. An unknown or expired session
    /// invalidates the returned provider.
    pub fn get_existing_session(
        &self,
        session_id: &str,
        ui_context: UiContext,
        filter: Option<StructureFilter>,
    ) -> Arc<FeedModelProvider> {
        let provider = self.provider_factory.create(self.api(), filter);
        let bound: Arc<dyn ModelProvider> = provider.clone();
        let manager = self.self_ref.clone();
        let session_id = session_id.to_string();
        self.deps.task_queue.execute(
            Task::GetExistingSession,
            TaskType::Immediate,
            Box::new(move || {
                if let Some(manager) = manager.upgrade() {
                    manager.restore_session(&session_id, bound, ui_context);
                }
            }),
        );
        provider
    }

    fn restore_session(&self, session_id: &str, provider: Arc<dyn ModelProvider>, ui_context: UiContext) {
        let previous = self
            .cache
            .get_attached(session_id)
            .and_then(|session| session.model_provider());
        if previous.is_some() {
            info!(session_id, "session is attached, moving it to a new provider");
            self.cache.detach_model_provider(session_id);
        }

        let metadata = self
            .cache
            .metadata(session_id)
            .filter(|metadata| self.cache.is_session_alive(session_id, metadata));
        let Some(metadata) = metadata else {
            warn!(session_id, "session is not alive, unable to reopen it");
            provider.invalidate(ui_context);
            return;
        };
        let structures = match self.deps.store.get_stream_structures(session_id) {
            Ok(structures) => structures,
            Err(e) => {
                warn!(session_id, error = %e, "unable to read the session journal");
                provider.invalidate(ui_context);
                return;
            }
        };

        let session = Arc::new(self.session_factory.create_session(session_id));
        self.cache.put_attached(Arc::clone(&session), metadata);
        session.bind_model_provider(Some(provider));
        session.populate_model_provider(&structures, ui_context);
        info!(session_id, structures = structures.len(), "reopened session");

        if let Some(previous) = previous {
            previous.detach_model_provider();
        }
    }

    /// A consumer for content pushed by the host rather than requested by a
    /// session.
    pub fn update_consumer(&self, mutation_context: MutationContext) -> ModelConsumer {
        self.mutation.create_committer("update", mutation_context)
    }

    /// Drops every session and empties head.
    pub fn reset(&self) {
        let cache = Arc::clone(&self.cache);
        self.deps.task_queue.execute(
            Task::Reset,
            TaskType::HeadReset,
            Box::new(move || cache.reset()),
        );
    }

    /// Queues a garbage collection that keeps content of every live session.
    pub fn trigger_content_gc(&self) {
        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.deps.store);
        self.deps.task_queue.execute(
            Task::GarbageCollectContent,
            TaskType::Background,
            Box::new(move || {
                let reserved = cache.reserved_content_ids();
                let accessible_from = Arc::downgrade(&cache);
                let gc = store.trigger_content_gc(
                    reserved,
                    Box::new(move || {
                        accessible_from
                            .upgrade()
                            .map(|cache| cache.accessible_content_ids())
                            .unwrap_or_default()
                    }),
                    true,
                );
                gc();
            }),
        );
    }

    pub fn register_content_changed_listener(&self, listener: Arc<dyn ContentChangedListener>) {
        self.listeners.register(listener);
    }

    pub fn unregister_content_changed_listener(&self, listener: &Arc<dyn ContentChangedListener>) -> bool {
        self.listeners.unregister(listener)
    }

    /// `true` when the attached session has no provider or its provider was
    /// invalidated. A session that moved to a new provider is left alone.
    fn provider_released(&self, session_id: &str) -> bool {
        match self.cache.get_attached(session_id) {
            Some(session) => session
                .model_provider()
                .map_or(true, |p| p.current_state() == ProviderState::Invalidated),
            None => false,
        }
    }
}

impl SessionManagerApi for FeedSessionManager {
    fn handle_token(&self, session_id: &str, token: StreamToken) {
        let committer = self.mutation.create_committer(
            "handle-token",
            MutationContext::for_token(token.clone(), session_id),
        );
        let request_manager = Arc::clone(&self.deps.request_manager);
        self.deps.task_queue.execute(
            Task::HandleToken,
            TaskType::UserFacing,
            Box::new(move || request_manager.load_more(token, committer)),
        );
    }

    fn trigger_refresh(&self, session_id: &str, reason: RequestReason, ui_context: UiContext) {
        info!(session_id, %reason, "refresh requested");
        let committer = self.mutation.create_committer(
            "trigger-refresh",
            MutationContext::for_session(session_id, ui_context),
        );
        let request_manager = Arc::clone(&self.deps.request_manager);
        self.deps.task_queue.execute(
            Task::TriggerRefresh,
            TaskType::UserFacing,
            Box::new(move || request_manager.trigger_refresh(reason, committer)),
        );
    }

    fn invalidate_session(&self, session_id: &str) {
        let manager = self.self_ref.clone();
        let session_id = session_id.to_string();
        self.deps.task_queue.execute(
            Task::InvalidateSession,
            TaskType::Immediate,
            Box::new(move || {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                if manager.provider_released(&session_id) {
                    manager.cache.remove_attached(&session_id);
                } else {
                    debug!(session_id = %session_id, "session has a live provider, not removing it");
                }
            }),
        );
    }

    fn detach_session(&self, session_id: &str) {
        let manager = self.self_ref.clone();
        let session_id = session_id.to_string();
        self.deps.task_queue.execute(
            Task::DetachSession,
            TaskType::Immediate,
            Box::new(move || {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                if manager.provider_released(&session_id) {
                    manager.cache.detach_model_provider(&session_id);
                } else {
                    debug!(session_id = %session_id, "session has a live provider, not detaching it");
                }
            }),
        );
    }

    fn shared_state(&self, content_id: &str) -> Option<StreamSharedState> {
        match self.deps.store.get_shared_state(content_id) {
            Ok(state) => state,
            Err(e) => {
                warn!(content_id, error = %e, "unable to read shared state");
                None
            }
        }
    }
}
