//! Tests for sessions, the session cache, and the session manager.
//!
//! The harness wires a real [`FeedSessionManager`] to an [`InMemoryStore`],
//! immediate fakes for the queue and main runner, a [`FakeClock`], and a
//! request manager that holds on to its consumers until a test responds.

mod session_impl;

use super::{FeedSessionManager, ModelConsumer, RequestManager, SessionConfig, SessionManagerDeps};
use crate::concurrent::{FakeClock, FakeMainThreadRunner, FakeTaskQueue};
use crate::error::{InternalErrorReporter, InternalFeedError, RequestError};
use crate::model::{
    FeedModelProvider, ModelError, ModelProvider, ModelProviderObserver, PagingConfig,
};
use crate::proto::{
    Model, MutationContext, StreamDataOperation, StreamStructure, UiContext, HEAD_SESSION_ID,
};
use crate::store::InMemoryStore;
use crate::RequestReason;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub(super) const START_MILLIS: i64 = 1_700_000_000_000;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub(super) struct FakeRequestManager {
    requests: Mutex<Vec<String>>,
    consumers: Mutex<VecDeque<ModelConsumer>>,
}

impl FakeRequestManager {
    pub(super) fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Completes the oldest outstanding request. Returns `false` if there
    /// was none.
    pub(super) fn respond(&self, result: Result<Model, RequestError>) -> bool {
        let consumer = self.consumers.lock().pop_front();
        match consumer {
            Some(consumer) => {
                consumer(result);
                true
            }
            None => false,
        }
    }
}

impl RequestManager for FakeRequestManager {
    fn load_more(&self, token: crate::proto::StreamToken, consumer: ModelConsumer) {
        self.requests
            .lock()
            .push(format!("load_more {}", token.next_page_token));
        self.consumers.lock().push_back(consumer);
    }

    fn trigger_refresh(&self, reason: RequestReason, consumer: ModelConsumer) {
        self.requests.lock().push(format!("refresh {}", reason));
        self.consumers.lock().push_back(consumer);
    }
}

#[derive(Default)]
pub(super) struct RecordingReporter {
    errors: Mutex<Vec<InternalFeedError>>,
}

impl RecordingReporter {
    pub(super) fn errors(&self) -> Vec<InternalFeedError> {
        self.errors.lock().clone()
    }
}

impl InternalErrorReporter for RecordingReporter {
    fn on_internal_error(&self, error: InternalFeedError) {
        self.errors.lock().push(error);
    }
}

#[derive(Default)]
pub(super) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub(super) fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl ModelProviderObserver for RecordingObserver {
    fn on_session_start(&self, _ui_context: &UiContext) {
        self.events.lock().push("start".to_string());
    }

    fn on_session_finished(&self, _ui_context: &UiContext) {
        self.events.lock().push("finished".to_string());
    }

    fn on_error(&self, error: &ModelError) {
        self.events.lock().push(format!("error {}", error.error_type()));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) task_queue: Arc<FakeTaskQueue>,
    pub(super) clock: Arc<FakeClock>,
    pub(super) requests: Arc<FakeRequestManager>,
    pub(super) reporter: Arc<RecordingReporter>,
    pub(super) manager: Arc<FeedSessionManager>,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub(super) fn with_config(config: SessionConfig) -> Self {
        Self::build(Arc::new(InMemoryStore::new()), config)
    }

    /// A manager over an existing store, as after a restart.
    pub(super) fn build(store: Arc<InMemoryStore>, config: SessionConfig) -> Self {
        let task_queue = Arc::new(FakeTaskQueue::immediate());
        let clock = Arc::new(FakeClock::new(START_MILLIS));
        let requests = Arc::new(FakeRequestManager::default());
        let reporter = Arc::new(RecordingReporter::default());
        let deps = SessionManagerDeps {
            store: store.clone(),
            task_queue: task_queue.clone(),
            main_runner: Arc::new(FakeMainThreadRunner::immediate()),
            clock: clock.clone(),
            request_manager: requests.clone(),
            error_reporter: reporter.clone(),
        };
        let manager = FeedSessionManager::new(deps, config, PagingConfig::default());
        assert!(manager.initialize(), "session manager should initialize");
        Self {
            store,
            task_queue,
            clock,
            requests,
            reporter,
            manager,
        }
    }

    /// Pushes a response nobody asked for.
    pub(super) fn push(&self, operations: Vec<StreamDataOperation>) {
        let consumer = self.manager.update_consumer(MutationContext::default());
        consumer(Ok(model(operations)));
    }

    pub(super) fn open(&self) -> Arc<FeedModelProvider> {
        self.manager.get_new_session(UiContext::default(), None)
    }

    pub(super) fn session_id(provider: &FeedModelProvider) -> String {
        provider.session_id().expect("provider should have a session")
    }

    pub(super) fn head_journal_ids(&self) -> Vec<String> {
        ids(&self.store.journal(HEAD_SESSION_ID))
    }
}

// ============================================================================
// Builders
// ============================================================================

pub(super) fn model(operations: Vec<StreamDataOperation>) -> Model {
    Model {
        operations,
        schema_version: 2,
    }
}

pub(super) fn root() -> StreamDataOperation {
    StreamDataOperation::feature("root", None)
}

pub(super) fn feature(id: &str) -> StreamDataOperation {
    StreamDataOperation::feature(id, Some("root"))
}

pub(super) fn token(id: &str, next_page_token: &str) -> StreamDataOperation {
    StreamDataOperation::token(id, "root", next_page_token)
}

pub(super) fn remove(id: &str) -> StreamDataOperation {
    StreamDataOperation::structure_only(StreamStructure::remove(id, Some("root")))
}

pub(super) fn clear_all() -> StreamDataOperation {
    StreamDataOperation::structure_only(StreamStructure::clear_all())
}

pub(super) fn root_with(children: &[&str]) -> Vec<StreamDataOperation> {
    let mut ops = vec![root()];
    ops.extend(children.iter().map(|id| feature(id)));
    ops
}

pub(super) fn ids(structures: &[StreamStructure]) -> Vec<String> {
    structures.iter().map(|s| s.content_id.clone()).collect()
}

pub(super) fn root_child_ids(provider: &FeedModelProvider) -> Vec<String> {
    provider
        .all_root_children()
        .iter()
        .map(|c| c.content_id().to_string())
        .collect()
}
