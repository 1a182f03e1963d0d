//! Tests for the model provider.
//!
//! Every test drives a real provider over an [`InMemoryStore`] with
//! immediate fakes, so observer callbacks have run by the time `commit`
//! returns.

mod lifecycle;

use super::{FeedModelProvider, PagingConfig, ProviderDeps, SessionManagerApi, StructureFilter};
use crate::concurrent::{FakeMainThreadRunner, FakeTaskQueue};
use crate::error::TracingErrorReporter;
use crate::model::{
    FeatureChange, FeatureChangeObserver, ModelError, ModelProvider, ModelProviderObserver,
    StoreChildBinder, TokenCompleted, TokenCompletedObserver,
};
use crate::proto::{
    MutationContext, Operation, PayloadWithId, StreamDataOperation, StreamFeature, StreamPayload,
    StreamSharedState, StreamStructure, StreamToken, UiContext,
};
use crate::store::{InMemoryStore, StoreExt};
use crate::RequestReason;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub(super) const SESSION_ID: &str = "_session:test";

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub(super) struct FakeSessionManager {
    calls: Mutex<Vec<String>>,
}

impl FakeSessionManager {
    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl SessionManagerApi for FakeSessionManager {
    fn handle_token(&self, session_id: &str, token: StreamToken) {
        self.calls
            .lock()
            .push(format!("handle_token {} {}", session_id, token.next_page_token));
    }

    fn trigger_refresh(&self, session_id: &str, reason: RequestReason, _ui_context: UiContext) {
        self.calls
            .lock()
            .push(format!("trigger_refresh {} {}", session_id, reason));
    }

    fn invalidate_session(&self, session_id: &str) {
        self.calls
            .lock()
            .push(format!("invalidate_session {}", session_id));
    }

    fn detach_session(&self, session_id: &str) {
        self.calls.lock().push(format!("detach_session {}", session_id));
    }

    fn shared_state(&self, content_id: &str) -> Option<StreamSharedState> {
        Some(StreamSharedState {
            content_id: content_id.to_string(),
            data: "shared".to_string(),
        })
    }
}

#[derive(Default)]
pub(super) struct RecordingProviderObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingProviderObserver {
    pub(super) fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl ModelProviderObserver for RecordingProviderObserver {
    fn on_session_start(&self, _ui_context: &UiContext) {
        self.events.lock().push("start".to_string());
    }

    fn on_session_finished(&self, _ui_context: &UiContext) {
        self.events.lock().push("finished".to_string());
    }

    fn on_error(&self, error: &ModelError) {
        self.events
            .lock()
            .push(format!("error {}", error.error_type()));
    }
}

#[derive(Default)]
pub(super) struct RecordingFeatureObserver {
    changes: Mutex<Vec<FeatureChange>>,
}

impl RecordingFeatureObserver {
    pub(super) fn changes(&self) -> Vec<FeatureChange> {
        self.changes.lock().clone()
    }
}

impl FeatureChangeObserver for RecordingFeatureObserver {
    fn on_change(&self, change: &FeatureChange) {
        self.changes.lock().push(change.clone());
    }
}

#[derive(Default)]
pub(super) struct RecordingTokenObserver {
    completed: Mutex<Vec<TokenCompleted>>,
    errors: Mutex<Vec<ModelError>>,
}

impl RecordingTokenObserver {
    pub(super) fn completed(&self) -> Vec<TokenCompleted> {
        self.completed.lock().clone()
    }

    pub(super) fn errors(&self) -> Vec<ModelError> {
        self.errors.lock().clone()
    }
}

impl TokenCompletedObserver for RecordingTokenObserver {
    fn on_token_completed(&self, completed: &TokenCompleted) {
        self.completed.lock().push(completed.clone());
    }

    fn on_error(&self, error: &ModelError) {
        self.errors.lock().push(error.clone());
    }
}

// ============================================================================
// Harness
// ============================================================================

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) task_queue: Arc<FakeTaskQueue>,
    pub(super) manager: Arc<FakeSessionManager>,
    pub(super) provider: Arc<FeedModelProvider>,
    pub(super) observer: Arc<RecordingProviderObserver>,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::build(PagingConfig::default(), FakeTaskQueue::immediate(), None)
    }

    pub(super) fn with_paging(initial_page_size: usize, page_size: usize, min_page_size: usize) -> Self {
        let paging = PagingConfig {
            initial_page_size,
            page_size,
            min_page_size,
        };
        Self::build(paging, FakeTaskQueue::immediate(), None)
    }

    pub(super) fn build(
        paging: PagingConfig,
        task_queue: FakeTaskQueue,
        filter: Option<StructureFilter>,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let task_queue = Arc::new(task_queue);
        let manager = Arc::new(FakeSessionManager::default());
        let deps = ProviderDeps {
            task_queue: task_queue.clone(),
            main_runner: Arc::new(FakeMainThreadRunner::immediate()),
            binder: Arc::new(StoreChildBinder::new(
                store.clone(),
                Arc::new(TracingErrorReporter),
            )),
            error_reporter: Arc::new(TracingErrorReporter),
        };
        let weak_manager: Weak<dyn SessionManagerApi> =
            Arc::downgrade(&manager) as Weak<dyn SessionManagerApi>;
        let provider = FeedModelProvider::new(weak_manager, deps, paging, filter);
        let observer = Arc::new(RecordingProviderObserver::default());
        provider.register_observer(observer.clone());
        Self {
            store,
            task_queue,
            manager,
            provider,
            observer,
        }
    }

    pub(super) fn store_payloads(&self, ops: &[StreamDataOperation]) {
        let mut content = self.store.edit_content();
        for op in ops {
            if let Some(payload) = &op.payload {
                content.add(PayloadWithId {
                    content_id: op.structure.content_id.clone(),
                    payload: payload.clone(),
                });
            }
        }
        content.commit();
    }

    pub(super) fn commit(&self, ops: &[StreamDataOperation]) {
        self.commit_with(ops, None, Some(SESSION_ID));
    }

    pub(super) fn commit_with(
        &self,
        ops: &[StreamDataOperation],
        context: Option<MutationContext>,
        session_id: Option<&str>,
    ) {
        self.store_payloads(ops);
        let mut mutation = self.provider.edit();
        for op in ops {
            match op.structure.operation {
                Operation::Remove => mutation.remove_child(op.structure.clone()),
                _ => mutation.add_child(op.structure.clone()),
            };
        }
        if let Some(session_id) = session_id {
            mutation.set_session_id(session_id);
        }
        if let Some(context) = context {
            mutation.set_mutation_context(context);
        }
        mutation.commit();
    }

    /// Rebinds existing children to the payloads in `ops`.
    pub(super) fn update(&self, ops: &[StreamDataOperation]) {
        self.store_payloads(ops);
        let mut mutation = self.provider.edit();
        for op in ops {
            mutation.update_child(op.structure.clone());
        }
        mutation.commit();
    }

    pub(super) fn root_child_ids(&self) -> Vec<String> {
        self.provider
            .all_root_children()
            .iter()
            .map(|c| c.content_id().to_string())
            .collect()
    }

    pub(super) fn assert_invariants(&self) {
        if let Err(e) = self.provider.check_tree_invariants() {
            panic!("tree invariants violated: {}", e);
        }
    }
}

// ============================================================================
// Operation builders
// ============================================================================

pub(super) fn root() -> StreamDataOperation {
    StreamDataOperation::feature("root", None)
}

pub(super) fn feature(id: &str, parent: &str) -> StreamDataOperation {
    StreamDataOperation::feature(id, Some(parent))
}

pub(super) fn feature_with_content(id: &str, parent: &str, content: &str) -> StreamDataOperation {
    StreamDataOperation {
        structure: StreamStructure::append(id, Some(parent)),
        payload: Some(StreamPayload::Feature(StreamFeature {
            content_id: id.to_string(),
            parent_id: Some(parent.to_string()),
            content: Some(content.to_string()),
        })),
    }
}

pub(super) fn token(id: &str, parent: &str, next_page_token: &str) -> StreamDataOperation {
    StreamDataOperation::token(id, parent, next_page_token)
}

pub(super) fn remove(id: &str, parent: &str) -> StreamDataOperation {
    StreamDataOperation::structure_only(StreamStructure::remove(id, Some(parent)))
}

pub(super) fn root_with_children(ids: &[&str]) -> Vec<StreamDataOperation> {
    let mut ops = vec![root()];
    ops.extend(ids.iter().map(|id| feature(id, "root")));
    ops
}
