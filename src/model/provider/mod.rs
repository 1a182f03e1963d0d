//! [`FeedModelProvider`]: one session's content tree.
//!
//! The whole tree, its token bookkeeping and its state live behind a single
//! mutex. Commits arrive from background tasks; every observer callback is
//! posted to the main-thread runner after the lock is released.
//!
//! # State machine
//!
//! ```text
//! Initializing --first commit--> Ready --invalidate/detach--> Invalidated
//!      |                                                          ^
//!      +------------------- conflicting root ---------------------+
//! ```
//!
//! `Invalidated` is terminal: later commits are ignored.

mod handler;
mod synthetic;
mod tree;

#[cfg(test)]
mod tests;

use self::handler::{MutationHandler, Notification};
use self::synthetic::SyntheticTokenTracker;
use self::tree::{ModelTree, TokenTracking};
use super::binder::ModelChildBinder;
use super::child::{CursorSource, ModelChild, ModelFeature, ModelToken};
use super::cursor::ModelCursor;
use super::error::{ErrorType, ModelError};
use super::mutation::{Change, ModelCommitter, ModelMutation};
use super::observer::{ModelProviderObserver, TokenCompleted};
use super::remove_tracking::{RemoveTracking, RemoveTrackingFactory};
use crate::concurrent::{MainThreadRunner, Task, TaskQueue, TaskType};
use crate::error::{InternalErrorReporter, InternalFeedError};
use crate::observable::Observable;
use crate::proto::{Operation, StreamFeature, StreamSharedState, StreamStructure, StreamToken, UiContext};
use crate::RequestReason;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Content id prefix of locally generated tokens.
pub const SYNTHETIC_TOKEN_PREFIX: &str = "_token:";

/// Lifecycle state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Initializing,
    Ready,
    Invalidated,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderState::Initializing => "initializing",
            ProviderState::Ready => "ready",
            ProviderState::Invalidated => "invalidated",
        };
        write!(f, "{}", s)
    }
}

/// Page sizes for synthetic tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagingConfig {
    /// Root children bound by the first page. `0` disables synthetic tokens.
    pub initial_page_size: usize,
    /// Root children revealed by each later page. `0` reuses the initial size.
    pub page_size: usize,
    /// A page is extended to the end rather than leave fewer than this many
    /// children behind it.
    pub min_page_size: usize,
}

impl PagingConfig {
    fn next_page_size(&self) -> usize {
        if self.page_size == 0 {
            self.initial_page_size
        } else {
            self.page_size
        }
    }
}

/// Structures for which the filter returns `false` are skipped on commit.
pub type StructureFilter = Arc<dyn Fn(&StreamStructure) -> bool + Send + Sync>;

/// What a provider needs from the session layer.
pub trait SessionManagerApi: Send + Sync {
    /// Requests the page behind a server token.
    fn handle_token(&self, session_id: &str, token: StreamToken);

    fn trigger_refresh(&self, session_id: &str, reason: RequestReason, ui_context: UiContext);

    /// The provider was invalidated; the session should be dropped.
    fn invalidate_session(&self, session_id: &str);

    /// The provider was detached; the session stays on disk.
    fn detach_session(&self, session_id: &str);

    fn shared_state(&self, content_id: &str) -> Option<StreamSharedState>;
}

/// The interface the UI and sessions use to read and edit a model.
pub trait ModelProvider: Send + Sync {
    /// Starts a new batched edit.
    fn edit(&self) -> ModelMutation;

    fn current_state(&self) -> ProviderState;

    /// Set by the first commit that carries one.
    fn session_id(&self) -> Option<String>;

    /// The root feature, or `None` for an empty stream.
    fn root_feature(&self) -> Option<ModelFeature>;

    fn model_child(&self, content_id: &str) -> Option<ModelChild>;

    /// A copy of the root's children, including unbound ones.
    fn all_root_children(&self) -> Vec<ModelChild>;

    fn shared_state(&self, content_id: &str) -> Option<StreamSharedState>;

    /// Starts handling `token`. Returns `false` if it cannot be handled.
    fn handle_token(&self, token: &ModelToken) -> bool;

    fn trigger_refresh(&self, reason: RequestReason, ui_context: UiContext);

    /// Registers an observer. A provider that is already ready (or
    /// invalidated) tells it so right away.
    fn register_observer(&self, observer: Arc<dyn ModelProviderObserver>);

    fn unregister_observer(&self, observer: &Arc<dyn ModelProviderObserver>) -> bool;

    fn invalidate(&self, ui_context: UiContext);

    /// Invalidates this provider without dropping its session.
    fn detach_model_provider(&self);

    fn raise_error(&self, error: ModelError);

    fn enable_remove_tracking(&self, factory: Arc<dyn RemoveTrackingFactory>);

    /// The root child whose subtree contains `content_id`.
    fn child_view_depth(&self, content_id: &str) -> Option<String>;

    fn dump(&self) -> ModelProviderDump;
}

/// Collaborators shared by every provider.
#[derive(Clone)]
pub struct ProviderDeps {
    pub task_queue: Arc<dyn TaskQueue>,
    pub main_runner: Arc<dyn MainThreadRunner>,
    pub binder: Arc<dyn ModelChildBinder>,
    pub error_reporter: Arc<dyn InternalErrorReporter>,
}

/// Diagnostic snapshot of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelProviderDump {
    pub state: ProviderState,
    pub session_id: Option<String>,
    pub root: String,
    pub content_count: usize,
    pub containers: usize,
    pub tokens: usize,
    pub synthetic_tokens: usize,
    pub observers: usize,
    pub commit_count: usize,
    pub commit_token_count: usize,
    pub commit_update_count: usize,
    pub remove_count: usize,
    pub remove_scan_count: usize,
    pub multi_child_containers: Vec<(String, usize)>,
    pub single_child_containers: usize,
    pub cursors: usize,
    pub cursors_removed: usize,
    pub cursors_at_end: usize,
}

enum ApplyOutcome {
    Applied {
        appended: Vec<ModelChild>,
        removed_features: Vec<StreamFeature>,
    },
    RootConflict,
}

/// In-memory tree for one session.
pub struct FeedModelProvider {
    self_ref: Weak<FeedModelProvider>,
    tree: Mutex<ModelTree>,
    observers: Observable<dyn ModelProviderObserver>,
    session_manager: Weak<dyn SessionManagerApi>,
    deps: ProviderDeps,
    paging: PagingConfig,
    filter: Option<StructureFilter>,
    remove_tracking_factory: Mutex<Option<Arc<dyn RemoveTrackingFactory>>>,
}

impl FeedModelProvider {
    pub fn new(
        session_manager: Weak<dyn SessionManagerApi>,
        deps: ProviderDeps,
        paging: PagingConfig,
        filter: Option<StructureFilter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            tree: Mutex::new(ModelTree::new()),
            observers: Observable::new(),
            session_manager,
            deps,
            paging,
            filter,
            remove_tracking_factory: Mutex::new(None),
        })
    }

    fn cursor_source(&self) -> Weak<dyn CursorSource> {
        self.self_ref.clone()
    }

    fn new_child(&self, content_id: &str, parent_id: Option<&str>) -> ModelChild {
        ModelChild::new(
            content_id,
            parent_id.map(str::to_string),
            self.cursor_source(),
        )
    }

    fn new_synthetic_token(&self, parent_id: &str) -> ModelChild {
        let content_id = format!("{}{}", SYNTHETIC_TOKEN_PREFIX, uuid::Uuid::new_v4());
        let child = self.new_child(&content_id, Some(parent_id));
        child.bind_token(
            StreamToken {
                content_id,
                parent_id: Some(parent_id.to_string()),
                next_page_token: String::new(),
            },
            true,
        );
        child
    }

    /// Applies the structure changes under the lock.
    fn apply_structure(
        &self,
        tree: &mut ModelTree,
        handler: &mut MutationHandler,
        structures: &[StreamStructure],
        track_removes: bool,
        ui_context: &UiContext,
    ) -> ApplyOutcome {
        handler.pre_mutation(tree);
        let mut appended = Vec::new();
        let mut removed_features = Vec::new();
        for structure in structures {
            match structure.operation {
                Operation::UpdateOrAppend => {
                    let content_id = structure.content_id.as_str();
                    match structure.parent_content_id.as_deref() {
                        None => match tree.root_id() {
                            None => {
                                let root = self.new_child(content_id, None);
                                tree.root = Some(root.clone());
                                tree.contents.insert(content_id.to_string(), root.clone());
                                appended.push(root);
                            }
                            Some(root_id) if root_id == content_id => {
                                warn!(content_id, "duplicate root is ignored");
                            }
                            Some(root_id) => {
                                error!(
                                    existing = %root_id,
                                    new = content_id,
                                    "multiple roots are not supported, invalidating model"
                                );
                                tree.move_to_invalidated(ui_context.clone());
                                return ApplyOutcome::RootConflict;
                            }
                        },
                        Some(parent_id) => {
                            if tree.contents.contains_key(content_id) {
                                warn!(content_id, "child is already in the model, ignoring append");
                                continue;
                            }
                            let child = self.new_child(content_id, Some(parent_id));
                            tree.child_list(parent_id).push(child.clone());
                            tree.contents.insert(content_id.to_string(), child.clone());
                            handler.append_child(parent_id, &child, tree);
                            appended.push(child);
                        }
                    }
                }
                Operation::Remove => {
                    let features = track_removes.then_some(&mut removed_features);
                    apply_remove(tree, handler, structure, features);
                }
                Operation::ClearAll | Operation::RequiredContent => {
                    debug!(operation = ?structure.operation, "ignoring structure operation");
                }
            }
        }
        ApplyOutcome::Applied {
            appended,
            removed_features,
        }
    }

    /// Inserts a synthetic token below the root when paging is enabled.
    /// Returns the children the page reveals.
    fn synthetic_page(&self, tree: &mut ModelTree) -> Option<Vec<ModelChild>> {
        if self.paging.initial_page_size == 0 {
            return None;
        }
        let root = tree.root.clone()?;
        let start = tree.first_unbound_root_child();
        let page_size = if start < self.paging.initial_page_size {
            self.paging.initial_page_size
        } else {
            self.paging.next_page_size()
        };
        let tracker =
            SyntheticTokenTracker::new(tree, &root, start, page_size, self.paging.min_page_size);
        Some(tracker.insert_token(tree, |parent| self.new_synthetic_token(parent)))
    }

    /// Binds `children`, then records any server tokens among them.
    fn bind_children_and_tokens(&self, children: &[ModelChild]) -> bool {
        let success = self.deps.binder.bind_children(children);
        let mut tree = self.tree.lock();
        if tree.state == ProviderState::Invalidated {
            return success;
        }
        for child in children {
            let Some(token) = child.token() else {
                continue;
            };
            if token.is_synthetic() {
                continue;
            }
            let Some(parent_id) = child.parent_id() else {
                warn!(content_id = %child.content_id(), "found a token without a parent, ignoring");
                continue;
            };
            let next_page_token = token.stream_token().next_page_token.clone();
            tree.tokens.insert(
                next_page_token,
                TokenTracking {
                    token,
                    parent_id: parent_id.to_string(),
                },
            );
        }
        success
    }

    /// Reveals the next window behind a synthetic token.
    pub(crate) fn handle_synthetic_token(&self, token: &ModelToken) {
        let content_id = token.stream_token().content_id.clone();
        let mut tree = self.tree.lock();
        let located = tree
            .synthetic_tokens
            .get(&content_id)
            .and_then(|tracker| tracker.token_child().cloned())
            .and_then(|token_child| {
                let root = tree.root.clone()?;
                let position = tree
                    .containers
                    .get(root.content_id())?
                    .iter()
                    .position(|c| c.same_node(&token_child))?;
                Some((root, position))
            });
        let Some((root, position)) = located else {
            drop(tree);
            error!(content_id = %content_id, "cannot find synthetic token");
            self.raise_error_on_token(
                ModelError::new(ErrorType::SyntheticTokenError, None),
                token.clone(),
            );
            return;
        };

        tree.synthetic_tokens.remove(&content_id);
        tree.child_list(root.content_id()).remove(position);
        tree.contents.remove(&content_id);
        let tracker = SyntheticTokenTracker::new(
            &tree,
            &root,
            position,
            self.paging.next_page_size(),
            self.paging.min_page_size,
        );
        let to_bind = tracker.insert_token(&mut tree, |parent| self.new_synthetic_token(parent));
        let revealed = tree
            .containers
            .get(root.content_id())
            .map(|list| list[position.min(list.len())..].to_vec())
            .unwrap_or_default();
        drop(tree);

        if !self.bind_children_and_tokens(&to_bind) {
            error!(content_id = %content_id, "binding the synthetic page was unsuccessful");
        }

        let parent_id = token
            .stream_token()
            .parent_id
            .clone()
            .unwrap_or_else(|| root.content_id().to_string());
        self.deliver(Notification::TokenCompleted {
            token: token.clone(),
            completed: TokenCompleted::new(ModelCursor::new(parent_id, revealed)),
        });
    }

    fn deliver(&self, notification: Notification) {
        match notification {
            Notification::None => {}
            Notification::SessionStart(ui_context) => {
                self.notify_observers("onSessionStart", move |o| o.on_session_start(&ui_context));
            }
            Notification::TokenCompleted { token, completed } => {
                self.deps.main_runner.execute(
                    "onTokenChange",
                    Box::new(move || {
                        for observer in token.observers_to_notify() {
                            observer.on_token_completed(&completed);
                        }
                    }),
                );
            }
            Notification::FeatureChanges(changes) => {
                if changes.is_empty() {
                    return;
                }
                self.deps.main_runner.execute(
                    "onFeatureChange",
                    Box::new(move || {
                        for change in &changes {
                            for observer in change.model_feature().observers_to_notify() {
                                observer.on_change(change);
                            }
                        }
                    }),
                );
            }
        }
    }

    /// Posts `f` for every provider observer to the main-thread runner.
    fn notify_observers(
        &self,
        label: &str,
        f: impl Fn(&dyn ModelProviderObserver) + Send + 'static,
    ) {
        let provider = self.self_ref.clone();
        self.deps.main_runner.execute(
            label,
            Box::new(move || {
                let Some(provider) = provider.upgrade() else {
                    return;
                };
                for observer in provider.observers.observers_to_notify() {
                    f(observer.as_ref());
                }
            }),
        );
    }

    fn notify_session_finished(&self, ui_context: UiContext) {
        self.notify_observers("onSessionFinished", move |o| {
            o.on_session_finished(&ui_context)
        });
    }

    fn raise_error_on_token(&self, error: ModelError, token: ModelToken) {
        self.deps.main_runner.execute(
            "onTokenChange",
            Box::new(move || {
                for observer in token.observers_to_notify() {
                    observer.on_error(&error);
                }
            }),
        );
    }

    fn post_delayed_refresh(&self, reason: RequestReason) {
        let provider = self.self_ref.clone();
        self.deps.main_runner.execute(
            "TriggerRefresh",
            Box::new(move || {
                if let Some(provider) = provider.upgrade() {
                    provider.trigger_refresh(reason, UiContext::default());
                }
            }),
        );
    }

    fn post_remove_tracking(&self, tracking: Arc<dyn RemoveTracking>, features: Vec<StreamFeature>) {
        for feature in &features {
            tracking.filter_stream_feature(feature);
        }
        self.deps.main_runner.execute(
            "removeTracking",
            Box::new(move || tracking.trigger_consumer_update()),
        );
    }

    #[cfg(test)]
    pub(crate) fn check_tree_invariants(&self) -> Result<(), String> {
        self.tree.lock().check_invariants()
    }

    #[cfg(test)]
    pub(crate) fn tracked_token_count(&self) -> usize {
        self.tree.lock().tokens.len()
    }

    #[cfg(test)]
    pub(crate) fn synthetic_window(&self, content_id: &str) -> Option<(usize, usize)> {
        self.tree
            .lock()
            .synthetic_tokens
            .get(content_id)
            .map(|t| t.window())
    }

    #[cfg(test)]
    pub(crate) fn delayed_refresh(&self) -> Option<RequestReason> {
        self.tree.lock().delayed_refresh
    }
}

/// Removes one child. Missing targets are logged and skipped.
fn apply_remove(
    tree: &mut ModelTree,
    handler: &mut MutationHandler,
    structure: &StreamStructure,
    removed_features: Option<&mut Vec<StreamFeature>>,
) {
    let Some(parent_id) = structure.parent_content_id.as_deref() else {
        error!("unable to remove the root element");
        return;
    };
    let child_id = structure.content_id.as_str();

    if let Some(features) = removed_features {
        match tree.contents.get(child_id).cloned() {
            Some(child) => tree.collect_features(&child, features),
            None => warn!(content_id = child_id, "didn't find child for remove tracking"),
        }
    }

    if !tree.containers.contains_key(parent_id) {
        warn!(parent_id, "parent of removed item is not found");
        return;
    }
    let Some(target) = tree.contents.get(child_id).cloned() else {
        error!(content_id = child_id, "child not found in the model provider contents");
        return;
    };
    if child_id.starts_with(SYNTHETIC_TOKEN_PREFIX) {
        info!(content_id = child_id, "removing synthetic token");
        tree.synthetic_tokens.remove(child_id);
    }
    if !target.is_unbound() {
        handler.remove_child(parent_id, &target, tree);
    }
    if target.token().is_some() {
        tree.tokens
            .retain(|_, tracking| tracking.token.stream_token().content_id != child_id);
    }

    // Scan backwards: the usual removal is a token at the end of the list.
    let mut scans = 0;
    let removed = match tree.containers.get_mut(parent_id) {
        Some(list) => {
            let mut found = None;
            for i in (0..list.len()).rev() {
                scans += 1;
                if list[i].content_id() == child_id {
                    found = Some(i);
                    break;
                }
            }
            found.map(|i| list.remove(i))
        }
        None => None,
    };
    tree.stats.remove_scans += scans;
    match removed {
        Some(_) => {
            tree.stats.removed_children += 1;
            tree.contents.remove(child_id);
        }
        None => warn!(content_id = child_id, parent_id, "child to be removed was not found"),
    }
}

impl ModelCommitter for FeedModelProvider {
    fn commit(&self, change: Change) {
        info!(
            structure_changes = change.structure_changes.len(),
            update_changes = change.update_changes.len(),
            "model provider commit"
        );
        let structures: Vec<StreamStructure> = match &self.filter {
            Some(filter) => change
                .structure_changes
                .iter()
                .filter(|s| (**filter)(*s))
                .cloned()
                .collect(),
            None => change.structure_changes.clone(),
        };
        let has_removes = structures.iter().any(|s| s.operation == Operation::Remove);

        let (mut handler, update_children, delayed_refresh) = {
            let mut tree = self.tree.lock();
            if tree.state == ProviderState::Invalidated {
                debug!("model provider is invalidated, ignoring mutation");
                return;
            }
            tree.stats.commits += 1;
            let mut delayed_refresh = None;
            if let Some(session_id) = &change.session_id {
                tree.session_id = Some(session_id.clone());
                delayed_refresh = tree.delayed_refresh.take();
            }
            let update_children: Vec<ModelChild> = change
                .update_changes
                .iter()
                .filter_map(|update| match tree.contents.get(&update.content_id) {
                    Some(child) => Some(child.clone()),
                    None => {
                        warn!(content_id = %update.content_id, "child was not found for updating");
                        None
                    }
                })
                .collect();
            let handler = MutationHandler::select(&mut tree, &change);
            (handler, update_children, delayed_refresh)
        };
        if let Some(reason) = delayed_refresh {
            self.post_delayed_refresh(reason);
        }

        let remove_tracking = match (has_removes, &change.mutation_context) {
            (true, Some(context)) => self
                .remove_tracking_factory
                .lock()
                .clone()
                .and_then(|factory| factory.create(context)),
            _ => None,
        };
        let ui_context = change
            .mutation_context
            .as_ref()
            .map(|c| c.ui_context.clone())
            .unwrap_or_default();

        let (children_to_bind, removed_features) = {
            let mut tree = self.tree.lock();
            let outcome = self.apply_structure(
                &mut tree,
                &mut handler,
                &structures,
                remove_tracking.is_some(),
                &ui_context,
            );
            let (appended, removed_features) = match outcome {
                ApplyOutcome::Applied {
                    appended,
                    removed_features,
                } => (appended, removed_features),
                ApplyOutcome::RootConflict => {
                    drop(tree);
                    self.notify_session_finished(ui_context);
                    return;
                }
            };
            let children_to_bind = match self.synthetic_page(&mut tree) {
                Some(mut page) => {
                    // Root children wait for their window. Deeper children
                    // under an already bound parent are visible right away.
                    let root_id = tree.root_id();
                    let visible = appended.into_iter().filter(|child| {
                        child.parent_id().is_some_and(|parent| {
                            Some(parent) != root_id.as_deref()
                                && tree.contents.get(parent).is_some_and(|p| !p.is_unbound())
                        })
                    });
                    for child in visible.chain(update_children) {
                        if !page.iter().any(|c| c.same_node(&child)) {
                            page.push(child);
                        }
                    }
                    page
                }
                None => {
                    let mut all = appended;
                    all.extend(update_children);
                    all
                }
            };
            (children_to_bind, removed_features)
        };

        if let Some(tracking) = remove_tracking {
            self.post_remove_tracking(tracking, removed_features);
        }

        let handler_label = handler.label();
        if self.bind_children_and_tokens(&children_to_bind) {
            let notification = {
                let mut tree = self.tree.lock();
                if tree.state == ProviderState::Invalidated {
                    Notification::None
                } else {
                    handler.post_mutation(&mut tree)
                }
            };
            self.deliver(notification);
        } else {
            error!("binding children failed, not processing mutation");
            self.invalidate(UiContext::default());
        }
        info!(
            handler = handler_label,
            structure_changes = structures.len(),
            children_to_bind = children_to_bind.len(),
            removed_children = has_removes,
            "model provider mutation committed"
        );
    }
}

impl CursorSource for FeedModelProvider {
    fn provide_cursor(&self, parent_id: &str) -> ModelCursor {
        let mut tree = self.tree.lock();
        let children = match tree.containers.get(parent_id) {
            Some(children) => children.clone(),
            None => {
                debug!(parent_id, "no children found for cursor");
                Vec::new()
            }
        };
        let cursor = ModelCursor::new(parent_id, children);
        tree.cursors.reclaim();
        tree.cursors.register(&cursor);
        cursor
    }
}

impl ModelProvider for FeedModelProvider {
    fn edit(&self) -> ModelMutation {
        ModelMutation::new(self.self_ref.clone())
    }

    fn current_state(&self) -> ProviderState {
        self.tree.lock().state
    }

    fn session_id(&self) -> Option<String> {
        self.tree.lock().session_id.clone()
    }

    fn root_feature(&self) -> Option<ModelFeature> {
        let root = self.tree.lock().root.clone();
        let Some(root) = root else {
            info!("found empty stream");
            return None;
        };
        let feature = root.feature();
        if feature.is_none() {
            error!(child_type = ?root.child_type(), "root is bound to the wrong type");
            self.deps
                .error_reporter
                .on_internal_error(InternalFeedError::RootNotBoundToFeature);
        }
        feature
    }

    fn model_child(&self, content_id: &str) -> Option<ModelChild> {
        self.tree.lock().contents.get(content_id).cloned()
    }

    fn all_root_children(&self) -> Vec<ModelChild> {
        self.tree.lock().root_children()
    }

    fn shared_state(&self, content_id: &str) -> Option<StreamSharedState> {
        self.session_manager.upgrade()?.shared_state(content_id)
    }

    fn handle_token(&self, token: &ModelToken) -> bool {
        if token.is_synthetic() {
            let known = self
                .tree
                .lock()
                .synthetic_tokens
                .contains_key(&token.stream_token().content_id);
            if !known {
                error!(
                    content_id = %token.stream_token().content_id,
                    "unable to find the synthetic token tracker"
                );
                return false;
            }
            let provider = self.self_ref.clone();
            let token = token.clone();
            self.deps.task_queue.execute(
                Task::HandleSyntheticToken,
                TaskType::UserFacing,
                Box::new(move || {
                    if let Some(provider) = provider.upgrade() {
                        provider.handle_synthetic_token(&token);
                    }
                }),
            );
            return true;
        }
        let Some(session_id) = self.session_id() else {
            error!("no session id, cannot request the next page");
            return false;
        };
        let Some(manager) = self.session_manager.upgrade() else {
            warn!("session manager is gone, dropping token");
            return false;
        };
        manager.handle_token(&session_id, token.stream_token().clone());
        true
    }

    fn trigger_refresh(&self, reason: RequestReason, ui_context: UiContext) {
        let session_id = {
            let mut tree = self.tree.lock();
            match tree.session_id.clone() {
                Some(session_id) => session_id,
                None => {
                    debug!(%reason, "no session yet, delaying refresh");
                    tree.delayed_refresh = Some(reason);
                    return;
                }
            }
        };
        if let Some(manager) = self.session_manager.upgrade() {
            manager.trigger_refresh(&session_id, reason, ui_context);
        }
    }

    fn register_observer(&self, observer: Arc<dyn ModelProviderObserver>) {
        self.observers.register(Arc::clone(&observer));
        let (state, ui_context) = {
            let tree = self.tree.lock();
            (tree.state, tree.ui_context.clone())
        };
        match state {
            ProviderState::Ready => observer.on_session_start(&ui_context),
            ProviderState::Invalidated => observer.on_session_finished(&ui_context),
            ProviderState::Initializing => {}
        }
    }

    fn unregister_observer(&self, observer: &Arc<dyn ModelProviderObserver>) -> bool {
        self.observers.unregister(observer)
    }

    fn invalidate(&self, ui_context: UiContext) {
        let (moved, session_id) = {
            let mut tree = self.tree.lock();
            (tree.move_to_invalidated(ui_context.clone()), tree.session_id.clone())
        };
        if !moved {
            error!("unable to invalidate model provider, already invalidated");
            return;
        }
        if let Some(session_id) = session_id {
            info!(session_id = %session_id, "invalidating the current model provider");
            if let Some(manager) = self.session_manager.upgrade() {
                manager.invalidate_session(&session_id);
            }
        }
        self.notify_session_finished(ui_context);
    }

    fn detach_model_provider(&self) {
        let (moved, session_id) = {
            let mut tree = self.tree.lock();
            (tree.move_to_invalidated(UiContext::default()), tree.session_id.clone())
        };
        if !moved {
            error!("unable to detach model provider, already invalidated");
            return;
        }
        if let Some(session_id) = session_id {
            info!(session_id = %session_id, "detaching the current model provider");
            if let Some(manager) = self.session_manager.upgrade() {
                manager.detach_session(&session_id);
            }
        }
    }

    fn raise_error(&self, error: ModelError) {
        match error.error_type() {
            ErrorType::NoCardsError => {
                self.notify_observers("onError", move |o| o.on_error(&error));
            }
            ErrorType::PaginationError => {
                info!("handling pagination error");
                let token = error.continuation_token().and_then(|npt| {
                    self.tree
                        .lock()
                        .tokens
                        .get(npt)
                        .map(|tracking| tracking.token.clone())
                });
                match token {
                    Some(token) => self.raise_error_on_token(error, token),
                    None => error!("the token observer was not found during pagination error"),
                }
            }
            other => warn!(error_type = %other, "unhandled model error"),
        }
    }

    fn enable_remove_tracking(&self, factory: Arc<dyn RemoveTrackingFactory>) {
        *self.remove_tracking_factory.lock() = Some(factory);
    }

    fn child_view_depth(&self, content_id: &str) -> Option<String> {
        self.tree.lock().view_depth(content_id)
    }

    fn dump(&self) -> ModelProviderDump {
        let observers = self.observers.len();
        let tree = self.tree.lock();
        let root = match &tree.root {
            None => "[UNDEFINED]".to_string(),
            Some(root) => match root.feature() {
                Some(feature) => feature.stream_feature().content_id,
                None => format!("[ROOT NOT A FEATURE: {:?}]", root.child_type()),
            },
        };
        let mut multi_child_containers: Vec<(String, usize)> = tree
            .containers
            .iter()
            .filter(|(_, children)| children.len() > 1)
            .map(|(id, children)| (id.clone(), children.len()))
            .collect();
        multi_child_containers.sort();
        ModelProviderDump {
            state: tree.state,
            session_id: tree.session_id.clone(),
            root,
            content_count: tree.contents.len(),
            containers: tree.containers.len(),
            tokens: tree.tokens.len(),
            synthetic_tokens: tree.synthetic_tokens.len(),
            observers,
            commit_count: tree.stats.commits,
            commit_token_count: tree.stats.token_commits,
            commit_update_count: tree.stats.update_commits,
            remove_count: tree.stats.removed_children,
            remove_scan_count: tree.stats.remove_scans,
            single_child_containers: tree.containers.len() - multi_child_containers.len(),
            multi_child_containers,
            cursors: tree.cursors.len(),
            cursors_removed: tree.cursors.reclaimed(),
            cursors_at_end: tree.cursors.at_end(),
        }
    }
}

/// Builds providers sharing one set of collaborators.
#[derive(Clone)]
pub struct FeedModelProviderFactory {
    deps: ProviderDeps,
    paging: PagingConfig,
}

impl FeedModelProviderFactory {
    pub fn new(deps: ProviderDeps, paging: PagingConfig) -> Self {
        Self { deps, paging }
    }

    pub fn create(
        &self,
        session_manager: Weak<dyn SessionManagerApi>,
        filter: Option<StructureFilter>,
    ) -> Arc<FeedModelProvider> {
        FeedModelProvider::new(session_manager, self.deps.clone(), self.paging, filter)
    }
}
