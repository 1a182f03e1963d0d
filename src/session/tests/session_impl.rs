//! Session and head session updates.

use super::*;
use crate::concurrent::FakeTaskQueue;
use crate::model::ProviderState;
use crate::proto::StreamToken;
use crate::session::{HeadSessionImpl, Session, SessionImpl};

const UNBOUND_ID: &str = "_session:unbound";

fn unbound(store: &Arc<InMemoryStore>, reporter: Arc<RecordingReporter>, limit: bool) -> SessionImpl {
    SessionImpl::new(
        UNBOUND_ID,
        store.clone(),
        Arc::new(FakeTaskQueue::immediate()),
        reporter,
        limit,
    )
}

fn structures(ops: &[StreamDataOperation]) -> Vec<StreamStructure> {
    ops.iter().map(|op| op.structure.clone()).collect()
}

fn sorted(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut ids: Vec<String> = ids.into_iter().collect();
    ids.sort();
    ids
}

fn page_context(token_id: &str, requesting: &str) -> MutationContext {
    MutationContext::for_token(
        StreamToken {
            content_id: token_id.to_string(),
            parent_id: Some("root".to_string()),
            next_page_token: "p1".to_string(),
        },
        requesting,
    )
}

// ============================================================================
// SessionImpl
// ============================================================================

#[test]
fn replaying_populate_ops_keeps_tracked_content() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);
    let seed = structures(&root_with(&["a", "b"]));

    session.populate_model_provider(&seed, UiContext::default());
    let before = session.content_in_session();
    session.update_session(false, &seed, 2, None);

    assert_eq!(session.content_in_session(), before);
    assert_eq!(sorted(before), vec!["a", "b", "root"]);
}

#[test]
fn only_new_content_is_journaled() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);
    session.populate_model_provider(&structures(&root_with(&["a"])), UiContext::default());

    session.update_session(false, &structures(&[feature("a"), feature("b"), remove("a")]), 2, None);

    assert_eq!(ids(&store.journal(UNBOUND_ID)), vec!["b", "a"]);
    assert_eq!(sorted(session.content_in_session()), vec!["b", "root"]);
}

#[test]
fn repeated_required_content_is_journaled_once() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);
    session.populate_model_provider(&structures(&root_with(&["a"])), UiContext::default());

    let required = vec![StreamStructure::required("x")];
    session.update_session(false, &required, 2, None);
    session.update_session(false, &required, 2, None);

    assert_eq!(ids(&store.journal(UNBOUND_ID)), vec!["x"]);
    assert!(session.content_in_session().contains("x"));
}

#[test]
fn page_for_a_token_outside_the_session_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);
    session.populate_model_provider(&structures(&root_with(&["a"])), UiContext::default());

    let context = page_context("t9", UNBOUND_ID);
    session.update_session(false, &structures(&[feature("b")]), 2, Some(&context));

    assert!(!session.content_in_session().contains("b"));
    assert!(store.journal(UNBOUND_ID).is_empty());
}

#[test]
fn page_requested_by_another_session_is_ignored_when_limited() {
    let store = Arc::new(InMemoryStore::new());
    let seed = structures(&[root(), feature("a"), token("t1", "p1")]);
    let context = page_context("t1", "_session:other");

    let limited = unbound(&store, Arc::default(), true);
    limited.populate_model_provider(&seed, UiContext::default());
    limited.update_session(false, &structures(&[feature("b")]), 2, Some(&context));
    assert!(!limited.content_in_session().contains("b"));

    let unlimited = unbound(&store, Arc::default(), false);
    unlimited.populate_model_provider(&seed, UiContext::default());
    unlimited.update_session(false, &structures(&[feature("b")]), 2, Some(&context));
    assert!(unlimited.content_in_session().contains("b"));
}

#[test]
fn clear_all_does_not_touch_a_regular_session() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);
    session.populate_model_provider(&structures(&root_with(&["a"])), UiContext::default());

    session.update_session(false, &structures(&[clear_all()]), 2, None);

    assert_eq!(session.content_in_session().len(), 2);
    assert!(store.journal(UNBOUND_ID).is_empty());
}

#[test]
fn only_the_requesting_session_is_invalidated_by_clear_head() {
    let store = Arc::new(InMemoryStore::new());
    let session = unbound(&store, Arc::default(), true);

    assert!(session.should_invalidate_model_provider(Some(&MutationContext::for_session(
        UNBOUND_ID,
        UiContext::default()
    ))));
    assert!(!session.should_invalidate_model_provider(Some(&MutationContext::for_session(
        "_session:other",
        UiContext::default()
    ))));
    assert!(!session.should_invalidate_model_provider(None));
    assert!(session.invalidate_on_reset_head());
}

#[test]
fn journal_failure_is_reported() {
    let store = Arc::new(InMemoryStore::new());
    let reporter = Arc::new(RecordingReporter::default());
    let session = unbound(&store, reporter.clone(), true);
    store.fail_commits(true);

    session.update_session(false, &structures(&root_with(&["a"])), 2, None);

    assert_eq!(
        reporter.errors(),
        vec![InternalFeedError::SessionStorageCommitFailure]
    );
    // Memory is not rolled back.
    assert!(session.content_in_session().contains("a"));
}

// ============================================================================
// Bound sessions
// ============================================================================

#[test]
fn replaying_head_into_a_bound_session_changes_nothing() {
    let h = Harness::new();
    h.push(root_with(&["a", "b"]));
    let provider = h.open();
    let session = h
        .manager
        .cache()
        .get_attached(&Harness::session_id(&provider))
        .expect("attached session");
    let before = session.content_in_session();

    session.update_session(false, &h.store.journal(HEAD_SESSION_ID), 2, None);

    assert_eq!(session.content_in_session(), before);
    assert_eq!(root_child_ids(&provider), vec!["a", "b"]);
    assert_eq!(provider.current_state(), ProviderState::Ready);
}

#[test]
fn clear_head_invalidates_only_the_requesting_provider() {
    let h = Harness::new();
    h.push(root_with(&["a"]));
    let first = h.open();
    let second = h.open();
    let first_id = Harness::session_id(&first);
    let cache = h.manager.cache();
    let context = MutationContext::for_session(&first_id, UiContext::default());

    for provider in [&first, &second] {
        let session = cache
            .get_attached(&Harness::session_id(provider))
            .expect("attached session");
        session.update_session(true, &[], 2, Some(&context));
    }

    assert_eq!(first.current_state(), ProviderState::Invalidated);
    assert_eq!(second.current_state(), ProviderState::Ready);
    assert_eq!(root_child_ids(&second), vec!["a"]);
}

// ============================================================================
// HeadSessionImpl
// ============================================================================

#[test]
fn head_journals_each_append_once() {
    let store = Arc::new(InMemoryStore::new());
    let head = HeadSessionImpl::new(store.clone(), Arc::new(RecordingReporter::default()));

    head.update_session(false, &structures(&root_with(&["a"])), 2, None);
    head.update_session(false, &structures(&[feature("a"), feature("b")]), 2, None);

    assert_eq!(ids(&store.journal(HEAD_SESSION_ID)), vec!["root", "a", "b"]);
    assert!(head.is_head());
    assert!(!head.invalidate_on_reset_head());
}

#[test]
fn head_journals_required_content_once() {
    let store = Arc::new(InMemoryStore::new());
    let head = HeadSessionImpl::new(store.clone(), Arc::new(RecordingReporter::default()));
    head.update_session(false, &structures(&root_with(&["a"])), 2, None);

    let required = vec![StreamStructure::required("shared")];
    head.update_session(false, &required, 2, None);
    head.update_session(false, &required, 2, None);

    assert_eq!(ids(&store.journal(HEAD_SESSION_ID)), vec!["root", "a", "shared"]);
}

#[test]
fn head_tracker_honors_clear_all() {
    let store = Arc::new(InMemoryStore::new());
    let head = HeadSessionImpl::new(store.clone(), Arc::new(RecordingReporter::default()));
    head.update_session(false, &structures(&root_with(&["a"])), 2, None);

    head.update_session(true, &structures(&[clear_all(), root(), feature("x")]), 2, None);

    assert_eq!(sorted(head.content_in_session()), vec!["root", "x"]);
    assert!(head.model_provider().is_none());
}
