//! State machine, observer replay, refresh, and invalidation.

use super::*;
use crate::model::{ChildType, ProviderState};
use std::sync::Arc;

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn first_root_moves_provider_to_ready() {
    let h = Harness::new();
    assert_eq!(h.provider.current_state(), ProviderState::Initializing);

    h.commit(&[root()]);

    assert_eq!(h.provider.current_state(), ProviderState::Ready);
    let root = h.provider.root_feature().expect("root feature");
    assert_eq!(root.stream_feature().content_id, "root");
    assert_eq!(h.observer.count("start"), 1);
    assert_eq!(h.provider.session_id().as_deref(), Some(SESSION_ID));
}

#[test]
fn empty_stream_has_no_root_feature() {
    let h = Harness::new();
    assert!(h.provider.root_feature().is_none());
    assert!(h.provider.all_root_children().is_empty());
}

#[test]
fn initial_children_are_bound_in_order() {
    let h = Harness::new();
    h.commit(&root_with_children(&["a", "b", "c"]));

    assert_eq!(h.root_child_ids(), vec!["a", "b", "c"]);
    for child in h.provider.all_root_children() {
        assert_eq!(child.child_type(), ChildType::Feature);
    }
    h.assert_invariants();
}

// ============================================================================
// Roots
// ============================================================================

#[test]
fn second_distinct_root_invalidates() {
    let h = Harness::new();
    h.commit(&root_with_children(&["a", "b"]));

    h.commit(&[StreamDataOperation::feature("other-root", None)]);

    assert_eq!(h.provider.current_state(), ProviderState::Invalidated);
    assert_eq!(h.observer.count("finished"), 1);
    assert!(h.provider.all_root_children().is_empty());
    h.assert_invariants();
}

#[test]
fn re_appending_the_root_is_a_no_op() {
    let h = Harness::new();
    h.commit(&root_with_children(&["a"]));
    let before = h.provider.model_child("root").expect("root child");

    h.commit(&[root()]);

    assert_eq!(h.provider.current_state(), ProviderState::Ready);
    assert_eq!(h.root_child_ids(), vec!["a"]);
    let after = h.provider.model_child("root").expect("root child");
    assert!(before.same_node(&after));
    assert_eq!(h.observer.count("finished"), 0);
    h.assert_invariants();
}

// ============================================================================
// Invalidation
// ============================================================================

#[test]
fn invalidation_is_terminal() {
    let h = Harness::new();
    h.commit(&root_with_children(&["a"]));
    h.provider.invalidate(UiContext::default());

    h.commit(&[feature("b", "root")]);

    assert_eq!(h.provider.current_state(), ProviderState::Invalidated);
    assert!(h.provider.all_root_children().is_empty());
    assert!(h.provider.model_child("b").is_none());
}

#[test]
fn invalidate_notifies_once_and_tells_the_session_manager() {
    let h = Harness::new();
    h.commit(&[root()]);

    h.provider.invalidate(UiContext::new("ui"));
    h.provider.invalidate(UiContext::default());

    assert_eq!(h.observer.count("finished"), 1);
    assert_eq!(
        h.manager.calls(),
        vec![format!("invalidate_session {}", SESSION_ID)]
    );
}

#[test]
fn detach_invalidates_without_notifying_observers() {
    let h = Harness::new();
    h.commit(&[root()]);

    h.provider.detach_model_provider();

    assert_eq!(h.provider.current_state(), ProviderState::Invalidated);
    assert_eq!(h.observer.count("finished"), 0);
    assert_eq!(h.manager.calls(), vec![format!("detach_session {}", SESSION_ID)]);
}

#[test]
fn bind_failure_invalidates() {
    let h = Harness::new();
    h.commit(&[root()]);

    // Structure without a stored payload cannot be bound.
    let mut mutation = h.provider.edit();
    mutation.add_child(StreamStructure::append("ghost", Some("root")));
    mutation.commit();

    assert_eq!(h.provider.current_state(), ProviderState::Invalidated);
    assert_eq!(h.observer.count("finished"), 1);
}

// ============================================================================
// Observers
// ============================================================================

#[test]
fn late_observer_is_told_the_session_started() {
    let h = Harness::new();
    h.commit(&[root()]);

    let late = Arc::new(RecordingProviderObserver::default());
    h.provider.register_observer(late.clone());

    assert_eq!(late.count("start"), 1);
}

#[test]
fn late_observer_is_told_the_session_finished() {
    let h = Harness::new();
    h.commit(&[root()]);
    h.provider.invalidate(UiContext::default());

    let late = Arc::new(RecordingProviderObserver::default());
    h.provider.register_observer(late.clone());

    assert_eq!(late.count("finished"), 1);
    assert_eq!(late.count("start"), 0);
}

#[test]
fn unregistered_observer_hears_nothing() {
    let h = Harness::new();
    let observer: Arc<dyn ModelProviderObserver> = h.observer.clone();
    assert!(h.provider.unregister_observer(&observer));

    h.commit(&[root()]);

    assert_eq!(h.observer.count("start"), 0);
}

// ============================================================================
// Refresh
// ============================================================================

#[test]
fn refresh_before_session_is_delayed_until_first_commit() {
    let h = Harness::new();
    h.provider
        .trigger_refresh(RequestReason::ManualRefresh, UiContext::default());
    assert_eq!(h.provider.delayed_refresh(), Some(RequestReason::ManualRefresh));
    assert!(h.manager.calls().is_empty());

    h.commit(&[root()]);

    assert_eq!(h.provider.delayed_refresh(), None);
    assert_eq!(
        h.manager.calls(),
        vec![format!("trigger_refresh {} manual-refresh", SESSION_ID)]
    );
}

#[test]
fn refresh_with_session_goes_straight_to_the_manager() {
    let h = Harness::new();
    h.commit(&[root()]);

    h.provider
        .trigger_refresh(RequestReason::HostRequested, UiContext::default());

    assert_eq!(
        h.manager.calls(),
        vec![format!("trigger_refresh {} host-requested", SESSION_ID)]
    );
}

// ============================================================================
// Filtering, view depth, shared state, dump
// ============================================================================

#[test]
fn filter_predicate_skips_structures() {
    let filter: StructureFilter = Arc::new(|s: &StreamStructure| s.content_id != "b");
    let h = Harness::build(PagingConfig::default(), FakeTaskQueue::immediate(), Some(filter));

    h.commit(&root_with_children(&["a", "b", "c"]));

    assert_eq!(h.root_child_ids(), vec!["a", "c"]);
    h.assert_invariants();
}

#[test]
fn view_depth_maps_descendants_to_root_children() {
    let h = Harness::new();
    h.commit(&[
        root(),
        feature("a", "root"),
        feature("a1", "a"),
        feature("a1x", "a1"),
    ]);

    assert_eq!(h.provider.child_view_depth("a1x").as_deref(), Some("a"));
    assert_eq!(h.provider.child_view_depth("a").as_deref(), Some("a"));
    assert_eq!(h.provider.child_view_depth("root"), None);
    assert_eq!(h.provider.child_view_depth("unknown"), None);
}

#[test]
fn shared_state_comes_from_the_session_manager() {
    let h = Harness::new();
    let state = h.provider.shared_state("shared-1").expect("shared state");
    assert_eq!(state.content_id, "shared-1");
}

#[test]
fn dump_reports_counts() {
    let h = Harness::new();
    h.commit(&[root(), feature("a", "root"), feature("b", "root"), feature("a1", "a")]);
    h.commit(&[remove("b", "root")]);
    let _cursor = h.provider.root_feature().expect("root").cursor();

    let dump = h.provider.dump();

    assert_eq!(dump.state, ProviderState::Ready);
    assert_eq!(dump.root, "root");
    assert_eq!(dump.content_count, 3);
    assert_eq!(dump.containers, 2);
    assert_eq!(dump.commit_count, 2);
    assert_eq!(dump.commit_update_count, 1);
    assert_eq!(dump.remove_count, 1);
    assert_eq!(dump.observers, 1);
    assert_eq!(dump.cursors, 1);
    assert_eq!(dump.single_child_containers, 2);
    let json = serde_json::to_string(&dump).expect("serialize dump");
    assert!(json.contains("\"state\":\"ready\""));
}
