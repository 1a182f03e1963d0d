//! Binding unbound children to the payloads held in the store.

use super::child::ModelChild;
use crate::error::{InternalErrorReporter, InternalFeedError};
use crate::proto::StreamPayload;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Binds children to their features or tokens.
pub trait ModelChildBinder: Send + Sync {
    /// Returns `false` if any child could not be bound.
    fn bind_children(&self, children: &[ModelChild]) -> bool;
}

/// Reads payloads from a [`Store`].
pub struct StoreChildBinder {
    store: Arc<dyn Store>,
    error_reporter: Arc<dyn InternalErrorReporter>,
}

impl StoreChildBinder {
    pub fn new(store: Arc<dyn Store>, error_reporter: Arc<dyn InternalErrorReporter>) -> Self {
        Self {
            store,
            error_reporter,
        }
    }
}

impl ModelChildBinder for StoreChildBinder {
    fn bind_children(&self, children: &[ModelChild]) -> bool {
        if children.is_empty() {
            return true;
        }
        let ids: Vec<String> = children
            .iter()
            .map(|c| c.content_id().to_string())
            .collect();
        let payloads = match self.store.get_payloads(&ids) {
            Ok(payloads) => payloads,
            Err(e) => {
                error!(error = %e, "failed to read payloads for binding");
                self.error_reporter
                    .on_internal_error(InternalFeedError::ModelChildBindFailure);
                return false;
            }
        };
        let by_id: HashMap<&str, &StreamPayload> = payloads
            .iter()
            .map(|p| (p.content_id.as_str(), &p.payload))
            .collect();

        let mut success = true;
        for child in children {
            let bound = match by_id.get(child.content_id()) {
                Some(StreamPayload::Feature(feature)) => child.bind_feature(feature.clone()),
                Some(StreamPayload::Token(token)) => child.bind_token(token.clone(), false),
                Some(_) => {
                    warn!(content_id = %child.content_id(), "payload is neither feature nor token");
                    false
                }
                None => {
                    warn!(content_id = %child.content_id(), "no payload found for child");
                    false
                }
            };
            success &= bound;
        }
        if !success {
            self.error_reporter
                .on_internal_error(InternalFeedError::ModelChildBindFailure);
        }
        debug!(count = children.len(), success, "bound children");
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TracingErrorReporter;
    use crate::model::ChildType;
    use crate::proto::{PayloadWithId, StreamDataOperation};
    use crate::store::{InMemoryStore, StoreExt};

    fn store_with(ops: &[StreamDataOperation]) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let mut content = store.edit_content();
        for op in ops {
            if let Some(payload) = &op.payload {
                content.add(PayloadWithId {
                    content_id: op.structure.content_id.clone(),
                    payload: payload.clone(),
                });
            }
        }
        content.commit();
        store
    }

    #[test]
    fn binds_features_and_tokens() {
        let store = store_with(&[
            StreamDataOperation::feature("a", Some("root")),
            StreamDataOperation::token("t", "root", "npt"),
        ]);
        let binder = StoreChildBinder::new(store, Arc::new(TracingErrorReporter));
        let a = ModelChild::detached("a", Some("root"));
        let t = ModelChild::detached("t", Some("root"));

        assert!(binder.bind_children(&[a.clone(), t.clone()]));
        assert_eq!(a.child_type(), ChildType::Feature);
        assert_eq!(t.child_type(), ChildType::Token);
        assert!(!t.token().expect("token").is_synthetic());
    }

    #[test]
    fn missing_payload_fails_the_bind() {
        let store = store_with(&[StreamDataOperation::feature("a", Some("root"))]);
        let binder = StoreChildBinder::new(store, Arc::new(TracingErrorReporter));
        let a = ModelChild::detached("a", Some("root"));
        let missing = ModelChild::detached("missing", Some("root"));

        assert!(!binder.bind_children(&[a.clone(), missing.clone()]));
        assert_eq!(a.child_type(), ChildType::Feature);
        assert_eq!(missing.child_type(), ChildType::Unbound);
    }

    #[test]
    fn store_read_failure_fails_the_bind() {
        let store = store_with(&[StreamDataOperation::feature("a", Some("root"))]);
        store.fail_reads(true);
        let binder = StoreChildBinder::new(store, Arc::new(TracingErrorReporter));
        assert!(!binder.bind_children(&[ModelChild::detached("a", Some("root"))]));
    }
}
