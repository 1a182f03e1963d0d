//! Builds sessions with the collaborators they share.

use super::session_impl::{HeadSessionImpl, SessionImpl};
use crate::concurrent::TaskQueue;
use crate::error::InternalErrorReporter;
use crate::proto::SESSION_ID_PREFIX;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionFactory {
    store: Arc<dyn Store>,
    task_queue: Arc<dyn TaskQueue>,
    error_reporter: Arc<dyn InternalErrorReporter>,
    limit_paging_updates: bool,
}

impl SessionFactory {
    pub fn new(
        store: Arc<dyn Store>,
        task_queue: Arc<dyn TaskQueue>,
        error_reporter: Arc<dyn InternalErrorReporter>,
        limit_paging_updates: bool,
    ) -> Self {
        Self {
            store,
            task_queue,
            error_reporter,
            limit_paging_updates,
        }
    }

    pub fn create_head(&self) -> HeadSessionImpl {
        HeadSessionImpl::new(Arc::clone(&self.store), Arc::clone(&self.error_reporter))
    }

    /// An unbound session with the given id and no content yet.
    pub fn create_session(&self, session_id: &str) -> SessionImpl {
        SessionImpl::new(
            session_id,
            Arc::clone(&self.store),
            Arc::clone(&self.task_queue),
            Arc::clone(&self.error_reporter),
            self.limit_paging_updates,
        )
    }

    /// A fresh `_session:<uuid>` id.
    pub fn new_session_id() -> String {
        format!("{}{}", SESSION_ID_PREFIX, uuid::Uuid::new_v4())
    }
}
