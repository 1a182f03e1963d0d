//! A [`Store`] kept entirely in memory, with failure injection for tests.

use super::{AccessibleContent, CommitResult, Store};
use crate::concurrent::Runnable;
use crate::error::StoreError;
use crate::proto::{
    PayloadWithId, SessionMetadata, StreamPayload, StreamSharedState, StreamStructure,
    HEAD_SESSION_ID,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct StoreData {
    content: HashMap<String, StreamPayload>,
    semantic_properties: HashMap<String, Vec<u8>>,
    journals: HashMap<String, Vec<StreamStructure>>,
    metadata: HashMap<String, SessionMetadata>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<StoreData>>,
    fail_reads: AtomicBool,
    fail_commits: AtomicBool,
    content_commits: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read return [`StoreError::ReadFailed`].
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every commit return [`CommitResult::Failure`].
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Successful `commit_content` calls so far.
    pub fn content_commit_count(&self) -> usize {
        self.content_commits.load(Ordering::SeqCst)
    }

    pub fn content_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data.lock().content.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_content(&self, content_id: &str) -> bool {
        self.data.lock().content.contains_key(content_id)
    }

    pub fn semantic_properties(&self, content_id: &str) -> Option<Vec<u8>> {
        self.data.lock().semantic_properties.get(content_id).cloned()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.data.lock().journals.contains_key(session_id)
    }

    /// The journal as stored, or empty when absent.
    pub fn journal(&self, session_id: &str) -> Vec<StreamStructure> {
        self.data
            .lock()
            .journals
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailed("injected read failure".to_string()));
        }
        Ok(())
    }

    fn commits_fail(&self, what: &'static str) -> bool {
        let fail = self.fail_commits.load(Ordering::SeqCst);
        if fail {
            warn!(what, "injected commit failure");
        }
        fail
    }
}

impl Store for InMemoryStore {
    fn get_stream_structures(&self, session_id: &str) -> Result<Vec<StreamStructure>, StoreError> {
        self.check_read()?;
        match self.data.lock().journals.get(session_id) {
            Some(journal) => Ok(journal.clone()),
            None if session_id == HEAD_SESSION_ID => Ok(Vec::new()),
            None => Err(StoreError::SessionNotFound(session_id.to_string())),
        }
    }

    fn get_payloads(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>, StoreError> {
        self.check_read()?;
        let data = self.data.lock();
        Ok(content_ids
            .iter()
            .filter_map(|id| {
                data.content.get(id).map(|payload| PayloadWithId {
                    content_id: id.clone(),
                    payload: payload.clone(),
                })
            })
            .collect())
    }

    fn get_shared_state(&self, content_id: &str) -> Result<Option<StreamSharedState>, StoreError> {
        self.check_read()?;
        Ok(match self.data.lock().content.get(content_id) {
            Some(StreamPayload::SharedState(state)) => Some(state.clone()),
            _ => None,
        })
    }

    fn get_all_sessions(&self) -> Result<Vec<String>, StoreError> {
        self.check_read()?;
        let mut ids: Vec<String> = self
            .data
            .lock()
            .journals
            .keys()
            .filter(|id| id.as_str() != HEAD_SESSION_ID)
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn read_session_metadata(&self) -> Result<HashMap<String, SessionMetadata>, StoreError> {
        self.check_read()?;
        Ok(self.data.lock().metadata.clone())
    }

    fn write_session_metadata(&self, metadata: &HashMap<String, SessionMetadata>) -> CommitResult {
        if self.commits_fail("session metadata") {
            return CommitResult::Failure;
        }
        self.data.lock().metadata = metadata.clone();
        CommitResult::Success
    }

    fn commit_content(&self, payloads: Vec<PayloadWithId>) -> CommitResult {
        if self.commits_fail("content") {
            return CommitResult::Failure;
        }
        let mut data = self.data.lock();
        for payload in payloads {
            data.content.insert(payload.content_id, payload.payload);
        }
        self.content_commits.fetch_add(1, Ordering::SeqCst);
        CommitResult::Success
    }

    fn commit_session(&self, session_id: &str, structures: Vec<StreamStructure>) -> CommitResult {
        if self.commits_fail("session") {
            return CommitResult::Failure;
        }
        self.data
            .lock()
            .journals
            .entry(session_id.to_string())
            .or_default()
            .extend(structures);
        CommitResult::Success
    }

    fn commit_semantic_properties(&self, properties: Vec<(String, Vec<u8>)>) -> CommitResult {
        if self.commits_fail("semantic properties") {
            return CommitResult::Failure;
        }
        let mut data = self.data.lock();
        for (content_id, bytes) in properties {
            data.semantic_properties.insert(content_id, bytes);
        }
        CommitResult::Success
    }

    fn remove_session(&self, session_id: &str) -> Result<(), StoreError> {
        if session_id == HEAD_SESSION_ID {
            warn!("refusing to remove the head journal");
            return Ok(());
        }
        match self.data.lock().journals.remove(session_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::SessionNotFound(session_id.to_string())),
        }
    }

    fn clear_head(&self) {
        info!("clearing head journal");
        self.data
            .lock()
            .journals
            .insert(HEAD_SESSION_ID.to_string(), Vec::new());
    }

    fn trigger_content_gc(
        &self,
        reserved: HashSet<String>,
        accessible: AccessibleContent,
        keep_shared_states: bool,
    ) -> Runnable {
        let data = Arc::clone(&self.data);
        Box::new(move || {
            let mut keep = reserved;
            keep.extend(accessible());
            let mut data = data.lock();
            let before = data.content.len();
            data.content.retain(|id, payload| {
                keep.contains(id)
                    || (keep_shared_states && matches!(payload, StreamPayload::SharedState(_)))
            });
            data.semantic_properties.retain(|id, _| keep.contains(id));
            debug!(
                removed = before - data.content.len(),
                kept = data.content.len(),
                "content garbage collected"
            );
        })
    }
}
