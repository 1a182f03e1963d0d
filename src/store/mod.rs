//! Persistent store interface.
//!
//! The store keeps three things: content payloads by content id, one journal
//! of structural operations per session (head included), and the session
//! metadata map. Writes go through small builders that are committed in one
//! call.

mod memory;

pub use memory::InMemoryStore;

use crate::concurrent::Runnable;
use crate::error::StoreError;
use crate::proto::{PayloadWithId, SessionMetadata, StreamSharedState, StreamStructure};
use std::collections::{HashMap, HashSet};

/// Outcome of committing a store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Success,
    Failure,
}

impl CommitResult {
    pub fn is_success(self) -> bool {
        self == CommitResult::Success
    }
}

/// Returns the ids that must survive a content garbage collection.
pub type AccessibleContent = Box<dyn FnOnce() -> HashSet<String> + Send + 'static>;

/// Backing storage for content and session journals.
pub trait Store: Send + Sync {
    /// The journal of `session_id`. Head always exists, possibly empty.
    fn get_stream_structures(&self, session_id: &str) -> Result<Vec<StreamStructure>, StoreError>;

    /// Payloads for the ids that have one. Missing ids are skipped.
    fn get_payloads(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>, StoreError>;

    fn get_shared_state(&self, content_id: &str) -> Result<Option<StreamSharedState>, StoreError>;

    /// Ids of every non-head session journal.
    fn get_all_sessions(&self) -> Result<Vec<String>, StoreError>;

    fn read_session_metadata(&self) -> Result<HashMap<String, SessionMetadata>, StoreError>;

    fn write_session_metadata(&self, metadata: &HashMap<String, SessionMetadata>) -> CommitResult;

    fn commit_content(&self, payloads: Vec<PayloadWithId>) -> CommitResult;

    /// Appends `structures` to the journal of `session_id`, creating it if needed.
    fn commit_session(&self, session_id: &str, structures: Vec<StreamStructure>) -> CommitResult;

    fn commit_semantic_properties(&self, properties: Vec<(String, Vec<u8>)>) -> CommitResult;

    fn remove_session(&self, session_id: &str) -> Result<(), StoreError>;

    /// Empties the head journal.
    fn clear_head(&self);

    /// Builds a task that drops content outside `reserved` and the ids
    /// `accessible` returns when the task runs. Shared states survive when
    /// `keep_shared_states` is set.
    fn trigger_content_gc(
        &self,
        reserved: HashSet<String>,
        accessible: AccessibleContent,
        keep_shared_states: bool,
    ) -> Runnable;
}

/// Builder entry points available on every [`Store`].
pub trait StoreExt: Store {
    fn edit_content(&self) -> ContentMutation<'_, Self> {
        ContentMutation {
            store: self,
            payloads: Vec::new(),
        }
    }

    fn edit_session(&self, session_id: &str) -> SessionMutation<'_, Self> {
        SessionMutation {
            store: self,
            session_id: session_id.to_string(),
            structures: Vec::new(),
        }
    }

    fn edit_semantic_properties(&self) -> SemanticPropertiesMutation<'_, Self> {
        SemanticPropertiesMutation {
            store: self,
            properties: Vec::new(),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Payloads to write.
pub struct ContentMutation<'a, S: Store + ?Sized> {
    store: &'a S,
    payloads: Vec<PayloadWithId>,
}

impl<S: Store + ?Sized> ContentMutation<'_, S> {
    pub fn add(&mut self, payload: PayloadWithId) -> &mut Self {
        self.payloads.push(payload);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn commit(self) -> CommitResult {
        self.store.commit_content(self.payloads)
    }
}

/// Structures to append to one session journal.
pub struct SessionMutation<'a, S: Store + ?Sized> {
    store: &'a S,
    session_id: String,
    structures: Vec<StreamStructure>,
}

impl<S: Store + ?Sized> SessionMutation<'_, S> {
    pub fn add(&mut self, structure: StreamStructure) -> &mut Self {
        self.structures.push(structure);
        self
    }

    pub fn commit(self) -> CommitResult {
        self.store.commit_session(&self.session_id, self.structures)
    }
}

/// Semantic properties to write.
pub struct SemanticPropertiesMutation<'a, S: Store + ?Sized> {
    store: &'a S,
    properties: Vec<(String, Vec<u8>)>,
}

impl<S: Store + ?Sized> SemanticPropertiesMutation<'_, S> {
    pub fn add(&mut self, content_id: impl Into<String>, data: Vec<u8>) -> &mut Self {
        self.properties.push((content_id.into(), data));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn commit(self) -> CommitResult {
        self.store.commit_semantic_properties(self.properties)
    }
}
