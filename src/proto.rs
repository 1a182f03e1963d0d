//! Wire types for the feed stream.
//!
//! A response from the server is a list of [`StreamDataOperation`]s. Each one
//! carries a [`StreamStructure`] (where the content sits in the tree) and, for
//! appends, a [`StreamPayload`] (what the content is). Structures are what the
//! session journals persist; payloads live in the content store.

use serde::{Deserialize, Serialize};

/// Session id of the canonical head session.
pub const HEAD_SESSION_ID: &str = "$HEAD";

/// Prefix of generated session ids.
pub const SESSION_ID_PREFIX: &str = "_session:";

/// Structural operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// Append a new child, or update an existing one in place.
    UpdateOrAppend,
    /// Remove a child from its parent.
    Remove,
    /// Drop everything. Only meaningful for the head session.
    ClearAll,
    /// Record that the session depends on content without placing it in the tree.
    RequiredContent,
}

/// One structural change to the stream tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamStructure {
    /// Content id of the node being changed.
    pub content_id: String,
    /// Parent content id; absent only for the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_content_id: Option<String>,
    /// What to do with the node.
    pub operation: Operation,
}

impl StreamStructure {
    /// Builds an `UPDATE_OR_APPEND` structure.
    pub fn append(content_id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            content_id: content_id.into(),
            parent_content_id: parent.map(str::to_string),
            operation: Operation::UpdateOrAppend,
        }
    }

    /// Builds a `REMOVE` structure.
    pub fn remove(content_id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            content_id: content_id.into(),
            parent_content_id: parent.map(str::to_string),
            operation: Operation::Remove,
        }
    }

    /// Builds a `CLEAR_ALL` structure.
    pub fn clear_all() -> Self {
        Self {
            content_id: String::new(),
            parent_content_id: None,
            operation: Operation::ClearAll,
        }
    }

    /// Builds a `REQUIRED_CONTENT` structure.
    pub fn required(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            parent_content_id: None,
            operation: Operation::RequiredContent,
        }
    }

    /// Returns `true` when the structure names a parent.
    pub fn has_parent(&self) -> bool {
        self.parent_content_id.is_some()
    }
}

/// Feature content. The body is opaque to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFeature {
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A continuation token for fetching the next page below `parent_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamToken {
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Server cursor. Empty for locally generated tokens.
    #[serde(default)]
    pub next_page_token: String,
}

/// Shared state referenced by features but stored once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSharedState {
    pub content_id: String,
    #[serde(default)]
    pub data: String,
}

/// Payload attached to an `UPDATE_OR_APPEND`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPayload {
    Feature(StreamFeature),
    Token(StreamToken),
    SharedState(StreamSharedState),
    SemanticProperties {
        content_id: String,
        #[serde(default)]
        data: Vec<u8>,
    },
}

/// A payload together with the content id it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadWithId {
    pub content_id: String,
    pub payload: StreamPayload,
}

/// One entry of a server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDataOperation {
    pub structure: StreamStructure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<StreamPayload>,
}

impl StreamDataOperation {
    /// Appends a feature under `parent`.
    pub fn feature(content_id: &str, parent: Option<&str>) -> Self {
        Self {
            structure: StreamStructure::append(content_id, parent),
            payload: Some(StreamPayload::Feature(StreamFeature {
                content_id: content_id.to_string(),
                parent_id: parent.map(str::to_string),
                content: None,
            })),
        }
    }

    /// Appends a continuation token under `parent`.
    pub fn token(content_id: &str, parent: &str, next_page_token: &str) -> Self {
        Self {
            structure: StreamStructure::append(content_id, Some(parent)),
            payload: Some(StreamPayload::Token(StreamToken {
                content_id: content_id.to_string(),
                parent_id: Some(parent.to_string()),
                next_page_token: next_page_token.to_string(),
            })),
        }
    }

    /// Wraps a structure that carries no payload.
    pub fn structure_only(structure: StreamStructure) -> Self {
        Self {
            structure,
            payload: None,
        }
    }
}

/// A full response: the operations plus the schema version they were written with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub operations: Vec<StreamDataOperation>,
    #[serde(default)]
    pub schema_version: i32,
}

/// Opaque context from the UI that is echoed back in session callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UiContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl UiContext {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

/// Describes where a mutation came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationContext {
    /// Set when the mutation is the response to a continuation token.
    pub continuation_token: Option<StreamToken>,
    /// Session that issued the request, if any.
    pub requesting_session_id: Option<String>,
    pub ui_context: UiContext,
}

impl MutationContext {
    /// Context for a response to `token`, requested by `session_id`.
    pub fn for_token(token: StreamToken, session_id: &str) -> Self {
        Self {
            continuation_token: Some(token),
            requesting_session_id: Some(session_id.to_string()),
            ui_context: UiContext::default(),
        }
    }

    /// Context for a request issued by `session_id` without a token.
    pub fn for_session(session_id: &str, ui_context: UiContext) -> Self {
        Self {
            continuation_token: None,
            requesting_session_id: Some(session_id.to_string()),
            ui_context,
        }
    }

    pub fn with_ui_context(ui_context: UiContext) -> Self {
        Self {
            ui_context,
            ..Self::default()
        }
    }
}

/// Per-session metadata persisted alongside the session journals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Milliseconds since the epoch when the session was created.
    pub creation_time_millis: i64,
    /// Milliseconds since the epoch when content was last added.
    pub last_added_time_millis: i64,
    pub schema_version: i32,
}

impl SessionMetadata {
    pub fn new(creation_time_millis: i64, schema_version: i32) -> Self {
        Self {
            creation_time_millis,
            last_added_time_millis: creation_time_millis,
            schema_version,
        }
    }
}
