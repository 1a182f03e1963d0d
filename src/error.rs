//! Error types shared across the crate.

use thiserror::Error;

/// Errors returned by a [`crate::store::Store`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The named session journal does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The backing storage could not be read.
    #[error("Failed to read from store: {0}")]
    ReadFailed(String),

    /// A mutation could not be committed.
    #[error("Failed to commit {what} to store")]
    CommitFailed {
        /// Which mutation failed (content, session, metadata, ...).
        what: &'static str,
    },
}

/// Failure delivered in place of a [`crate::proto::Model`] by the request layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Internal failures worth reporting to the host, even though they are
/// recovered from locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalFeedError {
    RootNotBoundToFeature,
    ContentStorageCommitFailure,
    SemanticPropertiesCommitFailure,
    SessionStorageCommitFailure,
    SessionMetadataCommitFailure,
    ModelChildBindFailure,
}

/// Sink for [`InternalFeedError`]s.
pub trait InternalErrorReporter: Send + Sync {
    fn on_internal_error(&self, error: InternalFeedError);
}

/// Reporter that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl InternalErrorReporter for TracingErrorReporter {
    fn on_internal_error(&self, error: InternalFeedError) {
        tracing::error!(?error, "internal feed error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_session_not_found() {
        let err = StoreError::SessionNotFound("_session:abc".to_string());
        assert_eq!(err.to_string(), "Session not found: _session:abc");
    }

    #[test]
    fn display_commit_failed_names_the_mutation() {
        let err = StoreError::CommitFailed { what: "content" };
        let msg = err.to_string();
        assert!(msg.contains("content"), "CommitFailed should name the mutation");
    }

    #[test]
    fn display_request_errors() {
        assert!(RequestError::Network("timeout".to_string())
            .to_string()
            .contains("timeout"));
        assert!(RequestError::InvalidResponse("empty".to_string())
            .to_string()
            .starts_with("Invalid response"));
    }
}
