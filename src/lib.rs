//! Feed session library
//!
//! This crate provides the in-memory content model behind a paginated feed
//! stream: the per-session model tree handed to the UI, the session cache
//! that keeps the canonical head session and its derived sessions in sync
//! with a persistent store, and the mutation path that fans a batch of
//! structural operations out to every live session.
//!
//! # Threading
//!
//! Mutations are expected to run on background work submitted through a
//! [`concurrent::TaskQueue`]. Observer callbacks are always posted to a
//! single [`concurrent::MainThreadRunner`], so observers never run
//! concurrently with each other.

use std::fmt;
use std::str::FromStr;

/// Configuration loading (TOML schema, XDG paths, defaults).
pub mod config;

/// Task queue, main-thread runner, and clock abstractions.
pub mod concurrent;

/// Error types shared across the crate.
pub mod error;

/// Logging initialization.
pub mod logging;

/// The model provider tree and everything it hands out to the UI.
pub mod model;

/// Observer list used by providers, features, and tokens.
pub mod observable;

/// Wire types for structural operations and payloads.
pub mod proto;

/// Session tracking, caching, and mutation fan-out.
pub mod session;

/// Persistent store interface and the in-memory implementation.
pub mod store;

pub use error::{InternalErrorReporter, InternalFeedError, RequestError, StoreError};

/// Reason a refresh was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestReason {
    /// No reason recorded.
    #[default]
    Unknown,
    /// The user pulled to refresh.
    ManualRefresh,
    /// The embedding application asked for fresh content.
    HostRequested,
    /// The stream was opened and had no content to show.
    OpenWithoutContent,
    /// Content was cleared and must be fetched again.
    ClearAll,
}

impl fmt::Display for RequestReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestReason::Unknown => "unknown",
            RequestReason::ManualRefresh => "manual-refresh",
            RequestReason::HostRequested => "host-requested",
            RequestReason::OpenWithoutContent => "open-without-content",
            RequestReason::ClearAll => "clear-all",
        };
        write!(f, "{}", s)
    }
}

/// Error type for parsing a [`RequestReason`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequestReasonError(pub String);

impl fmt::Display for ParseRequestReasonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request reason: {}", self.0)
    }
}

impl std::error::Error for ParseRequestReasonError {}

impl FromStr for RequestReason {
    type Err = ParseRequestReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(RequestReason::Unknown),
            "manual-refresh" => Ok(RequestReason::ManualRefresh),
            "host-requested" => Ok(RequestReason::HostRequested),
            "open-without-content" => Ok(RequestReason::OpenWithoutContent),
            "clear-all" => Ok(RequestReason::ClearAll),
            _ => Err(ParseRequestReasonError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_reason_round_trips_through_display() {
        for reason in [
            RequestReason::Unknown,
            RequestReason::ManualRefresh,
            RequestReason::HostRequested,
            RequestReason::OpenWithoutContent,
            RequestReason::ClearAll,
        ] {
            let parsed: RequestReason = reason.to_string().parse().expect("should parse");
            assert_eq!(parsed, reason);
        }
    }

    #[test]
    fn request_reason_parse_is_case_insensitive() {
        assert_eq!(
            "Manual-Refresh".parse::<RequestReason>(),
            Ok(RequestReason::ManualRefresh)
        );
    }

    #[test]
    fn request_reason_rejects_unknown_strings() {
        let err = "sideways".parse::<RequestReason>().unwrap_err();
        assert_eq!(err.to_string(), "invalid request reason: sideways");
    }
}
