//! Errors delivered to model observers.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kind of a [`ModelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Unknown,
    /// An initial request or refresh produced no content.
    NoCardsError,
    /// A continuation-token request failed.
    PaginationError,
    /// A synthetic token could not be resolved.
    SyntheticTokenError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorType::Unknown => "UNKNOWN",
            ErrorType::NoCardsError => "NO_CARDS_ERROR",
            ErrorType::PaginationError => "PAGINATION_ERROR",
            ErrorType::SyntheticTokenError => "SYNTHETIC_TOKEN_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// An error raised on a provider or on one of its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type} (token: {continuation_token:?})")]
pub struct ModelError {
    error_type: ErrorType,
    /// `next_page_token` of the token the error refers to.
    continuation_token: Option<String>,
}

impl ModelError {
    pub fn new(error_type: ErrorType, continuation_token: Option<String>) -> Self {
        Self {
            error_type,
            continuation_token,
        }
    }

    pub fn no_cards() -> Self {
        Self::new(ErrorType::NoCardsError, None)
    }

    pub fn pagination(next_page_token: impl Into<String>) -> Self {
        Self::new(ErrorType::PaginationError, Some(next_page_token.into()))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_type() {
        let err = ModelError::pagination("npt-1");
        assert!(err.to_string().starts_with("PAGINATION_ERROR"));
        assert_eq!(err.continuation_token(), Some("npt-1"));
    }

    #[test]
    fn no_cards_has_no_token() {
        let err = ModelError::no_cards();
        assert_eq!(err.error_type(), ErrorType::NoCardsError);
        assert!(err.continuation_token().is_none());
    }
}
