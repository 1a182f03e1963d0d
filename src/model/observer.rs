//! Observer traits. Every callback is delivered on the main-thread runner.

use super::change::FeatureChange;
use super::cursor::ModelCursor;
use super::error::ModelError;
use crate::proto::UiContext;

/// Lifecycle of a model provider.
pub trait ModelProviderObserver: Send + Sync {
    /// The provider finished its first population and is ready.
    fn on_session_start(&self, ui_context: &UiContext);

    /// The provider was invalidated. No further events follow.
    fn on_session_finished(&self, ui_context: &UiContext);

    fn on_error(&self, error: &ModelError);
}

/// Changes to one feature's content or children.
pub trait FeatureChangeObserver: Send + Sync {
    fn on_change(&self, change: &FeatureChange);
}

/// Outcome of handling a continuation token.
#[derive(Debug, Clone)]
pub struct TokenCompleted {
    cursor: ModelCursor,
}

impl TokenCompleted {
    pub(crate) fn new(cursor: ModelCursor) -> Self {
        Self { cursor }
    }

    /// Cursor over the children the token revealed.
    pub fn cursor(&self) -> &ModelCursor {
        &self.cursor
    }
}

pub trait TokenCompletedObserver: Send + Sync {
    fn on_token_completed(&self, completed: &TokenCompleted);

    fn on_error(&self, error: &ModelError);
}

/// Notified when head receives new content.
pub trait ContentChangedListener: Send + Sync {
    fn on_content_changed(&self);
}
