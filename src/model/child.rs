//! Nodes of the model tree.
//!
//! A [`ModelChild`] is created unbound when its structure is applied, then
//! bound to a feature or token once its payload has been read from the
//! store. Identity is the node itself: rebinding an existing child (an
//! update) keeps the same feature and its observers.

use super::cursor::ModelCursor;
use super::observer::{FeatureChangeObserver, TokenCompletedObserver};
use crate::observable::Observable;
use crate::proto::{StreamFeature, StreamToken};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::warn;

/// Hands out cursors over a parent's children. Implemented by the provider.
pub(crate) trait CursorSource: Send + Sync {
    fn provide_cursor(&self, parent_id: &str) -> ModelCursor;
}

/// Cursor source for children that are not attached to any provider.
#[cfg(test)]
struct NoCursorSource;

#[cfg(test)]
impl CursorSource for NoCursorSource {
    fn provide_cursor(&self, parent_id: &str) -> ModelCursor {
        ModelCursor::empty(parent_id)
    }
}

/// What a child is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildType {
    Unbound,
    Feature,
    Token,
}

enum Binding {
    Unbound,
    Feature(ModelFeature),
    Token(ModelToken),
}

struct ChildNode {
    content_id: String,
    parent_id: Option<String>,
    binding: Mutex<Binding>,
    cursors: Weak<dyn CursorSource>,
}

/// A node in a provider's tree. Cheap to clone; clones share the node.
#[derive(Clone)]
pub struct ModelChild(Arc<ChildNode>);

impl ModelChild {
    pub(crate) fn new(
        content_id: impl Into<String>,
        parent_id: Option<String>,
        cursors: Weak<dyn CursorSource>,
    ) -> Self {
        Self(Arc::new(ChildNode {
            content_id: content_id.into(),
            parent_id,
            binding: Mutex::new(Binding::Unbound),
            cursors,
        }))
    }

    /// A child with no provider behind it. Its feature cursors are always empty.
    #[cfg(test)]
    pub(crate) fn detached(content_id: impl Into<String>, parent_id: Option<&str>) -> Self {
        let cursors: Weak<dyn CursorSource> = Weak::<NoCursorSource>::new();
        Self::new(content_id, parent_id.map(str::to_string), cursors)
    }

    pub fn content_id(&self) -> &str {
        &self.0.content_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.0.parent_id.as_deref()
    }

    pub fn has_parent(&self) -> bool {
        self.0.parent_id.is_some()
    }

    pub fn child_type(&self) -> ChildType {
        match &*self.0.binding.lock() {
            Binding::Unbound => ChildType::Unbound,
            Binding::Feature(_) => ChildType::Feature,
            Binding::Token(_) => ChildType::Token,
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.child_type() == ChildType::Unbound
    }

    /// The bound feature, if this child is a feature.
    pub fn feature(&self) -> Option<ModelFeature> {
        match &*self.0.binding.lock() {
            Binding::Feature(feature) => Some(feature.clone()),
            _ => None,
        }
    }

    /// The bound token, if this child is a token.
    pub fn token(&self) -> Option<ModelToken> {
        match &*self.0.binding.lock() {
            Binding::Token(token) => Some(token.clone()),
            _ => None,
        }
    }

    /// Binds (or rebinds) this child to a feature. Returns `false` if the
    /// child is already a token.
    pub(crate) fn bind_feature(&self, stream_feature: StreamFeature) -> bool {
        let mut binding = self.0.binding.lock();
        match &*binding {
            Binding::Feature(existing) => {
                existing.set_stream_feature(stream_feature);
                true
            }
            Binding::Unbound => {
                *binding = Binding::Feature(ModelFeature::new(
                    stream_feature,
                    Weak::clone(&self.0.cursors),
                ));
                true
            }
            Binding::Token(_) => {
                warn!(
                    content_id = %self.0.content_id,
                    "cannot bind a feature to a child already bound to a token"
                );
                false
            }
        }
    }

    /// Binds this child to a token. Returns `false` if the child is already
    /// bound.
    pub(crate) fn bind_token(&self, stream_token: StreamToken, synthetic: bool) -> bool {
        let mut binding = self.0.binding.lock();
        match &*binding {
            Binding::Unbound => {
                *binding = Binding::Token(ModelToken::new(stream_token, synthetic));
                true
            }
            _ => {
                warn!(content_id = %self.0.content_id, "child is already bound");
                false
            }
        }
    }

    /// Returns `true` when both handles refer to the same node.
    pub fn same_node(&self, other: &ModelChild) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ModelChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelChild")
            .field("content_id", &self.0.content_id)
            .field("parent_id", &self.0.parent_id)
            .field("type", &self.child_type())
            .finish()
    }
}

struct FeatureNode {
    stream_feature: Mutex<StreamFeature>,
    observers: Observable<dyn FeatureChangeObserver>,
    cursors: Weak<dyn CursorSource>,
}

/// A child bound to feature content.
#[derive(Clone)]
pub struct ModelFeature(Arc<FeatureNode>);

impl ModelFeature {
    fn new(stream_feature: StreamFeature, cursors: Weak<dyn CursorSource>) -> Self {
        Self(Arc::new(FeatureNode {
            stream_feature: Mutex::new(stream_feature),
            observers: Observable::new(),
            cursors,
        }))
    }

    pub fn stream_feature(&self) -> StreamFeature {
        self.0.stream_feature.lock().clone()
    }

    fn set_stream_feature(&self, stream_feature: StreamFeature) {
        *self.0.stream_feature.lock() = stream_feature;
    }

    /// A new cursor over this feature's current children.
    pub fn cursor(&self) -> ModelCursor {
        let content_id = self.0.stream_feature.lock().content_id.clone();
        match self.0.cursors.upgrade() {
            Some(source) => source.provide_cursor(&content_id),
            None => ModelCursor::empty(&content_id),
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn FeatureChangeObserver>) {
        self.0.observers.register(observer);
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn FeatureChangeObserver>) -> bool {
        self.0.observers.unregister(observer)
    }

    pub(crate) fn observers_to_notify(&self) -> Vec<Arc<dyn FeatureChangeObserver>> {
        self.0.observers.observers_to_notify()
    }

    pub fn same_feature(&self, other: &ModelFeature) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ModelFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelFeature")
            .field(&self.0.stream_feature.lock().content_id)
            .finish()
    }
}

struct TokenNode {
    stream_token: StreamToken,
    synthetic: bool,
    observers: Observable<dyn TokenCompletedObserver>,
}

/// A child bound to a continuation token.
#[derive(Clone)]
pub struct ModelToken(Arc<TokenNode>);

impl ModelToken {
    fn new(stream_token: StreamToken, synthetic: bool) -> Self {
        Self(Arc::new(TokenNode {
            stream_token,
            synthetic,
            observers: Observable::new(),
        }))
    }

    pub fn stream_token(&self) -> &StreamToken {
        &self.0.stream_token
    }

    /// Locally generated tokens page through content that is already loaded.
    pub fn is_synthetic(&self) -> bool {
        self.0.synthetic
    }

    pub fn register_observer(&self, observer: Arc<dyn TokenCompletedObserver>) {
        self.0.observers.register(observer);
    }

    pub fn unregister_observer(&self, observer: &Arc<dyn TokenCompletedObserver>) -> bool {
        self.0.observers.unregister(observer)
    }

    pub(crate) fn observers_to_notify(&self) -> Vec<Arc<dyn TokenCompletedObserver>> {
        self.0.observers.observers_to_notify()
    }
}

impl fmt::Debug for ModelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelToken")
            .field("content_id", &self.0.stream_token.content_id)
            .field("synthetic", &self.0.synthetic)
            .finish()
    }
}
