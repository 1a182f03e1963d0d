//! Change records delivered to [`super::FeatureChangeObserver`]s.

use super::child::{ModelChild, ModelFeature};

/// Children appended to and removed from one parent during a mutation.
#[derive(Debug, Clone, Default)]
pub struct ChildChanges {
    pub appended: Vec<ModelChild>,
    pub removed: Vec<ModelChild>,
}

impl ChildChanges {
    pub fn is_empty(&self) -> bool {
        self.appended.is_empty() && self.removed.is_empty()
    }
}

/// Everything that changed about one existing feature in an update.
#[derive(Debug, Clone)]
pub struct FeatureChange {
    content_id: String,
    feature: ModelFeature,
    feature_changed: bool,
    child_changes: ChildChanges,
}

impl FeatureChange {
    pub(crate) fn new(content_id: impl Into<String>, feature: ModelFeature) -> Self {
        Self {
            content_id: content_id.into(),
            feature,
            feature_changed: false,
            child_changes: ChildChanges::default(),
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn model_feature(&self) -> &ModelFeature {
        &self.feature
    }

    /// `true` when the feature's own content was rebound.
    pub fn is_feature_changed(&self) -> bool {
        self.feature_changed
    }

    pub fn child_changes(&self) -> &ChildChanges {
        &self.child_changes
    }

    pub(crate) fn set_feature_changed(&mut self) {
        self.feature_changed = true;
    }

    pub(crate) fn append_child(&mut self, child: ModelChild) {
        self.child_changes.appended.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: ModelChild) {
        self.child_changes.removed.push(child);
    }
}
