//! Collecting features as they are removed from the tree.

use crate::proto::{MutationContext, StreamFeature};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives every feature in the removed subtrees of one mutation.
pub trait RemoveTracking: Send + Sync {
    fn filter_stream_feature(&self, feature: &StreamFeature);

    /// Called on the main-thread runner once the mutation is applied.
    fn trigger_consumer_update(&self);
}

/// Creates a [`RemoveTracking`] for mutations that remove content. Returning
/// `None` disables tracking for that mutation.
pub trait RemoveTrackingFactory: Send + Sync {
    fn create(&self, context: &MutationContext) -> Option<Arc<dyn RemoveTracking>>;
}

type Matcher<T> = Box<dyn Fn(&StreamFeature) -> Option<T> + Send + Sync>;
type Consumer<T> = Box<dyn Fn(Vec<T>) + Send + Sync>;

/// Extracts a `T` from each removed feature the matcher accepts and hands
/// the batch to the consumer.
pub struct MatchingRemoveTracking<T> {
    matcher: Matcher<T>,
    consumer: Consumer<T>,
    matches: Mutex<Vec<T>>,
}

impl<T: Send> MatchingRemoveTracking<T> {
    pub fn new(
        matcher: impl Fn(&StreamFeature) -> Option<T> + Send + Sync + 'static,
        consumer: impl Fn(Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            matcher: Box::new(matcher),
            consumer: Box::new(consumer),
            matches: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Send> RemoveTracking for MatchingRemoveTracking<T> {
    fn filter_stream_feature(&self, feature: &StreamFeature) {
        if let Some(found) = (self.matcher)(feature) {
            self.matches.lock().push(found);
        }
    }

    fn trigger_consumer_update(&self) {
        let matches = std::mem::take(&mut *self.matches.lock());
        (self.consumer)(matches);
    }
}
