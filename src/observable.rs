//! A small registry of observers.
//!
//! Callbacks are never invoked while the list lock is held: callers take a
//! snapshot with [`Observable::observers_to_notify`] and iterate that.

use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe list of observers of type `T`.
pub struct Observable<T: ?Sized> {
    observers: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Observable<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Adds an observer. Registering the same `Arc` twice is a no-op.
    pub fn register(&self, observer: Arc<T>) {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            tracing::debug!("observer already registered");
            return;
        }
        observers.push(observer);
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn unregister(&self, observer: &Arc<T>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        before != observers.len()
    }

    /// Snapshot of the current observers.
    pub fn observers_to_notify(&self) -> Vec<Arc<T>> {
        self.observers.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

impl<T: ?Sized> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("observer_count", &self.len())
            .finish()
    }
}
