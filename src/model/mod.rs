//! The in-memory model handed to the UI.
//!
//! A [`FeedModelProvider`] holds one session's content as a tree of
//! [`ModelChild`] nodes. It is edited through [`ModelMutation`]s committed
//! from background tasks and reports what changed through observers.

mod binder;
mod change;
mod child;
mod cursor;
mod error;
mod mutation;
mod observer;
mod provider;
mod remove_tracking;

pub use binder::{ModelChildBinder, StoreChildBinder};
pub use change::{ChildChanges, FeatureChange};
pub use child::{ChildType, ModelChild, ModelFeature, ModelToken};
pub use cursor::ModelCursor;
pub use error::{ErrorType, ModelError};
pub use mutation::{Change, ModelMutation};
pub use observer::{
    ContentChangedListener, FeatureChangeObserver, ModelProviderObserver, TokenCompleted,
    TokenCompletedObserver,
};
pub use provider::{
    FeedModelProvider, FeedModelProviderFactory, ModelProvider, ModelProviderDump, PagingConfig,
    ProviderDeps, ProviderState, SessionManagerApi, StructureFilter, SYNTHETIC_TOKEN_PREFIX,
};
pub use remove_tracking::{MatchingRemoveTracking, RemoveTracking, RemoveTrackingFactory};
