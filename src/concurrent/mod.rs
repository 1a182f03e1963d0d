//! Scheduling abstractions.
//!
//! Model and session mutations are submitted to a [`TaskQueue`], which keeps
//! submission order per [`TaskType`] while letting different types run
//! concurrently. Observer callbacks go through a [`MainThreadRunner`], a
//! single serial consumer standing in for the UI thread.

use std::fmt;

mod clock;
mod fake;
mod serial;
mod task_queue;

pub use clock::{Clock, FakeClock, SystemClock};
pub use fake::{FakeMainThreadRunner, FakeTaskQueue};
pub use task_queue::{TokioMainThreadRunner, TokioTaskQueue};

/// A unit of work handed to a queue or runner.
pub type Runnable = Box<dyn FnOnce() + Send + 'static>;

/// Ordering class of a queued task. Tasks of the same type run in submission
/// order; tasks of different types may interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Work that should run as soon as possible.
    Immediate,
    /// Work a user is waiting on (opening a session, revealing a page).
    UserFacing,
    /// Maintenance work (journal cleanup, garbage collection, session writes).
    Background,
    /// Resetting the head session.
    HeadReset,
    /// Invalidating sessions attached to head.
    HeadInvalidate,
}

impl TaskType {
    /// Every task type, one serial consumer each.
    pub const ALL: [TaskType; 5] = [
        TaskType::Immediate,
        TaskType::UserFacing,
        TaskType::Background,
        TaskType::HeadReset,
        TaskType::HeadInvalidate,
    ];
}

/// Label attached to queued work, used for logging and by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    CleanUpSessionJournals,
    DetachSession,
    GarbageCollectContent,
    GetExistingSession,
    GetNewSession,
    HandleSyntheticToken,
    HandleToken,
    InvalidateSession,
    PersistSessionMutation,
    RequestFailure,
    Reset,
    SessionManagerMutation,
    TriggerRefresh,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Task::CleanUpSessionJournals => "clean-up-session-journals",
            Task::DetachSession => "detach-session",
            Task::GarbageCollectContent => "garbage-collect-content",
            Task::GetExistingSession => "get-existing-session",
            Task::GetNewSession => "get-new-session",
            Task::HandleSyntheticToken => "handle-synthetic-token",
            Task::HandleToken => "handle-token",
            Task::InvalidateSession => "invalidate-session",
            Task::PersistSessionMutation => "persist-session-mutation",
            Task::RequestFailure => "request-failure",
            Task::Reset => "reset",
            Task::SessionManagerMutation => "session-manager-mutation",
            Task::TriggerRefresh => "trigger-refresh",
        };
        write!(f, "{}", s)
    }
}

/// Background work queue.
pub trait TaskQueue: Send + Sync {
    fn execute(&self, task: Task, task_type: TaskType, runnable: Runnable);
}

/// The single destination for observer callbacks.
pub trait MainThreadRunner: Send + Sync {
    fn execute(&self, label: &str, runnable: Runnable);
}
