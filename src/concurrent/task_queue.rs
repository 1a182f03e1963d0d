//! Tokio-backed [`TaskQueue`] and [`MainThreadRunner`].

use super::serial::{PendingWork, SerialExecutor};
use super::{MainThreadRunner, Runnable, Task, TaskQueue, TaskType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// One serial consumer per [`TaskType`].
///
/// Work of one type runs strictly in submission order. Work of different
/// types runs concurrently on the blocking pool.
pub struct TokioTaskQueue {
    executors: HashMap<TaskType, SerialExecutor>,
    pending: Arc<PendingWork>,
}

impl TokioTaskQueue {
    /// Creates the queue, spawning its consumers on `handle`.
    pub fn new(handle: &Handle) -> Self {
        let pending = Arc::new(PendingWork::default());
        let executors = TaskType::ALL
            .iter()
            .map(|task_type| {
                let name = task_type_name(*task_type);
                (
                    *task_type,
                    SerialExecutor::spawn(name, handle, Arc::clone(&pending)),
                )
            })
            .collect();
        Self { executors, pending }
    }

    /// Number of tasks submitted but not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.pending.pending()
    }

    /// Waits until every submitted task, including tasks they submit, has run.
    pub async fn wait_until_idle(&self) {
        self.pending.wait_idle().await;
    }
}

impl TaskQueue for TokioTaskQueue {
    fn execute(&self, task: Task, task_type: TaskType, runnable: Runnable) {
        debug!(%task, ?task_type, "queueing task");
        if let Some(executor) = self.executors.get(&task_type) {
            executor.submit(task.to_string(), runnable);
        }
    }
}

fn task_type_name(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Immediate => "immediate",
        TaskType::UserFacing => "user-facing",
        TaskType::Background => "background",
        TaskType::HeadReset => "head-reset",
        TaskType::HeadInvalidate => "head-invalidate",
    }
}

/// Delivers observer callbacks from one serial consumer.
pub struct TokioMainThreadRunner {
    executor: SerialExecutor,
    pending: Arc<PendingWork>,
}

impl TokioMainThreadRunner {
    pub fn new(handle: &Handle) -> Self {
        let pending = Arc::new(PendingWork::default());
        Self {
            executor: SerialExecutor::spawn("main", handle, Arc::clone(&pending)),
            pending,
        }
    }

    /// Waits until every posted callback has run.
    pub async fn wait_until_idle(&self) {
        self.pending.wait_idle().await;
    }
}

impl MainThreadRunner for TokioMainThreadRunner {
    fn execute(&self, label: &str, runnable: Runnable) {
        self.executor.submit(label.to_string(), runnable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn same_type_tasks_run_in_submission_order() {
        let queue = TokioTaskQueue::new(&Handle::current());
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = Arc::clone(&order);
            queue.execute(
                Task::PersistSessionMutation,
                TaskType::Background,
                Box::new(move || {
                    if i % 3 == 0 {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    order.lock().push(i);
                }),
            );
        }
        queue.wait_until_idle().await;
        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn different_types_do_not_block_each_other() {
        let queue = TokioTaskQueue::new(&Handle::current());
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let done = Arc::new(Mutex::new(Vec::new()));

        // The background task waits for a signal that only the user-facing
        // task sends, so this only finishes if the two run concurrently.
        let done_bg = Arc::clone(&done);
        queue.execute(
            Task::GarbageCollectContent,
            TaskType::Background,
            Box::new(move || {
                rx.recv_timeout(Duration::from_secs(5)).ok();
                done_bg.lock().push("background");
            }),
        );
        let done_uf = Arc::clone(&done);
        queue.execute(
            Task::GetNewSession,
            TaskType::UserFacing,
            Box::new(move || {
                done_uf.lock().push("user-facing");
                tx.send(()).ok();
            }),
        );

        tokio::time::timeout(Duration::from_secs(10), queue.wait_until_idle())
            .await
            .expect("queue should drain");
        assert_eq!(*done.lock(), vec!["user-facing", "background"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wait_until_idle_covers_chained_tasks() {
        let queue = Arc::new(TokioTaskQueue::new(&Handle::current()));
        let ran = Arc::new(Mutex::new(false));

        let inner_queue = Arc::clone(&queue);
        let inner_ran = Arc::clone(&ran);
        queue.execute(
            Task::SessionManagerMutation,
            TaskType::Immediate,
            Box::new(move || {
                inner_queue.execute(
                    Task::PersistSessionMutation,
                    TaskType::Background,
                    Box::new(move || *inner_ran.lock() = true),
                );
            }),
        );

        queue.wait_until_idle().await;
        assert!(*ran.lock());
        assert_eq!(queue.pending_tasks(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn main_thread_runner_is_serial() {
        let runner = TokioMainThreadRunner::new(&Handle::current());
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = Arc::clone(&order);
            runner.execute("notify", Box::new(move || order.lock().push(i)));
        }
        runner.wait_until_idle().await;
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_task_does_not_stop_the_queue() {
        let queue = TokioTaskQueue::new(&Handle::current());
        let ran = Arc::new(Mutex::new(false));
        queue.execute(
            Task::Reset,
            TaskType::HeadReset,
            Box::new(|| panic!("boom")),
        );
        let ran_after = Arc::clone(&ran);
        queue.execute(
            Task::Reset,
            TaskType::HeadReset,
            Box::new(move || *ran_after.lock() = true),
        );
        queue.wait_until_idle().await;
        assert!(*ran.lock());
    }
}
