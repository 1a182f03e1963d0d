//! A single-consumer executor: runnables submitted to it run one at a time,
//! in submission order, on tokio's blocking pool.

use super::Runnable;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{error, trace};

/// Count of submitted-but-unfinished runnables, shared by every executor of
/// one queue so callers can wait for the whole queue to drain.
#[derive(Debug, Default)]
pub(crate) struct PendingWork {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingWork {
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once no work is pending. Work submitted by running work keeps
    /// the count above zero, so chains of tasks are waited for as a whole.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct Job {
    label: String,
    runnable: Runnable,
}

/// Sender half of one serial consumer.
pub(crate) struct SerialExecutor {
    name: &'static str,
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<PendingWork>,
}

impl SerialExecutor {
    /// Spawns the consumer loop on `handle`.
    pub(crate) fn spawn(name: &'static str, handle: &Handle, pending: Arc<PendingWork>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(consume(name, receiver, Arc::clone(&pending)));
        Self {
            name,
            sender,
            pending,
        }
    }

    pub(crate) fn submit(&self, label: String, runnable: Runnable) {
        self.pending.begin();
        if let Err(rejected) = self.sender.send(Job { label, runnable }) {
            self.pending.finish();
            error!(
                executor = self.name,
                label = %rejected.0.label,
                "executor shut down, dropping work"
            );
        }
    }
}

async fn consume(
    name: &'static str,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    pending: Arc<PendingWork>,
) {
    while let Some(Job { label, runnable }) = receiver.recv().await {
        trace!(executor = name, label = %label, "running");
        if let Err(e) = tokio::task::spawn_blocking(runnable).await {
            error!(executor = name, label = %label, error = %e, "work panicked");
        }
        pending.finish();
    }
    trace!(executor = name, "executor stopped");
}
