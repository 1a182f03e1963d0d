//! Deterministic stand-ins for the queue and runner.
//!
//! Both fakes either run work inline (`immediate`) or hold it until the test
//! drains it explicitly (`queued`). Work submitted while draining is drained
//! too.

use super::{MainThreadRunner, Runnable, Task, TaskQueue, TaskType};
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Immediate,
    Queued,
}

/// In-process [`TaskQueue`] that records what it ran.
pub struct FakeTaskQueue {
    mode: Mode,
    queue: Mutex<VecDeque<(Task, TaskType, Runnable)>>,
    executed: Mutex<Vec<(Task, TaskType)>>,
}

impl FakeTaskQueue {
    /// Runs each task as soon as it is submitted.
    pub fn immediate() -> Self {
        Self::with_mode(Mode::Immediate)
    }

    /// Holds tasks until [`FakeTaskQueue::run_all_tasks`].
    pub fn queued() -> Self {
        Self::with_mode(Mode::Queued)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            queue: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Runs queued tasks in submission order until none remain. Returns how
    /// many ran.
    pub fn run_all_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it: tasks may submit more tasks.
            let next = self.queue.lock().pop_front();
            let Some((task, task_type, runnable)) = next else {
                return ran;
            };
            self.run(task, task_type, runnable);
            ran += 1;
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.lock().len()
    }

    /// Tasks run so far, in order.
    pub fn executed_tasks(&self) -> Vec<Task> {
        self.executed.lock().iter().map(|(task, _)| *task).collect()
    }

    pub fn executed_with_types(&self) -> Vec<(Task, TaskType)> {
        self.executed.lock().clone()
    }

    pub fn has_executed(&self, task: Task) -> bool {
        self.executed.lock().iter().any(|(t, _)| *t == task)
    }

    fn run(&self, task: Task, task_type: TaskType, runnable: Runnable) {
        self.executed.lock().push((task, task_type));
        runnable();
    }
}

impl TaskQueue for FakeTaskQueue {
    fn execute(&self, task: Task, task_type: TaskType, runnable: Runnable) {
        match self.mode {
            Mode::Immediate => self.run(task, task_type, runnable),
            Mode::Queued => self.queue.lock().push_back((task, task_type, runnable)),
        }
    }
}

/// In-process [`MainThreadRunner`].
pub struct FakeMainThreadRunner {
    mode: Mode,
    queue: Mutex<VecDeque<(String, Runnable)>>,
    completed: Mutex<Vec<String>>,
}

impl FakeMainThreadRunner {
    pub fn immediate() -> Self {
        Self::with_mode(Mode::Immediate)
    }

    pub fn queued() -> Self {
        Self::with_mode(Mode::Queued)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            queue: Mutex::new(VecDeque::new()),
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Runs posted callbacks until none remain. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some((label, runnable)) = next else {
                return ran;
            };
            self.run(label, runnable);
            ran += 1;
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Labels of callbacks run so far, in order.
    pub fn completed_labels(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    fn run(&self, label: String, runnable: Runnable) {
        self.completed.lock().push(label);
        runnable();
    }
}

impl MainThreadRunner for FakeMainThreadRunner {
    fn execute(&self, label: &str, runnable: Runnable) {
        match self.mode {
            Mode::Immediate => self.run(label.to_string(), runnable),
            Mode::Queued => self.queue.lock().push_back((label.to_string(), runnable)),
        }
    }
}
