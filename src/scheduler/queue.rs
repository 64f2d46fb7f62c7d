//! Priority work queues backing the scheduler (C2).
//!
//! Grounded on `optimized_thread_pool.hpp::WorkQueue`: a per-worker queue
//! holding four priority buckets plus a FIFO ordering within each bucket, and
//! a structurally identical global overflow queue. The original's single
//! `priority_queue<Task>` (binary heap, tie-broken arbitrarily) is replaced
//! here with four `VecDeque`s so that same-priority FIFO ordering
//! (spec.md §4.2: "ties FIFO by enqueue time") falls out of the data
//! structure instead of a custom `Ord` impl.

use super::task::{Priority, Task};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

const PRIORITY_LEVELS: usize = 4;

fn bucket(priority: Priority) -> usize {
    priority as usize
}

#[derive(Default)]
struct Buckets {
    lanes: [VecDeque<Task>; PRIORITY_LEVELS],
}

impl Buckets {
    fn push(&mut self, task: Task) {
        self.lanes[bucket(task.priority)].push_back(task);
    }

    fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    /// Pop the highest-priority task, FIFO within a priority level.
    fn pop_highest(&mut self) -> Option<Task> {
        self.lanes.iter_mut().rev().find_map(VecDeque::pop_front)
    }

    /// Pop from the tail of a stealable (Normal/Low) lane only. Spec.md §4.2:
    /// "Work stealing only moves normal/low tasks; critical and high are
    /// never stolen."
    fn steal(&mut self) -> Option<Task> {
        for p in [Priority::Low, Priority::Normal] {
            if let Some(task) = self.lanes[bucket(p)].pop_back() {
                return Some(task);
            }
        }
        None
    }
}

/// A single worker's local queue: condvar-guarded priority buckets.
pub(super) struct WorkerQueue {
    state: Mutex<Buckets>,
    not_empty: Condvar,
}

impl WorkerQueue {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(Buckets::default()),
            not_empty: Condvar::new(),
        }
    }

    pub(super) fn push(&self, task: Task) {
        let mut state = self.state.lock().expect("worker queue poisoned");
        state.push(task);
        self.not_empty.notify_one();
    }

    pub(super) fn len(&self) -> usize {
        self.state.lock().expect("worker queue poisoned").len()
    }

    pub(super) fn try_pop(&self) -> Option<Task> {
        self.state.lock().expect("worker queue poisoned").pop_highest()
    }

    pub(super) fn try_steal(&self) -> Option<Task> {
        self.state.lock().expect("worker queue poisoned").steal()
    }

    /// Block for up to `timeout` waiting for a task to appear, then pop it.
    pub(super) fn wait_pop(&self, timeout: Duration) -> Option<Task> {
        let mut state = self.state.lock().expect("worker queue poisoned");
        if state.is_empty() {
            let (guard, _result) = self
                .not_empty
                .wait_timeout_while(state, timeout, |b| b.is_empty())
                .expect("worker queue poisoned");
            state = guard;
        }
        state.pop_highest()
    }
}

/// Shared overflow queue polled by idle workers as a last resort.
pub(super) struct GlobalQueue {
    state: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
}

impl GlobalQueue {
    pub(super) fn new() -> Self {
        Self {
            state: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub(super) fn push(&self, task: Task) {
        let mut state = self.state.lock().expect("global queue poisoned");
        state.push_back(task);
        self.not_empty.notify_one();
    }

    pub(super) fn len(&self) -> usize {
        self.state.lock().expect("global queue poisoned").len()
    }

    pub(super) fn wait_pop(&self, timeout: Duration) -> Option<Task> {
        let mut state = self.state.lock().expect("global queue poisoned");
        if state.is_empty() {
            let (guard, _result) = self
                .not_empty
                .wait_timeout_while(state, timeout, VecDeque::is_empty)
                .expect("global queue poisoned");
            state = guard;
        }
        state.pop_front()
    }
}
