//! Task wrapper and priority levels (C2).

use std::time::Instant;

/// Task priority levels (spec.md §4.2). Ordered so `Critical > High > Normal
/// > Low`; the discriminant doubles as the bucket index in
/// [`super::queue::Buckets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum Priority {
    /// Background work; stealable.
    Low = 0,
    /// Default priority; stealable.
    Normal = 1,
    /// Never stolen.
    High = 2,
    /// Never stolen.
    Critical = 3,
}

/// A boxed unit of work queued on a worker. Carries its enqueue time so
/// schedulers can report average queue wait (spec.md §4.2 `statistics()`).
///
/// `run` returns `true` on logical success and `false` on a caught
/// application-level failure (an `Err` result the task reported itself);
/// an actual Rust panic is caught one layer up, in
/// [`super::worker::execute`], so either path keeps the worker thread alive.
pub(super) struct Task {
    pub(super) priority: Priority,
    pub(super) queued_at: Instant,
    pub(super) run: Box<dyn FnOnce() -> bool + Send + 'static>,
}

impl Task {
    pub(super) fn new(priority: Priority, run: Box<dyn FnOnce() -> bool + Send + 'static>) -> Self {
        Self {
            priority,
            queued_at: Instant::now(),
            run,
        }
    }
}
