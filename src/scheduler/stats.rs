//! Atomic statistics accumulator for the scheduler (C2 `statistics()`).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub(super) struct Stats {
    pub(super) active: AtomicUsize,
    pub(super) completed: AtomicU64,
    pub(super) failed: AtomicU64,
    pub(super) work_stealing_events: AtomicU64,
    total_task_nanos: AtomicU64,
    task_samples: AtomicU64,
    total_queue_wait_nanos: AtomicU64,
    queue_wait_samples: AtomicU64,
    shutdown: AtomicBool,
}

impl Stats {
    pub(super) fn record_task_time(&self, d: Duration) {
        self.total_task_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::Relaxed);
        self.task_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_queue_wait(&self, d: Duration) {
        self.total_queue_wait_nanos
            .fetch_add(d.as_nanos() as u64, Ordering::Relaxed);
        self.queue_wait_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(super) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(super) fn average_task_latency(&self) -> Duration {
        average(&self.total_task_nanos, &self.task_samples)
    }

    pub(super) fn average_queue_wait(&self) -> Duration {
        average(&self.total_queue_wait_nanos, &self.queue_wait_samples)
    }
}

fn average(total_nanos: &AtomicU64, samples: &AtomicU64) -> Duration {
    let n = samples.load(Ordering::Relaxed);
    if n == 0 {
        return Duration::ZERO;
    }
    let total = total_nanos.load(Ordering::Relaxed);
    Duration::from_nanos(total / n)
}

/// Point-in-time scheduler statistics (spec.md §4.2 `statistics()`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStatistics {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Tasks currently executing.
    pub active: usize,
    /// Tasks currently sitting in any queue (workers + global).
    pub queued: usize,
    /// Tasks that ran to completion without panicking or returning an error.
    pub completed: u64,
    /// Tasks that panicked or returned an error.
    pub failed: u64,
    /// Number of times a worker successfully stole a task from a peer.
    pub work_stealing_events: u64,
    /// Mean wall-clock time spent executing a task.
    pub average_task_latency: Duration,
    /// Mean time a task spent queued before a worker picked it up.
    pub average_queue_wait: Duration,
}
