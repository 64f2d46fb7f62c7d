//! Priority + work-stealing scheduler (C2).
//!
//! Grounded on `examples/original_source/backend/include/utils/optimized_thread_pool.hpp`
//! (`OptimizedThreadPool`), rebuilt as plain `std::thread` workers instead of
//! the original's `std::packaged_task`/`std::future` pairing — see spec.md §9
//! "coroutine-style flows" note: `submit` returns the scheduler's own future
//! type ([`SchedulerFuture`]) backed by a `tokio::sync::oneshot` channel, not
//! an ambient async runtime. Workers themselves are never `tokio` tasks.

mod queue;
mod stats;
mod task;
mod worker;

pub use stats::SchedulerStatistics;
pub use task::Priority;

use crate::config::SchedulerConfig;
use crate::error::PipelineError;
use queue::{GlobalQueue, WorkerQueue};
use stats::Stats;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::Duration;
use task::Task;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Future returned by [`Scheduler::submit`]. Resolves with `Ok(T)` on
/// success, or `Err(PipelineError)` if the task panicked or returned an
/// error — spec.md §4.2: "a future that resolves when the task completes
/// (success or failure)".
pub struct SchedulerFuture<T> {
    rx: oneshot::Receiver<Result<T, PipelineError>>,
}

impl<T> Future for SchedulerFuture<T> {
    type Output = Result<T, PipelineError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PipelineError::Internal(
                "scheduler task dropped before completion".into(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A priority- and work-stealing worker pool (C2).
pub struct Scheduler {
    workers: Vec<Arc<WorkerQueue>>,
    global: Arc<GlobalQueue>,
    stats: Arc<Stats>,
    max_queue_size: usize,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spin up `config.num_workers` worker threads (0 = `available_parallelism`).
    pub fn new(config: &SchedulerConfig) -> Self {
        let num_workers = if config.num_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            config.num_workers
        };

        let workers: Vec<Arc<WorkerQueue>> = (0..num_workers)
            .map(|_| Arc::new(WorkerQueue::new()))
            .collect();
        let global = Arc::new(GlobalQueue::new());
        let stats = Arc::new(Stats::default());

        let mut handles = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let ctx = worker::WorkerContext {
                id,
                own: Arc::clone(&workers[id]),
                peers: workers.clone(),
                global: Arc::clone(&global),
                stats: Arc::clone(&stats),
                idle_timeout: config.thread_idle_timeout,
            };
            let affinity = config.enable_affinity;
            let handle = std::thread::Builder::new()
                .name(format!("vocalbridge-worker-{id}"))
                .spawn(move || {
                    if affinity {
                        pin_to_core(id);
                    }
                    worker::run(ctx);
                })
                .expect("failed to spawn scheduler worker thread");
            handles.push(handle);
        }

        debug!(num_workers, "scheduler started");
        Self {
            workers,
            global,
            stats,
            max_queue_size: config.max_queue_size,
            handles,
        }
    }

    /// Submit a task that produces a value, returning a future that resolves
    /// when it completes (success or failure). Never rejects — scheduler
    /// queues grow to accommodate; use [`Scheduler::submit_void`] for
    /// backpressure-sensitive call sites.
    pub fn submit<F, T>(&self, priority: Priority, task: F) -> SchedulerFuture<T>
    where
        F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let run: Box<dyn FnOnce() -> bool + Send + 'static> = Box::new(move || {
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
                Ok(Ok(value)) => {
                    let _ = tx.send(Ok(value));
                    true
                }
                Ok(Err(e)) => {
                    let _ = tx.send(Err(e));
                    false
                }
                Err(_) => {
                    let _ = tx.send(Err(PipelineError::Internal("task panicked".into())));
                    false
                }
            }
        });
        self.push(priority, run);
        SchedulerFuture { rx }
    }

    /// Submit a non-returning task. Rejects with
    /// [`PipelineError::QueueFull`] if `queue_size >= max_queue_size`
    /// (spec.md §4.2).
    pub fn submit_void<F>(&self, priority: Priority, task: F) -> Result<(), PipelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.queue_size() >= self.max_queue_size {
            return Err(PipelineError::QueueFull);
        }
        let run: Box<dyn FnOnce() -> bool + Send + 'static> = Box::new(move || {
            matches!(
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)),
                Ok(())
            )
        });
        self.push(priority, run);
        Ok(())
    }

    fn push(&self, priority: Priority, run: Box<dyn FnOnce() -> bool + Send + 'static>) {
        let task = Task::new(priority, run);
        // Pick the worker queue with minimum size; first empty queue wins
        // (spec.md §4.2).
        let target = self
            .workers
            .iter()
            .enumerate()
            .min_by_key(|(_, q)| q.len())
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.workers[target].push(task);
    }

    fn queue_size(&self) -> usize {
        self.workers.iter().map(|q| q.len()).sum::<usize>() + self.global.len()
    }

    /// Block until no task is active and every queue (workers + global) is
    /// empty.
    pub fn wait_all(&self) {
        loop {
            let active = self.stats.active.load(Ordering::SeqCst);
            if active == 0 && self.queue_size() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Point-in-time statistics.
    pub fn statistics(&self) -> SchedulerStatistics {
        SchedulerStatistics {
            num_workers: self.workers.len(),
            active: self.stats.active.load(Ordering::SeqCst),
            queued: self.queue_size(),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            work_stealing_events: self.stats.work_stealing_events.load(Ordering::Relaxed),
            average_task_latency: self.stats.average_task_latency(),
            average_queue_wait: self.stats.average_queue_wait(),
        }
    }

    /// Whether the scheduler looks healthy: no worker thread has exited and
    /// the queue isn't saturated. Grounded on
    /// `optimized_thread_pool.hpp::isHealthy`/`getHealthStatus`.
    pub fn health(&self) -> SchedulerHealth {
        let all_alive = self.handles.iter().all(|h| !h.is_finished());
        let queued = self.queue_size();
        SchedulerHealth {
            healthy: all_alive && queued < self.max_queue_size,
            workers_alive: self.handles.iter().filter(|h| !h.is_finished()).count(),
            queued,
        }
    }
}

/// Derived health snapshot over the scheduler's own statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerHealth {
    /// Whether every worker thread is alive and the queue isn't saturated.
    pub healthy: bool,
    /// Number of worker threads still running.
    pub workers_alive: usize,
    /// Total tasks currently queued.
    pub queued: usize,
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stats.request_shutdown();
        // Wake every worker blocked in a condvar wait so it observes shutdown.
        for w in &self.workers {
            w.push(Task::new(Priority::Low, Box::new(|| true)));
        }
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("scheduler worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(worker_id: usize) {
    // SAFETY: `cpu_set` is a plain-old-data struct fully initialized by
    // `CPU_ZERO`/`CPU_SET` before being passed to `sched_setaffinity`, and
    // the pid 0 refers to the calling thread.
    unsafe {
        let hw = libc::sysconf(libc::_SC_NPROCESSORS_ONLN).max(1) as usize;
        let core = worker_id % hw;
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            warn!(worker_id, core, "failed to pin scheduler worker to core");
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_worker_id: usize) {
    // CPU affinity pinning is Linux-only (spec.md §4.2 says "optional");
    // other platforms run unpinned.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            num_workers: 2,
            max_queue_size: 4,
            thread_idle_timeout: StdDuration::from_millis(20),
            enable_affinity: false,
        }
    }

    #[tokio::test]
    async fn submit_resolves_with_value() {
        let sched = Scheduler::new(&test_config());
        let fut = sched.submit(Priority::Normal, || Ok::<_, PipelineError>(42));
        assert_eq!(fut.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn submit_propagates_error_without_panicking_worker() {
        let sched = Scheduler::new(&test_config());
        let fut = sched.submit::<_, ()>(Priority::Normal, || {
            Err(PipelineError::Internal("boom".into()))
        });
        assert!(fut.await.is_err());
        // Worker should still serve further tasks.
        let fut2 = sched.submit(Priority::Normal, || Ok::<_, PipelineError>(7));
        assert_eq!(fut2.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn panicking_task_reports_failure_and_worker_survives() {
        let sched = Scheduler::new(&test_config());
        let fut = sched.submit::<_, ()>(Priority::Normal, || panic!("boom"));
        assert!(fut.await.is_err());
        let stats = sched.statistics();
        assert!(stats.failed >= 1);
        let fut2 = sched.submit(Priority::Normal, || Ok::<_, PipelineError>(1));
        assert_eq!(fut2.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn submit_void_rejects_when_queue_full() {
        let sched = Scheduler::new(&test_config());
        let counter = Arc::new(AtomicUsize::new(0));
        // Fill every worker queue to max_queue_size before workers can drain it
        // by holding them busy with a blocking task each.
        let gate = Arc::new(std::sync::Barrier::new(3));
        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            sched
                .submit_void(Priority::Normal, move || {
                    gate.wait();
                })
                .unwrap();
        }
        for _ in 0..4 {
            let c = Arc::clone(&counter);
            let _ = sched.submit_void(Priority::Low, move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        let err = sched.submit_void(Priority::Low, || {});
        assert!(matches!(err, Err(PipelineError::QueueFull)));
        gate.wait();
        sched.wait_all();
    }

    #[tokio::test]
    async fn wait_all_blocks_until_drained() {
        let sched = Scheduler::new(&test_config());
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = Arc::clone(&counter);
            sched
                .submit_void(Priority::Normal, move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        sched.wait_all();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn critical_priority_is_never_stolen() {
        // A single-worker pool can't exhibit stealing; use 2 workers and pin
        // all tasks to worker 0 indirectly by saturating it first isn't
        // directly controllable through the public API, so this test
        // verifies the documented contract at the queue level instead.
        use super::queue::WorkerQueue;
        let q = WorkerQueue::new();
        q.push(Task::new(Priority::Critical, Box::new(|| true)));
        q.push(Task::new(Priority::Normal, Box::new(|| true)));
        assert!(q.try_steal().is_some(), "normal task is stealable");
        assert_eq!(q.len(), 1, "critical task must remain");
    }
}
