//! Worker thread body: local pop, steal, global poll (spec.md §4.2).

use super::queue::{GlobalQueue, WorkerQueue};
use super::stats::Stats;
use super::task::Task;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub(super) struct WorkerContext {
    pub(super) id: usize,
    pub(super) own: Arc<WorkerQueue>,
    pub(super) peers: Vec<Arc<WorkerQueue>>,
    pub(super) global: Arc<GlobalQueue>,
    pub(super) stats: Arc<Stats>,
    pub(super) idle_timeout: Duration,
}

pub(super) fn run(ctx: WorkerContext) {
    if ctx.stats.shutdown_requested() {
        return;
    }
    debug!(worker = ctx.id, "scheduler worker starting");
    loop {
        if ctx.stats.shutdown_requested() {
            break;
        }

        if let Some(task) = ctx.own.try_pop() {
            execute(&ctx, task, false);
            continue;
        }

        if let Some(task) = try_steal(&ctx) {
            execute(&ctx, task, true);
            continue;
        }

        if let Some(task) = ctx.global.wait_pop(ctx.idle_timeout) {
            execute(&ctx, task, false);
        }
    }
    debug!(worker = ctx.id, "scheduler worker stopped");
}

fn try_steal(ctx: &WorkerContext) -> Option<Task> {
    // Start from a rotating offset so workers don't all hammer worker 0.
    let n = ctx.peers.len();
    for offset in 0..n {
        let idx = (ctx.id + 1 + offset) % n;
        if idx == ctx.id {
            continue;
        }
        if let Some(task) = ctx.peers[idx].try_steal() {
            ctx.stats.work_stealing_events.fetch_add(1, Ordering::Relaxed);
            trace!(worker = ctx.id, from = idx, "stole task");
            return Some(task);
        }
    }
    None
}

fn execute(ctx: &WorkerContext, task: Task, stolen: bool) {
    let queue_wait = task.queued_at.elapsed();
    ctx.stats.record_queue_wait(queue_wait);
    ctx.stats.active.fetch_add(1, Ordering::SeqCst);

    let start = Instant::now();
    let run = task.run;
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(run));
    let task_time = start.elapsed();
    ctx.stats.record_task_time(task_time);

    ctx.stats.active.fetch_sub(1, Ordering::SeqCst);
    match outcome {
        Ok(true) => {
            ctx.stats.completed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(false) | Err(_) => {
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
    let _ = stolen;
}
