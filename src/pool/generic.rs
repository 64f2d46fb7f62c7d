//! Generic pooled-item machinery shared by [`super::AudioBufferPool`] and
//! [`super::ResultPool`].

use crate::error::PipelineError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A type that can live in a [`Pool`]: constructible from nothing and
/// resettable to an empty/default state before reuse.
pub trait Poolable: Default + Send + 'static {
    /// Reset this item to the state a freshly-acquired item should have.
    fn reset(&mut self);
}

struct Slot<T> {
    item: T,
    last_used: Instant,
}

struct Inner<T: Poolable> {
    free: VecDeque<Slot<T>>,
    in_use: usize,
    allocated: usize,
    max_size: usize,
    peak_use: usize,
    acquire_count: u64,
    release_count: u64,
}

/// Point-in-time pool statistics (spec.md §4.1 `statistics()`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Items currently checked out via a live [`Handle`].
    pub in_use: usize,
    /// Items sitting in the free list.
    pub free: usize,
    /// Total items ever allocated (in_use + free).
    pub allocated: usize,
    /// High-water mark of `in_use`.
    pub peak_use: usize,
    /// Total number of successful `acquire` calls.
    pub acquire_count: u64,
    /// Total number of handle drops that returned an item to the pool.
    pub release_count: u64,
}

/// A recyclable pool of `T`. Cheap to clone — internally an `Arc`.
pub struct Pool<T: Poolable> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Poolable> Pool<T> {
    /// Create a pool pre-populated with `initial_size` items, growable up to
    /// `max_size` on demand.
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        let now = Instant::now();
        let mut free = VecDeque::with_capacity(initial_size);
        for _ in 0..initial_size {
            free.push_back(Slot {
                item: T::default(),
                last_used: now,
            });
        }
        Self {
            inner: Arc::new(Mutex::new(Inner {
                allocated: free.len(),
                free,
                in_use: 0,
                max_size: max_size.max(1),
                peak_use: 0,
                acquire_count: 0,
                release_count: 0,
            })),
        }
    }

    /// Acquire an item, growing the pool if below `max_size`. Fails with
    /// [`PipelineError::PoolExhausted`] only once the hard cap is reached.
    pub fn acquire(&self) -> Result<Handle<T>, PipelineError> {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        let mut item = if let Some(slot) = inner.free.pop_front() {
            slot.item
        } else if inner.allocated < inner.max_size {
            inner.allocated += 1;
            T::default()
        } else {
            return Err(PipelineError::PoolExhausted(format!(
                "hard cap of {} items reached",
                inner.max_size
            )));
        };
        item.reset();
        inner.in_use += 1;
        inner.acquire_count += 1;
        if inner.in_use > inner.peak_use {
            inner.peak_use = inner.in_use;
        }
        Ok(Handle {
            item: Some(item),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Current pool statistics.
    pub fn statistics(&self) -> PoolStatistics {
        let inner = self.inner.lock().expect("pool mutex poisoned");
        PoolStatistics {
            in_use: inner.in_use,
            free: inner.free.len(),
            allocated: inner.allocated,
            peak_use: inner.peak_use,
            acquire_count: inner.acquire_count,
            release_count: inner.release_count,
        }
    }

    /// Free items idle longer than `max_idle`, never below a floor of 1.
    /// Grounded on `memory_pool.hpp::cleanup`'s `pool_.size() <= 1` guard.
    pub fn cleanup(&self, max_idle: Duration) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        let now = Instant::now();
        while inner.free.len() > 1 {
            let oldest_idle = match inner.free.front() {
                Some(slot) => now.duration_since(slot.last_used),
                None => break,
            };
            if oldest_idle < max_idle {
                break;
            }
            inner.free.pop_front();
            inner.allocated -= 1;
        }
    }

    /// Unconditionally drop every free item but one, regardless of idle time.
    /// Grounded on `memory_pool.hpp::forceCleanup`.
    pub fn force_cleanup(&self) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        while inner.free.len() > 1 {
            inner.free.pop_front();
            inner.allocated -= 1;
        }
    }
}

/// RAII handle to a pooled item. Returns the item to its pool, reset, when
/// dropped — including on panic unwind, since this runs in `Drop`.
pub struct Handle<T: Poolable> {
    item: Option<T>,
    pool: Arc<Mutex<Inner<T>>>,
}

impl<T: Poolable> std::ops::Deref for Handle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().expect("handle item taken before drop")
    }
}

impl<T: Poolable> std::ops::DerefMut for Handle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("handle item taken before drop")
    }
}

impl<T: Poolable> Drop for Handle<T> {
    fn drop(&mut self) {
        let Some(mut item) = self.item.take() else {
            return;
        };
        item.reset();
        let mut inner = self.pool.lock().expect("pool mutex poisoned");
        inner.in_use -= 1;
        inner.release_count += 1;
        inner.free.push_back(Slot {
            item,
            last_used: Instant::now(),
        });
    }
}
