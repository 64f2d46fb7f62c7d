//! Pooled audio-sample buffers (spec.md §4.1, §3 "Audio buffer").
//!
//! Grounded on `memory_pool.hpp::AudioBufferPool` / `AudioBuffer`, rebuilt
//! around [`super::generic::Pool`] instead of a bespoke free list.

use super::generic::{Handle, Pool, Poolable, PoolStatistics};
use crate::error::PipelineError;
use std::time::Duration;

/// A reusable sample buffer. Ownership flows pool -> utterance -> pool on drop
/// (spec.md §3).
#[derive(Debug, Default)]
pub struct AudioBuffer {
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Borrow the samples currently held.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Append samples, growing the backing `Vec` as needed.
    pub fn extend(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Number of samples currently stored.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn ensure_capacity(&mut self, min_capacity: usize) {
        if self.samples.capacity() < min_capacity {
            self.samples.reserve(min_capacity - self.samples.capacity());
        }
    }
}

impl Poolable for AudioBuffer {
    fn reset(&mut self) {
        self.samples.clear();
    }
}

/// Pool of recyclable [`AudioBuffer`]s (C1).
pub struct AudioBufferPool {
    pool: Pool<AudioBuffer>,
    default_capacity: usize,
}

impl AudioBufferPool {
    /// Create a pool pre-populated with `initial_size` buffers, each
    /// reserved to `default_capacity` samples, growable to `max_size`.
    pub fn new(initial_size: usize, max_size: usize, default_capacity: usize) -> Self {
        let pool = Pool::new(initial_size, max_size);
        // Pre-reserve the initial population so the hot path doesn't pay for
        // the first grow.
        let warm: Vec<_> = (0..initial_size)
            .filter_map(|_| pool.acquire().ok())
            .collect();
        for mut h in warm {
            h.ensure_capacity(default_capacity);
        }
        Self {
            pool,
            default_capacity,
        }
    }

    /// Acquire a buffer, reserving at least `min_capacity` samples (falls
    /// back to the pool's configured default).
    pub fn acquire(&self, min_capacity: Option<usize>) -> Result<Handle<AudioBuffer>, PipelineError> {
        let mut handle = self.pool.acquire()?;
        handle.ensure_capacity(min_capacity.unwrap_or(self.default_capacity));
        Ok(handle)
    }

    /// Current pool statistics.
    pub fn statistics(&self) -> PoolStatistics {
        self.pool.statistics()
    }

    /// Free idle buffers beyond the floor of 1 (spec.md §4.1).
    pub fn cleanup(&self, max_idle: Duration) {
        self.pool.cleanup(max_idle);
    }

    /// Unconditionally trim the free list to one buffer.
    pub fn force_cleanup(&self) {
        self.pool.force_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_respects_min_capacity() {
        let pool = AudioBufferPool::new(1, 4, 16);
        let h = pool.acquire(Some(1024)).expect("acquire");
        assert!(h.samples().is_empty());
        drop(h);
    }

    #[test]
    fn extend_and_reset_round_trip() {
        let pool = AudioBufferPool::new(1, 4, 16);
        {
            let mut h = pool.acquire(None).expect("acquire");
            h.extend(&[1.0, 2.0, 3.0]);
            assert_eq!(h.len(), 3);
        }
        let h2 = pool.acquire(None).expect("acquire again");
        assert!(h2.is_empty(), "buffer must come back reset");
    }
}
