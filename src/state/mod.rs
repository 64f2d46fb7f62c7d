//! Streaming state (C3): per-utterance buffers, chunk queues, latest partial
//! result.
//!
//! Grounded on
//! `examples/original_source/backend/include/stt/optimized_streaming_state.hpp`
//! (`OptimizedStreamingState`): the top-level map is a reader-writer lock
//! (`shared_mutex` there, `std::sync::RwLock` here) over
//! `Arc<UtteranceRuntime>`s whose own counters are atomics, matching spec.md
//! §4.3's concurrency note. The acquire/modify/release cycle for audio
//! buffers never holds the map lock: [`StreamingState::add_audio_chunk`]
//! acquires from the pool and pushes onto the per-utterance queue, both
//! without touching `self.map`'s lock beyond a single read-lock lookup of
//! the `Arc`.

mod guard;
mod runtime;

pub use guard::UtteranceGuard;
pub use runtime::{LatestTranscription, UtteranceRuntime};

use crate::config::StreamingStateConfig;
use crate::error::PipelineError;
use crate::pool::{AudioBuffer, AudioBufferPool, Handle};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Aggregate statistics over the streaming-state manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingStateStatistics {
    /// Utterances currently tracked (active + inactive awaiting cleanup).
    pub total: usize,
    /// Utterances still accepting chunks.
    pub active: usize,
}

/// Manages per-utterance streaming runtime (C3).
pub struct StreamingState {
    map: RwLock<HashMap<u32, Arc<UtteranceRuntime>>>,
    audio_pool: Arc<AudioBufferPool>,
    max_concurrent: usize,
    max_pending_chunks: usize,
    max_idle: std::time::Duration,
}

impl StreamingState {
    /// Build a streaming-state manager around a shared audio-buffer pool.
    pub fn new(audio_pool: Arc<AudioBufferPool>, config: &StreamingStateConfig) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            audio_pool,
            max_concurrent: config.max_concurrent_utterances,
            max_pending_chunks: config.max_pending_chunks,
            max_idle: config.max_idle,
        }
    }

    /// Create runtime state for a new utterance. Rejects if capacity is
    /// reached, after first attempting to evict the oldest *inactive* idle
    /// utterance (spec.md §4.3 `create`).
    pub fn create(&self, utterance_id: u32) -> Result<(), PipelineError> {
        let mut map = self.map.write().expect("streaming state map poisoned");
        if map.contains_key(&utterance_id) {
            return Err(PipelineError::InvalidInput(format!(
                "utterance {utterance_id} already has streaming state"
            )));
        }
        if map.len() >= self.max_concurrent {
            let evictable = map
                .values()
                .filter(|r| !r.is_active())
                .min_by_key(|r| r.created_at())
                .map(|r| r.utterance_id);
            match evictable {
                Some(id) => {
                    map.remove(&id);
                    debug!(utterance_id = id, "evicted idle utterance to make room");
                }
                None => {
                    return Err(PipelineError::PoolExhausted(
                        "streaming state at max_concurrent_utterances with no inactive entry to evict".into(),
                    ));
                }
            }
        }
        map.insert(
            utterance_id,
            Arc::new(UtteranceRuntime::new(utterance_id, self.max_pending_chunks)),
        );
        Ok(())
    }

    fn get(&self, utterance_id: u32) -> Result<Arc<UtteranceRuntime>, PipelineError> {
        self.map
            .read()
            .expect("streaming state map poisoned")
            .get(&utterance_id)
            .cloned()
            .ok_or_else(|| PipelineError::InvalidInput(format!("no streaming state for utterance {utterance_id}")))
    }

    /// Whether an utterance currently has tracked state.
    pub fn has(&self, utterance_id: u32) -> bool {
        self.map.read().expect("streaming state map poisoned").contains_key(&utterance_id)
    }

    /// Acquire a buffer from the pool, copy `samples` into it, and append it
    /// to the utterance's pending-chunk queue (spec.md §4.3
    /// `add_audio_chunk`). The pool acquisition happens without holding the
    /// top-level map lock.
    pub fn add_audio_chunk(&self, utterance_id: u32, samples: &[f32]) -> Result<(), PipelineError> {
        let runtime = self.get(utterance_id)?;
        if !runtime.is_active() {
            return Err(PipelineError::InvalidInput(format!(
                "utterance {utterance_id} is no longer accepting audio"
            )));
        }
        let mut handle: Handle<AudioBuffer> = self.audio_pool.acquire(Some(samples.len()))?;
        handle.extend(samples);
        runtime.push_chunk(handle, samples.len());
        Ok(())
    }

    /// Pop and return the head of the utterance's pending-chunk queue
    /// (spec.md §4.3 `next_audio_buffer`).
    pub fn next_audio_buffer(&self, utterance_id: u32) -> Result<Option<Handle<AudioBuffer>>, PipelineError> {
        let runtime = self.get(utterance_id)?;
        Ok(runtime.next_audio_buffer())
    }

    /// Store the latest transcription result and roll it into the
    /// utterance's confidence average (spec.md §4.3 `set_transcription`).
    pub fn set_transcription(
        &self,
        utterance_id: u32,
        text: &str,
        confidence: f32,
        is_partial: bool,
    ) -> Result<(), PipelineError> {
        let runtime = self.get(utterance_id)?;
        runtime.set_transcription(text.to_string(), confidence, is_partial);
        Ok(())
    }

    /// Fold a stage-latency sample (ms) into the utterance's rolling
    /// average.
    pub fn record_latency(&self, utterance_id: u32, latency_ms: f32) -> Result<(), PipelineError> {
        let runtime = self.get(utterance_id)?;
        runtime.record_latency(latency_ms);
        Ok(())
    }

    /// The utterance's most recent transcription snapshot, if any.
    pub fn last_result(&self, utterance_id: u32) -> Result<Option<LatestTranscription>, PipelineError> {
        let runtime = self.get(utterance_id)?;
        Ok(runtime.last_result())
    }

    /// Mark an utterance inactive; no further chunks are accepted.
    pub fn finalize(&self, utterance_id: u32) -> Result<(), PipelineError> {
        let runtime = self.get(utterance_id)?;
        runtime.finalize();
        Ok(())
    }

    /// Remove an utterance's runtime state outright (used when a session
    /// closes, or by [`UtteranceGuard`] on drop).
    pub fn remove(&self, utterance_id: u32) {
        self.map.write().expect("streaming state map poisoned").remove(&utterance_id);
    }

    /// Remove inactive utterances idle longer than `max_idle` (spec.md §4.3
    /// `cleanup`, run periodically).
    pub fn cleanup(&self) -> usize {
        let expired: Vec<u32> = {
            let map = self.map.read().expect("streaming state map poisoned");
            map.values()
                .filter(|r| !r.is_active() && r.idle_duration() > self.max_idle)
                .map(|r| r.utterance_id)
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut map = self.map.write().expect("streaming state map poisoned");
        for id in &expired {
            map.remove(id);
        }
        warn!(count = expired.len(), "streaming state cleanup reclaimed idle utterances");
        expired.len()
    }

    /// Create runtime state for `utterance_id` and return a scope-bound
    /// [`UtteranceGuard`] over it (spec.md §9 supplemented feature, grounded
    /// on `optimized_streaming_state.hpp`'s `UtteranceHandle`).
    pub fn create_guarded(self: Arc<Self>, utterance_id: u32) -> Result<UtteranceGuard, PipelineError> {
        self.create(utterance_id)?;
        Ok(UtteranceGuard::new(utterance_id, self))
    }

    /// Wrap an already-created utterance in a scope-bound [`UtteranceGuard`]
    /// without creating new state.
    pub fn guard_existing(self: Arc<Self>, utterance_id: u32) -> UtteranceGuard {
        UtteranceGuard::new(utterance_id, self)
    }

    /// Point-in-time statistics.
    pub fn statistics(&self) -> StreamingStateStatistics {
        let map = self.map.read().expect("streaming state map poisoned");
        StreamingStateStatistics {
            total: map.len(),
            active: map.values().filter(|r| r.is_active()).count(),
        }
    }

    /// Whether the map looks healthy: not at capacity. Grounded on
    /// `optimized_streaming_state.hpp`'s `isHealthy`/`getHealthStatus`.
    pub fn health(&self) -> StreamingStateHealth {
        let stats = self.statistics();
        StreamingStateHealth {
            healthy: stats.total < self.max_concurrent,
            total: stats.total,
            active: stats.active,
        }
    }
}

/// Derived health snapshot over [`StreamingState`]'s own statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingStateHealth {
    /// Whether the map isn't at `max_concurrent_utterances` capacity.
    pub healthy: bool,
    /// Utterances currently tracked.
    pub total: usize,
    /// Utterances still accepting chunks.
    pub active: usize,
}
