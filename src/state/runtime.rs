//! Per-utterance streaming runtime (spec.md §4.3).

use crate::pool::{AudioBuffer, Handle};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;

/// Snapshot of a runtime's latest transcription, stored inline rather than as
/// a pooled handle — the handle's lifetime is tied to the STT stage that
/// produced it, while this snapshot must outlive that call.
#[derive(Debug, Clone, Default)]
pub struct LatestTranscription {
    /// Transcribed text.
    pub text: String,
    /// STT confidence.
    pub confidence: f32,
    /// Whether this was a partial result.
    pub is_partial: bool,
}

struct Inner {
    chunks: VecDeque<Handle<AudioBuffer>>,
    last_result: Option<LatestTranscription>,
    last_activity: Instant,
    avg_confidence: f32,
    avg_latency_ms: f32,
}

/// Runtime state for a single in-flight utterance (C3). Counters are
/// lock-free atomics; the chunk queue and latest-result snapshot share one
/// small mutex, per spec.md §4.3's concurrency note.
pub struct UtteranceRuntime {
    pub utterance_id: u32,
    active: AtomicBool,
    created_at: Instant,
    chunks_processed: AtomicU64,
    total_samples: AtomicU64,
    inner: Mutex<Inner>,
    max_pending_chunks: usize,
}

impl UtteranceRuntime {
    pub(super) fn new(utterance_id: u32, max_pending_chunks: usize) -> Self {
        let now = Instant::now();
        Self {
            utterance_id,
            active: AtomicBool::new(true),
            created_at: now,
            chunks_processed: AtomicU64::new(0),
            total_samples: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                chunks: VecDeque::new(),
                last_result: None,
                last_activity: now,
                avg_confidence: 0.0,
                avg_latency_ms: 0.0,
            }),
            max_pending_chunks,
        }
    }

    /// Whether chunks are still accepted for this utterance.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop accepting further chunks.
    pub fn finalize(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Time since the last chunk/transcription update.
    pub fn idle_duration(&self) -> std::time::Duration {
        self.inner.lock().expect("utterance runtime poisoned").last_activity.elapsed()
    }

    /// When this runtime was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Total chunks accepted so far.
    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed.load(Ordering::Relaxed)
    }

    /// Total samples accepted so far, across all chunks.
    pub fn total_samples(&self) -> u64 {
        self.total_samples.load(Ordering::Relaxed)
    }

    /// Push an already-acquired, already-filled audio buffer onto this
    /// utterance's pending-chunk queue. Bounded by `max_pending_chunks`:
    /// beyond that, the oldest pending chunk is dropped (returned to the
    /// pool via `Drop`) to make room, and a warning is logged.
    pub(super) fn push_chunk(&self, handle: Handle<AudioBuffer>, sample_count: usize) {
        let mut inner = self.inner.lock().expect("utterance runtime poisoned");
        if inner.chunks.len() >= self.max_pending_chunks {
            warn!(
                utterance_id = self.utterance_id,
                "pending audio chunk queue full, dropping oldest chunk"
            );
            inner.chunks.pop_front();
        }
        inner.chunks.push_back(handle);
        inner.last_activity = Instant::now();
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
        self.total_samples.fetch_add(sample_count as u64, Ordering::Relaxed);
    }

    /// Pop the head of the pending-chunk queue.
    pub(super) fn next_audio_buffer(&self) -> Option<Handle<AudioBuffer>> {
        self.inner.lock().expect("utterance runtime poisoned").chunks.pop_front()
    }

    /// Store the latest transcription and fold it into the rolling-average
    /// confidence (spec.md §4.3 `set_transcription`).
    pub(super) fn set_transcription(&self, text: String, confidence: f32, is_partial: bool) {
        let mut inner = self.inner.lock().expect("utterance runtime poisoned");
        let n = self.chunks_processed.load(Ordering::Relaxed).max(1) as f32;
        inner.avg_confidence = (inner.avg_confidence * (n - 1.0) + confidence) / n;
        inner.last_result = Some(LatestTranscription {
            text,
            confidence,
            is_partial,
        });
        inner.last_activity = Instant::now();
    }

    /// Fold a stage latency sample into the rolling average.
    pub(super) fn record_latency(&self, latency_ms: f32) {
        let mut inner = self.inner.lock().expect("utterance runtime poisoned");
        let n = self.chunks_processed.load(Ordering::Relaxed).max(1) as f32;
        inner.avg_latency_ms = (inner.avg_latency_ms * (n - 1.0) + latency_ms) / n;
    }

    /// The most recent transcription snapshot, if any.
    pub fn last_result(&self) -> Option<LatestTranscription> {
        self.inner.lock().expect("utterance runtime poisoned").last_result.clone()
    }

    /// Rolling-average confidence and latency-in-ms observed so far.
    pub fn rolling_averages(&self) -> (f32, f32) {
        let inner = self.inner.lock().expect("utterance runtime poisoned");
        (inner.avg_confidence, inner.avg_latency_ms)
    }

}
