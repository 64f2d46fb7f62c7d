//! Pooled transcription-result records (spec.md §4.1, §3 "Transcription
//! result").
//!
//! Grounded on `memory_pool.hpp::TranscriptionResultPool`.

use super::generic::{Handle, Pool, Poolable, PoolStatistics};
use crate::error::PipelineError;
use std::time::Duration;

/// A pooled transcription result. Mirrors spec.md §3's
/// `{text, confidence, is_partial, start_ms, end_ms, detected_language?,
/// language_confidence?}`.
#[derive(Debug, Clone, Default)]
pub struct PooledTranscriptionResult {
    /// Transcribed text.
    pub text: String,
    /// STT confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Whether this is a non-final (streaming) result.
    pub is_partial: bool,
    /// Start offset of the segment in milliseconds.
    pub start_ms: u64,
    /// End offset of the segment in milliseconds.
    pub end_ms: u64,
    /// Language detected inline by the STT engine, if any.
    pub detected_language: Option<String>,
    /// Confidence of the inline detection, if any.
    pub language_confidence: Option<f32>,
}

impl Poolable for PooledTranscriptionResult {
    fn reset(&mut self) {
        self.text.clear();
        self.confidence = 0.0;
        self.is_partial = false;
        self.start_ms = 0;
        self.end_ms = 0;
        self.detected_language = None;
        self.language_confidence = None;
    }
}

/// Pool of recyclable [`PooledTranscriptionResult`]s (C1).
pub struct ResultPool {
    pool: Pool<PooledTranscriptionResult>,
}

impl ResultPool {
    /// Create a pool pre-populated with `initial_size` records, growable to
    /// `max_size`.
    pub fn new(initial_size: usize, max_size: usize) -> Self {
        Self {
            pool: Pool::new(initial_size, max_size),
        }
    }

    /// Acquire a reset record.
    pub fn acquire(&self) -> Result<Handle<PooledTranscriptionResult>, PipelineError> {
        self.pool.acquire()
    }

    /// Current pool statistics.
    pub fn statistics(&self) -> PoolStatistics {
        self.pool.statistics()
    }

    /// Free idle records beyond the floor of 1.
    pub fn cleanup(&self, max_idle: Duration) {
        self.pool.cleanup(max_idle);
    }

    /// Unconditionally trim the free list to one record.
    pub fn force_cleanup(&self) {
        self.pool.force_cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_record_starts_reset() {
        let pool = ResultPool::new(1, 4);
        let h = pool.acquire().expect("acquire");
        assert!(h.text.is_empty());
        assert_eq!(h.confidence, 0.0);
    }

    #[test]
    fn fields_are_cleared_on_return() {
        let pool = ResultPool::new(1, 4);
        {
            let mut h = pool.acquire().expect("acquire");
            h.text = "hello".into();
            h.confidence = 0.9;
            h.detected_language = Some("en".into());
        }
        let h2 = pool.acquire().expect("acquire again");
        assert!(h2.text.is_empty());
        assert_eq!(h2.confidence, 0.0);
        assert!(h2.detected_language.is_none());
    }
}
