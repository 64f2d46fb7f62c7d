//! Language detector + cache (C6).
//!
//! `detect` is a pure function of text, backed by an injected
//! [`LanguageDetectorEngine`] (the out-of-scope model boundary, spec.md §1)
//! plus a small normalized-text cache so repeated identical text — common in
//! streaming — is free (spec.md §4.6).

mod cache;
mod engine;

pub use cache::DetectionCacheStats;
pub use engine::{LanguageDetectorEngine, MockLanguageDetectorEngine};

use crate::config::LanguageDetectionConfig;
use crate::error::PipelineError;
use cache::DetectionCache;
use std::sync::Arc;
use tracing::debug;

/// A single candidate in a detection's ranked alternatives list.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageCandidate {
    /// Language code, e.g. `"es"`.
    pub language: String,
    /// Model score for this candidate.
    pub score: f32,
}

/// Result of a language detection (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Best-guess language code.
    pub language: String,
    /// Confidence of the best guess, `0.0..=1.0`.
    pub confidence: f32,
    /// `true` iff `confidence >= reliability_threshold`.
    pub is_reliable: bool,
    /// Name of the detection method/model used.
    pub method: String,
    /// Ranked alternative candidates, best first.
    pub candidates: Vec<LanguageCandidate>,
}

/// Language detector + cache (C6).
pub struct LanguageDetector {
    engine: Arc<dyn LanguageDetectorEngine>,
    cache: DetectionCache,
    reliability_threshold: f32,
    caching_enabled: bool,
}

impl LanguageDetector {
    /// Build a detector around an injected engine.
    pub fn new(engine: Arc<dyn LanguageDetectorEngine>, config: &LanguageDetectionConfig) -> Self {
        Self {
            engine,
            cache: DetectionCache::new(config.cache_max_size),
            reliability_threshold: config.reliability_threshold,
            caching_enabled: config.enable_caching,
        }
    }

    /// Run detection, uncached. Errors on empty text (spec.md §8 boundary
    /// behavior: "Empty text to detector -> error").
    pub fn detect(&self, text: &str) -> Result<DetectionResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "cannot detect language of empty text".into(),
            ));
        }
        let mut raw = self.engine.detect(text)?;
        raw.is_reliable = raw.confidence >= self.reliability_threshold;
        Ok(raw)
    }

    /// Detect with caching keyed on normalized text (spec.md §4.6
    /// `detect_cached`). Falls back to an uncached [`Self::detect`] when
    /// caching is disabled.
    pub fn detect_cached(&self, text: &str) -> Result<(DetectionResult, bool), PipelineError> {
        if !self.caching_enabled {
            return self.detect(text).map(|r| (r, false));
        }
        let key = normalize(text);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "language detection cache hit");
            return Ok((hit, true));
        }
        let result = self.detect(text)?;
        self.cache.put(key, result.clone());
        Ok((result, false))
    }

    /// Number of entries currently cached.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Empty the detection cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache hit/miss counters.
    pub fn cache_stats(&self) -> DetectionCacheStats {
        self.cache.stats()
    }
}

/// Trim + lowercase normalization shared with the translation cache's
/// fingerprinting rule (spec.md §4.4).
pub(crate) fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> LanguageDetector {
        LanguageDetector::new(
            Arc::new(MockLanguageDetectorEngine::default()),
            &LanguageDetectionConfig::default(),
        )
    }

    #[test]
    fn empty_text_is_invalid_input() {
        let d = detector();
        assert!(matches!(d.detect(""), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn reliability_follows_threshold() {
        let d = detector();
        let result = d.detect("Hello there, friend").unwrap();
        assert_eq!(result.is_reliable, result.confidence >= 0.7);
    }

    #[test]
    fn repeated_detection_is_cache_hit_when_enabled() {
        let d = detector();
        let (_first, hit1) = d.detect_cached("Hello there").unwrap();
        assert!(!hit1);
        let (_second, hit2) = d.detect_cached("Hello there").unwrap();
        assert!(hit2);
        assert_eq!(d.cache_size(), 1);
    }

    #[test]
    fn normalization_is_trim_and_lowercase() {
        assert_eq!(normalize("  Hello WORLD  "), "hello world");
    }
}
