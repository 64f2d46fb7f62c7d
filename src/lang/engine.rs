//! The language-detector model boundary (spec.md §1, §9 "opaque `void*`
//! model handles" -> trait objects).

use super::{DetectionResult, LanguageCandidate};
use crate::error::PipelineError;

/// Trait boundary for the language-detection model. Concrete engines (a
/// fastText/CLD3-style model, say) are injected; this crate ships only a
/// deterministic mock suitable for tests and for wiring the pipeline before a
/// real model is plugged in.
pub trait LanguageDetectorEngine: Send + Sync {
    /// Detect the language of `text`. `text` is guaranteed non-empty by the
    /// caller ([`super::LanguageDetector::detect`]).
    fn detect(&self, text: &str) -> Result<DetectionResult, PipelineError>;
}

/// A small heuristic detector: looks at a handful of common stopwords per
/// language and scores by match count. Deterministic and fast, good enough
/// to drive the pipeline's caching/threshold logic in tests without a real
/// model dependency. Not a quality model (spec.md §9: fallback/demo
/// artifacts are not a behavior contract).
#[derive(Debug, Clone)]
pub struct MockLanguageDetectorEngine {
    lexicon: Vec<(&'static str, &'static [&'static str])>,
}

impl Default for MockLanguageDetectorEngine {
    fn default() -> Self {
        Self {
            lexicon: vec![
                ("en", &["the", "is", "and", "hello", "you", "are"]),
                ("es", &["el", "la", "hola", "como", "estas", "y"]),
                ("fr", &["le", "la", "bonjour", "et", "vous", "est"]),
                ("de", &["der", "die", "und", "hallo", "ist", "sie"]),
            ],
        }
    }
}

impl LanguageDetectorEngine for MockLanguageDetectorEngine {
    fn detect(&self, text: &str) -> Result<DetectionResult, PipelineError> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        let total = words.len().max(1) as f32;

        let mut scored: Vec<LanguageCandidate> = self
            .lexicon
            .iter()
            .map(|(lang, stopwords)| {
                let matches = words
                    .iter()
                    .filter(|w| stopwords.contains(w))
                    .count() as f32;
                LanguageCandidate {
                    language: (*lang).to_string(),
                    score: (matches / total).min(1.0),
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let best = scored.first().cloned().unwrap_or(LanguageCandidate {
            language: "en".to_string(),
            score: 0.0,
        });
        // Give a confidence floor so short/unrecognized input still resolves
        // to *something* rather than reporting 0.0 for everything.
        let confidence = if best.score > 0.0 { best.score.max(0.75) } else { 0.4 };

        Ok(DetectionResult {
            language: best.language,
            confidence,
            is_reliable: false, // filled in by LanguageDetector::detect
            method: "mock-stopword-lexicon".to_string(),
            candidates: scored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_spanish_stopwords() {
        let engine = MockLanguageDetectorEngine::default();
        let result = engine.detect("Hola, como estas").unwrap();
        assert_eq!(result.language, "es");
    }

    #[test]
    fn candidates_are_sorted_descending() {
        let engine = MockLanguageDetectorEngine::default();
        let result = engine.detect("Hello there, you are welcome").unwrap();
        for pair in result.candidates.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
