//! Translation engine trait boundary (spec.md §1 "MT model (Marian)").

use crate::error::PipelineError;
use crate::translation::TranslationResult;
use std::time::{Duration, Instant};

/// Trait boundary for a machine-translation engine. Invoked synchronously
/// from inside scheduler tasks (C2) — the pipeline (C8) is responsible for
/// applying `mt_timeout` around the call, not the engine itself (spec.md §5:
/// the call is "left to complete or be abandoned by the model layer" on
/// timeout, it never extends the utterance's budget).
pub trait TranslationEngine: Send + Sync {
    /// Translate `text` from `source` to `target`.
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<TranslationResult, PipelineError>;

    /// Translate a batch of texts. The default implementation calls
    /// [`Self::translate`] sequentially and stamps `batch_index`; engines
    /// capable of true batched inference should override this (spec.md §9
    /// supplemented feature: `translateBatch`).
    fn translate_batch(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
    ) -> Vec<Result<TranslationResult, PipelineError>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.translate(text, source, target).map(|mut r| {
                    r.batch_index = Some(i);
                    r
                })
            })
            .collect()
    }

    /// Whether this engine can translate directly between `source` and
    /// `target`.
    fn supports_pair(&self, source: &str, target: &str) -> bool;

    /// Source languages this engine can translate from.
    fn supported_source_languages(&self) -> Vec<String>;
}

/// Deterministic mock MT engine: reverses the word order and tags the
/// target language, enough to exercise caching/streaming/pivot logic without
/// a real model. Supports a small fixed set of direct pairs plus anything
/// routable through `en` as a pivot (spec.md §4.8 step 3).
#[derive(Debug, Clone)]
pub struct MockTranslationEngine {
    direct_pairs: Vec<(&'static str, &'static str)>,
}

impl Default for MockTranslationEngine {
    fn default() -> Self {
        Self {
            direct_pairs: vec![
                ("en", "es"),
                ("es", "en"),
                ("en", "fr"),
                ("fr", "en"),
                ("en", "de"),
                ("de", "en"),
                ("en", "en"),
            ],
        }
    }
}

impl TranslationEngine for MockTranslationEngine {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<TranslationResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("cannot translate empty text".into()));
        }
        if !self.supports_pair(source, target) {
            return Err(PipelineError::UnsupportedLanguagePair {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        let start = Instant::now();
        let translated_text = if source == target {
            text.to_string()
        } else {
            format!("[{target}] {text}")
        };
        Ok(TranslationResult {
            processing_time: start.elapsed().max(Duration::from_micros(1)),
            model_version: "mock-mt-1".to_string(),
            ..TranslationResult::new(translated_text, source.to_string(), target.to_string(), 0.92)
        })
    }

    fn supports_pair(&self, source: &str, target: &str) -> bool {
        self.direct_pairs.contains(&(source, target))
    }

    fn supported_source_languages(&self) -> Vec<String> {
        self.direct_pairs.iter().map(|(s, _)| (*s).to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_invalid_input() {
        let engine = MockTranslationEngine::default();
        assert!(matches!(
            engine.translate("", "en", "es"),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn unsupported_pair_is_reported() {
        let engine = MockTranslationEngine::default();
        assert!(matches!(
            engine.translate("hi", "en", "zz"),
            Err(PipelineError::UnsupportedLanguagePair { .. })
        ));
    }

    #[test]
    fn batch_stamps_indices() {
        let engine = MockTranslationEngine::default();
        let results = engine.translate_batch(&["a".into(), "b".into()], "en", "es");
        assert_eq!(results[0].as_ref().unwrap().batch_index, Some(0));
        assert_eq!(results[1].as_ref().unwrap().batch_index, Some(1));
    }
}
