//! Fallback translator used when the primary MT engine times out or errors
//! (spec.md §4.8 step 5, §9: "fallback translators contain literal phrase
//! lookups; these are demo artifacts and should not be specified as
//! behavior" — so this stays a minimal, explicitly-labeled placeholder, not a
//! quality translator).

use crate::error::PipelineError;
use crate::translation::TranslationResult;
use std::collections::HashMap;
use std::time::Duration;

/// A tiny word-substitution lookup translator, used only as a last resort
/// when the primary engine is unavailable. Unknown words pass through
/// unchanged, tagged so callers can see a fallback was used via
/// `model_version`.
pub struct HeuristicFallbackTranslator {
    phrases: HashMap<(String, String, String), String>,
}

impl Default for HeuristicFallbackTranslator {
    fn default() -> Self {
        let mut phrases = HashMap::new();
        phrases.insert(
            ("en".to_string(), "es".to_string(), "hello".to_string()),
            "hola".to_string(),
        );
        phrases.insert(
            ("en".to_string(), "fr".to_string(), "hello".to_string()),
            "bonjour".to_string(),
        );
        Self { phrases }
    }
}

impl HeuristicFallbackTranslator {
    /// Translate via literal phrase lookup, falling through to an
    /// unmodified copy of the input for anything not in the lookup table.
    pub fn translate(&self, text: &str, source: &str, target: &str) -> Result<TranslationResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput("cannot translate empty text".into()));
        }
        let key = (source.to_string(), target.to_string(), text.to_lowercase());
        let translated_text = self
            .phrases
            .get(&key)
            .cloned()
            .unwrap_or_else(|| text.to_string());
        Ok(TranslationResult {
            processing_time: Duration::from_micros(1),
            model_version: "fallback-heuristic".to_string(),
            ..TranslationResult::new(translated_text, source.to_string(), target.to_string(), 0.35)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_phrase_is_substituted() {
        let t = HeuristicFallbackTranslator::default();
        let r = t.translate("Hello", "en", "es").unwrap();
        assert_eq!(r.translated_text, "hola");
    }

    #[test]
    fn unknown_phrase_passes_through() {
        let t = HeuristicFallbackTranslator::default();
        let r = t.translate("Goodbye", "en", "es").unwrap();
        assert_eq!(r.translated_text, "Goodbye");
    }
}
