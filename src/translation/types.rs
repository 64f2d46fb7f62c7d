//! Translation result type shared by the cache, streaming sessions, and the
//! pipeline (spec.md §3 "Translation result").

use std::time::Duration;

/// Result of a single MT invocation, one-shot or streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    /// The translated text.
    pub translated_text: String,
    /// Source language code.
    pub source_lang: String,
    /// Target language code.
    pub target_lang: String,
    /// MT confidence, `0.0..=1.0`.
    pub confidence: f32,
    /// Alternative translations, if the engine produces any.
    pub alternatives: Vec<String>,
    /// Whether this is a non-final (streaming) result.
    pub is_partial: bool,
    /// Whether this result finalizes a streaming session.
    pub is_streaming_complete: bool,
    /// Streaming MT session id, if this came from C5.
    pub session_id: Option<String>,
    /// Index within a batch dispatch, if this came from
    /// `TranslationEngine::translate_batch`.
    pub batch_index: Option<usize>,
    /// Wall-clock time the engine spent producing this result.
    pub processing_time: Duration,
    /// Whether the engine used GPU acceleration for this call.
    pub used_gpu: bool,
    /// Engine/model version string.
    pub model_version: String,
    /// Whether this result was served from the translation cache (C4)
    /// instead of a live MT call.
    pub used_cache: bool,
}

impl TranslationResult {
    /// Construct a direct (non-partial, non-cached) result from an engine
    /// call — the common case callers build before annotating cache/stream
    /// flags.
    pub fn new(translated_text: String, source_lang: String, target_lang: String, confidence: f32) -> Self {
        Self {
            translated_text,
            source_lang,
            target_lang,
            confidence,
            alternatives: Vec::new(),
            is_partial: false,
            is_streaming_complete: false,
            session_id: None,
            batch_index: None,
            processing_time: Duration::ZERO,
            used_gpu: false,
            model_version: "unknown".to_string(),
            used_cache: false,
        }
    }
}
