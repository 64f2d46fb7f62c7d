//! Translation pipeline (C8): the push path from an already-produced
//! transcription through language detection, target resolution, cache
//! lookup, MT dispatch, and notification (spec.md §4.8).
//!
//! Shares [`crate::utterance::Store`] with the managed path
//! ([`crate::utterance::UtteranceManager`], C7), which hands a freshly
//! transcribed utterance to [`TranslationPipeline::submit_transcription`]
//! once its own STT stage completes — see SPEC_FULL.md §6.

use crate::cache::TranslationCache;
use crate::config::TranslationConfig;
use crate::engines::{HeuristicFallbackTranslator, TranslationEngine};
use crate::error::PipelineError;
use crate::events::{Dispatcher, TranslationNotification};
use crate::lang::{DetectionResult, LanguageDetector};
use crate::pool::PooledTranscriptionResult;
use crate::scheduler::{Priority, Scheduler};
use crate::session::SessionRegistry;
use crate::streaming_mt::StreamingMtSessions;
use crate::translation::TranslationResult;
use crate::utterance::{Store, UtteranceState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::{debug, warn};

/// Pivot language used when no direct pair is available (spec.md §4.8 step
/// 3: "If no direct pair exists, attempt source -> en -> target").
const PIVOT_LANGUAGE: &str = "en";

/// Outcome of [`TranslationPipeline::resolve_source_language`]'s
/// detect-and-maybe-swap step, threaded explicitly into the translation
/// stage rather than re-derived from session state afterward — re-deriving
/// it would conflate "this call changed the source" with "the source
/// happens to equal the last detection," which are not the same thing once
/// multiple utterances interleave on one session.
struct LanguageResolution {
    source: String,
    changed: bool,
    previous: Option<String>,
    detected: Option<String>,
    detection_confidence: Option<f32>,
}

/// Point-in-time counters exposed alongside the pipeline (spec.md §8
/// scenario assertions reference these by name).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatistics {
    /// Transcriptions rejected because confidence fell below
    /// `min_transcription_confidence`.
    pub confidence_gate_rejections: u64,
    /// Transcriptions rejected for empty/malformed text.
    pub invalid_input_rejections: u64,
    /// Number of times language detection actually ran (cache misses plus
    /// detections with caching disabled).
    pub language_detections_performed: u64,
    /// Number of times a cached detection was reused instead.
    pub language_detection_cache_hits: u64,
    /// Translations that completed (direct, pivoted, cached, or fallback).
    pub translations_completed: u64,
    /// Terminal pipeline errors emitted.
    pub pipeline_errors: u64,
}

/// Drives the push path (C8): one call to [`Self::submit_transcription`] per
/// produced transcript. Cheap to clone — every field is an `Arc` or atomics.
#[derive(Clone)]
pub struct TranslationPipeline {
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    detector: Arc<LanguageDetector>,
    cache: Arc<TranslationCache>,
    streaming_mt: Arc<StreamingMtSessions>,
    scheduler: Arc<Scheduler>,
    engine: Arc<dyn TranslationEngine>,
    fallback: Arc<HeuristicFallbackTranslator>,
    dispatcher: Arc<Dispatcher>,
    config: TranslationConfig,
    stats: Arc<PipelineCounters>,
}

#[derive(Default)]
struct PipelineCounters {
    confidence_gate_rejections: AtomicU64,
    invalid_input_rejections: AtomicU64,
    language_detections_performed: AtomicU64,
    language_detection_cache_hits: AtomicU64,
    translations_completed: AtomicU64,
    pipeline_errors: AtomicU64,
}

impl TranslationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionRegistry>,
        detector: Arc<LanguageDetector>,
        cache: Arc<TranslationCache>,
        streaming_mt: Arc<StreamingMtSessions>,
        scheduler: Arc<Scheduler>,
        engine: Arc<dyn TranslationEngine>,
        fallback: Arc<HeuristicFallbackTranslator>,
        dispatcher: Arc<Dispatcher>,
        config: TranslationConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            detector,
            cache,
            streaming_mt,
            scheduler,
            engine,
            fallback,
            dispatcher,
            config,
            stats: Arc::new(PipelineCounters::default()),
        }
    }

    /// Point-in-time counters.
    pub fn statistics(&self) -> PipelineStatistics {
        PipelineStatistics {
            confidence_gate_rejections: self.stats.confidence_gate_rejections.load(Ordering::Relaxed),
            invalid_input_rejections: self.stats.invalid_input_rejections.load(Ordering::Relaxed),
            language_detections_performed: self.stats.language_detections_performed.load(Ordering::Relaxed),
            language_detection_cache_hits: self.stats.language_detection_cache_hits.load(Ordering::Relaxed),
            translations_completed: self.stats.translations_completed.load(Ordering::Relaxed),
            pipeline_errors: self.stats.pipeline_errors.load(Ordering::Relaxed),
        }
    }

    /// Entry point for an already-produced transcription (spec.md §4.8,
    /// §6 `submit_transcription`). Empty text and sub-threshold confidence
    /// are dropped silently — neither ever drives the utterance to `Error`
    /// (spec.md §8 scenario 3/4, `PipelineError::is_terminal`).
    pub fn submit_transcription(
        &self,
        utterance_id: u32,
        session_id: &str,
        transcription: &PooledTranscriptionResult,
    ) -> Result<(), PipelineError> {
        self.store.ensure_tracked(utterance_id, session_id);

        if transcription.text.trim().is_empty() {
            self.stats.invalid_input_rejections.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if transcription.confidence < self.config.min_transcription_confidence {
            self.stats.confidence_gate_rejections.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let _ = self.store.set_transcript(utterance_id, &transcription.text, transcription.confidence);
        let session = self.sessions.get_or_create(session_id);

        let resolution = self.resolve_source_language(utterance_id, &session, session_id, &transcription.text);
        let target_language = session.language().target;

        let pipeline = self.clone();
        let utterance_id_owned = utterance_id;
        let session_id_owned = session_id.to_string();
        let text = transcription.text.clone();
        let is_partial = transcription.is_partial;

        self.scheduler.submit_void(Priority::High, move || {
            pipeline.run_translation_stage(
                utterance_id_owned,
                session_id_owned,
                text,
                resolution,
                target_language,
                is_partial,
            );
        })
    }

    /// Run detection ad hoc, independent of a transcription's normal flow
    /// through the pipeline (spec.md §6 `trigger_language_detection`). Does
    /// not touch session state or emit `language_change` — only
    /// `language_detection_complete` — but does record the result against
    /// `utterance_id` if that utterance is still tracked.
    pub fn trigger_language_detection(
        &self,
        utterance_id: u32,
        session_id: &str,
        text: &str,
    ) -> Result<DetectionResult, PipelineError> {
        let (result, from_cache) = self.detect(text)?;
        if from_cache {
            self.stats.language_detection_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.language_detections_performed.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.store.set_detection(utterance_id, &result.language);
        self.dispatcher.emit_language_detection_complete(session_id, &result);
        Ok(result)
    }

    fn detect(&self, text: &str) -> Result<(DetectionResult, bool), PipelineError> {
        if self.config.enable_language_detection_caching {
            self.detector.detect_cached(text)
        } else {
            self.detector.detect(text).map(|r| (r, false))
        }
    }

    /// Step 2 of spec.md §4.8: detection runs when enabled AND (the session's
    /// source is `"auto"` OR automatic switching is on and the text clears
    /// `min_text_length_for_detection`). When it runs, swap the session's
    /// effective source via compare-and-set if the detection clears the
    /// confidence threshold and differs from the current source.
    fn resolve_source_language(
        &self,
        utterance_id: u32,
        session: &Arc<crate::session::Session>,
        session_id: &str,
        text: &str,
    ) -> LanguageResolution {
        let current = session.language();
        let no_swap = LanguageResolution {
            source: current.source.clone(),
            changed: false,
            previous: None,
            detected: None,
            detection_confidence: None,
        };
        let long_enough_for_auto_switch = self.config.enable_automatic_language_switching
            && text.trim().chars().count() >= self.config.min_text_length_for_detection;
        if !self.config.enable_language_detection || !(current.source == "auto" || long_enough_for_auto_switch) {
            return no_swap;
        }

        let Ok((detection, from_cache)) = self.detect(text) else {
            return no_swap;
        };
        if from_cache {
            self.stats.language_detection_cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.language_detections_performed.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.store.set_detection(utterance_id, &detection.language);
        self.dispatcher.emit_language_detection_complete(session_id, &detection);

        if !self.config.enable_automatic_language_switching
            || detection.confidence < self.config.language_detection_confidence_threshold
            || detection.language == current.source
        {
            session.record_detection(&detection.language);
            return LanguageResolution {
                detected: Some(detection.language),
                detection_confidence: Some(detection.confidence),
                ..no_swap
            };
        }

        let previous = current.source.clone();
        if session.try_swap_source(&previous, &detection.language) {
            if self.config.notify_language_changes {
                self.dispatcher.emit_language_change(session_id, &previous, &detection.language, detection.confidence);
            }
            LanguageResolution {
                source: detection.language.clone(),
                changed: true,
                previous: Some(previous),
                detected: Some(detection.language),
                detection_confidence: Some(detection.confidence),
            }
        } else {
            // Lost the race to a concurrent detection on the same session;
            // defer to whatever source is now in effect, and don't report a
            // change this call didn't cause.
            LanguageResolution {
                source: session.language().source.clone(),
                detected: Some(detection.language),
                detection_confidence: Some(detection.confidence),
                ..no_swap
            }
        }
    }

    fn run_translation_stage(
        &self,
        utterance_id: u32,
        session_id: String,
        text: String,
        resolution: LanguageResolution,
        target_language: String,
        is_partial: bool,
    ) {
        let _ = self.store.transition(utterance_id, UtteranceState::Translating);
        let source_language = resolution.source.clone();

        if is_partial {
            if let Err(e) = self.push_streaming(&session_id, &source_language, &target_language, &text, false) {
                self.fail(&session_id, utterance_id, "translation", &e.to_string());
            }
            return;
        }

        let result = self.translate_final(&session_id, &source_language, &target_language, &text);
        match result {
            Ok(translation) => {
                let _ = self.store.set_translation(utterance_id, &translation.translated_text, &target_language);
                let _ = self.store.transition(utterance_id, UtteranceState::Complete);
                self.stats.translations_completed.fetch_add(1, Ordering::Relaxed);

                self.dispatcher.emit_translation_complete(
                    &session_id,
                    utterance_id,
                    &TranslationNotification {
                        translated_text: translation.translated_text,
                        source_language,
                        target_language,
                        confidence: translation.confidence,
                        language_changed: resolution.changed,
                        previous_language: resolution.previous,
                        detected_language: resolution.detected,
                        language_confidence: resolution.detection_confidence,
                    },
                );
            }
            Err(e) => self.fail(&session_id, utterance_id, "translation", &e.to_string()),
        }
    }

    fn fail(&self, session_id: &str, utterance_id: u32, stage: &str, message: &str) {
        let _ = self.store.set_error(utterance_id, message);
        let _ = self.store.transition(utterance_id, UtteranceState::Error);
        self.stats.pipeline_errors.fetch_add(1, Ordering::Relaxed);
        self.dispatcher.emit_pipeline_error(session_id, utterance_id, stage, message);
    }

    fn push_streaming(
        &self,
        session_id: &str,
        source: &str,
        target: &str,
        text: &str,
        is_final: bool,
    ) -> Result<TranslationResult, PipelineError> {
        if !self.streaming_mt.has(session_id) {
            self.streaming_mt.start(session_id, source, target)?;
        }
        self.streaming_mt.push(session_id, text, is_final)
    }

    /// Cache lookup, then MT dispatch with timeout and fallback (spec.md
    /// §4.8 steps 4-5). Only final (non-partial) results are cached or
    /// carried through the streaming context window's finalize.
    fn translate_final(
        &self,
        session_id: &str,
        source: &str,
        target: &str,
        text: &str,
    ) -> Result<TranslationResult, PipelineError> {
        if let Some(hit) = self.cache.get(source, target, text) {
            debug!(session_id, source, target, "translation cache hit");
            let mut result = TranslationResult::new(hit.translated_text, source.to_string(), target.to_string(), hit.confidence);
            result.used_cache = true;
            return Ok(result);
        }

        let result = if self.streaming_mt.has(session_id) {
            self.push_streaming(session_id, source, target, text, true).or_else(|_| self.translate_with_fallback(source, target, text))
        } else {
            self.translate_with_fallback(source, target, text)
        }?;

        if self.streaming_mt.has(session_id) {
            self.streaming_mt.cancel(session_id);
        }

        self.cache.put(source, target, text, result.translated_text.clone(), result.confidence);
        Ok(result)
    }

    fn translate_with_fallback(&self, source: &str, target: &str, text: &str) -> Result<TranslationResult, PipelineError> {
        match self.dispatch_mt(source, target, text) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(source, target, error = %e, "mt call failed or timed out, using fallback translator");
                self.fallback.translate(text, source, target)
            }
        }
    }

    /// Resolve a translation path: direct, or pivoted through `en` if no
    /// direct pair exists (spec.md §4.8 step 3), then call the engine with
    /// `mt_timeout` enforced via [`call_with_timeout`] since this runs on a
    /// plain scheduler worker thread with no async runtime to bound it.
    fn dispatch_mt(&self, source: &str, target: &str, text: &str) -> Result<TranslationResult, PipelineError> {
        if self.engine.supports_pair(source, target) {
            let engine = Arc::clone(&self.engine);
            let (source, target, text) = (source.to_string(), target.to_string(), text.to_string());
            return call_with_timeout(self.config.mt_timeout, move || engine.translate(&text, &source, &target));
        }
        if source != PIVOT_LANGUAGE
            && target != PIVOT_LANGUAGE
            && self.engine.supports_pair(source, PIVOT_LANGUAGE)
            && self.engine.supports_pair(PIVOT_LANGUAGE, target)
        {
            let engine = Arc::clone(&self.engine);
            let (source, target, text) = (source.to_string(), target.to_string(), text.to_string());
            return call_with_timeout(self.config.mt_timeout, move || pivot_translate(engine.as_ref(), &text, &source, &target));
        }
        Err(PipelineError::UnsupportedLanguagePair {
            source: source.to_string(),
            target: target.to_string(),
        })
    }
}

/// Chain source -> en -> target through two engine calls (spec.md §4.8 step
/// 3). The pivoted result's confidence is the product of both legs and it is
/// tagged with the target's model version.
fn pivot_translate(
    engine: &dyn TranslationEngine,
    text: &str,
    source: &str,
    target: &str,
) -> Result<TranslationResult, PipelineError> {
    let first_leg = engine.translate(text, source, PIVOT_LANGUAGE)?;
    let mut second_leg = engine.translate(&first_leg.translated_text, PIVOT_LANGUAGE, target)?;
    second_leg.confidence *= first_leg.confidence;
    second_leg.source_lang = source.to_string();
    Ok(second_leg)
}

/// Bound a blocking call by `timeout`, used for MT dispatch from inside a
/// plain scheduler worker thread that has no runtime to `.await`/`block_on`
/// with. The call keeps running on its own thread past the deadline; its
/// result is simply discarded (spec.md §5: left to complete or be abandoned
/// by the model layer).
fn call_with_timeout<F, T>(timeout: Duration, call: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(call());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LanguageDetectionConfig, PipelineConfig};
    use crate::engines::MockTranslationEngine;
    use crate::lang::MockLanguageDetectorEngine;
    use std::time::Duration as StdDuration;

    fn pipeline() -> TranslationPipeline {
        let config = PipelineConfig::default();
        let store = Arc::new(Store::new(config.utterance.utterance_timeout, config.utterance.terminal_grace_period));
        let sessions = Arc::new(SessionRegistry::new("en", "es"));
        let mt_engine: Arc<dyn TranslationEngine> = Arc::new(MockTranslationEngine::default());
        let cache = Arc::new(TranslationCache::new(config.cache.max_size, config.cache.confidence_floor, config.cache.enabled));
        let streaming_mt = Arc::new(StreamingMtSessions::new(mt_engine.clone(), config.streaming_mt.context_window_tokens, config.streaming_mt.session_timeout));
        let detector = Arc::new(LanguageDetector::new(Arc::new(MockLanguageDetectorEngine::default()), &LanguageDetectionConfig::default()));
        let scheduler = Arc::new(Scheduler::new(&config.scheduler));
        let dispatcher = Arc::new(Dispatcher::new());
        TranslationPipeline::new(
            store,
            sessions,
            detector,
            cache,
            streaming_mt,
            scheduler,
            mt_engine,
            Arc::new(HeuristicFallbackTranslator::default()),
            dispatcher,
            config.translation,
        )
    }

    fn transcription(text: &str, confidence: f32) -> PooledTranscriptionResult {
        PooledTranscriptionResult {
            text: text.to_string(),
            confidence,
            is_partial: false,
            start_ms: 0,
            end_ms: 100,
            detected_language: None,
            language_confidence: None,
        }
    }

    #[test]
    fn empty_text_is_dropped_without_error() {
        let pipeline = pipeline();
        pipeline.submit_transcription(1, "s1", &transcription("", 0.9)).unwrap();
        assert_eq!(pipeline.statistics().invalid_input_rejections, 1);
    }

    #[test]
    fn low_confidence_is_gated() {
        let pipeline = pipeline();
        pipeline.submit_transcription(1, "s1", &transcription("hello there friend", 0.3)).unwrap();
        assert_eq!(pipeline.statistics().confidence_gate_rejections, 1);
    }

    #[test]
    fn confident_transcription_runs_through_to_completion() {
        let pipeline = pipeline();
        pipeline.sessions.get_or_create("s1").set_language_configuration("en", "es");
        pipeline.submit_transcription(1, "s1", &transcription("hello there friend", 0.95)).unwrap();
        pipeline.scheduler.wait_all();
        std::thread::sleep(StdDuration::from_millis(50));
        let snapshot = pipeline.store.snapshot(1).unwrap();
        assert_eq!(snapshot.state, UtteranceState::Complete);
        assert!(snapshot.translated_text.is_some());
    }

    #[test]
    fn pivot_translate_chains_through_english() {
        let engine = MockTranslationEngine::default();
        let result = pivot_translate(&engine, "hello", "es", "fr").unwrap();
        assert!(result.translated_text.contains("fr"));
        assert_eq!(result.source_lang, "es");
    }

    #[test]
    fn timeout_falls_back_when_call_exceeds_budget() {
        let result: Result<u32, PipelineError> = call_with_timeout(StdDuration::from_millis(5), || {
            std::thread::sleep(StdDuration::from_millis(50));
            Ok(1)
        });
        assert!(matches!(result, Err(PipelineError::Timeout(_))));
    }
}
