//! Top-level facade wiring C1-C9 from one [`crate::config::PipelineConfig`]
//! plus the three injected model engines (spec.md §6 "External Interfaces").
//!
//! This is the one type most callers construct directly; everything else in
//! this crate is reachable through it or usable standalone for callers that
//! want finer control (e.g. driving [`crate::pipeline::TranslationPipeline`]
//! without the managed path at all).

use crate::cache::TranslationCache;
use crate::config::PipelineConfig;
use crate::engines::{HeuristicFallbackTranslator, SpeechToTextEngine, TranslationEngine};
use crate::error::PipelineError;
use crate::events::{Dispatcher, PipelineCallbacks};
use crate::lang::{DetectionResult, LanguageDetector, LanguageDetectorEngine};
use crate::pipeline::{PipelineStatistics, TranslationPipeline};
use crate::pool::AudioBufferPool;
use crate::scheduler::{Scheduler, SchedulerStatistics};
use crate::session::SessionRegistry;
use crate::state::StreamingState;
use crate::state::StreamingStateHealth;
use crate::streaming_mt::StreamingMtSessions;
use crate::utterance::{UtteranceManager, UtteranceSnapshot};
use std::sync::Arc;

/// Aggregate point-in-time statistics across every component (spec.md §6
/// exposes no single wire shape for this; it is a convenience for operators,
/// not a notification).
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub scheduler: SchedulerStatistics,
    pub streaming_state: StreamingStateHealth,
    pub translation: PipelineStatistics,
    pub translation_cache_hit_rate: f32,
    pub streaming_sessions: usize,
    pub tracked_utterances: usize,
}

/// Constructs and owns every component, exposing spec.md §6's inbound API.
/// Cheap to clone — every field is an `Arc`.
#[derive(Clone)]
pub struct Pipeline {
    sessions: Arc<SessionRegistry>,
    streaming_state: Arc<StreamingState>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<Dispatcher>,
    streaming_mt: Arc<StreamingMtSessions>,
    cache: Arc<TranslationCache>,
    translation_pipeline: Arc<TranslationPipeline>,
    manager: Arc<UtteranceManager>,
}

impl Pipeline {
    /// Wire up every component from `config` and the three model-boundary
    /// engines. Engines are caller-supplied per spec.md §1/§9 — this crate
    /// never ships a production STT/MT/detector, only deterministic mocks
    /// for tests.
    pub fn new(
        config: PipelineConfig,
        stt_engine: Arc<dyn SpeechToTextEngine>,
        mt_engine: Arc<dyn TranslationEngine>,
        detector_engine: Arc<dyn LanguageDetectorEngine>,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new("auto", "en"));
        let audio_pool = Arc::new(AudioBufferPool::new(
            config.pools.audio_initial,
            config.pools.audio_max,
            config.pools.audio_default_capacity,
        ));
        let streaming_state = Arc::new(StreamingState::new(audio_pool, &config.streaming_state));
        let scheduler = Arc::new(Scheduler::new(&config.scheduler));
        let dispatcher = Arc::new(Dispatcher::new());
        let cache = Arc::new(TranslationCache::new(config.cache.max_size, config.cache.confidence_floor, config.cache.enabled));
        let streaming_mt = Arc::new(StreamingMtSessions::new(
            Arc::clone(&mt_engine),
            config.streaming_mt.context_window_tokens,
            config.streaming_mt.session_timeout,
        ));
        let detector = Arc::new(LanguageDetector::new(detector_engine, &config.language_detection));
        let store = Arc::new(crate::utterance::Store::new(
            config.utterance.utterance_timeout,
            config.utterance.terminal_grace_period,
        ));

        let translation_pipeline = Arc::new(TranslationPipeline::new(
            Arc::clone(&store),
            Arc::clone(&sessions),
            detector,
            Arc::clone(&cache),
            Arc::clone(&streaming_mt),
            Arc::clone(&scheduler),
            mt_engine,
            Arc::new(HeuristicFallbackTranslator::default()),
            Arc::clone(&dispatcher),
            config.translation.clone(),
        ));

        let manager = Arc::new(UtteranceManager::new(
            store,
            Arc::clone(&sessions),
            Arc::clone(&streaming_state),
            stt_engine,
            Arc::clone(&scheduler),
            Arc::clone(&dispatcher),
            Arc::clone(&translation_pipeline),
            &config.utterance,
        ));

        Self {
            sessions,
            streaming_state,
            scheduler,
            dispatcher,
            streaming_mt,
            cache,
            translation_pipeline,
            manager,
        }
    }

    /// Register an observer for every C9 event (spec.md §6 "Callback
    /// contracts").
    pub fn register_callback(&self, callback: Arc<dyn PipelineCallbacks>) {
        self.dispatcher.register(callback);
    }

    /// Push path: hand the pipeline an already-produced transcription
    /// (spec.md §6 `submit_transcription`).
    pub fn submit_transcription(
        &self,
        utterance_id: u32,
        session_id: &str,
        transcription: &crate::pool::PooledTranscriptionResult,
    ) -> Result<(), PipelineError> {
        self.translation_pipeline.submit_transcription(utterance_id, session_id, transcription)
    }

    /// Managed path: create a new utterance for `session_id` (spec.md §6
    /// `create_utterance`).
    pub fn create_utterance(&self, session_id: &str) -> Result<u32, PipelineError> {
        self.manager.create_utterance(session_id)
    }

    /// Managed path: append audio samples to an utterance awaiting
    /// transcription (spec.md §6 `add_audio`).
    pub fn add_audio(&self, utterance_id: u32, samples: &[f32]) -> Result<(), PipelineError> {
        self.manager.add_audio(utterance_id, samples)
    }

    /// Managed path: kick off transcription, then the full translation
    /// pipeline, for `utterance_id` (spec.md §6 `process_utterance`).
    pub fn process_utterance(&self, utterance_id: u32) -> Result<(), PipelineError> {
        self.manager.process_utterance(utterance_id)
    }

    /// Explicitly set a session's effective source/target pair (spec.md §6
    /// `set_language_configuration`).
    pub fn set_language_configuration(&self, session_id: &str, source: &str, target: &str) {
        self.sessions.get_or_create(session_id).set_language_configuration(source, target);
    }

    /// Run detection ad hoc against arbitrary text, independent of an
    /// in-flight transcription (spec.md §6 `trigger_language_detection`).
    pub fn trigger_language_detection(
        &self,
        utterance_id: u32,
        session_id: &str,
        text: &str,
    ) -> Result<DetectionResult, PipelineError> {
        self.translation_pipeline.trigger_language_detection(utterance_id, session_id, text)
    }

    /// Point-in-time snapshot of an utterance's payload and state, if still
    /// tracked.
    pub fn utterance_snapshot(&self, utterance_id: u32) -> Option<UtteranceSnapshot> {
        self.manager.snapshot(utterance_id)
    }

    /// Periodic maintenance: reclaim expired streaming-MT sessions, enforce
    /// utterance timeouts, and sweep terminal utterances past their grace
    /// period. Callers drive this on a timer (spec.md §4.3/§4.5/§4.7's
    /// "periodic" language — this crate schedules no timers of its own).
    pub fn run_maintenance(&self) {
        self.manager.enforce_timeouts();
        self.manager.cleanup();
        self.streaming_mt.cleanup_expired();
        self.streaming_state.cleanup();
    }

    /// Aggregate point-in-time statistics across every component.
    pub fn statistics(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            scheduler: self.scheduler.statistics(),
            streaming_state: self.streaming_state.health(),
            translation: self.translation_pipeline.statistics(),
            translation_cache_hit_rate: self.cache.hit_rate(),
            streaming_sessions: self.streaming_mt.len(),
            tracked_utterances: self.manager.tracked_utterances(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::engines::{MockSpeechToTextEngine, MockTranslationEngine};
    use crate::lang::MockLanguageDetectorEngine;
    use std::time::Duration;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            PipelineConfig::default(),
            Arc::new(MockSpeechToTextEngine),
            Arc::new(MockTranslationEngine::default()),
            Arc::new(MockLanguageDetectorEngine::default()),
        )
    }

    #[test]
    fn managed_path_runs_end_to_end() {
        let pipeline = pipeline();
        pipeline.set_language_configuration("s1", "en", "es");
        let id = pipeline.create_utterance("s1").unwrap();
        pipeline.add_audio(id, &[0.3_f32; 16_000]).unwrap();
        pipeline.process_utterance(id).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        let snapshot = pipeline.utterance_snapshot(id).unwrap();
        assert!(snapshot.translated_text.is_some() || snapshot.error_message.is_some());
    }

    #[test]
    fn push_path_runs_end_to_end() {
        let pipeline = pipeline();
        pipeline.set_language_configuration("s1", "en", "es");
        let transcription = crate::pool::PooledTranscriptionResult {
            text: "hello there friend".to_string(),
            confidence: 0.95,
            is_partial: false,
            start_ms: 0,
            end_ms: 500,
            detected_language: None,
            language_confidence: None,
        };
        pipeline.submit_transcription(1, "s1", &transcription).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        let snapshot = pipeline.utterance_snapshot(1).unwrap();
        assert_eq!(snapshot.translated_text.as_deref(), Some("[es] hello there friend"));
    }
}
