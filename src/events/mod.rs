//! Event fan-out (C9): a registry of typed callbacks, dispatched to
//! observers, plus the pure wire-format encoders for the four JSON
//! notification shapes spec.md §6 defines.
//!
//! Grounded on `pipeline_websocket_integration.hpp`/`.cpp`'s
//! `PipelineWebSocketIntegration`: the original wires itself into the
//! pipeline via `setXCallback(lambda)` setters and forwards into a
//! `WebSocketServer::sendMessage`. Per spec.md §9's "cyclic references"
//! redesign flag, that back-edge (integration -> pipeline -> integration) is
//! broken here: [`Dispatcher`] only ever emits outward to registered
//! [`PipelineCallbacks`] implementors; it holds no reference back into the
//! pipeline that owns it.

mod wire;

pub use wire::{
    LanguageChangeMessage, LanguageDetectionResultMessage, PipelineErrorMessage,
    TranslationCompleteMessage, WireCandidate,
};

use crate::lang::DetectionResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

/// Payload delivered to [`PipelineCallbacks::on_translation_complete`] — the
/// full `translation_complete` notification (spec.md §6), independent of the
/// wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationNotification {
    /// Translated text.
    pub translated_text: String,
    /// Source language used for this translation.
    pub source_language: String,
    /// Target language used for this translation.
    pub target_language: String,
    /// MT confidence.
    pub confidence: f32,
    /// Whether this stage run changed the session's source language.
    pub language_changed: bool,
    /// The language in effect before the change, if `language_changed`.
    pub previous_language: Option<String>,
    /// The language detected that triggered the change, if `language_changed`.
    pub detected_language: Option<String>,
    /// Confidence of the triggering detection, if `language_changed`.
    pub language_confidence: Option<f32>,
}

/// Callback contracts invoked by [`Dispatcher`] (spec.md §6). Every method has
/// a no-op default so a registrant only implements the events it cares about.
pub trait PipelineCallbacks: Send + Sync {
    /// A transcription (partial or final) is available for an utterance.
    fn on_transcription_complete(
        &self,
        _utterance_id: u32,
        _session_id: &str,
        _text: &str,
        _confidence: f32,
        _is_partial: bool,
    ) {
    }

    /// Language detection ran for a session.
    fn on_language_detection_complete(&self, _session_id: &str, _detection: &DetectionResult) {}

    /// A session's effective source language changed.
    fn on_language_change(
        &self,
        _session_id: &str,
        _previous_language: &str,
        _detected_language: &str,
        _confidence: f32,
    ) {
    }

    /// A translation completed for an utterance.
    fn on_translation_complete(&self, _session_id: &str, _utterance_id: u32, _result: &TranslationNotification) {}

    /// A pipeline stage failed terminally for an utterance.
    fn on_pipeline_error(&self, _session_id: &str, _utterance_id: u32, _stage: &str, _message: &str) {}
}

/// Fan-out counters (spec.md §7: "Callback exceptions ... count against a
/// `callback_failures` metric").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStatistics {
    /// Total events dispatched across all callback kinds.
    pub events_dispatched: u64,
    /// Callback invocations that panicked and were caught.
    pub callback_failures: u64,
}

/// Registry of [`PipelineCallbacks`] implementors, dispatched in causal order
/// per `session_id` (spec.md §4.9, §5: "Within a single session_id, outbound
/// events are observed in order ... utterance boundaries preserve the order
/// of utterance_id. Across sessions, no ordering is guaranteed.").
pub struct Dispatcher {
    callbacks: RwLock<Vec<Arc<dyn PipelineCallbacks>>>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    events_dispatched: AtomicU64,
    callback_failures: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Build an empty dispatcher.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            session_locks: Mutex::new(HashMap::new()),
            events_dispatched: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
        }
    }

    /// Register a callback implementor. Registration order is preserved as
    /// invocation order within a single dispatch.
    pub fn register(&self, callback: Arc<dyn PipelineCallbacks>) {
        self.callbacks.write().expect("dispatcher callbacks poisoned").push(callback);
    }

    /// Number of currently registered callback implementors.
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().expect("dispatcher callbacks poisoned").len()
    }

    /// Point-in-time dispatch statistics.
    pub fn statistics(&self) -> DispatcherStatistics {
        DispatcherStatistics {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().expect("dispatcher session locks poisoned");
        Arc::clone(
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Dispatch a single event to every registered callback, serialized
    /// against other dispatches for the same `session_id`. A callback that
    /// panics is caught, counted, and never propagates (spec.md §7).
    fn dispatch(&self, session_id: &str, invoke: impl Fn(&dyn PipelineCallbacks) + Send + Sync + std::panic::RefUnwindSafe) {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().expect("dispatcher per-session lock poisoned");
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        let callbacks = self.callbacks.read().expect("dispatcher callbacks poisoned").clone();
        for cb in callbacks {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| invoke(cb.as_ref())));
            if result.is_err() {
                self.callback_failures.fetch_add(1, Ordering::Relaxed);
                warn!(session_id, "pipeline callback panicked; continuing dispatch");
            }
        }
    }

    /// Emit `transcription_complete` to every registered callback.
    pub fn emit_transcription_complete(
        &self,
        utterance_id: u32,
        session_id: &str,
        text: &str,
        confidence: f32,
        is_partial: bool,
    ) {
        self.dispatch(session_id, move |cb| {
            cb.on_transcription_complete(utterance_id, session_id, text, confidence, is_partial);
        });
    }

    /// Emit `language_detection_complete` to every registered callback.
    pub fn emit_language_detection_complete(&self, session_id: &str, detection: &DetectionResult) {
        self.dispatch(session_id, move |cb| {
            cb.on_language_detection_complete(session_id, detection);
        });
    }

    /// Emit `language_change` to every registered callback.
    pub fn emit_language_change(
        &self,
        session_id: &str,
        previous_language: &str,
        detected_language: &str,
        confidence: f32,
    ) {
        self.dispatch(session_id, move |cb| {
            cb.on_language_change(session_id, previous_language, detected_language, confidence);
        });
    }

    /// Emit `translation_complete` to every registered callback.
    pub fn emit_translation_complete(&self, session_id: &str, utterance_id: u32, result: &TranslationNotification) {
        self.dispatch(session_id, move |cb| {
            cb.on_translation_complete(session_id, utterance_id, result);
        });
    }

    /// Emit `pipeline_error` to every registered callback.
    pub fn emit_pipeline_error(&self, session_id: &str, utterance_id: u32, stage: &str, message: &str) {
        self.dispatch(session_id, move |cb| {
            cb.on_pipeline_error(session_id, utterance_id, stage, message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        events: StdMutex<Vec<String>>,
    }

    impl PipelineCallbacks for Recorder {
        fn on_translation_complete(&self, session_id: &str, utterance_id: u32, result: &TranslationNotification) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{session_id}:{utterance_id}:{}", result.translated_text));
        }

        fn on_pipeline_error(&self, session_id: &str, _utterance_id: u32, stage: &str, _message: &str) {
            self.events.lock().unwrap().push(format!("{session_id}:error:{stage}"));
        }
    }

    struct PanicsOnTranslation;
    impl PipelineCallbacks for PanicsOnTranslation {
        fn on_translation_complete(&self, _session_id: &str, _utterance_id: u32, _result: &TranslationNotification) {
            panic!("boom");
        }
    }

    fn sample_result(text: &str) -> TranslationNotification {
        TranslationNotification {
            translated_text: text.to_string(),
            source_language: "en".into(),
            target_language: "es".into(),
            confidence: 0.9,
            language_changed: false,
            previous_language: None,
            detected_language: None,
            language_confidence: None,
        }
    }

    #[test]
    fn registered_callback_receives_event() {
        let dispatcher = Dispatcher::new();
        let recorder = Arc::new(Recorder::default());
        dispatcher.register(recorder.clone());
        dispatcher.emit_translation_complete("s1", 1, &sample_result("Hola"));
        assert_eq!(*recorder.events.lock().unwrap(), vec!["s1:1:Hola".to_string()]);
    }

    #[test]
    fn panicking_callback_is_caught_and_counted() {
        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(PanicsOnTranslation));
        let recorder = Arc::new(Recorder::default());
        dispatcher.register(recorder.clone());
        dispatcher.emit_translation_complete("s1", 1, &sample_result("Hola"));
        // The recorder, registered after the panicking callback, must still
        // have run.
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.statistics().callback_failures, 1);
    }

    #[test]
    fn events_for_distinct_sessions_are_independent() {
        let dispatcher = Dispatcher::new();
        let recorder = Arc::new(Recorder::default());
        dispatcher.register(recorder.clone());
        dispatcher.emit_translation_complete("a", 1, &sample_result("x"));
        dispatcher.emit_translation_complete("b", 1, &sample_result("y"));
        let events = recorder.events.lock().unwrap();
        assert!(events.contains(&"a:1:x".to_string()));
        assert!(events.contains(&"b:1:y".to_string()));
    }
}
