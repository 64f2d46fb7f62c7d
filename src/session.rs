//! Session registry (spec.md §3 "Session"): per-session effective language
//! pair, streaming-MT session id, and the single-flight gate over
//! `Transcribing` utterances.
//!
//! Grounded on spec.md §5's "Session language state: compare-and-set on a
//! small struct pointer." There's no `arc-swap` in the teacher's dependency
//! tree, so the swap is realized as a short critical section over a
//! `Mutex<Arc<LanguageState>>` — the same pattern `state::runtime`'s
//! `Mutex<Inner>` already uses elsewhere in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// A session's effective language configuration plus the bookkeeping the
/// automatic language-switching algorithm (spec.md §4.8) needs.
#[derive(Debug, Clone)]
pub struct LanguageState {
    pub source: String,
    pub target: String,
    pub last_detection: Option<String>,
    pub last_detection_at: Option<Instant>,
}

/// Per-session runtime state (spec.md §3).
pub struct Session {
    pub session_id: String,
    language: Mutex<Arc<LanguageState>>,
    streaming_mt_session: Mutex<Option<String>>,
    priority_boost: AtomicBool,
    /// At most one utterance in `Transcribing` at a time (spec.md §3
    /// invariant); subsequent ready utterances queue behind it.
    transcribing: AtomicBool,
}

impl Session {
    pub fn new(session_id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            language: Mutex::new(Arc::new(LanguageState {
                source: source.into(),
                target: target.into(),
                last_detection: None,
                last_detection_at: None,
            })),
            streaming_mt_session: Mutex::new(None),
            priority_boost: AtomicBool::new(false),
            transcribing: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current language state.
    pub fn language(&self) -> Arc<LanguageState> {
        Arc::clone(&self.language.lock().expect("session language state poisoned"))
    }

    /// Explicitly set the session's effective source/target (spec.md §6
    /// `set_language_configuration`). Does not touch `last_detection`.
    pub fn set_language_configuration(&self, source: &str, target: &str) {
        let mut guard = self.language.lock().expect("session language state poisoned");
        let prev = Arc::clone(&guard);
        *guard = Arc::new(LanguageState {
            source: source.to_string(),
            target: target.to_string(),
            last_detection: prev.last_detection.clone(),
            last_detection_at: prev.last_detection_at,
        });
    }

    /// Compare-and-set the effective source language: only swaps if the
    /// current source still equals `expected_source`, so two concurrent
    /// detections on the same session can't stomp on each other's swap
    /// (spec.md §4.8 "Automatic language switching state").
    pub fn try_swap_source(&self, expected_source: &str, new_source: &str) -> bool {
        let mut guard = self.language.lock().expect("session language state poisoned");
        if guard.source != expected_source {
            return false;
        }
        *guard = Arc::new(LanguageState {
            source: new_source.to_string(),
            target: guard.target.clone(),
            last_detection: Some(new_source.to_string()),
            last_detection_at: Some(Instant::now()),
        });
        true
    }

    /// Record a detection result without necessarily swapping the effective
    /// source (e.g. below the switching threshold, or a manual
    /// `trigger_language_detection` call).
    pub fn record_detection(&self, language: &str) {
        let mut guard = self.language.lock().expect("session language state poisoned");
        *guard = Arc::new(LanguageState {
            source: guard.source.clone(),
            target: guard.target.clone(),
            last_detection: Some(language.to_string()),
            last_detection_at: Some(Instant::now()),
        });
    }

    /// The session's current streaming-MT session id, if one is active.
    pub fn streaming_mt_session(&self) -> Option<String> {
        self.streaming_mt_session.lock().expect("session streaming id poisoned").clone()
    }

    pub fn set_streaming_mt_session(&self, id: Option<String>) {
        *self.streaming_mt_session.lock().expect("session streaming id poisoned") = id;
    }

    pub fn priority_boost(&self) -> bool {
        self.priority_boost.load(Ordering::Relaxed)
    }

    pub fn set_priority_boost(&self, boost: bool) {
        self.priority_boost.store(boost, Ordering::Relaxed);
    }

    /// Try to enter `Transcribing` for this session. Returns `false` if
    /// another utterance is already in flight, in which case the caller must
    /// queue the request rather than dispatch it.
    pub fn begin_transcribing(&self) -> bool {
        self.transcribing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the single-flight `Transcribing` slot.
    pub fn end_transcribing(&self) {
        self.transcribing.store(false, Ordering::SeqCst);
    }
}

/// Registry of [`Session`]s keyed by `session_id`, created lazily on first
/// touch and never explicitly destroyed by this crate (callers that close a
/// session are expected to call [`SessionRegistry::remove`]).
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    default_source: String,
    default_target: String,
}

impl SessionRegistry {
    pub fn new(default_source: impl Into<String>, default_target: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_source: default_source.into(),
            default_target: default_target.into(),
        }
    }

    /// Fetch the session, creating it with the registry's default language
    /// pair if this is the first time `session_id` has been seen.
    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().expect("session registry poisoned").get(session_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().expect("session registry poisoned");
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(session_id, &self.default_source, &self.default_target))),
        )
    }

    /// Drop a session's state outright (session close).
    pub fn remove(&self, session_id: &str) {
        self.sessions.write().expect("session registry poisoned").remove(session_id);
    }

    /// Number of currently tracked sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().expect("session registry poisoned").len()
    }

    /// Whether any sessions are currently tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_same_session_on_repeat() {
        let registry = SessionRegistry::new("auto", "en");
        let a = registry.get_or_create("s1");
        let b = registry.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn try_swap_source_fails_when_expectation_stale() {
        let session = Session::new("s1", "auto", "en");
        assert!(session.try_swap_source("auto", "es"));
        // A second caller still expecting "auto" loses the race.
        assert!(!session.try_swap_source("auto", "fr"));
        assert_eq!(session.language().source, "es");
    }

    #[test]
    fn begin_transcribing_is_single_flight() {
        let session = Session::new("s1", "auto", "en");
        assert!(session.begin_transcribing());
        assert!(!session.begin_transcribing());
        session.end_transcribing();
        assert!(session.begin_transcribing());
    }

    #[test]
    fn set_language_configuration_overrides_pair() {
        let session = Session::new("s1", "auto", "en");
        session.set_language_configuration("en", "es");
        let state = session.language();
        assert_eq!(state.source, "en");
        assert_eq!(state.target, "es");
    }
}
