//! Shared utterance record store (spec.md §3 "Utterance", §4.7, §5).
//!
//! Owned jointly by the managed path ([`super::UtteranceManager`], C7) and
//! the push path (`crate::pipeline::TranslationPipeline`, C8) per
//! SPEC_FULL.md §6's "two collaborating types sharing one `utterance::Store`"
//! decision. Concurrency matches spec.md §5's "Utterance map: reader-writer
//! lock; writes only on create/remove" — per-utterance mutation takes the map
//! read lock plus that utterance's own short mutex.

use super::state::UtteranceState;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

struct Utterance {
    utterance_id: u32,
    session_id: String,
    state: UtteranceState,
    transcript: String,
    transcript_confidence: f32,
    detected_source_language: Option<String>,
    translated_text: Option<String>,
    target_language: Option<String>,
    voice_id: Option<String>,
    error_message: Option<String>,
    created_at: Instant,
    created_at_wall: DateTime<Utc>,
    last_activity: Instant,
    completed_at: Option<Instant>,
}

/// Read-only view of an utterance's payload and timing, the only form in
/// which external callers may observe one (spec.md §3 "Ownership").
#[derive(Debug, Clone)]
pub struct UtteranceSnapshot {
    pub utterance_id: u32,
    pub session_id: String,
    pub state: UtteranceState,
    pub transcript: String,
    pub transcript_confidence: f32,
    pub detected_source_language: Option<String>,
    pub translated_text: Option<String>,
    pub target_language: Option<String>,
    pub voice_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Utterance> for UtteranceSnapshot {
    fn from(u: &Utterance) -> Self {
        Self {
            utterance_id: u.utterance_id,
            session_id: u.session_id.clone(),
            state: u.state,
            transcript: u.transcript.clone(),
            transcript_confidence: u.transcript_confidence,
            detected_source_language: u.detected_source_language.clone(),
            translated_text: u.translated_text.clone(),
            target_language: u.target_language.clone(),
            voice_id: u.voice_id.clone(),
            error_message: u.error_message.clone(),
            created_at: u.created_at_wall,
        }
    }
}

/// Owns every tracked [`Utterance`], keyed by id (C7 data side).
pub struct Store {
    map: RwLock<HashMap<u32, Mutex<Utterance>>>,
    next_id: AtomicU32,
    utterance_timeout: Duration,
    terminal_grace_period: Duration,
}

impl Store {
    pub fn new(utterance_timeout: Duration, terminal_grace_period: Duration) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            utterance_timeout,
            terminal_grace_period,
        }
    }

    /// Create a fresh utterance in `Created` state for the managed path
    /// (spec.md §4.7 — created on `process_utterance`'s `create_utterance`
    /// precursor).
    pub fn create(&self, session_id: &str) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let utterance = Utterance {
            utterance_id: id,
            session_id: session_id.to_string(),
            state: UtteranceState::Created,
            transcript: String::new(),
            transcript_confidence: 0.0,
            detected_source_language: None,
            translated_text: None,
            target_language: None,
            voice_id: None,
            error_message: None,
            created_at: now,
            created_at_wall: Utc::now(),
            last_activity: now,
            completed_at: None,
        };
        self.map
            .write()
            .expect("utterance store poisoned")
            .insert(id, Mutex::new(utterance));
        id
    }

    /// Track an externally-produced utterance for the push path (spec.md
    /// §4.8): the transcript already exists by the time `submit_transcription`
    /// is called, so the record starts life in `Transcribing` rather than
    /// `Created`. Idempotent: a second call for an id already tracked is a
    /// no-op.
    pub fn ensure_tracked(&self, utterance_id: u32, session_id: &str) {
        let map = self.map.read().expect("utterance store poisoned");
        if map.contains_key(&utterance_id) {
            return;
        }
        drop(map);
        let mut map = self.map.write().expect("utterance store poisoned");
        map.entry(utterance_id).or_insert_with(|| {
            let now = Instant::now();
            Mutex::new(Utterance {
                utterance_id,
                session_id: session_id.to_string(),
                state: UtteranceState::Transcribing,
                transcript: String::new(),
                transcript_confidence: 0.0,
                detected_source_language: None,
                translated_text: None,
                target_language: None,
                voice_id: None,
                error_message: None,
                created_at: now,
                created_at_wall: Utc::now(),
                last_activity: now,
                completed_at: None,
            })
        });
    }

    fn with_utterance<R>(&self, id: u32, f: impl FnOnce(&mut Utterance) -> R) -> Result<R, PipelineError> {
        let map = self.map.read().expect("utterance store poisoned");
        let slot = map
            .get(&id)
            .ok_or_else(|| PipelineError::InvalidInput(format!("no utterance {id}")))?;
        let mut utterance = slot.lock().expect("utterance entry poisoned");
        Ok(f(&mut utterance))
    }

    /// Move `id` to state `to`, enforcing the DAG (spec.md §3 "An utterance
    /// never regresses to an earlier state").
    pub fn transition(&self, id: u32, to: UtteranceState) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            if !u.state.can_transition_to(&to) {
                return Err(PipelineError::Internal(format!(
                    "invalid utterance transition {:?} -> {:?} for utterance {id}",
                    u.state, to
                )));
            }
            u.state = to;
            u.last_activity = Instant::now();
            if to.is_terminal() {
                u.completed_at = Some(Instant::now());
            }
            Ok(())
        })?
    }

    pub fn set_transcript(&self, id: u32, text: &str, confidence: f32) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            u.transcript = text.to_string();
            u.transcript_confidence = confidence;
            u.last_activity = Instant::now();
        })
    }

    pub fn set_detection(&self, id: u32, language: &str) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            u.detected_source_language = Some(language.to_string());
            u.last_activity = Instant::now();
        })
    }

    pub fn set_translation(&self, id: u32, translated_text: &str, target_language: &str) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            u.translated_text = Some(translated_text.to_string());
            u.target_language = Some(target_language.to_string());
            u.last_activity = Instant::now();
        })
    }

    pub fn set_voice_id(&self, id: u32, voice_id: &str) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            u.voice_id = Some(voice_id.to_string());
        })
    }

    pub fn set_error(&self, id: u32, message: &str) -> Result<(), PipelineError> {
        self.with_utterance(id, |u| {
            u.error_message = Some(message.to_string());
            u.last_activity = Instant::now();
        })
    }

    pub fn snapshot(&self, id: u32) -> Option<UtteranceSnapshot> {
        let map = self.map.read().expect("utterance store poisoned");
        map.get(&id).map(|slot| UtteranceSnapshot::from(&*slot.lock().expect("utterance entry poisoned")))
    }

    /// Drop a tracked utterance outright.
    pub fn remove(&self, id: u32) {
        self.map.write().expect("utterance store poisoned").remove(&id);
    }

    /// Number of utterances currently tracked.
    pub fn len(&self) -> usize {
        self.map.read().expect("utterance store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transition any utterance whose age exceeds `utterance_timeout` and
    /// which has not yet reached a terminal state to `Error` (spec.md §4.7
    /// "On timeout ... transitions to Error with kind Timeout"). Returns the
    /// `(utterance_id, session_id)` pairs affected, for the caller to notify.
    pub fn enforce_timeouts(&self) -> Vec<(u32, String)> {
        let map = self.map.read().expect("utterance store poisoned");
        let mut expired = Vec::new();
        for slot in map.values() {
            let mut u = slot.lock().expect("utterance entry poisoned");
            if u.state.is_terminal() {
                continue;
            }
            if u.created_at.elapsed() > self.utterance_timeout {
                u.state = UtteranceState::Error;
                u.error_message = Some("utterance exceeded utterance_timeout".to_string());
                u.completed_at = Some(Instant::now());
                expired.push((u.utterance_id, u.session_id.clone()));
            }
        }
        expired
    }

    /// Remove every terminal utterance whose grace period has elapsed
    /// (spec.md §4.7 "Cleanup of terminal utterances is periodic").
    pub fn cleanup(&self) -> usize {
        let expired: Vec<u32> = {
            let map = self.map.read().expect("utterance store poisoned");
            map.values()
                .filter_map(|slot| {
                    let u = slot.lock().expect("utterance entry poisoned");
                    let past_grace = u
                        .completed_at
                        .map(|t| t.elapsed() > self.terminal_grace_period)
                        .unwrap_or(false);
                    (u.state.is_terminal() && past_grace).then_some(u.utterance_id)
                })
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut map = self.map.write().expect("utterance store poisoned");
        for id in &expired {
            map.remove(id);
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::new(Duration::from_secs(60), Duration::from_secs(30))
    }

    #[test]
    fn create_starts_in_created_state() {
        let store = store();
        let id = store.create("s1");
        assert_eq!(store.snapshot(id).unwrap().state, UtteranceState::Created);
    }

    #[test]
    fn ensure_tracked_starts_in_transcribing_and_is_idempotent() {
        let store = store();
        store.ensure_tracked(7, "s1");
        assert_eq!(store.snapshot(7).unwrap().state, UtteranceState::Transcribing);
        store.ensure_tracked(7, "s1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let store = store();
        let id = store.create("s1");
        assert!(store.transition(id, UtteranceState::Complete).is_err());
    }

    #[test]
    fn terminal_transition_sets_completed_at() {
        let store = store();
        store.ensure_tracked(1, "s1");
        store.transition(1, UtteranceState::Translating).unwrap();
        store.transition(1, UtteranceState::Complete).unwrap();
        // Cleanup with zero grace should reclaim it immediately.
        let store = Store::new(Duration::from_secs(60), Duration::from_secs(0));
        store.ensure_tracked(1, "s1");
        store.transition(1, UtteranceState::Translating).unwrap();
        store.transition(1, UtteranceState::Complete).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup(), 1);
        assert!(store.snapshot(1).is_none());
    }

    #[test]
    fn timeout_enforcement_errors_stale_utterances() {
        let store = Store::new(Duration::from_millis(0), Duration::from_secs(30));
        store.ensure_tracked(1, "s1");
        std::thread::sleep(Duration::from_millis(5));
        let expired = store.enforce_timeouts();
        assert_eq!(expired, vec![(1, "s1".to_string())]);
        assert_eq!(store.snapshot(1).unwrap().state, UtteranceState::Error);
    }
}
