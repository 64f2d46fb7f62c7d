//! Streaming MT sessions (C5): incremental text -> incremental translation,
//! with context carry.
//!
//! Grounded on
//! `examples/original_source/backend/include/mt/translation_interface.hpp`'s
//! `startStreamingTranslation`/`addStreamingText`/
//! `finalizeStreamingTranslation`/`cancelStreamingTranslation`/
//! `hasStreamingSession`, mapped one-to-one onto `start`/`push`/`finalize`/
//! `cancel`/`has` per spec.md §4.5.

use crate::engines::TranslationEngine;
use crate::error::PipelineError;
use crate::translation::TranslationResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-session incremental-translation state (spec.md §3 "Streaming MT
/// session").
struct Session {
    source: String,
    target: String,
    accumulated_text: String,
    /// Trailing tokens of the last translation output, carried as context
    /// into the next incremental re-translation.
    context_window: Vec<String>,
    chunks: usize,
    partials: usize,
    last_activity: Instant,
    active: bool,
}

/// Incremental translation sessions keyed by `session_id` (C5).
pub struct StreamingMtSessions {
    sessions: Mutex<HashMap<String, Session>>,
    engine: Arc<dyn TranslationEngine>,
    context_window_tokens: usize,
    session_timeout: Duration,
}

impl StreamingMtSessions {
    /// Build a session manager around an injected MT engine.
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        context_window_tokens: usize,
        session_timeout: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            engine,
            context_window_tokens,
            session_timeout,
        }
    }

    /// Start a new streaming session. Rejects an overlapping `start` for the
    /// same `session_id` (spec.md §3 invariant: "overlapping start calls are
    /// rejected").
    pub fn start(&self, session_id: &str, source: &str, target: &str) -> Result<(), PipelineError> {
        if !self.engine.supports_pair(source, target) {
            return Err(PipelineError::UnsupportedLanguagePair {
                source: source.to_string(),
                target: target.to_string(),
            });
        }
        let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
        if sessions.contains_key(session_id) {
            return Err(PipelineError::InvalidInput(format!(
                "streaming session {session_id} already exists"
            )));
        }
        sessions.insert(
            session_id.to_string(),
            Session {
                source: source.to_string(),
                target: target.to_string(),
                accumulated_text: String::new(),
                context_window: Vec::new(),
                chunks: 0,
                partials: 0,
                last_activity: Instant::now(),
                active: true,
            },
        );
        debug!(session_id, source, target, "streaming mt session started");
        Ok(())
    }

    /// Append `chunk` to the accumulated text and re-translate using the last
    /// N tokens of prior output as context, returning a result marked
    /// `is_partial = !is_final`.
    pub fn push(
        &self,
        session_id: &str,
        chunk: &str,
        is_final: bool,
    ) -> Result<TranslationResult, PipelineError> {
        let (source, target, accumulated, context) = {
            let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| PipelineError::InvalidInput(format!("no streaming session {session_id}")))?;
            if !session.active {
                return Err(PipelineError::InvalidInput(format!(
                    "streaming session {session_id} is already finalized"
                )));
            }
            session.accumulated_text.push_str(chunk);
            session.chunks += 1;
            session.last_activity = Instant::now();
            if is_final {
                session.partials += 0;
            } else {
                session.partials += 1;
            }
            (
                session.source.clone(),
                session.target.clone(),
                session.accumulated_text.clone(),
                session.context_window.join(" "),
            )
        };

        let contextual_input = if context.is_empty() {
            accumulated.clone()
        } else {
            format!("{context} {accumulated}")
        };

        let mut result = self
            .engine
            .translate(&contextual_input, &source, &target)?;
        result.is_partial = !is_final;
        result.is_streaming_complete = is_final;
        result.session_id = Some(session_id.to_string());

        {
            let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
            if let Some(session) = sessions.get_mut(session_id) {
                let tokens: Vec<String> = result
                    .translated_text
                    .split_whitespace()
                    .rev()
                    .take(self.context_window_tokens)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                session.context_window = tokens;
            }
        }

        Ok(result)
    }

    /// Mark a session's streaming complete and remove it, returning its final
    /// result.
    pub fn finalize(&self, session_id: &str) -> Result<TranslationResult, PipelineError> {
        let mut result = self.push(session_id, "", true)?;
        result.is_streaming_complete = true;
        let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
        sessions.remove(session_id);
        debug!(session_id, "streaming mt session finalized");
        Ok(result)
    }

    /// Destroy a session without producing a final result.
    pub fn cancel(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
        if sessions.remove(session_id).is_some() {
            debug!(session_id, "streaming mt session canceled");
        }
    }

    /// Whether a session with this id currently exists.
    pub fn has(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .expect("streaming mt sessions poisoned")
            .contains_key(session_id)
    }

    /// Garbage-collect sessions idle longer than `session_timeout` (spec.md
    /// §4.5 "Session expiry").
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("streaming mt sessions poisoned");
        let before = sessions.len();
        sessions.retain(|id, s| {
            let expired = s.last_activity.elapsed() > self.session_timeout;
            if expired {
                warn!(session_id = %id, "streaming mt session expired");
            }
            !expired
        });
        before - sessions.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("streaming mt sessions poisoned").len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
