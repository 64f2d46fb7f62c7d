//! Utterance manager (C7): drives utterances through the state machine on
//! the *managed* path, where this component invokes STT itself rather than
//! receiving an already-produced transcription (spec.md §4.7, in contrast to
//! the push path in `crate::pipeline`).

use super::store::Store;
use crate::config::UtteranceConfig;
use crate::engines::SpeechToTextEngine;
use crate::error::PipelineError;
use crate::events::Dispatcher;
use crate::pipeline::TranslationPipeline;
use crate::scheduler::{Priority, Scheduler};
use crate::session::SessionRegistry;
use crate::state::StreamingState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Pending utterances per session, waiting for the session's single
/// `Transcribing` slot (spec.md §3 "subsequent utterances queue behind it").
/// Tie-broken by earliest `created_at`, then lowest `utterance_id` (spec.md
/// §4.7).
type PendingQueues = Mutex<HashMap<String, Vec<(Instant, u32)>>>;

/// Drives the managed path (C7). Cheap to clone — every field is an `Arc`.
#[derive(Clone)]
pub struct UtteranceManager {
    store: Arc<Store>,
    sessions: Arc<SessionRegistry>,
    streaming_state: Arc<StreamingState>,
    stt_engine: Arc<dyn SpeechToTextEngine>,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<Dispatcher>,
    pipeline: Arc<TranslationPipeline>,
    pending: Arc<PendingQueues>,
    retry_backoff: std::time::Duration,
}

impl UtteranceManager {
    pub fn new(
        store: Arc<Store>,
        sessions: Arc<SessionRegistry>,
        streaming_state: Arc<StreamingState>,
        stt_engine: Arc<dyn SpeechToTextEngine>,
        scheduler: Arc<Scheduler>,
        dispatcher: Arc<Dispatcher>,
        pipeline: Arc<TranslationPipeline>,
        config: &UtteranceConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            streaming_state,
            stt_engine,
            scheduler,
            dispatcher,
            pipeline,
            pending: Arc::new(Mutex::new(HashMap::new())),
            retry_backoff: config.retry_backoff,
        }
    }

    /// Create a new utterance for `session_id` and its matching streaming
    /// audio buffer (spec.md §6 `create_utterance`).
    pub fn create_utterance(&self, session_id: &str) -> Result<u32, PipelineError> {
        self.sessions.get_or_create(session_id);
        let id = self.store.create(session_id);
        self.streaming_state.create(id)?;
        Ok(id)
    }

    /// Append raw samples to an utterance's pending audio queue (spec.md §6
    /// `add_audio`).
    pub fn add_audio(&self, utterance_id: u32, samples: &[f32]) -> Result<(), PipelineError> {
        self.streaming_state.add_audio_chunk(utterance_id, samples)
    }

    /// Kick off transcription for `utterance_id` (spec.md §6
    /// `process_utterance`). If the owning session already has another
    /// utterance `Transcribing`, this one queues instead (spec.md §3
    /// invariant) and is dispatched automatically once the slot frees up.
    pub fn process_utterance(&self, utterance_id: u32) -> Result<(), PipelineError> {
        let snapshot = self
            .store
            .snapshot(utterance_id)
            .ok_or_else(|| PipelineError::InvalidInput(format!("no utterance {utterance_id}")))?;
        let session = self.sessions.get_or_create(&snapshot.session_id);
        if !session.begin_transcribing() {
            let created_at = Instant::now();
            let mut pending = self.pending.lock().expect("utterance manager pending queue poisoned");
            pending.entry(snapshot.session_id.clone()).or_default().push((created_at, utterance_id));
            debug!(utterance_id, session_id = %snapshot.session_id, "utterance queued behind in-flight transcription");
            return Ok(());
        }
        self.dispatch_transcription(utterance_id, snapshot.session_id)
    }

    fn dispatch_transcription(&self, utterance_id: u32, session_id: String) -> Result<(), PipelineError> {
        self.store.transition(utterance_id, super::state::UtteranceState::Transcribing)?;
        let manager = self.clone();
        self.scheduler.submit_void(Priority::High, move || {
            manager.run_transcription_stage(utterance_id, session_id);
        })
    }

    fn run_transcription_stage(&self, utterance_id: u32, session_id: String) {
        let mut samples = Vec::new();
        while let Ok(Some(buf)) = self.streaming_state.next_audio_buffer(utterance_id) {
            samples.extend_from_slice(buf.samples());
        }

        let mut attempt = self.stt_engine.transcribe(&samples);
        if attempt.is_err() {
            std::thread::sleep(self.retry_backoff);
            attempt = self.stt_engine.transcribe(&samples);
        }

        match attempt {
            Ok(result) => {
                let _ = self.streaming_state.set_transcription(utterance_id, &result.text, result.confidence, result.is_partial);
                self.dispatcher.emit_transcription_complete(
                    utterance_id,
                    &session_id,
                    &result.text,
                    result.confidence,
                    result.is_partial,
                );
                if let Err(e) = self.pipeline.submit_transcription(utterance_id, &session_id, &result) {
                    warn!(utterance_id, session_id = %session_id, error = %e, "managed-path handoff to pipeline failed");
                }
            }
            Err(e) => {
                let _ = self.store.set_error(utterance_id, &e.to_string());
                let _ = self.store.transition(utterance_id, super::state::UtteranceState::Error);
                self.dispatcher.emit_pipeline_error(&session_id, utterance_id, "transcription", &e.to_string());
            }
        }

        let sessions = Arc::clone(&self.sessions);
        sessions.get_or_create(&session_id).end_transcribing();
        self.advance_queue(&session_id);
    }

    /// Dispatch the next queued utterance for `session_id`, if any, now that
    /// the single-flight slot has freed up.
    fn advance_queue(&self, session_id: &str) {
        let next = {
            let mut pending = self.pending.lock().expect("utterance manager pending queue poisoned");
            let Some(queue) = pending.get_mut(session_id) else {
                return;
            };
            if queue.is_empty() {
                return;
            }
            queue.sort_by_key(|(created_at, id)| (*created_at, *id));
            Some(queue.remove(0))
        };
        if let Some((_, utterance_id)) = next {
            if let Err(e) = self.process_utterance(utterance_id) {
                warn!(utterance_id, session_id, error = %e, "failed to dispatch queued utterance");
            }
        }
    }

    /// Sweep utterances past `utterance_timeout` to `Error` and notify C9
    /// (spec.md §4.7 "On timeout ... transitions to Error with kind
    /// Timeout").
    pub fn enforce_timeouts(&self) {
        for (utterance_id, session_id) in self.store.enforce_timeouts() {
            self.dispatcher.emit_pipeline_error(&session_id, utterance_id, "timeout", "utterance exceeded utterance_timeout");
        }
    }

    /// Reclaim terminal utterances past their grace period (spec.md §4.7
    /// "Cleanup of terminal utterances is periodic").
    pub fn cleanup(&self) -> usize {
        self.store.cleanup()
    }

    /// Point-in-time view of a tracked utterance, if it still exists.
    pub fn snapshot(&self, utterance_id: u32) -> Option<super::store::UtteranceSnapshot> {
        self.store.snapshot(utterance_id)
    }

    /// Number of utterances currently tracked, across every state.
    pub fn tracked_utterances(&self) -> usize {
        self.store.len()
    }
}
