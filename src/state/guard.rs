//! Scope-bound utterance runtime lifetime.
//!
//! Grounded on `optimized_streaming_state.hpp`'s `UtteranceHandle`: an RAII
//! wrapper that finalizes and removes an utterance's streaming state when it
//! goes out of scope, so a managed-path (C7) caller doesn't have to remember
//! to clean up on every early return.

use super::StreamingState;
use std::sync::Arc;

/// Move-only handle over a single utterance's streaming-state entry.
/// Finalizes (stops accepting audio) and removes the entry on drop, unless
/// [`UtteranceGuard::release`] has already detached it.
pub struct UtteranceGuard {
    utterance_id: u32,
    state: Arc<StreamingState>,
    released: bool,
}

impl UtteranceGuard {
    pub(super) fn new(utterance_id: u32, state: Arc<StreamingState>) -> Self {
        Self {
            utterance_id,
            state,
            released: false,
        }
    }

    /// The utterance id this guard owns.
    pub fn utterance_id(&self) -> u32 {
        self.utterance_id
    }

    /// Detach the guard from its cleanup duty, leaving the streaming state in
    /// place for some other owner to manage (e.g. a longer-lived cache).
    pub fn release(mut self) -> u32 {
        self.released = true;
        self.utterance_id
    }
}

impl Drop for UtteranceGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let _ = self.state.finalize(self.utterance_id);
        self.state.remove(self.utterance_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamingStateConfig;
    use crate::pool::AudioBufferPool;

    fn state() -> Arc<StreamingState> {
        Arc::new(StreamingState::new(
            Arc::new(AudioBufferPool::new(2, 16, 1_000)),
            &StreamingStateConfig::default(),
        ))
    }

    #[test]
    fn drop_finalizes_and_removes() {
        let state = state();
        state.create(1).unwrap();
        {
            let _guard = Arc::clone(&state).guard_existing(1);
        }
        assert!(!state.has(1));
    }

    #[test]
    fn release_skips_cleanup() {
        let state = state();
        state.create(1).unwrap();
        let guard = Arc::clone(&state).guard_existing(1);
        let id = guard.release();
        assert_eq!(id, 1);
        assert!(state.has(1));
        state.remove(1);
    }

    #[test]
    fn create_guarded_creates_and_wraps() {
        let state = state();
        let guard = Arc::clone(&state).create_guarded(1).unwrap();
        assert_eq!(guard.utterance_id(), 1);
        assert!(state.has(1));
        drop(guard);
        assert!(!state.has(1));
    }
}
