//! Utterance state machine (spec.md §3, §4.7).

/// One of the seven states an utterance passes through. Transitions form a
/// DAG ending at `Complete` or `Error` — they never regress (spec.md §3
/// "Global invariants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtteranceState {
    Created,
    Transcribing,
    Detecting,
    Translating,
    /// Reserved for downstream TTS; the manager never schedules a stage task
    /// for it (spec.md §9 / SPEC_FULL.md §6 decision). Kept in the enum for
    /// API completeness.
    Synthesizing,
    Complete,
    Error,
}

impl UtteranceState {
    /// Whether a transition from `self` to `to` is allowed (spec.md §4.7).
    pub fn can_transition_to(&self, to: &UtteranceState) -> bool {
        use UtteranceState::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Error) {
            return true;
        }
        matches!(
            (self, to),
            (Created, Transcribing)
                | (Transcribing, Translating)
                | (Transcribing, Detecting)
                | (Detecting, Translating)
                | (Translating, Synthesizing)
                | (Translating, Complete)
                | (Synthesizing, Complete)
        )
    }

    /// Terminal states (`Complete`, `Error`) never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UtteranceState::Complete | UtteranceState::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_only_advances_to_transcribing() {
        assert!(UtteranceState::Created.can_transition_to(&UtteranceState::Transcribing));
        assert!(!UtteranceState::Created.can_transition_to(&UtteranceState::Translating));
    }

    #[test]
    fn any_nonterminal_state_may_error() {
        assert!(UtteranceState::Transcribing.can_transition_to(&UtteranceState::Error));
        assert!(UtteranceState::Detecting.can_transition_to(&UtteranceState::Error));
        assert!(UtteranceState::Translating.can_transition_to(&UtteranceState::Error));
    }

    #[test]
    fn terminal_states_accept_nothing_further() {
        assert!(!UtteranceState::Complete.can_transition_to(&UtteranceState::Error));
        assert!(!UtteranceState::Error.can_transition_to(&UtteranceState::Complete));
    }

    #[test]
    fn transcribing_may_skip_detecting() {
        assert!(UtteranceState::Transcribing.can_transition_to(&UtteranceState::Translating));
    }
}
