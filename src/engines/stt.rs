//! Speech-to-text engine trait boundary (spec.md §1 "STT model (Whisper)").
//!
//! Only used by the managed path (C7 `process_utterance`); the push path
//! (C8) receives an already-produced [`crate::pool::PooledTranscriptionResult`]
//! from an upstream producer and never touches this trait.

use crate::error::PipelineError;
use crate::pool::PooledTranscriptionResult;

/// Trait boundary for a speech-to-text engine.
pub trait SpeechToTextEngine: Send + Sync {
    /// Transcribe raw `f32` samples.
    fn transcribe(&self, samples: &[f32]) -> Result<PooledTranscriptionResult, PipelineError>;
}

/// Deterministic mock STT: reports a fixed confidence proportional to
/// signal energy and a placeholder transcript. Enough to drive the managed
/// pipeline path in tests without a real acoustic model.
#[derive(Debug, Clone, Default)]
pub struct MockSpeechToTextEngine;

impl SpeechToTextEngine for MockSpeechToTextEngine {
    fn transcribe(&self, samples: &[f32]) -> Result<PooledTranscriptionResult, PipelineError> {
        if samples.is_empty() {
            return Err(PipelineError::InvalidInput("cannot transcribe empty audio".into()));
        }
        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        let confidence = rms.clamp(0.0, 1.0).max(0.5);
        Ok(PooledTranscriptionResult {
            text: "transcribed audio".to_string(),
            confidence,
            is_partial: false,
            start_ms: 0,
            end_ms: (samples.len() as u64 * 1000) / 16_000,
            detected_language: None,
            language_confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_audio_is_invalid_input() {
        let engine = MockSpeechToTextEngine;
        assert!(matches!(
            engine.transcribe(&[]),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn nonempty_audio_produces_a_result() {
        let engine = MockSpeechToTextEngine;
        let samples = vec![0.1_f32; 16_000];
        let result = engine.transcribe(&samples).unwrap();
        assert!(!result.is_partial);
        assert_eq!(result.end_ms, 1000);
    }
}
