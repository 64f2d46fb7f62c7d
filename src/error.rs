//! Error taxonomy for the utterance pipeline.
//!
//! Every stage task catches its own failures at the task boundary and converts
//! them into one of these variants before attaching them to the utterance and
//! delivering them via [`crate::events::PipelineCallbacks::on_pipeline_error`].
//! Errors never cross a worker boundary uncaught.

/// Top-level error type for the utterance pipeline.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Empty text, missing session, or malformed config. Never mutates state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No direct and no pivot translation path available for the language pair.
    #[error("unsupported language pair: {source} -> {target}")]
    UnsupportedLanguagePair {
        /// Source language code.
        source: String,
        /// Target language code.
        target: String,
    },

    /// STT confidence fell below `min_transcription_confidence`. Dropped silently;
    /// never drives the utterance into `Error`.
    #[error("confidence gate rejected transcription (confidence {confidence:.3})")]
    ConfidenceGateRejected {
        /// The rejected confidence value.
        confidence: f32,
    },

    /// A stage deadline (`utterance_timeout` or a per-stage timeout) was exceeded.
    #[error("stage timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// STT, MT, or the language detector returned failure after retry and fallback
    /// were exhausted.
    #[error("model failure in stage {stage}: {message}")]
    ModelFailure {
        /// The stage that failed (`"stt"`, `"mt"`, `"detect"`).
        stage: String,
        /// Underlying error message.
        message: String,
    },

    /// A memory pool's hard capacity was reached.
    #[error("memory pool exhausted: {0}")]
    PoolExhausted(String),

    /// The scheduler rejected a `submit_void` call because the queue is full.
    #[error("scheduler queue is full")]
    QueueFull,

    /// An invariant was violated. Logged and terminates the utterance.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Short machine-readable name of the error's stage/kind, used in the
    /// `pipeline_error` notification and in metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::UnsupportedLanguagePair { .. } => "UnsupportedLanguagePair",
            Self::ConfidenceGateRejected { .. } => "ConfidenceGateRejected",
            Self::Timeout(_) => "Timeout",
            Self::ModelFailure { .. } => "ModelFailure",
            Self::PoolExhausted(_) => "PoolExhausted",
            Self::QueueFull => "QueueFull",
            Self::Internal(_) => "Internal",
        }
    }

    /// Whether this error terminates the owning utterance in `Error` state.
    /// `ConfidenceGateRejected`, `InvalidInput`, and `QueueFull` are surfaced to
    /// the caller without ever touching utterance state.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::ConfidenceGateRejected { .. } | Self::InvalidInput(_) | Self::QueueFull
        )
    }
}

/// Convenience result type used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
