//! Configuration types for the utterance pipeline.
//!
//! All fields enumerated in spec.md §4.8 and §5 live here, organized the way
//! the teacher organizes config: one root struct, one sub-struct per
//! component, `#[serde(default)]` everywhere so a partial TOML/JSON document
//! still produces a complete, valid config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the utterance pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Memory pool sizing (C1).
    pub pools: PoolConfig,
    /// Scheduler sizing and timeouts (C2).
    pub scheduler: SchedulerConfig,
    /// Streaming state sizing (C3).
    pub streaming_state: StreamingStateConfig,
    /// Translation cache sizing (C4).
    pub cache: CacheConfig,
    /// Streaming MT session sizing (C5).
    pub streaming_mt: StreamingMtConfig,
    /// Language detector thresholds (C6).
    pub language_detection: LanguageDetectionConfig,
    /// Utterance manager timeouts (C7).
    pub utterance: UtteranceConfig,
    /// Translation pipeline policy knobs (C8).
    pub translation: TranslationConfig,
}

impl PipelineConfig {
    /// Parse a full configuration document from TOML, falling back to
    /// `#[serde(default)]` for any field a partial document omits.
    pub fn from_toml(document: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(document)
    }
}

/// Memory pool configuration (C1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Initial number of pre-allocated audio buffers.
    pub audio_initial: usize,
    /// Hard cap on audio buffers.
    pub audio_max: usize,
    /// Default capacity (samples) for a freshly allocated audio buffer.
    pub audio_default_capacity: usize,
    /// Initial number of pre-allocated transcription-result records.
    pub result_initial: usize,
    /// Hard cap on transcription-result records.
    pub result_max: usize,
    /// Idle duration after which `cleanup` frees a pooled item (floor of 1 kept).
    pub max_idle: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            audio_initial: 20,
            audio_max: 200,
            audio_default_capacity: 16_000,
            result_initial: 50,
            result_max: 500,
            max_idle: Duration::from_secs(300),
        }
    }
}

/// Scheduler configuration (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads. `0` = auto-detect from available parallelism.
    pub num_workers: usize,
    /// Maximum tasks allowed across all queues before `submit_void` rejects
    /// with `QueueFull`.
    pub max_queue_size: usize,
    /// How long an idle worker blocks on the global queue before looping
    /// back to attempt a steal.
    pub thread_idle_timeout: Duration,
    /// Pin worker `i` to CPU core `i mod hw_cores`.
    pub enable_affinity: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            max_queue_size: 10_000,
            thread_idle_timeout: Duration::from_millis(250),
            enable_affinity: false,
        }
    }
}

/// Streaming state configuration (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingStateConfig {
    /// Maximum concurrent utterances tracked before `create` starts evicting
    /// idle inactive entries and, failing that, rejects.
    pub max_concurrent_utterances: usize,
    /// Bound on the per-utterance pending audio-chunk queue.
    pub max_pending_chunks: usize,
    /// Idle duration after which an inactive utterance is reclaimed by
    /// `cleanup`.
    pub max_idle: Duration,
    /// Interval between periodic `cleanup` sweeps.
    pub cleanup_interval: Duration,
}

impl Default for StreamingStateConfig {
    fn default() -> Self {
        Self {
            max_concurrent_utterances: 50,
            max_pending_chunks: 64,
            max_idle: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(5),
        }
    }
}

/// Translation cache configuration (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache is consulted/populated at all.
    pub enabled: bool,
    /// Bound on the number of cached entries; LRU eviction beyond this.
    pub max_size: usize,
    /// Minimum confidence a translation must have to be cached.
    pub confidence_floor: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1_000,
            confidence_floor: 0.0,
        }
    }
}

/// Streaming MT session configuration (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingMtConfig {
    /// Idle duration after which a session is garbage-collected.
    pub session_timeout: Duration,
    /// Interval between periodic expiry sweeps.
    pub cleanup_interval: Duration,
    /// Number of trailing tokens of prior output carried as context on each
    /// incremental re-translation.
    pub context_window_tokens: usize,
}

impl Default for StreamingMtConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
            context_window_tokens: 32,
        }
    }
}

/// Language detector configuration (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageDetectionConfig {
    /// Confidence at/above which a detection is `is_reliable`.
    pub reliability_threshold: f32,
    /// Whether `detect_cached` is backed by a cache at all.
    pub enable_caching: bool,
    /// Bound on the number of cached detections.
    pub cache_max_size: usize,
}

impl Default for LanguageDetectionConfig {
    fn default() -> Self {
        Self {
            reliability_threshold: 0.7,
            enable_caching: true,
            cache_max_size: 1_000,
        }
    }
}

/// Utterance manager configuration (C7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UtteranceConfig {
    /// Absolute per-utterance deadline from creation.
    pub utterance_timeout: Duration,
    /// Grace period a terminal utterance is retained before cleanup.
    pub terminal_grace_period: Duration,
    /// Interval between periodic cleanup sweeps of terminal utterances.
    pub cleanup_interval: Duration,
    /// Backoff before a single retry of a recoverable stage failure.
    pub retry_backoff: Duration,
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self {
            utterance_timeout: Duration::from_secs(60),
            terminal_grace_period: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Translation pipeline policy configuration (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Gate: transcriptions below this confidence are dropped before
    /// detection/translation.
    pub min_transcription_confidence: f32,
    /// Whether language detection runs at all.
    pub enable_language_detection: bool,
    /// Whether a confident detection differing from the session's current
    /// source swaps it for subsequent stages.
    pub enable_automatic_language_switching: bool,
    /// Confidence at/above which an automatic switch is applied.
    pub language_detection_confidence_threshold: f32,
    /// Minimum text length (chars) before automatic-switch detection runs.
    pub min_text_length_for_detection: usize,
    /// Whether detections are cached (delegates to the detector's own cache).
    pub enable_language_detection_caching: bool,
    /// Whether a `language_change` notification is emitted on swap.
    pub notify_language_changes: bool,
    /// Per-MT-call timeout.
    pub mt_timeout: Duration,
    /// Maximum batch size for batched translation dispatch.
    pub max_batch_size: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            min_transcription_confidence: 0.7,
            enable_language_detection: true,
            enable_automatic_language_switching: true,
            language_detection_confidence_threshold: 0.8,
            min_text_length_for_detection: 8,
            enable_language_detection_caching: true,
            notify_language_changes: true,
            mt_timeout: Duration::from_secs(5),
            max_batch_size: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.cache.max_size, 1_000);
        assert_eq!(cfg.translation.min_transcription_confidence, 0.7);
        assert_eq!(cfg.translation.language_detection_confidence_threshold, 0.8);
        assert_eq!(cfg.utterance.utterance_timeout, Duration::from_secs(60));
        assert_eq!(cfg.language_detection.reliability_threshold, 0.7);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let partial = serde_json::json!({ "cache": { "max_size": 50 } });
        let cfg: PipelineConfig = serde_json::from_value(partial).expect("parses");
        assert_eq!(cfg.cache.max_size, 50);
        assert_eq!(cfg.cache.confidence_floor, 0.0);
        assert_eq!(cfg.scheduler.max_queue_size, 10_000);
    }
}
