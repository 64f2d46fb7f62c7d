//! Pure JSON wire encoders for the four outbound notification shapes.
//!
//! Grounded on `language_change_message.hpp`/`.cpp` (field names, 3-decimal
//! confidence formatting via the original's `std::setprecision(3)`) and
//! `pipeline_websocket_integration.cpp`'s `handleTranslationComplete` /
//! `handlePipelineError` / `sendLanguageDetectionResult` for the other three
//! shapes. These are pure data types + `serde_json::to_string`; nothing here
//! touches a transport.

use crate::lang::DetectionResult;
use serde::{Deserialize, Serialize};

/// Round a confidence value to 3 decimal places, matching the original's
/// `std::setprecision(3)` formatting.
fn round3(value: f32) -> f64 {
    ((value as f64) * 1000.0).round() / 1000.0
}

/// `{"type": "language_change", ...}` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageChangeMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    pub previous_language: String,
    pub detected_language: String,
    pub confidence: f64,
    pub timestamp_ms: i64,
}

impl LanguageChangeMessage {
    /// Build the message for a session whose source language just changed.
    pub fn new(session_id: &str, previous_language: &str, detected_language: &str, confidence: f32, timestamp_ms: i64) -> Self {
        Self {
            kind: "language_change".to_string(),
            session_id: session_id.to_string(),
            previous_language: previous_language.to_string(),
            detected_language: detected_language.to_string(),
            confidence: round3(confidence),
            timestamp_ms,
        }
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("LanguageChangeMessage serialization cannot fail")
    }

    /// Decode from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One entry of `language_detection_result`'s `candidates` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCandidate {
    pub language: String,
    pub confidence: f64,
}

/// `{"type": "language_detection_result", ...}` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetectionResultMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    pub detected_language: String,
    pub confidence: f64,
    pub is_reliable: bool,
    pub detection_method: String,
    pub candidates: Vec<WireCandidate>,
    pub timestamp_ms: i64,
}

impl LanguageDetectionResultMessage {
    /// Build from a detection result.
    pub fn new(session_id: &str, detection: &DetectionResult, timestamp_ms: i64) -> Self {
        Self {
            kind: "language_detection_result".to_string(),
            session_id: session_id.to_string(),
            detected_language: detection.language.clone(),
            confidence: round3(detection.confidence),
            is_reliable: detection.is_reliable,
            detection_method: detection.method.clone(),
            candidates: detection
                .candidates
                .iter()
                .map(|c| WireCandidate {
                    language: c.language.clone(),
                    confidence: round3(c.score),
                })
                .collect(),
            timestamp_ms,
        }
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("LanguageDetectionResultMessage serialization cannot fail")
    }
}

/// `{"type": "translation_complete", ...}` (spec.md §6). Only sent by the
/// integration layer when `language_changed` is true, per
/// `handleTranslationComplete` in the original — callers decide whether to
/// emit it; this type only encodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationCompleteMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub utterance_id: u32,
    pub session_id: String,
    pub translated_text: String,
    pub confidence: f64,
    pub source_language: String,
    pub target_language: String,
    pub language_changed: bool,
    pub previous_language: Option<String>,
    pub detected_language: Option<String>,
    pub language_confidence: Option<f64>,
}

impl TranslationCompleteMessage {
    /// Build from a dispatched [`super::TranslationNotification`].
    pub fn new(session_id: &str, utterance_id: u32, notification: &super::TranslationNotification) -> Self {
        Self {
            kind: "translation_complete".to_string(),
            utterance_id,
            session_id: session_id.to_string(),
            translated_text: notification.translated_text.clone(),
            confidence: round3(notification.confidence),
            source_language: notification.source_language.clone(),
            target_language: notification.target_language.clone(),
            language_changed: notification.language_changed,
            previous_language: notification.previous_language.clone(),
            detected_language: notification.detected_language.clone(),
            language_confidence: notification.language_confidence.map(round3),
        }
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("TranslationCompleteMessage serialization cannot fail")
    }
}

/// `{"type": "pipeline_error", ...}` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineErrorMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub utterance_id: u32,
    pub session_id: String,
    pub stage: String,
    pub error_message: String,
    pub timestamp_ms: i64,
}

impl PipelineErrorMessage {
    /// Build from an error notification.
    pub fn new(session_id: &str, utterance_id: u32, stage: &str, error_message: &str, timestamp_ms: i64) -> Self {
        Self {
            kind: "pipeline_error".to_string(),
            utterance_id,
            session_id: session_id.to_string(),
            stage: stage.to_string(),
            error_message: error_message.to_string(),
            timestamp_ms,
        }
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("PipelineErrorMessage serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageCandidate;

    #[test]
    fn language_change_round_trips() {
        let msg = LanguageChangeMessage::new("s1", "en", "es", 0.87654, 1_700_000_000_000);
        let json = msg.to_json();
        let decoded = LanguageChangeMessage::from_json(&json).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.confidence, 0.877);
    }

    #[test]
    fn language_change_has_expected_type_tag() {
        let msg = LanguageChangeMessage::new("s1", "en", "es", 0.9, 0);
        assert!(msg.to_json().contains("\"type\":\"language_change\""));
    }

    #[test]
    fn detection_result_wire_rounds_candidate_confidence() {
        let detection = DetectionResult {
            language: "es".into(),
            confidence: 0.91111,
            is_reliable: true,
            method: "mock".into(),
            candidates: vec![LanguageCandidate {
                language: "es".into(),
                score: 0.91111,
            }],
        };
        let msg = LanguageDetectionResultMessage::new("s1", &detection, 0);
        assert_eq!(msg.candidates[0].confidence, 0.911);
        assert_eq!(msg.kind, "language_detection_result");
    }

    #[test]
    fn pipeline_error_carries_stage_and_message() {
        let msg = PipelineErrorMessage::new("s1", 7, "translation", "MT engine timed out", 42);
        let json = msg.to_json();
        assert!(json.contains("\"stage\":\"translation\""));
        assert!(json.contains("\"utterance_id\":7"));
    }
}
