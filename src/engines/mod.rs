//! Model trait boundaries (spec.md §1, §9): STT, MT, and language detection
//! are out of scope as concrete models — only the operations the core
//! invokes on them are specified here. Concrete engines (Whisper-like STT,
//! Marian-like MT) are injected by the caller; this crate ships deterministic
//! mocks so the pipeline is exercisable without a real model.
//!
//! Grounded on
//! `examples/original_source/backend/include/mt/translation_interface.hpp`
//! (`TranslationInterface`), rebuilt as a Rust trait per spec.md §9's
//! "opaque void* model handles -> trait/interface" redesign flag.

mod fallback;
mod mt;
mod stt;

pub use fallback::HeuristicFallbackTranslator;
pub use mt::{MockTranslationEngine, TranslationEngine};
pub use stt::{MockSpeechToTextEngine, SpeechToTextEngine};

pub use crate::lang::{LanguageDetectorEngine, MockLanguageDetectorEngine};
