//! Translation result type (spec.md §3 "Translation result"), shared by the
//! cache (C4), streaming MT sessions (C5), and the pipeline (C8).

mod types;

pub use types::TranslationResult;
