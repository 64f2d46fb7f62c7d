//! vocalbridge: the core utterance pipeline behind a real-time speech
//! translation backend.
//!
//! A caller feeds this crate either raw audio (the *managed* path:
//! [`Pipeline::create_utterance`] / [`Pipeline::add_audio`] /
//! [`Pipeline::process_utterance`], which drives its own injected STT
//! engine) or an already-produced transcription (the *push* path:
//! [`Pipeline::submit_transcription`]). Both paths converge on the same
//! language-detection -> translation pipeline and the same event fan-out.
//!
//! # Architecture
//!
//! - **C1 memory pools** (`pool`): recyclable audio buffers and
//!   transcription-result records.
//! - **C2 scheduler** (`scheduler`): priority + work-stealing thread pool
//!   stage tasks run on.
//! - **C3 streaming state** (`state`): per-utterance audio-chunk buffering.
//! - **C4 translation cache** (`cache`): bounded LRU over translated text.
//! - **C5 streaming MT sessions** (`streaming_mt`): incremental
//!   text -> incremental translation with context carry.
//! - **C6 language detector** (`lang`): detection plus its own cache.
//! - **C7 utterance manager** (`utterance`): the managed path's state
//!   machine and single-flight session gate.
//! - **C8 translation pipeline** (`pipeline`): the push path's
//!   detect/translate/notify algorithm, shared with C7 once a transcript
//!   exists.
//! - **C9 event fan-out** (`events`): typed callbacks plus wire encoders.
//!
//! [`Pipeline`] wires all nine together from one [`config::PipelineConfig`].

pub mod cache;
pub mod config;
pub mod engines;
pub mod error;
pub mod events;
pub mod lang;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod streaming_mt;
pub mod translation;
pub mod utterance;
mod util;

mod facade;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use facade::{Pipeline, PipelineSnapshot};
