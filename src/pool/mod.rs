//! Memory pools (C1): recyclable audio buffers and transcription-result
//! records so the hot path never allocates.
//!
//! Grounded on `examples/original_source/backend/include/utils/memory_pool.hpp`
//! (`MemoryPool<T>`, `AudioBufferPool`, `TranscriptionResultPool`), rebuilt
//! around an owned RAII handle instead of a `shared_ptr` with a capturing
//! deleter — see spec.md §9 on replacing `shared_ptr` patterns.

mod audio;
mod generic;
mod result;

pub use audio::AudioBufferPool;
pub use generic::{Handle, Pool, PoolStatistics};
pub use result::{PooledTranscriptionResult, ResultPool};
