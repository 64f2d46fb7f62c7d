//! Detection cache keyed on normalized text (spec.md §4.6).

use super::DetectionResult;
use crate::util::lru::LruMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters for the detection cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionCacheStats {
    /// Cache hits.
    pub hits: u64,
    /// Cache misses.
    pub misses: u64,
}

pub(super) struct DetectionCache {
    map: Mutex<LruMap<String, DetectionResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DetectionCache {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            map: Mutex::new(LruMap::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub(super) fn get(&self, key: &str) -> Option<DetectionResult> {
        let mut map = self.map.lock().expect("detection cache poisoned");
        let hit = map.get(&key.to_string()).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub(super) fn put(&self, key: String, value: DetectionResult) {
        let mut map = self.map.lock().expect("detection cache poisoned");
        map.insert(key, value);
    }

    pub(super) fn len(&self) -> usize {
        self.map.lock().expect("detection cache poisoned").len()
    }

    pub(super) fn clear(&self) {
        self.map.lock().expect("detection cache poisoned").clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub(super) fn stats(&self) -> DetectionCacheStats {
        DetectionCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
