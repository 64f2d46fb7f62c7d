//! Translation cache (C4): fingerprint -> translation, bounded, LRU eviction.
//!
//! Grounded on spec.md §4.4: normalization (trim + lowercase) happens only
//! for the fingerprint; the stored value keeps original casing. A cache hit
//! never changes size; a miss followed by `put` may evict at most one entry
//! (the [`crate::util::lru::LruMap`] this wraps guarantees that by
//! construction — one `insert` evicts at most one tail node).

use crate::util::lru::LruMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A cached translation (spec.md §3 "Cache entry").
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached translated text (original casing preserved).
    pub translated_text: String,
    /// Confidence of the cached translation.
    pub confidence: f32,
    /// When this entry was first inserted.
    pub inserted_at: Instant,
    /// When this entry was last read.
    pub last_hit_at: Instant,
    /// Number of times this entry has been read.
    pub hit_count: u64,
}

/// Opaque fingerprint over `(source_lang, target_lang, normalized(text))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Compute the fingerprint for a translation lookup (spec.md §4.4).
    pub fn new(source_lang: &str, target_lang: &str, text: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        source_lang.hash(&mut hasher);
        target_lang.hash(&mut hasher);
        crate::lang::normalize(text).hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Bounded LRU cache of fingerprint -> [`CacheEntry`] (C4).
pub struct TranslationCache {
    map: Mutex<LruMap<Fingerprint, CacheEntry>>,
    capacity: usize,
    confidence_floor: f32,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranslationCache {
    /// Build a cache bounded to `capacity` entries; translations below
    /// `confidence_floor` are never cached. When `enabled` is `false`, every
    /// `get` reports a miss and every `put` is a no-op (spec.md §4.8
    /// `cache_enabled` policy knob) — the cache is neither consulted nor
    /// populated.
    pub fn new(capacity: usize, confidence_floor: f32, enabled: bool) -> Self {
        Self {
            map: Mutex::new(LruMap::new(capacity)),
            capacity: capacity.max(1),
            confidence_floor,
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached translation, promoting it to most-recently-used and
    /// bumping its hit counter on a hit.
    pub fn get(&self, source_lang: &str, target_lang: &str, text: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }
        let key = Fingerprint::new(source_lang, target_lang, text);
        let mut map = self.map.lock().expect("translation cache poisoned");
        match map.get(&key) {
            Some(entry) => {
                entry.last_hit_at = Instant::now();
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a translation, evicting the LRU entry if at capacity. Refuses
    /// confidence below the floor, and never replaces an existing entry with
    /// a strictly lower-confidence value (spec.md §4.4).
    pub fn put(&self, source_lang: &str, target_lang: &str, text: &str, translated_text: String, confidence: f32) {
        if !self.enabled || confidence < self.confidence_floor {
            return;
        }
        let key = Fingerprint::new(source_lang, target_lang, text);
        let mut map = self.map.lock().expect("translation cache poisoned");
        if let Some(existing) = map.peek(&key) {
            if existing.confidence > confidence {
                return;
            }
        }
        let now = Instant::now();
        map.insert(
            key,
            CacheEntry {
                translated_text,
                confidence,
                inserted_at: now,
                last_hit_at: now,
                hit_count: 0,
            },
        );
    }

    /// Empty the cache and reset hit/miss statistics.
    pub fn clear(&self) {
        self.map.lock().expect("translation cache poisoned").clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Fraction of `get` calls that were hits, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f32 {
        let hits = self.hits.load(Ordering::Relaxed) as f32;
        let misses = self.misses.load(Ordering::Relaxed) as f32;
        let total = hits + misses;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.map.lock().expect("translation cache poisoned").len()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fixed idle bound used by cache-hit "recency" reasoning in tests;
    /// exposed for callers that want to reason about staleness externally.
    pub fn is_stale(entry: &CacheEntry, max_age: Duration) -> bool {
        entry.last_hit_at.elapsed() > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = TranslationCache::new(10, 0.0, true);
        cache.put("en", "es", "Hello", "Hola".into(), 0.9);
        let entry = cache.get("en", "es", "Hello").unwrap();
        assert_eq!(entry.translated_text, "Hola");
        assert_eq!(entry.confidence, 0.9);
    }

    #[test]
    fn normalization_makes_case_and_whitespace_irrelevant_to_the_key() {
        let cache = TranslationCache::new(10, 0.0, true);
        cache.put("en", "es", "Hello", "Hola".into(), 0.9);
        assert!(cache.get("en", "es", "  HELLO  ").is_some());
    }

    #[test]
    fn low_confidence_is_never_cached() {
        let cache = TranslationCache::new(10, 0.5, true);
        cache.put("en", "es", "Hi", "Hola".into(), 0.2);
        assert!(cache.get("en", "es", "Hi").is_none());
    }

    #[test]
    fn does_not_downgrade_existing_entry() {
        let cache = TranslationCache::new(10, 0.0, true);
        cache.put("en", "es", "Hi", "Hola!".into(), 0.9);
        cache.put("en", "es", "Hi", "Hola?".into(), 0.3);
        let entry = cache.get("en", "es", "Hi").unwrap();
        assert_eq!(entry.translated_text, "Hola!");
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let cache = TranslationCache::new(2, 0.0, true);
        cache.put("en", "es", "a", "a1".into(), 0.9);
        cache.put("en", "es", "b", "b1".into(), 0.9);
        cache.put("en", "es", "c", "c1".into(), 0.9);
        assert!(cache.len() <= 2);
    }

    #[test]
    fn hit_never_changes_size() {
        let cache = TranslationCache::new(5, 0.0, true);
        cache.put("en", "es", "a", "a1".into(), 0.9);
        let before = cache.len();
        let _ = cache.get("en", "es", "a");
        assert_eq!(cache.len(), before);
    }

    #[test]
    fn hit_rate_tracks_gets() {
        let cache = TranslationCache::new(5, 0.0, true);
        cache.put("en", "es", "a", "a1".into(), 0.9);
        let _ = cache.get("en", "es", "a"); // hit
        let _ = cache.get("en", "es", "missing"); // miss
        assert!((cache.hit_rate() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn disabled_cache_is_neither_consulted_nor_populated() {
        let cache = TranslationCache::new(5, 0.0, false);
        cache.put("en", "es", "a", "a1".into(), 0.9);
        assert!(cache.get("en", "es", "a").is_none());
        assert!(cache.is_empty());
    }
}
