//! Statistics and configuration (component E).
//!
//! Statistics is a mapping from fixed string keys to non-negative
//! integers, backed by a [`PersistentJsonStore`]. Two disjoint key
//! groups: RESETTABLE (call counters, hit/miss counters, miss-subclass
//! counters) and NON-RESETTABLE (`CacheEntries`, `CacheSize`), so that
//! `-z` can zero the former without disturbing the latter, which
//! reflect what is actually on disk rather than anything request-scoped.

use std::path::Path;

use crate::error::Result;
use crate::jsonstore::PersistentJsonStore;

const CALLS_WITH_INVALID_ARGUMENT: &str = "CallsWithInvalidArgument";
const CALLS_WITHOUT_SOURCE_FILE: &str = "CallsWithoutSourceFile";
const CALLS_WITH_MULTIPLE_SOURCE_FILES: &str = "CallsWithMultipleSourceFiles";
const CALLS_WITH_PCH: &str = "CallsWithPch";
const CALLS_FOR_LINKING: &str = "CallsForLinking";
const CALLS_FOR_EXTERNAL_DEBUG_INFO: &str = "CallsForExternalDebugInfo";
const CALLS_FOR_PREPROCESSING: &str = "CallsForPreprocessing";
const CACHE_HITS: &str = "CacheHits";
const CACHE_MISSES: &str = "CacheMisses";
const EVICTED_MISSES: &str = "EvictedMisses";
const HEADER_CHANGED_MISSES: &str = "HeaderChangedMisses";
const SOURCE_CHANGED_MISSES: &str = "SourceChangedMisses";

const CACHE_ENTRIES: &str = "CacheEntries";
const CACHE_SIZE: &str = "CacheSize";

const RESETTABLE_KEYS: &[&str] = &[
    CALLS_WITH_INVALID_ARGUMENT,
    CALLS_WITHOUT_SOURCE_FILE,
    CALLS_WITH_MULTIPLE_SOURCE_FILES,
    CALLS_WITH_PCH,
    CALLS_FOR_LINKING,
    CALLS_FOR_EXTERNAL_DEBUG_INFO,
    CALLS_FOR_PREPROCESSING,
    CACHE_HITS,
    CACHE_MISSES,
    EVICTED_MISSES,
    HEADER_CHANGED_MISSES,
    SOURCE_CHANGED_MISSES,
];

/// Call-, hit-, and miss-counters backed by `<root>/stats.txt`.
pub struct Statistics {
    store: PersistentJsonStore,
}

impl Statistics {
    /// Open (or create) the statistics file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            store: PersistentJsonStore::open(path.as_ref()),
        }
    }

    /// Persist changes to disk if dirty.
    pub fn save(&mut self) -> Result<()> {
        self.store.save_if_dirty()
    }

    fn get(&self, key: &str) -> u64 {
        self.store.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
    }

    fn increment(&mut self, key: &str) {
        let next = self.get(key) + 1;
        self.store.set(key, serde_json::json!(next));
    }

    pub fn num_calls_with_invalid_argument(&self) -> u64 {
        self.get(CALLS_WITH_INVALID_ARGUMENT)
    }
    pub fn register_call_with_invalid_argument(&mut self) {
        self.increment(CALLS_WITH_INVALID_ARGUMENT);
    }

    pub fn num_calls_without_source_file(&self) -> u64 {
        self.get(CALLS_WITHOUT_SOURCE_FILE)
    }
    pub fn register_call_without_source_file(&mut self) {
        self.increment(CALLS_WITHOUT_SOURCE_FILE);
    }

    pub fn num_calls_with_multiple_source_files(&self) -> u64 {
        self.get(CALLS_WITH_MULTIPLE_SOURCE_FILES)
    }
    pub fn register_call_with_multiple_source_files(&mut self) {
        self.increment(CALLS_WITH_MULTIPLE_SOURCE_FILES);
    }

    pub fn num_calls_with_pch(&self) -> u64 {
        self.get(CALLS_WITH_PCH)
    }
    pub fn register_call_with_pch(&mut self) {
        self.increment(CALLS_WITH_PCH);
    }

    pub fn num_calls_for_linking(&self) -> u64 {
        self.get(CALLS_FOR_LINKING)
    }
    pub fn register_call_for_linking(&mut self) {
        self.increment(CALLS_FOR_LINKING);
    }

    pub fn num_calls_for_external_debug_info(&self) -> u64 {
        self.get(CALLS_FOR_EXTERNAL_DEBUG_INFO)
    }
    pub fn register_call_for_external_debug_info(&mut self) {
        self.increment(CALLS_FOR_EXTERNAL_DEBUG_INFO);
    }

    pub fn num_calls_for_preprocessing(&self) -> u64 {
        self.get(CALLS_FOR_PREPROCESSING)
    }
    pub fn register_call_for_preprocessing(&mut self) {
        self.increment(CALLS_FOR_PREPROCESSING);
    }

    pub fn num_cache_hits(&self) -> u64 {
        self.get(CACHE_HITS)
    }
    pub fn register_cache_hit(&mut self) {
        self.increment(CACHE_HITS);
    }

    /// The generic miss counter, distinct from the miss *subclasses* below.
    /// [`Self::num_cache_misses`] aggregates this with every subclass.
    pub fn register_cache_miss(&mut self) {
        self.increment(CACHE_MISSES);
    }

    pub fn num_evicted_misses(&self) -> u64 {
        self.get(EVICTED_MISSES)
    }
    pub fn register_evicted_miss(&mut self) {
        self.increment(EVICTED_MISSES);
        self.increment(CACHE_MISSES);
    }

    pub fn num_header_changed_misses(&self) -> u64 {
        self.get(HEADER_CHANGED_MISSES)
    }
    pub fn register_header_changed_miss(&mut self) {
        self.increment(HEADER_CHANGED_MISSES);
        self.increment(CACHE_MISSES);
    }

    pub fn num_source_changed_misses(&self) -> u64 {
        self.get(SOURCE_CHANGED_MISSES)
    }
    pub fn register_source_changed_miss(&mut self) {
        self.increment(SOURCE_CHANGED_MISSES);
        self.increment(CACHE_MISSES);
    }

    /// Aggregate of the generic miss counter plus every miss subclass.
    pub fn num_cache_misses(&self) -> u64 {
        self.get(CACHE_MISSES)
    }

    pub fn num_cache_entries(&self) -> u64 {
        self.get(CACHE_ENTRIES)
    }
    pub fn set_cache_entries(&mut self, value: u64) {
        self.store.set(CACHE_ENTRIES, serde_json::json!(value));
    }

    pub fn cache_size(&self) -> u64 {
        self.get(CACHE_SIZE)
    }
    pub fn set_cache_size(&mut self, value: u64) {
        self.store.set(CACHE_SIZE, serde_json::json!(value));
    }

    /// Record one freshly stored artifact of `size` bytes: bumps
    /// `CacheEntries` by one and `CacheSize` by `size`, so the running
    /// totals stay accurate between eviction passes rather than only
    /// being true right after a `clean()`.
    pub fn register_cache_entry(&mut self, size: u64) {
        let entries = self.num_cache_entries() + 1;
        self.store.set(CACHE_ENTRIES, serde_json::json!(entries));
        let total = self.cache_size() + size;
        self.store.set(CACHE_SIZE, serde_json::json!(total));
    }

    /// Zero every RESETTABLE counter; `CacheEntries`/`CacheSize` survive.
    pub fn reset(&mut self) {
        for key in RESETTABLE_KEYS {
            self.store.set(*key, serde_json::json!(0));
        }
    }
}

/// Single mutable setting: `maximum_cache_size` in bytes, lower bound 1.
pub struct Configuration {
    store: PersistentJsonStore,
}

const MAXIMUM_CACHE_SIZE: &str = "MaximumCacheSize";

impl Configuration {
    /// Open (or create) the configuration file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            store: PersistentJsonStore::open(path.as_ref()),
        }
    }

    /// Persist changes to disk if dirty.
    pub fn save(&mut self) -> Result<()> {
        self.store.save_if_dirty()
    }

    /// Maximum cache size in bytes; defaults to [`crate::env::DEFAULT_MAX_CACHE_SIZE`].
    pub fn maximum_cache_size(&self) -> u64 {
        self.store
            .get(MAXIMUM_CACHE_SIZE)
            .and_then(|v| v.as_u64())
            .unwrap_or(crate::env::DEFAULT_MAX_CACHE_SIZE)
    }

    /// Set the maximum cache size in bytes. Values below 1 are clamped to 1.
    pub fn set_maximum_cache_size(&mut self, bytes: u64) {
        self.store
            .set(MAXIMUM_CACHE_SIZE, serde_json::json!(bytes.max(1)));
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
