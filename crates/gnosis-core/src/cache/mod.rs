//! Caches.
//!
//! Grounded on the teacher's `lru::LruCache`-backed `query_cache` in
//! `storage/sqlite.rs`, generalized into one reusable LRU+TTL cache used
//! three times: the plan cache, the embedding cache, and (wrapped with
//! Brotli compression) the compressed-entity cache.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Hit/miss/eviction counters, reported by every cache.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A bounded LRU cache with a per-entry TTL. TTL checks use `>=` against
/// wall-clock to avoid timer-resolution boundary issues.
pub struct TtlLruCache<V> {
    inner: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl<V: Clone> TtlLruCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).expect("capacity must be nonzero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let expired = match inner.peek(key) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => false,
        };
        if expired {
            inner.pop(key);
            drop(inner);
            self.stats.lock().expect("cache mutex poisoned").misses += 1;
            return None;
        }
        let found = inner.get(key).map(|e| e.value.clone());
        drop(inner);
        let mut stats = self.stats.lock().expect("cache mutex poisoned");
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let key = key.into();
        let evicted = inner.len() >= inner.cap().get() && !inner.contains(&key);
        inner.put(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        drop(inner);
        if evicted {
            self.stats.lock().expect("cache mutex poisoned").evictions += 1;
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().expect("cache mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().expect("cache mutex poisoned").clear();
    }

    /// Remove a single entry, e.g. for invalidation on a known mutation.
    pub fn invalidate(&self, key: &str) {
        self.inner.lock().expect("cache mutex poisoned").pop(key);
    }
}

/// Plan cache key normalization: lowercase, collapse
/// internal whitespace, trim. Keys that differ only in case or spacing
/// map to the same entry.
pub fn normalize_plan_key(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compressed-entity cache: keeps the
/// hottest entries uncompressed and Brotli-compresses the rest. Never
/// accepts payloads below a minimum size or with insufficient achievable
/// compression ratio.
pub struct CompressedEntityCache {
    hot: Mutex<LruCache<String, String>>,
    cold: Mutex<LruCache<String, Vec<u8>>>,
    min_size: usize,
    min_ratio: f64,
    stats: Mutex<CacheStats>,
}

impl CompressedEntityCache {
    pub fn new(hot_capacity: usize, cold_capacity: usize, min_size: usize, min_ratio: f64) -> Self {
        Self {
            hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(hot_capacity.max(1)).unwrap(),
            )),
            cold: Mutex::new(LruCache::new(
                NonZeroUsize::new(cold_capacity.max(1)).unwrap(),
            )),
            min_size,
            min_ratio,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Insert `payload` keyed by `name`. Short payloads, or payloads that
    /// don't compress well enough, are kept in the hot (uncompressed)
    /// tier regardless of capacity pressure intent; they are simply not
    /// worth the decompression cost.
    pub fn set(&self, name: &str, payload: &str) {
        if payload.len() < self.min_size {
            self.hot
                .lock()
                .expect("cache mutex poisoned")
                .put(name.to_string(), payload.to_string());
            return;
        }
        let compressed = brotli_compress(payload.as_bytes());
        let ratio = compressed.len() as f64 / payload.len() as f64;
        if ratio > self.min_ratio {
            self.hot
                .lock()
                .expect("cache mutex poisoned")
                .put(name.to_string(), payload.to_string());
        } else {
            self.cold
                .lock()
                .expect("cache mutex poisoned")
                .put(name.to_string(), compressed);
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(hit) = self.hot.lock().expect("cache mutex poisoned").get(name) {
            self.stats.lock().expect("cache mutex poisoned").hits += 1;
            return Some(hit.clone());
        }
        let compressed = self.cold.lock().expect("cache mutex poisoned").get(name).cloned();
        match compressed {
            Some(bytes) => {
                self.stats.lock().expect("cache mutex poisoned").hits += 1;
                brotli_decompress(&bytes)
            }
            None => {
                self.stats.lock().expect("cache mutex poisoned").misses += 1;
                None
            }
        }
    }

    pub fn invalidate(&self, name: &str) {
        self.hot.lock().expect("cache mutex poisoned").pop(name);
        self.cold.lock().expect("cache mutex poisoned").pop(name);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().expect("cache mutex poisoned").clone()
    }
}

fn brotli_compress(data: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 9, 22);
        writer.write_all(data).expect("in-memory write cannot fail");
    }
    out
}

fn brotli_decompress(data: &[u8]) -> Option<String> {
    use std::io::Read;
    let mut out = Vec::new();
    let mut reader = brotli::Decompressor::new(data, 4096);
    reader.read_to_end(&mut out).ok()?;
    String::from_utf8(out).ok()
}
