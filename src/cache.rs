//! Bounded in-memory translation cache.
//! Key: target language and source text joined by a unit separator.
//! LRU eviction at capacity, optional TTL checked lazily on lookup.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, TranscacheError};

/// Separator between the language code and the text in a cache key.
/// Language codes never contain it, so keys cannot collide.
const KEY_SEPARATOR: char = '\u{1f}';

struct CacheEntry {
    translated_text: String,
    inserted_at: Instant,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
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

struct Inner {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

pub struct TranslationCache {
    inner: Mutex<Inner>,
    ttl: Option<Duration>,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            TranscacheError::Config("cache capacity must be greater than 0".to_string())
        })?;

        Ok(Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.cache_capacity, config.cache_ttl())
    }

    /// Compute the cache key for a text and an already normalized language code.
    pub fn compute_key(text: &str, target_lang: &str) -> String {
        let mut key = String::with_capacity(target_lang.len() + 1 + text.len());
        key.push_str(target_lang);
        key.push(KEY_SEPARATOR);
        key.push_str(text);
        key
    }

    /// Look up a cached translation. Returns None if absent or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let ttl = self.ttl;

        let expired = match inner.entries.get(key) {
            Some(entry) if ttl.map_or(true, |ttl| entry.inserted_at.elapsed() < ttl) => {
                let text = entry.translated_text.clone();
                inner.stats.hits += 1;
                return Some(text);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
        }
        inner.stats.misses += 1;
        None
    }

    /// Check for a live entry without touching recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock();
        match inner.entries.peek(key) {
            Some(entry) => self.ttl.map_or(true, |ttl| entry.inserted_at.elapsed() < ttl),
            None => false,
        }
    }

    /// Insert a translation result into the cache.
    pub fn insert(&self, key: String, translated_text: String) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let pushed_key = key.clone();
        let displaced = inner.entries.push(
            key,
            CacheEntry {
                translated_text,
                inserted_at: Instant::now(),
            },
        );

        inner.stats.insertions += 1;
        if let Some((old_key, _)) = displaced {
            if old_key != pushed_key {
                inner.stats.evictions += 1;
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .entries
            .pop(key)
            .map(|entry| entry.translated_text)
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
