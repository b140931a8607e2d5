//! TTL caches for assembled bundles and raw corpora.
//!
//! Expiration is lazy: an entry past its TTL is evicted the next time it
//! is read. [`TtlCache::sweep`] exists for callers that want to reclaim
//! memory on a timer instead.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    approx_bytes: usize,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Point-in-time cache telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub ttl_seconds: u64,
    pub approximate_memory_bytes: usize,
}

/// A shared in-process cache with per-entry TTLs.
///
/// Values must serialize so the cache can estimate their footprint; every
/// cached type here is serde-derived already. Entry ages are measured on
/// the tokio clock, so tests can pause and advance time deterministically.
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone + Serialize> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Look up a key, evicting it first if it has expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and evict. Another task may have
        // refreshed the entry in between, so re-check before removing.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                debug!(key, "Cache entry expired");
            } else {
                return Some(entry.value.clone());
            }
        }
        None
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        self.put_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let approx_bytes = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
                approx_bytes,
            },
        );
    }

    /// Remove every expired entry. Returns how many were evicted.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Cache sweep");
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            total_entries: entries.len(),
            ttl_seconds: self.default_ttl.as_secs(),
            approximate_memory_bytes: entries.values().map(|e| e.approx_bytes).sum(),
        }
    }
}

/// Deterministic cache key for an assembled response.
///
/// The query is normalized (trimmed, lowercased, inner whitespace
/// collapsed) so trivially reworded repeats hit the same entry. Components
/// are NUL-separated before hashing to avoid ambiguity between e.g.
/// ("ab", "c") and ("a", "bc").
pub fn response_cache_key(owner_id: &str, query: &str, flags: &[&str]) -> String {
    let normalized = query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    for flag in flags {
        hasher.update([0u8]);
        hasher.update(flag.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Cache key for a user's raw corpus.
pub fn corpus_cache_key(owner_id: &str) -> String {
    format!("corpus:{owner_id}")
}
