//! Two-tier embedding cache.
//!
//! Tier 1 is a bounded in-process LRU; tier 2 is an optional [`DurableTier`]
//! pruned by TTL. Lookups go tier 1 → tier 2 → generator, and a tier-2 hit is
//! promoted into tier 1. Any durable-tier failure is logged and the cache
//! carries on with tier 1 alone; callers never see a `CacheIo` error.
//!
//! Keys are `sha256(model \0 text)`. The text is hashed exactly as given
//! (case- and whitespace-sensitive), so normalization is the caller's choice.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::store::{DurableTier, StoredEmbedding};
use crate::config::CacheConfig;
use crate::error::Result;

/// Tier-1 entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries in the durable tier, or in tier 1 when no durable tier is usable.
    pub entry_count: u64,
    pub memory_entries: usize,
    pub durable: bool,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub approx_bytes: u64,
}

/// Embedding cache shared by every caller of one engine.
///
/// Concurrent misses are not coalesced: two overlapping `get_or_compute`
/// calls for the same uncached text may both run their generator. Both
/// results are written and the last write wins; entries are never torn.
pub struct EmbeddingCache {
    model: String,
    memory: Mutex<LruCache<String, CacheEntry>>,
    durable: Option<Mutex<Box<dyn DurableTier>>>,
    /// `None` means entries never expire.
    ttl: Option<chrono::Duration>,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EmbeddingCache {
    pub fn new(
        model: impl Into<String>,
        config: &CacheConfig,
        durable: Option<Box<dyn DurableTier>>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            model: model.into(),
            memory: Mutex::new(LruCache::new(capacity)),
            durable: durable.map(Mutex::new),
            ttl: config.ttl(),
        }
    }

    /// Tier-1-only cache.
    pub fn in_memory(model: impl Into<String>, capacity: usize) -> Self {
        let config = CacheConfig {
            capacity,
            ..CacheConfig::default()
        };
        Self::new(model, &config, None)
    }

    pub fn key_for(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Cache-only lookup; never generates.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = self.key_for(text);
        let now = Utc::now();

        if let Some(entry) = lock(&self.memory).get_mut(&key) {
            entry.last_accessed_at = now;
            return Some(entry.vector.clone());
        }

        let stored = self.durable_get(&key, now)?;
        let vector = stored.vector.clone();
        self.insert_memory(CacheEntry {
            key,
            vector: stored.vector,
            created_at: stored.created_at,
            last_accessed_at: now,
        });
        tracing::debug!("embedding cache: promoted durable hit");
        Some(vector)
    }

    /// Return the cached vector for `text`, or run `generator`, cache its
    /// output in both tiers, and return it. A generator error propagates
    /// unchanged and nothing is cached.
    pub async fn get_or_compute<F, Fut>(&self, text: &str, generator: F) -> Result<Vec<f32>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<f32>>>,
    {
        if let Some(hit) = self.get(text) {
            return Ok(hit);
        }

        let vector = generator().await?;
        let now = Utc::now();
        let entry = CacheEntry {
            key: self.key_for(text),
            vector: vector.clone(),
            created_at: now,
            last_accessed_at: now,
        };
        self.durable_put(&entry);
        self.insert_memory(entry);
        Ok(vector)
    }

    /// Remove durable entries older than the TTL. Returns the number removed.
    pub fn prune(&self) -> usize {
        let Some(durable) = &self.durable else {
            return 0;
        };
        let Some(cutoff) = self.expiry_cutoff(Utc::now()) else {
            tracing::debug!("cache TTL out of range; nothing to prune");
            return 0;
        };
        match lock(durable).prune(cutoff) {
            Ok(removed) => {
                tracing::info!(removed, cutoff = %cutoff, "pruned durable embedding cache");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "durable cache prune failed");
                0
            }
        }
    }

    /// Empty both tiers.
    pub fn clear(&self) {
        lock(&self.memory).clear();
        if let Some(durable) = &self.durable {
            if let Err(e) = lock(durable).clear() {
                tracing::warn!(error = %e, "durable cache clear failed");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let (memory_entries, mem_oldest, mem_newest, mem_bytes) = {
            let memory = lock(&self.memory);
            let oldest = memory.iter().map(|(_, e)| e.created_at).min();
            let newest = memory.iter().map(|(_, e)| e.created_at).max();
            let bytes: usize = memory
                .iter()
                .map(|(k, e)| k.len() + e.vector.len() * std::mem::size_of::<f32>())
                .sum();
            (memory.len(), oldest, newest, bytes as u64)
        };

        let durable_stats = self
            .durable
            .as_ref()
            .and_then(|d| match lock(d).stats() {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!(error = %e, "durable cache stats failed");
                    None
                }
            });

        match durable_stats {
            Some(s) => CacheStats {
                entry_count: s.entry_count,
                memory_entries,
                durable: true,
                oldest_entry: s.oldest_entry,
                newest_entry: s.newest_entry,
                approx_bytes: s.approx_bytes,
            },
            None => CacheStats {
                entry_count: memory_entries as u64,
                memory_entries,
                durable: false,
                oldest_entry: mem_oldest,
                newest_entry: mem_newest,
                approx_bytes: mem_bytes,
            },
        }
    }

    // ── Tier helpers ─────────────────────────────────────────────────────────

    fn insert_memory(&self, entry: CacheEntry) {
        let key = entry.key.clone();
        if let Some((evicted, _)) = lock(&self.memory).push(key.clone(), entry) {
            if evicted != key {
                tracing::trace!(key = %evicted, "evicted LRU embedding");
            }
        }
    }

    /// Entries created before this instant are expired. `None` when the TTL
    /// reaches past the representable range.
    fn expiry_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.ttl.and_then(|ttl| now.checked_sub_signed(ttl))
    }

    fn durable_get(&self, key: &str, now: DateTime<Utc>) -> Option<StoredEmbedding> {
        let durable = self.durable.as_ref()?;
        let cutoff = self.expiry_cutoff(now);
        match lock(durable).get(key, now) {
            Ok(Some(stored)) if cutoff.map_or(true, |c| stored.created_at >= c) => Some(stored),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "durable cache read failed; using memory tier only");
                None
            }
        }
    }

    fn durable_put(&self, entry: &CacheEntry) {
        let Some(durable) = &self.durable else {
            return;
        };
        let stored = StoredEmbedding {
            key: entry.key.clone(),
            vector: entry.vector.clone(),
            created_at: entry.created_at,
            last_accessed_at: entry.last_accessed_at,
        };
        if let Err(e) = lock(durable).put(&stored) {
            tracing::warn!(error = %e, "durable cache write failed; entry kept in memory only");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_exact_and_model_scoped() {
        let a = EmbeddingCache::in_memory("model-a", 4);
        let b = EmbeddingCache::in_memory("model-b", 4);
        assert_eq!(a.key_for("Coffee"), a.key_for("Coffee"));
        assert_ne!(a.key_for("Coffee"), a.key_for("coffee"));
        assert_ne!(a.key_for("coffee"), a.key_for("coffee "));
        assert_ne!(a.key_for("coffee"), b.key_for("coffee"));
        assert_eq!(a.key_for("x").len(), 64);
    }

    #[tokio::test]
    async fn test_get_is_cache_only() {
        let cache = EmbeddingCache::in_memory("m", 4);
        assert!(cache.get("never seen").is_none());
        cache
            .get_or_compute("seen", || async { Ok(vec![1.0, 2.0]) })
            .await
            .unwrap();
        assert_eq!(cache.get("seen"), Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn test_stats_memory_only() {
        let cache = EmbeddingCache::in_memory("m", 4);
        let stats = cache.stats();
        assert_eq!(stats.entry_count, 0);
        assert!(stats.oldest_entry.is_none());

        cache
            .get_or_compute("a", || async { Ok(vec![0.0; 8]) })
            .await
            .unwrap();
        let stats = cache.stats();
        assert!(!stats.durable);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.approx_bytes, 64 + 32);
        assert!(stats.oldest_entry.is_some());
    }

    #[test]
    fn test_prune_without_durable_tier() {
        assert_eq!(EmbeddingCache::in_memory("m", 4).prune(), 0);
    }
}
