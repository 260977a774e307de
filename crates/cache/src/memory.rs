use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{glob_match, CacheError, KeyValueCache};

#[derive(Clone, Debug)]
struct CachedEntry {
    data: Arc<Vec<u8>>,
    expires_at: Instant,
}

impl CachedEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Single-process cache backed by a `DashMap`.
///
/// Expired entries are treated as absent and pruned lazily when read or
/// scanned. Used by tests and by deployments without Redis.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CachedEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including ones that expired but have not
    /// been pruned yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.data.as_ref().clone()));
            }
        } else {
            return Ok(None);
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.entries.retain(|_, entry| !entry.is_expired());

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get_returns_payload() {
        let cache = MemoryCache::new();
        cache.set("k", b"payload".to_vec(), TTL).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"payload".to_vec()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec(), TTL).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn scan_filters_by_pattern_and_skips_expired() {
        let cache = MemoryCache::new();
        cache
            .set("books_offset_0_limit_10", b"[]".to_vec(), TTL)
            .await
            .unwrap();
        cache
            .set("books_offset_10_limit_10", b"[]".to_vec(), TTL)
            .await
            .unwrap();
        cache
            .set("books_offset_20_limit_10", b"[]".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        cache.set("session_1", b"x".to_vec(), TTL).await.unwrap();

        let keys = cache.scan("books_offset_*").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "books_offset_0_limit_10".to_string(),
                "books_offset_10_limit_10".to_string(),
            ]
        );
        assert_eq!(cache.len(), 3);
    }
}
