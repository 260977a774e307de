//! Key-value cache used as a disposable copy of store data.
//!
//! Every operation may fail or lose data without affecting correctness
//! beyond staleness; callers treat [`CacheError`] as a degraded state, not a
//! request failure.

use std::time::Duration;

use async_trait::async_trait;

mod error;
mod memory;
mod pattern;
mod redis_cache;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use pattern::glob_match;
pub use redis_cache::RedisCache;

/// Mapping with per-entry expiry, fronting the authoritative store.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Fetch the payload stored under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Remove `key`. Returns whether an entry was removed; deleting a missing
    /// key is not an error.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// List live keys matching a glob `pattern` (`*` and `?`).
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}
