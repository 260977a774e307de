//! Read-through cache over the paginated book listing.
//!
//! Each `(offset, limit)` window is cached under its own key for the
//! configured TTL. Any successful write removes every window, since a single
//! insert or delete shifts the contents of all windows after it. The cache is
//! never authoritative: a failing or corrupted cache degrades to store reads
//! and never fails a request.
//!
//! A read that missed before a write and stores its window after that write's
//! invalidation has swept leaves a stale window behind. It is served until
//! its TTL expires; the TTL is the bound on staleness.

use std::sync::Arc;
use std::time::Duration;

use shelf_cache::{CacheError, KeyValueCache};
use shelf_db::{Book, BookStore, StoreError};
use tracing::{debug, instrument, warn};

/// Glob matching every listing key.
pub const LISTING_KEY_PATTERN: &str = "books_offset_*";

pub fn listing_key(offset: u64, limit: u64) -> String {
    format!("books_offset_{}_limit_{}", offset, limit)
}

/// How the cache took part in serving a listing.
#[derive(Debug)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// The cached payload did not decode; the store answered instead.
    Corrupted,
    /// The cache could not be read or written; the store answered instead.
    Degraded(CacheError),
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Corrupted => "corrupted",
            CacheStatus::Degraded(_) => "degraded",
        }
    }
}

#[derive(Debug)]
pub struct Listing {
    pub books: Vec<Book>,
    pub cache: CacheStatus,
}

#[derive(Clone)]
pub struct CachedListing {
    store: Arc<dyn BookStore>,
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl CachedListing {
    pub fn new(store: Arc<dyn BookStore>, cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Books `offset..offset + limit` in id order, from the cache when a live
    /// entry exists, else from the store (populating the cache).
    #[instrument(skip(self))]
    pub async fn list(&self, offset: u64, limit: u64) -> Result<Listing, StoreError> {
        let key = listing_key(offset, limit);

        let mut status = match self.cache.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_slice::<Vec<Book>>(&payload) {
                Ok(books) => {
                    debug!(%key, count = books.len(), "listing cache hit");
                    return Ok(Listing {
                        books,
                        cache: CacheStatus::Hit,
                    });
                }
                Err(err) => {
                    warn!(%key, error = %err, "cached listing is corrupted, reading store");
                    CacheStatus::Corrupted
                }
            },
            Ok(None) => {
                debug!(%key, "listing cache miss");
                CacheStatus::Miss
            }
            Err(err) => {
                warn!(%key, error = %err, "listing cache read failed, reading store");
                CacheStatus::Degraded(err)
            }
        };

        let books = self.store.list_books(offset, limit).await?;

        match serde_json::to_vec(&books) {
            Ok(payload) => {
                if let Err(err) = self.cache.set(&key, payload, self.ttl).await {
                    warn!(%key, error = %err, "listing cache write failed");
                    if !matches!(status, CacheStatus::Degraded(_)) {
                        status = CacheStatus::Degraded(err);
                    }
                }
            }
            Err(err) => warn!(%key, error = %err, "failed to encode listing for cache"),
        }

        Ok(Listing {
            books,
            cache: status,
        })
    }

    /// Remove every cached listing window. Failures are logged and skipped;
    /// returns the number of entries removed.
    #[instrument(skip(self))]
    pub async fn invalidate(&self) -> usize {
        let keys = match self.cache.scan(LISTING_KEY_PATTERN).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "listing cache scan failed, entries expire by TTL");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.cache.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(%key, error = %err, "failed to delete cached listing"),
            }
        }

        debug!(removed, "listing cache invalidated");
        removed
    }
}
