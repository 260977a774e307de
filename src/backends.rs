//! Store and cache handles selected by configuration.

use std::sync::Arc;

use anyhow::Context;
use shelf_cache::{KeyValueCache, MemoryCache, RedisCache};
use shelf_db::{BookStore, MemoryStore, PostgresStore, UserStore};
use shelf_kernel::settings::{CacheBackendKind, Settings, StorageBackend};

/// Shared handles the modules are built from.
#[derive(Clone)]
pub struct Backends {
    pub books: Arc<dyn BookStore>,
    pub users: Arc<dyn UserStore>,
    pub cache: Arc<dyn KeyValueCache>,
    /// Set when the relational driver is in use, for bootstrap DDL.
    pub postgres: Option<PostgresStore>,
}

impl Backends {
    /// Everything in process; nothing survives a restart.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            books: store.clone(),
            users: store,
            cache: Arc::new(MemoryCache::new()),
            postgres: None,
        }
    }

    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let (books, users, postgres): (Arc<dyn BookStore>, Arc<dyn UserStore>, Option<PostgresStore>) =
            match settings.database.backend {
                StorageBackend::Postgres => {
                    let store = PostgresStore::connect(&settings.database).await?;
                    (
                        Arc::new(store.clone()),
                        Arc::new(store.clone()),
                        Some(store),
                    )
                }
                StorageBackend::Memory => {
                    tracing::warn!("using in-memory record store; data is lost on restart");
                    let store = Arc::new(MemoryStore::new());
                    (store.clone(), store, None)
                }
            };

        let cache: Arc<dyn KeyValueCache> = match settings.cache.backend {
            CacheBackendKind::Redis => {
                let cache = RedisCache::connect(&settings.cache.url)
                    .with_context(|| "failed to create Redis connection pool")?;
                // The listing degrades to store reads while Redis is away.
                match cache.ping().await {
                    Ok(()) => tracing::info!("connected to Redis"),
                    Err(err) => tracing::warn!(error = %err, "Redis is unreachable, continuing"),
                }
                Arc::new(cache)
            }
            CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
        };

        Ok(Self {
            books,
            users,
            cache,
            postgres,
        })
    }
}
