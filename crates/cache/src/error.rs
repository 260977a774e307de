use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection unavailable: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cached payload is corrupted: {0}")]
    Corrupted(String),
}
