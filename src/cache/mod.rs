//! Redis read-through cache for settled bill transactions
//!
//! Terminal transaction records never change, which makes them safe to serve
//! from Redis. The cache degrades to a miss whenever Redis is unavailable.

pub mod cache;
pub mod error;
pub mod keys;

pub use cache::{Cache, RedisCache};
pub use error::{CacheError, CacheResult};

use crate::config::CacheConfig;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{error, info, warn};

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LIFETIME: Duration = Duration::from_secs(300);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Initialize the Redis connection pool.
///
/// A failed initial PING is only logged so the service can start while Redis
/// is still coming up.
pub async fn init_cache_pool(redis_url: &str, config: &CacheConfig) -> CacheResult<RedisPool> {
    info!(
        max_connections = config.max_connections,
        "Initializing Redis cache pool"
    );

    let client = Client::open(redis_url).map_err(|e| {
        error!("Failed to create Redis client: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let manager = RedisConnectionManager::new(client).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(config.max_connections.min(2))
        .connection_timeout(CONNECTION_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .idle_timeout(IDLE_TIMEOUT)
        .test_on_check_out(false)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    if let Err(e) = health_check(&pool).await {
        warn!("Initial Redis connection test failed, but continuing: {}", e);
    }

    info!("Redis cache pool initialized successfully");
    Ok(pool)
}

/// PING through a pooled connection
pub async fn health_check(pool: &RedisPool) -> CacheResult<()> {
    let mut conn = pool.get().await?;

    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| {
            error!("Redis PING failed: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    Ok(())
}
