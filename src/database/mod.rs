//! Transaction persistence: Postgres pool, repositories and in-memory stores

pub mod account_repository;
#[cfg(feature = "cache")]
pub mod cached_repository;
pub mod error;
pub mod memory;
pub mod repository;
pub mod transaction_repository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error as log_error, info, warn};

use self::error::{DatabaseError, DatabaseErrorKind};
use self::memory::InMemoryTransactionRepository;
use self::repository::TransactionRepository;
use self::transaction_repository::PgTransactionRepository;
use crate::bills::{
    AirtimeTransaction, BillFamily, BillRecord, DataTransaction, EducationTransaction,
    ElectricityTransaction, TvTransaction,
};
use crate::config::DatabaseConfig;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 5,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(
    database_url: &str,
    config: Option<PoolConfig>,
) -> Result<PgPool, DatabaseError> {
    let config = config.unwrap_or_default();

    info!(
        "Initializing database pool: max_connections={}, min_connections={}, connection_timeout={:?}",
        config.max_connections, config.min_connections, config.connection_timeout
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    // Test the connection
    pool.acquire().await.map_err(|e| {
        log_error!("Failed to acquire test connection: {}", e);
        DatabaseError::from_sqlx(e)
    })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!("Health check failed: {}", e);
        DatabaseError::from_sqlx(e)
    })?;

    Ok(())
}

/// Initialize the database pool from application configuration
pub async fn init_pool_from_config(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let url = config.url.as_deref().ok_or_else(|| {
        DatabaseError::new(DatabaseErrorKind::ConfigError {
            message: "DATABASE_URL is not set".to_string(),
        })
    })?;

    let pool_config = PoolConfig {
        max_connections: config.max_connections,
        min_connections: config.min_connections,
        connection_timeout: Duration::from_secs(config.connection_timeout),
        idle_timeout: Duration::from_secs(config.idle_timeout.unwrap_or(600)),
        max_lifetime: Duration::from_secs(1800),
    };

    init_pool(url, Some(pool_config)).await
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        log_error!("Database migration failed: {}", e);
        DatabaseError::new(DatabaseErrorKind::MigrationError {
            message: e.to_string(),
        })
    })
}

/// One transaction store per bill family
#[derive(Clone)]
pub struct TransactionStores {
    pub electricity: Arc<dyn TransactionRepository<ElectricityTransaction>>,
    pub data: Arc<dyn TransactionRepository<DataTransaction>>,
    pub airtime: Arc<dyn TransactionRepository<AirtimeTransaction>>,
    pub education: Arc<dyn TransactionRepository<EducationTransaction>>,
    pub tv: Arc<dyn TransactionRepository<TvTransaction>>,
}

impl TransactionStores {
    pub fn in_memory() -> Self {
        Self {
            electricity: Arc::new(InMemoryTransactionRepository::new()),
            data: Arc::new(InMemoryTransactionRepository::new()),
            airtime: Arc::new(InMemoryTransactionRepository::new()),
            education: Arc::new(InMemoryTransactionRepository::new()),
            tv: Arc::new(InMemoryTransactionRepository::new()),
        }
    }

    pub fn postgres(pool: &PgPool) -> Self {
        fn store<R: BillRecord>(
            pool: &PgPool,
            family: BillFamily,
        ) -> Arc<dyn TransactionRepository<R>> {
            Arc::new(PgTransactionRepository::new(pool.clone(), family))
        }

        Self {
            electricity: store(pool, BillFamily::Electricity),
            data: store(pool, BillFamily::Data),
            airtime: store(pool, BillFamily::Airtime),
            education: store(pool, BillFamily::Education),
            tv: store(pool, BillFamily::Tv),
        }
    }

    /// Put a read-through cache in front of every store.
    #[cfg(feature = "cache")]
    pub fn with_cache(self, cache: crate::cache::RedisCache, ttl: Duration) -> Self {
        use self::cached_repository::CachedTransactionRepository;

        fn wrap<R: BillRecord>(
            inner: Arc<dyn TransactionRepository<R>>,
            cache: &crate::cache::RedisCache,
            family: BillFamily,
            ttl: Duration,
        ) -> Arc<dyn TransactionRepository<R>> {
            Arc::new(CachedTransactionRepository::new(
                inner,
                Arc::new(cache.clone()),
                family,
                ttl,
            ))
        }

        Self {
            electricity: wrap(self.electricity, &cache, BillFamily::Electricity, ttl),
            data: wrap(self.data, &cache, BillFamily::Data, ttl),
            airtime: wrap(self.airtime, &cache, BillFamily::Airtime, ttl),
            education: wrap(self.education, &cache, BillFamily::Education, ttl),
            tv: wrap(self.tv, &cache, BillFamily::Tv, ttl),
        }
    }
}
