use aremxyplug_backend::api::{self, BillHandlers};
use aremxyplug_backend::config::AppConfig;
use aremxyplug_backend::database::account_repository::{PgMessageSink, PgUserRepository};
use aremxyplug_backend::database::memory::{InMemoryMessageSink, InMemoryUserRepository};
use aremxyplug_backend::database::repository::{MessageSink, UserRepository};
use aremxyplug_backend::database::{
    init_pool_from_config, run_migrations, TransactionStores,
};
use aremxyplug_backend::health::{self, HealthChecker};
use aremxyplug_backend::logging::init_tracing;
use aremxyplug_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use aremxyplug_backend::providers::VtpassClient;
use aremxyplug_backend::services::PurchaseNotifier;
use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

#[cfg(feature = "cache")]
use aremxyplug_backend::cache::{init_cache_pool, RedisCache};
#[cfg(feature = "cache")]
use tracing::warn;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

async fn root() -> &'static str {
    "AremxyPlug bill payments API"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        skip_externals = config.skip_externals,
        provider = %config.provider.base_url,
        "Starting bill payments backend"
    );

    let mut db_pool = None;
    #[cfg(feature = "cache")]
    let mut redis_cache: Option<RedisCache> = None;

    let (stores, users, messages): (
        TransactionStores,
        Arc<dyn UserRepository>,
        Arc<dyn MessageSink>,
    ) = if config.skip_externals {
        info!("Skipping database and cache initialization (SKIP_EXTERNALS=true)");
        (
            TransactionStores::in_memory(),
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryMessageSink::new()),
        )
    } else {
        let pool = init_pool_from_config(&config.database).await?;
        if config.database.run_migrations {
            run_migrations(&pool).await?;
        }

        #[allow(unused_mut)]
        let mut stores = TransactionStores::postgres(&pool);

        #[cfg(feature = "cache")]
        {
            if let Some(redis_url) = &config.cache.redis_url {
                match init_cache_pool(redis_url, &config.cache).await {
                    Ok(cache_pool) => {
                        let cache = RedisCache::new(cache_pool);
                        stores = stores.with_cache(
                            cache.clone(),
                            std::time::Duration::from_secs(config.cache.default_ttl),
                        );
                        redis_cache = Some(cache);
                        info!("Transaction cache enabled");
                    }
                    Err(e) => warn!(error = %e, "Continuing without transaction cache"),
                }
            }
        }

        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
        let messages: Arc<dyn MessageSink> = Arc::new(PgMessageSink::new(pool.clone()));
        db_pool = Some(pool);
        (stores, users, messages)
    };

    let provider = Arc::new(VtpassClient::new(config.provider.clone())?);
    let notifier = Arc::new(PurchaseNotifier::new(messages));
    let bills = BillHandlers::new(provider, &stores, Some(notifier));

    let health_checker = HealthChecker::new(db_pool);
    #[cfg(feature = "cache")]
    let health_checker = health_checker.with_cache(redis_cache);

    let app = Router::new()
        .route("/", get(root))
        .merge(health::routes(health_checker))
        .merge(api::router(
            bills,
            users,
            config.provider.webhook_secret.clone(),
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer(&config.server.cors_allowed_origins)),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
