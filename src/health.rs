//! Health check module
//! Provides health status for the application and its dependencies

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

#[cfg(feature = "cache")]
use crate::cache::RedisCache;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }

    fn record(&mut self, name: &str, component: ComponentHealth) {
        let downgrade = match component.status {
            ComponentState::Up => None,
            ComponentState::Warning => Some(HealthState::Degraded),
            ComponentState::Down => Some(HealthState::Unhealthy),
        };

        match (&self.status, downgrade) {
            (_, Some(HealthState::Unhealthy)) => self.status = HealthState::Unhealthy,
            (HealthState::Healthy, Some(state)) => self.status = state,
            _ => {}
        }

        self.checks.insert(name.to_string(), component);
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Time a dependency check and bound it with a timeout.
async fn probe<F, E>(name: &str, check: F) -> ComponentHealth
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    match timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => {
            let elapsed = start.elapsed().as_millis();
            info!("{} health check: OK ({}ms)", name, elapsed);
            ComponentHealth::up(Some(elapsed))
        }
        Ok(Err(e)) => {
            error!("{} health check failed: {}", name, e);
            ComponentHealth::down(Some(e.to_string()))
        }
        Err(_) => {
            error!("{} health check timed out", name);
            ComponentHealth::down(Some("Timeout".to_string()))
        }
    }
}

/// Health checker for the application. Absent dependencies mean the service
/// runs on in-memory stores, which is reported as degraded.
#[derive(Clone, Default)]
pub struct HealthChecker {
    db_pool: Option<sqlx::PgPool>,
    #[cfg(feature = "cache")]
    cache: Option<RedisCache>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<sqlx::PgPool>) -> Self {
        Self {
            db_pool,
            #[cfg(feature = "cache")]
            cache: None,
        }
    }

    #[cfg(feature = "cache")]
    pub fn with_cache(mut self, cache: Option<RedisCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        let database = match &self.db_pool {
            Some(pool) => probe("Database", crate::database::health_check(pool)).await,
            None => ComponentHealth::warning(None, Some("in-memory store".to_string())),
        };
        health_status.record("database", database);

        #[cfg(feature = "cache")]
        {
            let cache = match &self.cache {
                Some(cache) => probe("Cache", crate::cache::health_check(cache.pool())).await,
                None => ComponentHealth::warning(None, Some("cache disabled".to_string())),
            };
            health_status.record("cache", cache);
        }

        health_status
    }
}

async fn health(
    State(checker): State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    info!("Health check requested");
    let health_status = checker.check_health().await;

    // Return 503 if any component is down
    if health_status.status == HealthState::Unhealthy {
        error!("Health check failed - service unhealthy");
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    } else {
        Ok(Json(health_status))
    }
}

async fn readiness(
    state: State<HealthChecker>,
) -> Result<Json<HealthStatus>, (StatusCode, String)> {
    info!("Readiness probe requested");
    health(state).await
}

async fn liveness() -> &'static str {
    "OK"
}

/// `/health`, `/health/ready` and `/health/live`
pub fn routes(checker: HealthChecker) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(checker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_status_creation() {
        let health_status = HealthStatus::new();
        assert!(matches!(health_status.status, HealthState::Healthy));
        assert!(health_status.checks.is_empty());
        assert!(health_status.timestamp <= chrono::Utc::now());
    }

    #[test]
    fn test_component_health_states() {
        let up_health = ComponentHealth::up(Some(100));
        assert!(matches!(up_health.status, ComponentState::Up));
        assert_eq!(up_health.response_time_ms, Some(100));

        let down_health = ComponentHealth::down(Some("Test error".to_string()));
        assert!(matches!(down_health.status, ComponentState::Down));
        assert_eq!(down_health.details, Some("Test error".to_string()));
    }

    #[test]
    fn down_component_outranks_warning() {
        let mut status = HealthStatus::new();
        status.record("cache", ComponentHealth::warning(None, None));
        assert_eq!(status.status, HealthState::Degraded);

        status.record("database", ComponentHealth::down(None));
        assert_eq!(status.status, HealthState::Unhealthy);

        status.record("other", ComponentHealth::warning(None, None));
        assert_eq!(status.status, HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn in_memory_service_is_degraded_not_down() {
        let status = HealthChecker::default().check_health().await;
        assert_eq!(status.status, HealthState::Degraded);
        assert!(status.checks.contains_key("database"));
    }
}
