//! Cache-specific error types

use std::fmt;

/// Cache operation errors
#[derive(Debug)]
pub enum CacheError {
    /// Redis unavailable, pool exhausted or a command failed
    ConnectionError(String),
    /// Cached JSON could not be encoded or decoded
    SerializationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::ConnectionError(msg) => write!(f, "Cache connection error: {}", msg),
            CacheError::SerializationError(msg) => write!(f, "Cache serialization error: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::ConnectionError(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        CacheError::ConnectionError(format!("Pool error: {}", err))
    }
}

impl From<CacheError> for crate::error::AppError {
    fn from(err: CacheError) -> Self {
        crate::error::AppError::new(crate::error::AppErrorKind::Infrastructure(
            crate::error::InfrastructureError::Cache {
                message: err.to_string(),
            },
        ))
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
