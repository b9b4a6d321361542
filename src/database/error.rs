use crate::error::{AppError, AppErrorKind, DomainError, InfrastructureError};
use std::fmt;

/// Store failure categories
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Record not found
    NotFound { entity: String, id: String },
    /// Unique constraint violation (e.g., duplicate key)
    UniqueConstraintViolation { column: String, value: String },
    /// Query execution error
    QueryError { message: String },
    /// Database connection error
    ConnectionError { message: String },
    /// Stored payload could not be encoded or decoded
    SerializationError { message: String },
    /// Configuration error
    ConfigError { message: String },
    /// Migration failed at start-up
    MigrationError { message: String },
    /// Unknown error
    Unknown { message: String },
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            DatabaseErrorKind::PoolExhausted | DatabaseErrorKind::ConnectionError { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.into(),
        })
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    /// Map SQLx error to our custom error type
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(DatabaseErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(DatabaseErrorKind::ConfigError {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // Postgres unique_violation
                Some("23505") => Self::new(DatabaseErrorKind::UniqueConstraintViolation {
                    column: db_err.constraint().unwrap_or("unknown").to_string(),
                    value: "provided value".to_string(),
                }),
                _ => Self::new(DatabaseErrorKind::QueryError {
                    message: db_err.message().to_string(),
                }),
            },
            sqlx::Error::Io(io_err) => Self::new(DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            sqlx::Error::ColumnDecode { source, .. } | sqlx::Error::Decode(source) => {
                Self::new(DatabaseErrorKind::SerializationError {
                    message: source.to_string(),
                })
            }
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }

    pub fn from_json(error: serde_json::Error) -> Self {
        Self::new(DatabaseErrorKind::SerializationError {
            message: error.to_string(),
        })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::PoolExhausted => {
                "Database connection pool exhausted. Please try again.".to_string()
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueConstraintViolation { column, value } => {
                format!("A record with {} '{}' already exists", column, value)
            }
            DatabaseErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            DatabaseErrorKind::SerializationError { message } => {
                format!("Stored record could not be decoded: {}", message)
            }
            DatabaseErrorKind::ConfigError { message } => {
                format!("Database configuration error: {}", message)
            }
            DatabaseErrorKind::MigrationError { message } => {
                format!("Database migration failed: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let kind = match &err.kind {
            DatabaseErrorKind::NotFound { entity, id } if entity == "User" => {
                AppErrorKind::Domain(DomainError::UserNotFound { email: id.clone() })
            }
            DatabaseErrorKind::NotFound { id, .. } => {
                AppErrorKind::Domain(DomainError::TransactionNotFound { id: id.clone() })
            }
            DatabaseErrorKind::UniqueConstraintViolation { value, .. } => {
                AppErrorKind::Domain(DomainError::DuplicateUser {
                    email: value.clone(),
                })
            }
            _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };

        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn not_found_maps_to_404() {
        let app: AppError = DatabaseError::not_found("ElectricityTransaction", "req-1").into();
        assert_eq!(app.status_code(), 404);
        assert_eq!(app.error_code(), ErrorCode::TransactionNotFound);

        let user: AppError = DatabaseError::not_found("User", "ada@example.com").into();
        assert_eq!(user.error_code(), ErrorCode::UserNotFound);
    }

    #[test]
    fn pool_exhaustion_is_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 500);
        assert!(app.is_retryable());
    }

    #[test]
    fn context_is_appended() {
        let err = DatabaseError::not_found("Record", "x").with_context("loading tv transaction");
        assert_eq!(
            err.to_string(),
            "Record with ID 'x' not found (loading tv transaction)"
        );
    }
}
