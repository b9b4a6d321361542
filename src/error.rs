//! Unified error handling for the AremxyPlug billing backend
//!
//! Every failure a request can hit is expressed as an [`AppError`] carrying an
//! HTTP status, a machine-readable [`ErrorCode`], a user-facing message and a
//! retryable flag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling by clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "DUPLICATE_REQUEST")]
    DuplicateRequest,
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "DUPLICATE_USER")]
    DuplicateUser,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CACHE_ERROR")]
    CacheError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "BILL_PROVIDER_ERROR")]
    BillProviderError,
    #[serde(rename = "PROVIDER_RESPONSE_INVALID")]
    ProviderResponseInvalid,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Business rule violations
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No transaction matches the given request id or transaction id
    TransactionNotFound { id: String },
    /// A request id was reused for a different purchase
    DuplicateRequest { request_id: String, reason: String },
    UserNotFound { email: String },
    DuplicateUser { email: String },
    /// Webhook body did not carry a valid signature
    InvalidSignature,
}

/// Infrastructure-level errors (database, cache, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Redis cache unavailable
    Cache { message: String },
    /// Missing or invalid configuration
    Configuration { message: String },
    /// Background task panicked or was aborted
    Internal { message: String },
}

/// Bill provider errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Provider unreachable or answered with an error status
    BillProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Provider answered but the response could not be mapped
    MalformedResponse { provider: String, message: String },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing or blank
    MissingField { field: String },
    /// Amount is zero, negative or not a number
    InvalidAmount { amount: String, reason: String },
    /// Field present but malformed (phone, email, meter number)
    InvalidFormat { field: String, reason: String },
    /// Field value not among the accepted options
    UnsupportedValue {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::TransactionNotFound {
            id: id.into(),
        }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Internal {
            message: message.into(),
        }))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => 404,
                DomainError::DuplicateRequest { .. } => 409, // Conflict
                DomainError::UserNotFound { .. } => 404,
                DomainError::DuplicateUser { .. } => 409,
                DomainError::InvalidSignature => 401,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::BillProvider { .. } => 502, // Bad Gateway
                ExternalError::MalformedResponse { .. } => 502,
                ExternalError::Timeout { .. } => 504, // Gateway Timeout
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
                DomainError::DuplicateRequest { .. } => ErrorCode::DuplicateRequest,
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::DuplicateUser { .. } => ErrorCode::DuplicateUser,
                DomainError::InvalidSignature => ErrorCode::InvalidSignature,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Cache { .. } => ErrorCode::CacheError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
                InfrastructureError::Internal { .. } => ErrorCode::InternalError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::BillProvider { .. } => ErrorCode::BillProviderError,
                ExternalError::MalformedResponse { .. } => ErrorCode::ProviderResponseInvalid,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::TransactionNotFound { id } => {
                    format!("Transaction '{}' not found", id)
                }
                DomainError::DuplicateRequest { request_id, reason } => {
                    format!("Request '{}' was already used: {}", request_id, reason)
                }
                DomainError::UserNotFound { email } => {
                    format!("User '{}' not found", email)
                }
                DomainError::DuplicateUser { email } => {
                    format!("A user with email '{}' already exists", email)
                }
                DomainError::InvalidSignature => "Invalid webhook signature".to_string(),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::BillProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Bill provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Bill payment failed. Please contact support".to_string()
                    }
                }
                ExternalError::MalformedResponse { provider, .. } => {
                    format!(
                        "Bill provider ({}) returned an unreadable response. Please contact support",
                        provider
                    )
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidFormat { field, reason } => {
                    format!("Field '{}' is invalid: {}", field, reason)
                }
                ValidationError::UnsupportedValue {
                    field,
                    value,
                    allowed,
                } => {
                    format!(
                        "Field '{}' does not accept '{}'. Expected one of: {}",
                        field,
                        value,
                        allowed.join(", ")
                    )
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Configuration { .. } => false,
                InfrastructureError::Internal { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::BillProvider { is_retryable, .. } => *is_retryable,
                ExternalError::MalformedResponse { .. } => false,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::new(AppErrorKind::Validation(err))
    }
}

// From<DatabaseError> lives in database/error.rs, From<ProviderError> in providers/mod.rs
// and From<CacheError> in cache/error.rs.

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_not_found_error() {
        let error = AppError::not_found("req-404");

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::TransactionNotFound);
        assert!(error.user_message().contains("req-404"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_duplicate_request_error() {
        let error = AppError::new(AppErrorKind::Domain(DomainError::DuplicateRequest {
            request_id: "req-1".to_string(),
            reason: "amount differs from the original purchase".to_string(),
        }));

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::DuplicateRequest);
    }

    #[test]
    fn test_provider_timeout_error() {
        let error = AppError::new(AppErrorKind::External(ExternalError::Timeout {
            service: "vtpass".to_string(),
            timeout_secs: 30,
        }));

        assert_eq!(error.status_code(), 504);
        assert_eq!(error.error_code(), ErrorCode::ExternalServiceTimeout);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_validation_error() {
        let error: AppError = ValidationError::InvalidAmount {
            amount: "-100".to_string(),
            reason: "Amount must be greater than zero".to_string(),
        }
        .into();

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_unsupported_value_lists_options() {
        let error: AppError = ValidationError::UnsupportedValue {
            field: "meter_type".to_string(),
            value: "smart".to_string(),
            allowed: vec!["prepaid".to_string(), "postpaid".to_string()],
        }
        .into();

        assert_eq!(error.user_message(), "Field 'meter_type' does not accept 'smart'. Expected one of: prepaid, postpaid");
    }
}
