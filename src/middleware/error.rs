//! Error response formatting
//!
//! Every error leaves the API as the same JSON document so clients can
//! branch on `error` and show `message`.

use crate::error::{AppError, ErrorCode};
use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Request ID for debugging and support
    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    /// Optional additional details (e.g. the context attached to the error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    /// Create a new error response from an AppError
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: error
                .context
                .as_ref()
                .map(|context| serde_json::json!({ "context": context })),
            retryable: Some(error.is_retryable()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Create a standardized success response
pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Create a standardized success response with metadata
pub fn success_response_with_meta<T: Serialize, M: Serialize>(
    data: T,
    meta: M,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "data": data,
        "meta": meta,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Helper to extract request ID from request headers
pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, DomainError, ExternalError, ValidationError};

    #[test]
    fn test_error_response_from_app_error() {
        let app_error = AppError::not_found("req-9").with_request_id("http_123");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert_eq!(error_response.error, ErrorCode::TransactionNotFound);
        assert_eq!(error_response.request_id, Some("http_123".to_string()));
        assert!(error_response.message.contains("req-9"));
        assert!(error_response.details.is_none());
    }

    #[test]
    fn test_context_becomes_details() {
        let app_error = AppError::new(AppErrorKind::External(ExternalError::MalformedResponse {
            provider: "vtpass".to_string(),
            message: "missing content.transactions".to_string(),
        }))
        .with_context("electricity purchase req-1");

        let error_response = ErrorResponse::from_app_error(&app_error);

        assert_eq!(error_response.error, ErrorCode::ProviderResponseInvalid);
        assert_eq!(
            error_response.details,
            Some(serde_json::json!({ "context": "electricity purchase req-1" }))
        );
    }

    #[test]
    fn test_app_error_into_response() {
        let app_error = AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
            amount: "-100".to_string(),
            reason: "Amount must be greater than zero".to_string(),
        }));

        let response = app_error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_into_response() {
        let app_error = AppError::new(AppErrorKind::Domain(DomainError::DuplicateUser {
            email: "ada@example.com".to_string(),
        }));

        assert_eq!(app_error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_request_id_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_request_id_from_headers(&headers), None);

        headers.insert("x-request-id", "abc-123".parse().unwrap());
        assert_eq!(
            get_request_id_from_headers(&headers),
            Some("abc-123".to_string())
        );
    }
}
