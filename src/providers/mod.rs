//! Outbound bill provider seam

pub mod vtpass;

pub use vtpass::{verify_signature, VtpassClient, VtpassPayload};

use crate::bills::{BillService, RawResponse};
use crate::error::{AppError, AppErrorKind, ExternalError};
use async_trait::async_trait;
use thiserror::Error;

/// Provider transport and protocol failures. A provider that answered with a
/// well-formed "failed" response is not an error here; that is a mapped
/// transaction status.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider request failed: {message}")]
    Transport { message: String },

    #[error("provider did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("provider returned an unreadable body: {message}")]
    InvalidResponse { message: String },

    #[error("provider client misconfigured: {message}")]
    Configuration { message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport { .. } | ProviderError::Timeout { .. } => true,
            ProviderError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            ProviderError::InvalidResponse { .. } | ProviderError::Configuration { .. } => false,
        }
    }
}

/// Sends purchases and status queries for one bill family.
#[async_trait]
pub trait BillProvider<S: BillService>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn purchase(
        &self,
        request: &S::Request,
    ) -> Result<RawResponse<S::Details>, ProviderError>;

    async fn requery(&self, request_id: &str) -> Result<RawResponse<S::Details>, ProviderError>;
}

/// Convert with the provider name attached.
pub fn provider_error(provider: &str, err: ProviderError) -> AppError {
    let kind = match &err {
        ProviderError::Timeout { timeout_secs } => ExternalError::Timeout {
            service: provider.to_string(),
            timeout_secs: *timeout_secs,
        },
        ProviderError::InvalidResponse { message } => ExternalError::MalformedResponse {
            provider: provider.to_string(),
            message: message.clone(),
        },
        _ => ExternalError::BillProvider {
            provider: provider.to_string(),
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        },
    };

    AppError::new(AppErrorKind::External(kind))
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        provider_error("vtpass", err)
    }
}
