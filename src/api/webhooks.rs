//! Provider status callbacks

use crate::bills::mapper::status_update;
use crate::bills::raw::StatusDetails;
use crate::bills::{RawResponse, StatusUpdateTarget};
use crate::error::{AppError, AppErrorKind, AppResult, DomainError, ValidationError};
use crate::providers::verify_signature;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{info, warn};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

pub struct WebhookState {
    pub targets: Vec<Arc<dyn StatusUpdateTarget>>,
    /// Signatures are only checked when a secret is configured
    pub secret: Option<String>,
}

/// VTpass wraps the requery document as `{"type": "...", "data": {...}}`;
/// bare documents are accepted too.
fn parse_update_document(body: &[u8]) -> Result<RawResponse<StatusDetails>, ValidationError> {
    let mut document: JsonValue =
        serde_json::from_slice(body).map_err(|e| ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: e.to_string(),
        })?;

    if document.get("data").map_or(false, JsonValue::is_object) {
        document = document["data"].take();
    }

    serde_json::from_value(document).map_err(|e| ValidationError::InvalidFormat {
        field: "body".to_string(),
        reason: e.to_string(),
    })
}

/// POST /api/v1/webhooks/vtpass
async fn vtpass_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    if let Some(secret) = &state.secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !verify_signature(&body, secret, signature) {
            warn!("Rejected webhook with missing or invalid signature");
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::InvalidSignature,
            )));
        }
    }

    let raw = parse_update_document(&body)?;
    let update = status_update(&raw).map_err(|e| {
        AppError::from(ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: e.to_string(),
        })
    })?;

    info!(
        request_id = %update.request_id,
        status = %update.status,
        "Received provider status update"
    );

    for target in &state.targets {
        if let Some(status) = target.apply_status_update(&update).await? {
            info!(
                family = %target.family(),
                request_id = %update.request_id,
                status = %status,
                "Provider status update applied"
            );
            return Ok(Json(serde_json::json!({
                "response": "success",
                "matched": true,
                "family": target.family(),
                "status": status,
            })));
        }
    }

    // Acknowledge anyway so the provider stops redelivering.
    warn!(request_id = %update.request_id, "Status update for unknown request id");
    Ok(Json(serde_json::json!({
        "response": "success",
        "matched": false,
    })))
}

pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/api/v1/webhooks/vtpass", post(vtpass_webhook))
        .with_state(state)
}
