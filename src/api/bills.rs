//! Generic purchase and query endpoints, instantiated once per bill family

use crate::bills::{BillRecord, BillService, PurchaseHandler, TransactionStatus};
use crate::error::{AppError, AppErrorKind, ExternalError, ValidationError};
use crate::middleware::error::{
    get_request_id_from_headers, success_response, success_response_with_meta, ErrorResponse,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub user: Option<String>,
}

fn with_request_id(error: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}

/// POST {base}
pub async fn purchase<S: BillService>(
    State(handler): State<Arc<PurchaseHandler<S>>>,
    headers: HeaderMap,
    body: Result<Json<S::Request>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = AppError::from(ValidationError::InvalidFormat {
                field: "body".to_string(),
                reason: rejection.body_text(),
            });
            return with_request_id(error, &headers).into_response();
        }
    };

    let outcome = match handler.purchase(request).await {
        Ok(outcome) => outcome,
        Err(e) => return with_request_id(e, &headers).into_response(),
    };

    if outcome.record.status() != TransactionStatus::Failed {
        return success_response_with_meta(
            &outcome.record,
            serde_json::json!({ "replayed": outcome.replayed, "family": S::FAMILY }),
        )
        .into_response();
    }

    // A failed purchase is still a persisted record; return it with the cause.
    let failure = outcome.failure.unwrap_or_else(|| {
        AppError::new(AppErrorKind::External(ExternalError::BillProvider {
            provider: "vtpass".to_string(),
            message: "purchase was declined".to_string(),
            is_retryable: false,
        }))
    });
    let failure = with_request_id(failure, &headers)
        .with_context(format!("{} purchase {}", S::FAMILY, outcome.record.request_id()));
    let status =
        StatusCode::from_u16(failure.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);

    (
        status,
        Json(serde_json::json!({
            "success": false,
            "data": &outcome.record,
            "replayed": outcome.replayed,
            "error": ErrorResponse::from_app_error(&failure),
        })),
    )
        .into_response()
}

/// GET {base}/{id}
pub async fn get_one<S: BillService>(
    State(handler): State<Arc<PurchaseHandler<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    match handler.get(&id).await {
        Ok(record) => success_response(record).into_response(),
        Err(e) => with_request_id(e, &headers).into_response(),
    }
}

/// GET {base}/transactions?user=
pub async fn list<S: BillService>(
    State(handler): State<Arc<PurchaseHandler<S>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let user = query.user.unwrap_or_default();
    match handler.list(&user).await {
        Ok(records) => success_response(records).into_response(),
        Err(e) => with_request_id(e, &headers).into_response(),
    }
}

/// POST {base}/{id}/requery
pub async fn requery<S: BillService>(
    State(handler): State<Arc<PurchaseHandler<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    match handler.requery(&id).await {
        Ok(record) => success_response(record).into_response(),
        Err(e) => with_request_id(e, &headers).into_response(),
    }
}
