//! Request logging and request id generation

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Generates a UUID v4 for every request lacking an `x-request-id` header
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Logs every request with method, path, status and latency.
///
/// Runs inside `SetRequestIdLayer`, so the id is always present.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    async move {
        info!("Request started");
        let response = next.run(request).await;
        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if status.is_server_error() {
            error!(status = status.as_u16(), latency_ms, "Request failed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), latency_ms, "Request rejected");
        } else {
            info!(status = status.as_u16(), latency_ms, "Request completed");
        }

        response
    }
    .instrument(span)
    .await
}

/// Time an outbound call and log its outcome.
pub async fn log_external_call<F, T, E>(service: &str, operation: &str, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let result = call.await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => info!(
            service = service,
            operation = operation,
            duration_ms,
            "External call succeeded"
        ),
        Err(e) => warn!(
            service = service,
            operation = operation,
            duration_ms,
            error = %e,
            "External call failed"
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_uuid_request_ids() {
        let request = http::Request::builder().body(()).unwrap();
        let id = UuidRequestId.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(value).is_ok());
    }

    #[tokio::test]
    async fn external_call_passes_result_through() {
        let ok: Result<u8, String> = log_external_call("vtpass", "pay", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> =
            log_external_call("vtpass", "pay", async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }
}
