//! Request id middleware
//!
//! Every request runs inside a `tracing` span whose `session` field is the
//! caller's `X-Request-Id`, else its `X-Transaction-Id`, else a fresh UUID v4.
//! The id is echoed back in the `X-Request-Id` response header and is
//! available to handlers as a [`RequestId`] extension.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;

/// Header carrying the caller's request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback header carrying a transaction id
pub const TRANSACTION_ID_HEADER: &str = "x-transaction-id";

/// Request id attached to the request extensions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Resolve the request id from headers, generating one when absent
fn resolve_request_id(headers: &HeaderMap) -> String {
    [REQUEST_ID_HEADER, TRANSACTION_ID_HEADER]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Middleware attaching a request id span to each request
pub async fn propagate_request_id(mut request: Request, next: Next) -> Response {
    let session = resolve_request_id(request.headers());
    request.extensions_mut().insert(RequestId(session.clone()));

    let span = tracing::info_span!(
        "request",
        session = %session,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(request).await;

        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&session) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}
