//! Request helpers for route handlers.
//!
//! # Responsibilities
//! - Read the request ID assigned by the trace module
//! - Parse JSON bodies into typed values, answering failures with an envelope
//!
//! # Design Decisions
//! - Body size is bounded here as well as by the limit middleware
//! - Parse failures are client errors (400), never internal errors

use axum::{body::Body, http::Request};
use serde::de::DeserializeOwned;

use crate::http::envelope::HandlerError;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Default ceiling for [`read_json`] when no explicit limit is given.
pub const DEFAULT_JSON_LIMIT: usize = 100 * 1024;

/// Correlation ID of a request, if one was assigned.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}

/// Consume the request body and deserialize it as JSON.
pub async fn read_json<T>(request: Request<Body>, limit: usize) -> Result<T, HandlerError>
where
    T: DeserializeOwned,
{
    let bytes = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| HandlerError::bad_request(format!("Unreadable body: {e}")))?;

    if bytes.is_empty() {
        return Err(HandlerError::bad_request("Expected a JSON body"));
    }

    Ok(serde_json::from_slice(&bytes)?)
}
